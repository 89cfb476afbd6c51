// ABOUTME: Audit history of messages passed through the simulator
// ABOUTME: A CRUD store trait and an in-memory implementation

use crate::sync::lock;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::SystemTime;
use tracing::info;

/// Direction of a recorded message
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageType {
    /// Mobile originated, injected towards the ESME
    Mo,
    /// Mobile terminated, submitted by the ESME
    Mt,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageRecord {
    /// Assigned by the store on save; 0 until then
    pub id: u32,
    pub source_addr: u64,
    pub dest_addr: u64,
    pub short_message: String,
    pub message_type: MessageType,
    pub timestamp: SystemTime,
}

impl MessageRecord {
    pub fn new(
        source_addr: u64,
        dest_addr: u64,
        short_message: impl Into<String>,
        message_type: MessageType,
        timestamp: SystemTime,
    ) -> Self {
        Self {
            id: 0,
            source_addr,
            dest_addr,
            short_message: short_message.into(),
            message_type,
            timestamp,
        }
    }
}

/// Persistence for message history
pub trait MessageStore: Send + Sync {
    /// Store `record` and return the id it was given
    fn save(&self, record: MessageRecord) -> u32;

    fn find_by_source_and_destination(&self, source_addr: u64, dest_addr: u64)
    -> Vec<MessageRecord>;

    /// Every record, ordered by message type
    fn find_all(&self) -> Vec<MessageRecord>;

    fn find_by_id(&self, id: u32) -> Option<MessageRecord>;

    /// Delete the stored record with the same id as `record`
    fn delete(&self, record: &MessageRecord) -> bool {
        self.delete_by_id(record.id)
    }

    fn delete_by_id(&self, id: u32) -> bool;

    fn delete_all(&self);
}

#[derive(Debug, Default)]
struct Records {
    next_id: u32,
    by_id: BTreeMap<u32, MessageRecord>,
}

/// In-memory [`MessageStore`]
#[derive(Debug, Default)]
pub struct MessageLog {
    records: Mutex<Records>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MessageStore for MessageLog {
    fn save(&self, mut record: MessageRecord) -> u32 {
        let mut records = lock(&self.records);
        records.next_id += 1;
        let id = records.next_id;
        record.id = id;
        info!(id, message_type = ?record.message_type, "message recorded");
        records.by_id.insert(id, record);
        id
    }

    fn find_by_source_and_destination(
        &self,
        source_addr: u64,
        dest_addr: u64,
    ) -> Vec<MessageRecord> {
        lock(&self.records)
            .by_id
            .values()
            .filter(|r| r.source_addr == source_addr && r.dest_addr == dest_addr)
            .cloned()
            .collect()
    }

    fn find_all(&self) -> Vec<MessageRecord> {
        let mut all: Vec<MessageRecord> = lock(&self.records).by_id.values().cloned().collect();
        // Stable sort keeps id order within a type
        all.sort_by_key(|r| r.message_type);
        all
    }

    fn find_by_id(&self, id: u32) -> Option<MessageRecord> {
        lock(&self.records).by_id.get(&id).cloned()
    }

    fn delete_by_id(&self, id: u32) -> bool {
        let removed = lock(&self.records).by_id.remove(&id).is_some();
        if removed {
            info!(id, "message deleted");
        }
        removed
    }

    fn delete_all(&self) {
        lock(&self.records).by_id.clear();
        info!("all messages deleted");
    }
}
