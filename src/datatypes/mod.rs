mod command_id;
mod command_status;
mod data_sm;
mod deliver_sm;
mod numeric_plan_indicator;
mod outbind;
mod pdu;
mod tlv;
mod type_of_number;

pub use command_id::CommandId;
pub use command_status::CommandStatus;
pub use data_sm::DataSm;
pub use deliver_sm::{
    DeliverSm, DeliverSmBuilder, DeliverSmResponse, ESM_CLASS_DELIVERY_RECEIPT,
    MAX_SHORT_MESSAGE_LENGTH,
};
pub use numeric_plan_indicator::NumericPlanIndicator;
pub use outbind::Outbind;
pub use pdu::MoPdu;
pub use tlv::{TAG_MESSAGE_PAYLOAD, Tlv};
pub use type_of_number::TypeOfNumber;
