use num_enum::{FromPrimitive, IntoPrimitive};

/// The command_status field of an SMPP response.
///
/// Every 32-bit value decodes: codes SMPP v3.4 does not name (reserved ranges,
/// SMPP extensions and vendor specific errors) land in `Other`. `MessageQueueFull`
/// (ESME_RMSGQFUL) is the single status that sends an MO message back for a
/// delayed retry.
#[derive(FromPrimitive, IntoPrimitive)]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CommandStatus {
    /// No Error
    Ok = 0x0000_0000,

    /// Message Length is invalid
    InvalidMsgLength = 0x0000_0001,

    /// Command Length is invalid
    InvalidCommandLength = 0x0000_0002,

    /// Invalid Command ID
    InvalidCommandId = 0x0000_0003,

    /// Incorrect BIND Status for given command
    IncorrectBindStatus = 0x0000_0004,

    /// ESME Already in Bound State
    AlreadyBoundState = 0x0000_0005,

    /// Invalid Priority Flag
    InvalidPriorityFlag = 0x0000_0006,

    /// Invalid Registered Delivery Flag
    InvalidRegisteredDeliveryFlag = 0x0000_0007,

    /// System Error
    SystemError = 0x0000_0008,

    /// Invalid Source Address
    InvalidSourceAddress = 0x0000_000A,

    /// Invalid Dest Addr
    InvalidDestinationAddress = 0x0000_000B,

    /// Message ID is invalid
    InvalidMessageId = 0x0000_000C,

    /// Bind Failed
    BindFailed = 0x0000_000D,

    /// Invalid Password
    InvalidPassword = 0x0000_000E,

    /// Invalid System ID
    InvalidSystemId = 0x0000_000F,

    /// Cancel SM Failed
    CancelSmFailed = 0x0000_0011,

    /// Replace SM Failed
    ReplaceSmFailed = 0x0000_0013,

    /// Message Queue Full (ESME_RMSGQFUL)
    MessageQueueFull = 0x0000_0014,

    /// Invalid Service Type
    InvalidServiceType = 0x0000_0015,

    /// Invalid number of destinations
    InvalidNumberOfDestinations = 0x0000_0033,

    /// Invalid Distribution List name
    InvalidDistributionListName = 0x0000_0034,

    /// Destination flag is invalid (submit_multi)
    InvalidDestinationFlag = 0x0000_0040,

    /// Invalid 'submit with replace' request
    InvalidSubmitWithReplaceRequest = 0x0000_0042,

    /// Invalid esm_class field data
    InvalidEsmClassFieldData = 0x0000_0043,

    /// Cannot Submit to Distribution List
    CannotSubmitToDistributionList = 0x0000_0044,

    /// submit_sm or submit_multi failed
    SubmitFailed = 0x0000_0045,

    /// Invalid Source address TON
    InvalidSourceAddressTon = 0x0000_0048,

    /// Invalid Source address NPI
    InvalidSourceAddressNpi = 0x0000_0049,

    /// Invalid Destination address TON
    InvalidDestinationAddressTon = 0x0000_0050,

    /// Invalid Destination address NPI
    InvalidDestinationAddressNpi = 0x0000_0051,

    /// Invalid system_type field
    InvalidSystemTypeField = 0x0000_0053,
    /// Invalid replace_if_present flag
    InvalidReplaceIfPresentFlag = 0x0000_0054,
    /// Invalid number of messages
    InvalidNumberOfMessages = 0x0000_0055,

    /// Throttling error (ESME has exceeded allowed message limits)
    ThrottlingError = 0x0000_0058,

    /// Invalid Scheduled Delivery Time
    InvalidScheduledDeliveryTime = 0x0000_0061,
    /// Invalid message validity period (Expiry time)
    InvalidExpiryTime = 0x0000_0062,
    /// Predefined Message Invalid or Not Found
    InvalidPredefinedMessageId = 0x0000_0063,
    /// ESME Receiver Temporary App Error Code
    ReceiverTemporaryAppError = 0x0000_0064,
    /// ESME Receiver Permanent App Error Code
    ReceiverPermanentAppError = 0x0000_0065,
    /// ESME Receiver Reject Message Error Code
    ReceiverRejectMessageError = 0x0000_0066,
    /// query_sm request failed
    QuerySmRequestFailed = 0x0000_0067,

    /// Error in the optional part of the PDU Body
    ErrorInOptionalPartOfPduBody = 0x0000_00C0,
    /// Optional Parameter not allowed
    OptionalParameterNotAllowed = 0x0000_00C1,
    /// Invalid Parameter Length
    InvalidParameterLength = 0x0000_00C2,
    /// Expected Optional Parameter missing
    ExpectedOptionalParameterMissing = 0x0000_00C3,
    /// Invalid Optional Parameter Value
    InvalidOptionalParameterValue = 0x0000_00C4,

    /// Delivery Failure (used for data_sm_resp)
    DeliveryFailed = 0x0000_00FE,

    /// Unknown Error
    UnknownError = 0x0000_00FF,

    /// Reserved, SMPP extension or vendor specific code
    #[num_enum(catch_all)]
    Other(u32),
}

impl CommandStatus {
    /// Whether the far end asked for the message to be offered again later.
    pub fn requests_retry(&self) -> bool {
        matches!(self, CommandStatus::MessageQueueFull)
    }
}
