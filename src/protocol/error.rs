/// Reasons an incoming frame is not a usable parameter change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The frame is shorter than the layout its header selects.
    #[error("truncated frame ({len} bytes, expected {expected})")]
    Truncated { len: usize, expected: usize },

    #[error("unsupported status: {0:#04X}")]
    UnsupportedStatus(u8),

    #[error("unsupported manufacturer: {0:#04X}")]
    UnsupportedManufacturer(u8),

    #[error("unsupported device group: {0:#04X}")]
    UnsupportedGroup(u8),

    #[error("unsupported device model: {0:#04X}")]
    UnsupportedModel(u8),

    /// Bulk dump, bulk request, or a request where a change was expected
    /// (and the other way round).
    #[error("unsupported sub-status: {0:#03X}")]
    UnsupportedSubStatus(u8),

    #[error("function calls unsupported")]
    FunctionCallUnsupported,

    #[error("level meter unsupported")]
    LevelMeterUnsupported,

    #[error("unsupported data category: {0:#04X}")]
    UnsupportedDataCategory(u8),

    #[error("no terminator, instead saw: {0:#04X}")]
    MissingTerminator(u8),
}
