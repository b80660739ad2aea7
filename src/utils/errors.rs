#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("Frame buffer overflow: no closing sync word within {0} bytes")]
    BufferOverflow(usize),

    #[error("Exceeded limit of {0} extension substream headers in one frame")]
    ExssAccumulatorOverflow(usize),

    #[error("Expected extension substream sync word, got {0:#010X}")]
    UnexpectedSyncTransition(u32),
}

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("Unrecognized sync word {0:#010X} at frame start")]
    InvalidSyncWord(u32),

    #[error("Not enough bits for {section}: need {needed}, have {available}")]
    NotEnoughBits {
        section: &'static str,
        needed: u64,
        available: u64,
    },
}
