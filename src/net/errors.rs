use thiserror::Error;

#[derive(Debug, PartialEq, Error)]
pub enum HeaderError {
    #[error("Buffer too small: expected {expected} bytes, found {found} bytes")]
    BufferTooSmall { expected: usize, found: usize },

    #[error("Bad {0} checksum")]
    BadChecksum(String),

    #[error("Payload too large: at most {max} bytes, found {found} bytes")]
    PayloadTooLarge { max: usize, found: usize },

    #[error("Unsupported {0}")]
    Unsupported(String),
}
