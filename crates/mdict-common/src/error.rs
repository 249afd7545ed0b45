use thiserror::Error;

pub type MdictResult<T> = Result<T, MdictError>;

#[derive(Error, Debug)]
pub enum MdictError {
    #[error("Unsupported compression type ({0}). Only 0 (none) and 2 (zlib) can be written.")]
    UnsupportedCompression(u32),
    #[error("Unsupported text encoding ({0})")]
    UnsupportedEncoding(Box<str>),
    #[error("Failed to write to the output sink: {0}")]
    SinkWrite(#[from] std::io::Error),
    #[error("`{op}` cannot be called when the writer is {state}")]
    Sequencing {
        op: &'static str,
        state: &'static str,
    },
    #[error("Invalid value ({0})")]
    InvalidValue(Box<str>),
    #[error("Key {key:?} sorts before the previous key {previous:?}, but ascending key order is required")]
    UnsortedKey { previous: Box<str>, key: Box<str> },
    #[error("Decode error ({0})")]
    DecodeError(Box<str>),
    #[error("Checksum mismatch in {0}. The data is corrupted.")]
    DecodeChecksumMismatchError(&'static str),
}

impl MdictError {
    /// Whether this error was caused by calling the writer out of order.
    pub fn is_sequencing(&self) -> bool {
        matches!(self, MdictError::Sequencing { .. })
    }

    /// Whether this error was caused by an invalid writer configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            MdictError::UnsupportedCompression(_) | MdictError::UnsupportedEncoding(_)
        )
    }
}
