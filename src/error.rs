use crate::fourcc::FourCC;

/// Errors surfaced by the parse and extraction passes.
///
/// `Format` covers structural inconsistencies in the box stream itself,
/// `Truncated` means the source ran out of bytes before a declared field,
/// and `Integrity` means the decoded sample tables (or a frame header)
/// contradict each other. Unknown box types are never an error; the walker
/// skips them.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("format: {0}")]
    Format(String),

    #[error("truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: u64, available: u64 },

    #[error("integrity: {0}")]
    Integrity(String),

    #[error("in box `{typ}` at offset {offset}: {source}")]
    InBox {
        typ: FourCC,
        offset: u64,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap an error with the box that was being decoded when it occurred.
    pub fn in_box(self, typ: FourCC, offset: u64) -> Self {
        Error::InBox {
            typ,
            offset,
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
