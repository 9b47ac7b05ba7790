use thiserror::Error;

#[derive(Error, Debug)]
pub enum HwpError {
    /// Input bytes are not a recognized HWP or HWPX container.
    #[error("Invalid file format: {0}")]
    Format(String),

    /// A structural invariant of the document is broken.
    #[error("Corrupt document: {0}")]
    Corrupt(String),

    /// A feature the editor does not implement.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A reference failed to parse or resolve.
    #[error("Invalid reference '{reference}': {reason}")]
    Ref { reference: String, reason: String },

    /// Mutually incompatible options were supplied together.
    #[error("Conflicting options: {0}")]
    Conflicting(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl HwpError {
    pub fn bad_ref(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Ref {
            reference: reference.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HwpError>;
