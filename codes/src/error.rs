use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodesError {
    #[error("unknown game: {0}")]
    UnknownGame(String),

    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("unknown code kind: {0}")]
    UnknownKind(String),

    #[error("unknown redemption status: {0}")]
    UnknownStatus(String),

    #[error("unknown unresolved policy: {0}")]
    UnknownPolicy(String),

    #[error("no code at row {row} (collection holds {size})")]
    RowOutOfRange { row: usize, size: usize },

    #[error("code not found in {scope}: {code}")]
    CodeNotFound { scope: String, code: String },
}
