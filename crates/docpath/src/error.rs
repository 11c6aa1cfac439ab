pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised when compiling or writing through a path expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("invalid path expression '{expression}' at offset {position}: {message}")]
    Syntax {
        expression: String,
        position: usize,
        message: String,
    },

    #[error("expression '{expression}' is not a supported assignment target")]
    UnsupportedAssignmentTarget { expression: String },

    #[error("invalid assignment target '{expression}': {message}")]
    InvalidAssignmentTarget { expression: String, message: String },
}
