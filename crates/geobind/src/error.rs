pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the binding layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Path(#[from] docpath::Error),

    #[error("schema validation failed at '{expression}': {message}")]
    SchemaValidation { expression: String, message: String },

    #[error("column count mismatch for '{context}': expected {expected}, got {actual}")]
    ColumnCountMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("missing column '{column}' required by '{context}'")]
    MissingColumn { context: String, column: String },

    #[error("unsupported attribute type for column '{column}': {data_type}")]
    UnsupportedAttributeType { column: String, data_type: String },

    #[error("no compatible binding registered for schema '{schema_id}'")]
    NoCompatibleVersion { schema_id: String },

    #[error("a binding is already registered for schema version '{schema_id}'")]
    DuplicateVersion { schema_id: String },

    #[error("classification mismatch: expected '{expected}', got '{actual}'")]
    ClassificationMismatch { expected: String, actual: String },

    #[error("invalid schema id '{id}': {message}")]
    InvalidSchemaId { id: String, message: String },

    #[error("dataset has no attribute binding for extra columns: {columns:?}")]
    NoAttributeBinding { columns: Vec<String> },

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("remote service error: {message}")]
    Remote { message: String },

    #[error("object not found: {reference}")]
    NotFound { reference: String },
}

impl Error {
    pub(crate) fn validation(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Error::SchemaValidation {
            expression: expression.into(),
            message: message.into(),
        }
    }
}
