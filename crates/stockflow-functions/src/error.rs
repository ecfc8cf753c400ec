use thiserror::Error;

#[derive(Error, Debug)]
pub enum FunctionError {
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Failed to read s3://{bucket}/{key}: {message}")]
    ObjectRead {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Table error: {0}")]
    Table(String),

    #[error("{0} items were still unprocessed after retrying")]
    Unprocessed(usize),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FunctionError>;
