use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("Failed to parse report: {0}")]
    Parse(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] crate::schema::ValidationError),

    #[error("Invalid literal: {0}")]
    Literal(#[from] crate::parsers::literal::LiteralError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CollectError>;
