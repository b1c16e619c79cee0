use thiserror::Error;

#[derive(Debug, Error)]
pub enum TriageError {
    #[error("Invalid specification: {0}")]
    InvalidSpec(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Rubric error: {0}")]
    Rubric(String),

    #[error("Expression error: {0}")]
    Expression(String),

    #[error("Memory backend error: {0}")]
    Memory(String),

    #[error("Tool execution failed: {0}")]
    Tool(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TriageError>;
