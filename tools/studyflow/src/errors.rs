use thiserror::Error;

#[derive(Debug, Error)]
pub enum StudyError {
    #[error("io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("cli error: {0}")]
    Cli(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("catalog error: {0}")]
    Catalog(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}
