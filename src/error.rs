use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("Unsupported target: {0}")]
    UnsupportedTarget(String),

    #[error("Invalid chart uri: {0}")]
    InvalidUri(String),

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    #[error("Invalid unit: {0}")]
    InvalidUnit(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Not supported SQL Server version ({0}), currently only V11 and V12 databases are supported")]
    UnsupportedVersion(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChartError {
    /// True for errors caused by the caller's request rather than a backend.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ChartError::UnsupportedTarget(_)
                | ChartError::InvalidUri(_)
                | ChartError::InvalidInterval(_)
                | ChartError::InvalidUnit(_)
        )
    }
}

impl From<serde_json::Error> for ChartError {
    fn from(err: serde_json::Error) -> Self {
        ChartError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for ChartError {
    fn from(err: reqwest::Error) -> Self {
        ChartError::Transport(err.to_string())
    }
}

impl From<url::ParseError> for ChartError {
    fn from(err: url::ParseError) -> Self {
        ChartError::InvalidUri(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChartError>;
