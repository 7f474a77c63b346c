use indicatif::style::TemplateError;
use thiserror::Error;

pub type GymResult<T> = Result<T, GymError>;

#[derive(Debug, Error)]
pub enum GymError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error(transparent)]
    Io(#[from] IoError),
}

/// Errors occurring within Agent logic or execution.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent logic error: {0}")]
    Logic(String),

    #[error("Invalid input to agent: {0}")]
    InvalidInput(String),
}

/// Errors related to price tables, feature series and their data quality.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Empty price series for instrument '{0}'")]
    EmptySeries(String),

    #[error("Dates are not strictly increasing for '{instrument}': {prev} followed by {next}")]
    NonMonotonicDates {
        instrument: String,
        prev: String,
        next: String,
    },

    #[error("Invalid price bar for '{instrument}' on {date}: {msg}")]
    InvalidBar {
        instrument: String,
        date: String,
        msg: String,
    },

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Null value in column '{column}' at row {row}")]
    NullValue { column: String, row: usize },

    #[error("Failed to parse date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("Data frame error: {0}")]
    DataFrame(String),
}

/// Errors related to the environment configuration and its step/reset lifecycle.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Mismatched series lengths or feature sets, invalid indicator windows,
    /// unusable initial cash. Fatal, raised before any episode starts.
    #[error("Invalid environment configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown instrument in action: '{0}'")]
    UnknownInstrument(String),

    #[error("Action vector has {got} entries, expected one per instrument ({expected})")]
    ActionLength { expected: usize, got: usize },

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Failed to encode EnvConfig")]
    Encoding(#[from] postcard::Error),

    #[error("Progress bar error")]
    ProgressBar(#[from] TemplateError),
}

/// Errors related to file I/O and serialization.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("IO operation failed")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read data: {0}")]
    ReadFailed(String),

    #[error("Failed to write data: {0}")]
    WriteFailed(String),
}

pub(crate) fn polars_to_gym_error(e: polars::error::PolarsError) -> GymError {
    DataError::DataFrame(e.to_string()).into()
}
