use chrono::NaiveDate;
use thiserror::Error;

/// Malformed decision text. Recoverable: the decision is dropped and logged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid ticker: {0}")]
    InvalidTicker(String),

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("No JSON payload found in response")]
    NoPayload,

    #[error("Malformed JSON payload: {0}")]
    MalformedJson(String),
}

impl ValidationError {
    /// Stable identifier for log grouping and idempotence checks.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::MissingField(_) => "missing_field",
            ValidationError::InvalidAction(_) => "invalid_action",
            ValidationError::InvalidAmount(_) => "invalid_amount",
            ValidationError::InvalidTicker(_) => "invalid_ticker",
            ValidationError::OutOfRange { .. } => "out_of_range",
            ValidationError::NoPayload => "no_payload",
            ValidationError::MalformedJson(_) => "malformed_json",
        }
    }
}

/// Missing or unreachable price data. Escalates the run to Failed.
#[derive(Error, Debug, Clone)]
pub enum DataError {
    #[error("No price for {ticker} on {date} within lookback window")]
    NotFound { ticker: String, date: NaiveDate },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider timed out after {attempts} attempts: {message}")]
    Timeout { attempts: u32, message: String },

    #[error("Malformed series for {ticker}: {message}")]
    MalformedSeries { ticker: String, message: String },
}

/// A decision inconsistent with portfolio state. Recoverable per decision.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Insufficient cash for {ticker}: need {required}, have {available}")]
    InsufficientCash {
        ticker: String,
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },

    #[error("Position already open for {0}")]
    PositionExists(String),

    #[error("No open position for {0}")]
    NoOpenPosition(String),
}

/// Fatal engine failure. Carries the date/ticker that caused the halt.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Run failed on {date} ({ticker}): {source}")]
    Data {
        ticker: String,
        date: NaiveDate,
        #[source]
        source: DataError,
    },

    #[error("Engine already consumed; a run can only be executed once")]
    AlreadyRun,
}

/// Decision oracle failure. Timeouts are retried; exhaustion is recoverable
/// at the persona-day level (the decision is dropped, the run continues).
#[derive(Error, Debug, Clone)]
pub enum OracleError {
    #[error("Oracle request failed: {0}")]
    Request(String),

    #[error("Oracle timed out after {attempts} attempts")]
    Timeout { attempts: u32 },
}
