//! Error types.
//!
//! - `CalibrationError` is what the calibration core returns. Every variant is
//!   local to one point or one fit, so batch callers decide whether to skip.
//! - `AppError` is the application-level error carrying a process exit code.

use chrono::{DateTime, Utc};

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Failures of the calibration core.
#[derive(Debug, Clone)]
pub enum CalibrationError {
    /// No raw reading with a value exists on one side of `at`.
    DataGap { at: DateTime<Utc> },
    /// Zero slope, zero-width glucose domain, or non-finite inputs.
    DegenerateInput(String),
    /// The data source failed while answering a lookup.
    Source(AppError),
}

impl CalibrationError {
    pub fn degenerate(message: impl Into<String>) -> Self {
        Self::DegenerateInput(message.into())
    }

    pub fn is_data_gap(&self) -> bool {
        matches!(self, Self::DataGap { .. })
    }
}

impl std::fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataGap { at } => {
                write!(f, "No bracketing raw readings around {}", at.to_rfc3339())
            }
            Self::DegenerateInput(msg) => write!(f, "Degenerate input: {msg}"),
            Self::Source(e) => write!(f, "Data source error: {e}"),
        }
    }
}

impl std::error::Error for CalibrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Source(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AppError> for CalibrationError {
    fn from(value: AppError) -> Self {
        Self::Source(value)
    }
}

impl From<CalibrationError> for AppError {
    fn from(value: CalibrationError) -> Self {
        match value {
            CalibrationError::Source(e) => e,
            CalibrationError::DataGap { .. } => AppError::new(3, value.to_string()),
            CalibrationError::DegenerateInput(_) => AppError::new(4, value.to_string()),
        }
    }
}
