use thiserror::Error;

/// Validation error types
///
/// Raised before anything reaches the wire: a scene that fails validation is
/// never formatted into a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Parameter '{parameter}' value '{value}' is out of range ({min}..={max})")]
    RangeError {
        parameter: String,
        value: String,
        min: String,
        max: String,
    },

    #[error("Parameter '{parameter}' must not be empty")]
    Empty { parameter: String },
}

impl ValidationError {
    pub fn range_error(
        parameter: &str,
        min: impl std::fmt::Display,
        max: impl std::fmt::Display,
        value: impl std::fmt::Display,
    ) -> Self {
        Self::RangeError {
            parameter: parameter.to_string(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    pub fn empty(parameter: &str) -> Self {
        Self::Empty {
            parameter: parameter.to_string(),
        }
    }
}

/// Protocol-level errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Inbound line doesn't match the scene status grammar
    #[error("Unrecognized line: {0:?}")]
    UnrecognizedLine(String),

    /// Delimiter must be exactly "\n" or "\r"
    #[error("Invalid delimiter {0:?} (expected \"\\n\" or \"\\r\")")]
    InvalidDelimiter(String),

    /// Scene failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Type alias for results that can return a ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
