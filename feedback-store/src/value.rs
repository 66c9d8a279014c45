//! Feedback values exported by cells
//!
//! A control surface only understands three signal shapes: digital (bool),
//! analog (integer) and serial (text). `FeedbackValue` mirrors that.
//!
//! # Example
//!
//! ```rust
//! use feedback_store::FeedbackValue;
//!
//! let online = FeedbackValue::from(true);
//! assert_eq!(online.as_bool(), Some(true));
//! assert_eq!(online.as_int(), None);
//! ```

use std::fmt;

/// A single observable value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackValue {
    /// Digital signal
    Bool(bool),
    /// Analog signal
    Int(i32),
    /// Serial signal
    Text(String),
}

impl FeedbackValue {
    /// Returns the boolean if this is a `Bool` value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FeedbackValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer if this is an `Int` value
    pub fn as_int(&self) -> Option<i32> {
        match self {
            FeedbackValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the text if this is a `Text` value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FeedbackValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Short name of the signal kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            FeedbackValue::Bool(_) => "bool",
            FeedbackValue::Int(_) => "int",
            FeedbackValue::Text(_) => "text",
        }
    }
}

impl From<bool> for FeedbackValue {
    fn from(value: bool) -> Self {
        FeedbackValue::Bool(value)
    }
}

impl From<i32> for FeedbackValue {
    fn from(value: i32) -> Self {
        FeedbackValue::Int(value)
    }
}

impl From<String> for FeedbackValue {
    fn from(value: String) -> Self {
        FeedbackValue::Text(value)
    }
}

impl From<&str> for FeedbackValue {
    fn from(value: &str) -> Self {
        FeedbackValue::Text(value.to_string())
    }
}

impl fmt::Display for FeedbackValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackValue::Bool(b) => write!(f, "{}", b),
            FeedbackValue::Int(i) => write!(f, "{}", i),
            FeedbackValue::Text(s) => write!(f, "{:?}", s),
        }
    }
}
