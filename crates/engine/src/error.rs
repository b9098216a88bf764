//! Error taxonomy for the analysis pipeline

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// A required OHLCV column is absent from the whole series. Fatal for the symbol.
    #[error("Missing required column: {column}")]
    MissingColumn { column: &'static str },

    /// Not enough bars for a window. Always handled where it is raised.
    #[error("{indicator} needs {required} bars, only {available} available")]
    InsufficientHistory {
        indicator: &'static str,
        required: usize,
        available: usize,
    },

    #[error("No data for symbol {symbol}: {reason}")]
    UpstreamData { symbol: String, reason: String },

    #[error("{indicator} backend error: {reason}")]
    Backend {
        indicator: &'static str,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The analysis itself broke down (panicked or was cancelled)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    pub fn insufficient(indicator: &'static str, required: usize, available: usize) -> Self {
        Self::InsufficientHistory {
            indicator,
            required,
            available,
        }
    }

    pub fn upstream(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UpstreamData {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    /// Fatal errors abort the analysis of a symbol; everything else is isolated.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingColumn { .. } | Self::InvalidConfig(_))
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
