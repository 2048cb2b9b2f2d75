// pitchloc_core/src/error.rs

use thiserror::Error;

/// Errors surfaced by the localization core.
///
/// Only construction and reconfiguration can fail. Every per-cycle operation
/// degrades locally instead of returning an error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LocalizationError {
    #[error("the sample set needs at least one sample (got {0})")]
    InvalidSampleCount(usize),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("invalid field dimensions: {0}")]
    InvalidFieldDimensions(String),
}

impl LocalizationError {
    pub(crate) fn parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Fails with [`LocalizationError::InvalidParameter`] unless `value` is finite and `>= 0`.
pub(crate) fn ensure_non_negative(name: &'static str, value: f64) -> Result<(), LocalizationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(LocalizationError::parameter(
            name,
            format!("must be finite and non-negative, got {value}"),
        ))
    }
}

/// Fails with [`LocalizationError::InvalidParameter`] unless `value` is finite and `> 0`.
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<(), LocalizationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(LocalizationError::parameter(
            name,
            format!("must be finite and positive, got {value}"),
        ))
    }
}
