//! Error types for policy validation.

use thiserror::Error;

/// A threshold policy that cannot be evaluated.
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("required fraction must be within 0.0..=1.0, got {0}")]
    FractionOutOfRange(f64),

    #[error("threshold must be a finite number, got {0}")]
    NonFiniteThreshold(f64),
}
