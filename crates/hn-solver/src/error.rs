//! Error types for translation and solving.

use hn_aml::AmlError;
use thiserror::Error;

/// Errors that can occur while translating, solving or harvesting.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Translation failed: {what}")]
    Translation { what: String },

    #[error("Constraint '{name}' could not be translated: {reason}")]
    ConstraintDropped { name: String, reason: String },

    #[error("Solver '{name}' is not available (available: {available})")]
    Unavailable { name: String, available: String },

    #[error("Harvest failed: {what}")]
    Harvest { what: String },

    #[error("{what} not found in index map")]
    IndexNotFound { what: &'static str },

    #[error("Numeric error: {what}")]
    Numeric { what: String },

    #[error("Model error: {0}")]
    Model(#[from] AmlError),
}

pub type SolverResult<T> = Result<T, SolverError>;
