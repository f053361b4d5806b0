//! Error types for time-stepped simulation.

use thiserror::Error;

/// Errors encountered while stepping a network through time.
#[derive(Error, Debug)]
pub enum SimError {
    /// The run could not be set up (e.g. the solver is not available).
    #[error("Setup error: {what}")]
    Setup { what: String },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Solver did not converge at t={time} s ({status})")]
    ConvergenceFailed { time: i64, status: String },

    #[error("Backend error: {message}")]
    Backend { message: String },
}

pub type SimResult<T> = Result<T, SimError>;

impl From<hn_solver::SolverError> for SimError {
    fn from(e: hn_solver::SolverError) -> Self {
        match e {
            hn_solver::SolverError::Unavailable { .. } => SimError::Setup {
                what: e.to_string(),
            },
            _ => SimError::Backend {
                message: e.to_string(),
            },
        }
    }
}

impl From<hn_network::NetworkError> for SimError {
    fn from(e: hn_network::NetworkError) -> Self {
        SimError::Backend {
            message: e.to_string(),
        }
    }
}

impl From<hn_aml::AmlError> for SimError {
    fn from(e: hn_aml::AmlError) -> Self {
        SimError::Backend {
            message: e.to_string(),
        }
    }
}
