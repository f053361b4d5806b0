//! Error types for the hn-app service layer.

use std::path::PathBuf;

/// Application error type that wraps errors from the backend crates and
/// gives the CLI one error interface.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Project error: {0}")]
    Project(String),

    #[error("Failed to read project file: {path}")]
    ProjectFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Project validation failed: {0}")]
    Validation(String),

    #[error("Network compilation failed: {0}")]
    Compile(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for hn-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<hn_project::ProjectError> for AppError {
    fn from(err: hn_project::ProjectError) -> Self {
        match err {
            hn_project::ProjectError::Validation(e) => AppError::Validation(e.to_string()),
            other => AppError::Project(other.to_string()),
        }
    }
}

impl From<hn_network::NetworkError> for AppError {
    fn from(err: hn_network::NetworkError) -> Self {
        AppError::Compile(err.to_string())
    }
}

impl From<hn_sim::SimError> for AppError {
    fn from(err: hn_sim::SimError) -> Self {
        AppError::Simulation(err.to_string())
    }
}

impl From<hn_results::ResultsError> for AppError {
    fn from(err: hn_results::ResultsError) -> Self {
        match err {
            hn_results::ResultsError::RunNotFound { run_id } => AppError::RunNotFound(run_id),
            other => AppError::Results(other.to_string()),
        }
    }
}
