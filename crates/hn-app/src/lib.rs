//! Shared application service layer for hydronet.
//!
//! Centralizes project management, network compilation, cached run
//! execution, and result querying for the CLI.

pub mod compile;
pub mod error;
pub mod progress;
pub mod project_service;
pub mod query;
pub mod run_service;

pub use compile::{build_network, stepper_config};
pub use error::{AppError, AppResult};
pub use progress::{RunProgressEvent, RunStage};
pub use project_service::{
    NetworkSummary, load_project, save_project, summarize, validate_project,
};
pub use query::{
    RunSummary, calibration_series, entity_series, link_series, node_series, run_summary,
};
pub use run_service::{
    RunOptions, RunRequest, RunResponse, ensure_run, ensure_run_with_progress, list_runs,
    load_run,
};
