//! Project loading, saving, validation, and introspection.

use std::path::Path;

use hn_project::schema::{PipeStatusDef, Project};

use crate::compile;
use crate::error::{AppError, AppResult};

/// Summary of a project's network for listing.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NetworkSummary {
    pub id: String,
    pub name: String,
    pub junction_count: usize,
    pub reservoir_count: usize,
    pub tank_count: usize,
    pub pipe_count: usize,
    pub closed_pipe_count: usize,
    pub duration_s: f64,
    pub hydraulic_timestep_s: f64,
    /// Steps a full run records.
    pub expected_steps: usize,
    pub solver: String,
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Load a project from YAML, or JSON when the extension says so. The project
/// is migrated to the latest version and validated.
pub fn load_project(path: &Path) -> AppResult<Project> {
    if !path.exists() {
        return Err(AppError::ProjectFileRead {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        });
    }
    let project = if is_json(path) {
        hn_project::load_json(path)?
    } else {
        hn_project::load_yaml(path)?
    };
    Ok(project)
}

pub fn save_project(path: &Path, project: &Project) -> AppResult<()> {
    if is_json(path) {
        hn_project::save_json(path, project)?;
    } else {
        hn_project::save_yaml(path, project)?;
    }
    Ok(())
}

/// Validate the project file and check that its network compiles.
pub fn validate_project(project: &Project) -> AppResult<()> {
    hn_project::validate_project(project).map_err(|e| AppError::Validation(e.to_string()))?;
    compile::build_network(&project.network, &project.run)?;
    Ok(())
}

pub fn summarize(project: &Project) -> NetworkSummary {
    let net = &project.network;
    let step = net.time.hydraulic_timestep_s;
    let expected_steps = if step > 0.0 {
        (net.time.duration_s / step).floor() as usize + 1
    } else {
        0
    };
    NetworkSummary {
        id: net.id.clone(),
        name: net.name.clone(),
        junction_count: net.junctions.len(),
        reservoir_count: net.reservoirs.len(),
        tank_count: net.tanks.len(),
        pipe_count: net.pipes.len(),
        closed_pipe_count: net
            .pipes
            .iter()
            .filter(|p| p.status == PipeStatusDef::Closed)
            .count(),
        duration_s: net.time.duration_s,
        hydraulic_timestep_s: step,
        expected_steps,
        solver: project.run.solver.clone(),
    }
}
