//! Run execution and caching service.

use std::path::Path;
use std::time::Instant;

use hn_project::schema::Project;
use hn_results::{Results, RunManifest, RunStore};
use hn_sim::{StepProgress, TimeStepper};
use tracing::info;

use crate::compile;
use crate::error::AppResult;
use crate::progress::{RunProgressEvent, RunStage};
use crate::project_service;

/// Options for running simulations.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub use_cache: bool,
    pub solver_version: String,
    /// Print solver iterations at info level, whatever the project says.
    pub tee: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            solver_version: "0.1.0".to_string(),
            tee: false,
        }
    }
}

/// Request to execute a run.
pub struct RunRequest<'a> {
    pub project_path: &'a Path,
    pub options: RunOptions,
}

/// Response from a run execution.
#[derive(Debug, Clone)]
pub struct RunResponse {
    pub run_id: String,
    pub manifest: RunManifest,
    pub loaded_from_cache: bool,
    pub elapsed_s: f64,
}

fn emit_progress(
    progress_cb: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    stage: RunStage,
    started: Instant,
    message: Option<String>,
    step: Option<StepProgress>,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(RunProgressEvent {
            stage,
            elapsed_wall_s: started.elapsed().as_secs_f64(),
            message,
            step,
        });
    }
}

/// Execute or load a run based on request.
pub fn ensure_run(request: &RunRequest) -> AppResult<RunResponse> {
    ensure_run_with_progress(request, None)
}

/// Execute or load a run and stream progress events.
pub fn ensure_run_with_progress(
    request: &RunRequest,
    mut progress_cb: Option<&mut dyn FnMut(RunProgressEvent)>,
) -> AppResult<RunResponse> {
    let started = Instant::now();

    emit_progress(
        &mut progress_cb,
        RunStage::LoadingProject,
        started,
        Some("Loading project".to_string()),
        None,
    );
    let project = project_service::load_project(request.project_path)?;

    emit_progress(
        &mut progress_cb,
        RunStage::CheckingCache,
        started,
        Some("Checking run cache".to_string()),
        None,
    );
    let run_id = hn_results::compute_run_id(
        &project.network,
        &project.run,
        &request.options.solver_version,
    );
    let store = RunStore::for_project(request.project_path)?;

    if request.options.use_cache && store.has_run(&run_id) {
        emit_progress(
            &mut progress_cb,
            RunStage::LoadingCachedResult,
            started,
            Some("Loading cached run".to_string()),
            None,
        );
        let manifest = store.load_manifest(&run_id)?;
        emit_progress(
            &mut progress_cb,
            RunStage::Completed,
            started,
            Some("Loaded cached run".to_string()),
            None,
        );
        info!(%run_id, "loaded cached run");
        return Ok(RunResponse {
            run_id,
            manifest,
            loaded_from_cache: true,
            elapsed_s: started.elapsed().as_secs_f64(),
        });
    }

    let manifest = execute_run(
        &project,
        &store,
        &run_id,
        &request.options,
        &mut progress_cb,
        started,
    )?;

    emit_progress(
        &mut progress_cb,
        RunStage::Completed,
        started,
        Some("Run completed".to_string()),
        None,
    );

    Ok(RunResponse {
        run_id,
        manifest,
        loaded_from_cache: false,
        elapsed_s: started.elapsed().as_secs_f64(),
    })
}

fn execute_run(
    project: &Project,
    store: &RunStore,
    run_id: &str,
    options: &RunOptions,
    progress_cb: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    started: Instant,
) -> AppResult<RunManifest> {
    emit_progress(
        progress_cb,
        RunStage::CompilingNetwork,
        started,
        Some("Compiling network".to_string()),
        None,
    );
    let network = compile::build_network(&project.network, &project.run)?;
    let mut config = compile::stepper_config(&project.run);
    config.solve.tee |= options.tee;
    let stepper = TimeStepper::new(config)?;

    emit_progress(
        progress_cb,
        RunStage::Stepping,
        started,
        Some("Stepping".to_string()),
        None,
    );
    let output = {
        let mut on_step = |p: StepProgress| {
            emit_progress(progress_cb, RunStage::Stepping, started, None, Some(p));
        };
        stepper.run_with_progress(network, Some(&mut on_step))?
    };
    let results = output.results;

    emit_progress(
        progress_cb,
        RunStage::SavingResults,
        started,
        Some("Saving results".to_string()),
        None,
    );
    let manifest = RunManifest {
        run_id: run_id.to_string(),
        network_id: project.network.id.clone(),
        timestamp: RunManifest::timestamp_now(),
        solver: stepper.solver_name().to_string(),
        solver_version: options.solver_version.clone(),
        steps: results.time.len(),
        converged: results.converged(),
    };
    store.save_run(&manifest, &results)?;
    info!(%run_id, steps = manifest.steps, converged = manifest.converged, "run saved");

    Ok(manifest)
}

/// Load a stored run's manifest and results.
pub fn load_run(project_path: &Path, run_id: &str) -> AppResult<(RunManifest, Results)> {
    let store = RunStore::for_project(project_path)?;

    let manifest = store.load_manifest(run_id)?;
    let results = store.load_results(run_id)?;

    Ok((manifest, results))
}

/// Stored runs of the project's network, newest first.
pub fn list_runs(project_path: &Path) -> AppResult<Vec<RunManifest>> {
    let project = project_service::load_project(project_path)?;
    let store = RunStore::for_project(project_path)?;
    Ok(store.list_runs(&project.network.id)?)
}
