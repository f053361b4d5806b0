//! Content-based hashing for run IDs.

use hn_project::schema::{NetworkDef, RunDef};
use sha2::{Digest, Sha256};

pub fn compute_run_id(network: &NetworkDef, run: &RunDef, solver_version: &str) -> String {
    let mut hasher = Sha256::new();

    let network_json = serde_json::to_string(network).unwrap_or_default();
    hasher.update(network_json.as_bytes());

    let run_json = serde_json::to_string(run).unwrap_or_default();
    hasher.update(run_json.as_bytes());

    hasher.update(solver_version.as_bytes());

    let result = hasher.finalize();
    format!("{:x}", result)
}
