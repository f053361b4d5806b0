//! Query helpers for extracting data from loaded runs.

use hn_results::{ErrorIndicator, Results, Table, TimeS};

use crate::error::{AppError, AppResult};

/// Summary of a run's time range and data.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunSummary {
    pub network_name: String,
    pub time_range: (TimeS, TimeS),
    pub step_count: usize,
    pub node_count: usize,
    pub link_count: usize,
    pub converged: bool,
    /// Human-readable error indicator, if the run set one.
    pub error: Option<String>,
    /// Constraints dropped over all steps.
    pub dropped_constraints: usize,
}

pub fn describe_error(indicator: &ErrorIndicator) -> String {
    match indicator {
        ErrorIndicator::SolverNonConvergence { time, status } => {
            format!("solver did not converge at t={time} s ({status})")
        }
    }
}

fn entity_count(tables: &std::collections::BTreeMap<String, Table>) -> usize {
    tables
        .values()
        .next()
        .map(|t| t.entities().count())
        .unwrap_or(0)
}

pub fn run_summary(results: &Results) -> AppResult<RunSummary> {
    let (Some(first), Some(last)) = (results.time.first(), results.time.last()) else {
        return Err(AppError::InvalidInput("No steps in run".to_string()));
    };

    Ok(RunSummary {
        network_name: results.network_name.clone(),
        time_range: (*first, *last),
        step_count: results.time.len(),
        node_count: entity_count(&results.node),
        link_count: entity_count(&results.link),
        converged: results.converged(),
        error: results.error.as_ref().map(describe_error),
        dropped_constraints: results.steps.iter().map(|s| s.dropped.len()).sum(),
    })
}

fn extract(
    tables: &std::collections::BTreeMap<String, Table>,
    kind: &str,
    entity: &str,
    attribute: &str,
) -> AppResult<Vec<(TimeS, f64)>> {
    let table = tables.get(attribute).ok_or_else(|| {
        AppError::InvalidInput(format!("Unknown {} attribute: {}", kind, attribute))
    })?;
    table
        .series(entity)
        .ok_or_else(|| AppError::InvalidInput(format!("Unknown {}: {}", kind, entity)))
}

/// Time series of a node attribute (`head`, `demand`, `pressure`).
pub fn node_series(results: &Results, node: &str, attribute: &str) -> AppResult<Vec<(TimeS, f64)>> {
    extract(&results.node, "node", node, attribute)
}

/// Time series of a link attribute (`flowrate`, `velocity`).
pub fn link_series(results: &Results, link: &str, attribute: &str) -> AppResult<Vec<(TimeS, f64)>> {
    extract(&results.link, "link", link, attribute)
}

/// Series of `entity`'s `attribute`, looking at nodes first, then links.
pub fn entity_series(
    results: &Results,
    entity: &str,
    attribute: &str,
) -> AppResult<Vec<(TimeS, f64)>> {
    if let Some(table) = results.node.get(attribute)
        && let Some(series) = table.series(entity)
    {
        return Ok(series);
    }
    if let Some(table) = results.link.get(attribute)
        && let Some(series) = table.series(entity)
    {
        return Ok(series);
    }
    Err(AppError::InvalidInput(format!(
        "No '{}' series for '{}'",
        attribute, entity
    )))
}

/// Values a tracked parameter took over the run.
pub fn calibration_series(results: &Results, param: &str) -> Vec<(TimeS, f64)> {
    results
        .calibration
        .iter()
        .filter_map(|(t, values)| values.get(param).map(|v| (*t, *v)))
        .collect()
}

pub fn list_node_ids(results: &Results) -> Vec<String> {
    results
        .node
        .values()
        .next()
        .map(|t| t.entities().map(str::to_string).collect())
        .unwrap_or_default()
}

pub fn list_link_ids(results: &Results) -> Vec<String> {
    results
        .link
        .values()
        .next()
        .map(|t| t.entities().map(str::to_string).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hn_results::{ResultsAggregator, StepReport, StepSnapshot};

    fn results() -> Results {
        let mut agg = ResultsAggregator::new("net");
        for (i, t) in [0, 3600].into_iter().enumerate() {
            let mut snap = StepSnapshot::new(t);
            snap.set_node("head", "J1", 40.0 - i as f64);
            snap.set_node("head", "R1", 50.0);
            snap.set_link("flowrate", "P1", 0.01 * (i + 1) as f64);
            snap.calibration.insert("hw_resistance[P1]".to_string(), 12.5);
            agg.record(
                snap,
                StepReport {
                    time: t,
                    constraints: 3,
                    dropped: vec!["headloss[P2]".to_string()],
                    iterations: 4,
                    residual_norm: 1e-10,
                    status: "converged".to_string(),
                },
            );
        }
        agg.finish()
    }

    #[test]
    fn summary_counts_entities_and_drops() {
        let s = run_summary(&results()).unwrap();
        assert_eq!(s.time_range, (0, 3600));
        assert_eq!(s.step_count, 2);
        assert_eq!(s.node_count, 2);
        assert_eq!(s.link_count, 1);
        assert_eq!(s.dropped_constraints, 2);
        assert!(s.converged);
        assert!(s.error.is_none());
    }

    #[test]
    fn empty_run_has_no_summary() {
        assert!(run_summary(&Results::default()).is_err());
    }

    #[test]
    fn series_lookup() {
        let r = results();
        assert_eq!(node_series(&r, "J1", "head").unwrap(), vec![(0, 40.0), (3600, 39.0)]);
        assert_eq!(link_series(&r, "P1", "flowrate").unwrap(), vec![(0, 0.01), (3600, 0.02)]);
        assert_eq!(entity_series(&r, "P1", "flowrate").unwrap().len(), 2);
        assert!(node_series(&r, "J1", "quality").is_err());
        assert!(link_series(&r, "P9", "flowrate").is_err());
        assert!(entity_series(&r, "J1", "flowrate").is_err());
        assert_eq!(
            calibration_series(&r, "hw_resistance[P1]"),
            vec![(0, 12.5), (3600, 12.5)]
        );
        assert_eq!(list_node_ids(&r), vec!["J1", "R1"]);
        assert_eq!(list_link_ids(&r), vec!["P1"]);
    }
}
