//! Result data types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type RunId = String;

/// Simulated time in whole seconds.
pub type TimeS = i64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: RunId,
    pub network_id: String,
    pub timestamp: String,
    pub solver: String,
    pub solver_version: String,
    pub steps: usize,
    /// False when any step ended without converging.
    pub converged: bool,
}

impl RunManifest {
    /// Current UTC time in RFC 3339, as stored in `timestamp`.
    pub fn timestamp_now() -> String {
        chrono::Utc::now().to_rfc3339()
    }
}

/// Marks a results record whose run did not go cleanly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ErrorIndicator {
    /// The solver stopped without converging at `time`.
    SolverNonConvergence { time: TimeS, status: String },
}

/// State of the network after one step, keyed by attribute then entity name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StepSnapshot {
    pub time: TimeS,
    pub nodes: BTreeMap<String, BTreeMap<String, f64>>,
    pub links: BTreeMap<String, BTreeMap<String, f64>>,
    /// Values of tracked parameters, by parameter name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub calibration: BTreeMap<String, f64>,
}

impl StepSnapshot {
    pub fn new(time: TimeS) -> Self {
        Self {
            time,
            ..Self::default()
        }
    }

    pub fn set_node(&mut self, attribute: &str, node: &str, value: f64) {
        self.nodes
            .entry(attribute.to_string())
            .or_default()
            .insert(node.to_string(), value);
    }

    pub fn set_link(&mut self, attribute: &str, link: &str, value: f64) {
        self.links
            .entry(attribute.to_string())
            .or_default()
            .insert(link.to_string(), value);
    }

    pub fn node(&self, attribute: &str, node: &str) -> Option<f64> {
        self.nodes.get(attribute)?.get(node).copied()
    }

    pub fn link(&self, attribute: &str, link: &str) -> Option<f64> {
        self.links.get(attribute)?.get(link).copied()
    }
}

/// Per-step account of translation and solve.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepReport {
    pub time: TimeS,
    /// Constraints handed to the solver
    pub constraints: usize,
    /// Names of constraints left out of the concrete model
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped: Vec<String>,
    pub iterations: usize,
    pub residual_norm: f64,
    pub status: String,
}

/// One attribute's values, indexed by entity and then time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Table {
    series: BTreeMap<String, BTreeMap<TimeS, f64>>,
}

impl Table {
    /// Record `value`; a second value at the same time replaces the first.
    pub fn insert(&mut self, time: TimeS, entity: &str, value: f64) {
        self.series
            .entry(entity.to_string())
            .or_default()
            .insert(time, value);
    }

    pub fn get(&self, time: TimeS, entity: &str) -> Option<f64> {
        self.series.get(entity)?.get(&time).copied()
    }

    /// All `(time, value)` samples of one entity, in time order.
    pub fn series(&self, entity: &str) -> Option<Vec<(TimeS, f64)>> {
        self.series
            .get(entity)
            .map(|s| s.iter().map(|(t, v)| (*t, *v)).collect())
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }
}

/// Complete record of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Results {
    pub network_name: String,
    /// Recorded times, in order.
    pub time: Vec<TimeS>,
    /// Node tables by attribute (`head`, `demand`, `pressure`)
    pub node: BTreeMap<String, Table>,
    /// Link tables by attribute (`flowrate`, `velocity`)
    pub link: BTreeMap<String, Table>,
    #[serde(default)]
    pub error: Option<ErrorIndicator>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub calibration: BTreeMap<TimeS, BTreeMap<String, f64>>,
    #[serde(default)]
    pub steps: Vec<StepReport>,
}

impl Results {
    pub fn node_value(&self, attribute: &str, time: TimeS, node: &str) -> Option<f64> {
        self.node.get(attribute)?.get(time, node)
    }

    pub fn link_value(&self, attribute: &str, time: TimeS, link: &str) -> Option<f64> {
        self.link.get(attribute)?.get(time, link)
    }

    /// Every recorded step converged.
    pub fn converged(&self) -> bool {
        self.steps.iter().all(|s| s.status == "converged")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lookup_by_time_and_entity() {
        let mut t = Table::default();
        t.insert(0, "J1", 1.0);
        t.insert(3600, "J1", 2.0);
        t.insert(0, "J2", 5.0);

        assert_eq!(t.get(3600, "J1"), Some(2.0));
        assert_eq!(t.get(7200, "J1"), None);
        assert_eq!(t.series("J1"), Some(vec![(0, 1.0), (3600, 2.0)]));
        assert_eq!(t.entities().collect::<Vec<_>>(), vec!["J1", "J2"]);
    }

    #[test]
    fn table_is_keyed_by_time() {
        let mut t = Table::default();
        t.insert(7200, "J1", 3.0);
        t.insert(0, "J1", 1.0);
        t.insert(3600, "J1", 2.0);
        t.insert(3600, "J1", 2.5);

        assert_eq!(t.get(3600, "J1"), Some(2.5));
        assert_eq!(t.series("J1"), Some(vec![(0, 1.0), (3600, 2.5), (7200, 3.0)]));

        let json = serde_json::to_string(&t).unwrap();
        let back: Table = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn error_indicator_is_tagged() {
        let e = ErrorIndicator::SolverNonConvergence {
            time: 3600,
            status: "max_iterations".to_string(),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"type\":\"SolverNonConvergence\""));
        let back: ErrorIndicator = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
