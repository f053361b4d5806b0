//! Accumulates step snapshots into a [`Results`] record.

use crate::types::{ErrorIndicator, Results, StepReport, StepSnapshot};

/// Builds a results record one step at a time.
#[derive(Debug, Clone)]
pub struct ResultsAggregator {
    results: Results,
}

impl ResultsAggregator {
    pub fn new(network_name: impl Into<String>) -> Self {
        Self {
            results: Results {
                network_name: network_name.into(),
                ..Results::default()
            },
        }
    }

    /// Append one step. The snapshot's time becomes the recorded time.
    pub fn record(&mut self, snapshot: StepSnapshot, report: StepReport) {
        let time = snapshot.time;
        self.results.time.push(time);

        for (attribute, values) in snapshot.nodes {
            let table = self.results.node.entry(attribute).or_default();
            for (node, value) in values {
                table.insert(time, &node, value);
            }
        }
        for (attribute, values) in snapshot.links {
            let table = self.results.link.entry(attribute).or_default();
            for (link, value) in values {
                table.insert(time, &link, value);
            }
        }
        if !snapshot.calibration.is_empty() {
            self.results.calibration.insert(time, snapshot.calibration);
        }
        self.results.steps.push(report);
    }

    /// Set the error indicator; the first one flagged is kept.
    pub fn flag(&mut self, indicator: ErrorIndicator) {
        if self.results.error.is_none() {
            self.results.error = Some(indicator);
        }
    }

    pub fn steps(&self) -> usize {
        self.results.time.len()
    }

    pub fn finish(self) -> Results {
        self.results
    }
}
