//! Time-stepped extended-period runs.

use crate::clock::SimClock;
use crate::error::{SimError, SimResult};
use crate::network::HydraulicNetwork;
use hn_results::{ErrorIndicator, Results, ResultsAggregator, StepReport};
use hn_solver::{
    NlpSolver, SolveOptions, SolveReport, SolveStatus, TranslateOptions, solve_in_place,
    solver_factory,
};
use tracing::{info, warn};

/// What to do when a step's solve does not converge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConvergencePolicy {
    /// Keep going and say nothing in the results.
    Ignore,
    /// Keep going; the first failing step is flagged on the results.
    #[default]
    Record,
    /// Stop the run with [`SimError::ConvergenceFailed`].
    Abort,
}

/// Options for a time-stepped run.
#[derive(Clone, Debug)]
pub struct StepperConfig {
    /// Solver name, resolved through [`solver_factory`]
    pub solver: String,
    pub solve: SolveOptions,
    pub translate: TranslateOptions,
    pub convergence: ConvergencePolicy,
    /// Maximum number of steps (safety limit)
    pub max_steps: usize,
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            solver: "newton".to_string(),
            solve: SolveOptions::default(),
            translate: TranslateOptions::default(),
            convergence: ConvergencePolicy::default(),
            max_steps: 100_000,
        }
    }
}

/// Reported once per completed step.
#[derive(Clone, Debug)]
pub struct StepProgress {
    /// Zero-based step index
    pub step: usize,
    pub time_s: i64,
    pub duration_s: f64,
    pub fraction_complete: f64,
    pub status: SolveStatus,
    pub dropped: usize,
}

/// A finished run: the network in its final state plus everything recorded.
#[derive(Debug)]
pub struct RunOutput<N> {
    pub network: N,
    pub results: Results,
}

/// Drives a network through simulated time, one steady-state solve per step.
pub struct TimeStepper {
    solver: Box<dyn NlpSolver>,
    config: StepperConfig,
}

impl TimeStepper {
    /// Resolve the configured solver. Fails before any step runs if the
    /// solver is not available.
    pub fn new(config: StepperConfig) -> SimResult<Self> {
        if config.max_steps == 0 {
            return Err(SimError::InvalidArg {
                what: "max_steps must be positive",
            });
        }
        let solver = solver_factory(&config.solver).map_err(|e| SimError::Setup {
            what: e.to_string(),
        })?;
        Ok(Self { solver, config })
    }

    /// Use `solver` directly instead of resolving `config.solver`.
    pub fn with_solver(solver: Box<dyn NlpSolver>, config: StepperConfig) -> Self {
        Self { solver, config }
    }

    pub fn solver_name(&self) -> &str {
        self.solver.name()
    }

    pub fn config(&self) -> &StepperConfig {
        &self.config
    }

    /// Run `network` to the end of its duration and hand it back with the
    /// results. On error the network is dropped; use [`Self::run_in_place`]
    /// to keep its state at the failing step.
    pub fn run<N: HydraulicNetwork>(&self, network: N) -> SimResult<RunOutput<N>> {
        self.run_with_progress(network, None)
    }

    pub fn run_with_progress<N: HydraulicNetwork>(
        &self,
        mut network: N,
        progress_cb: Option<&mut dyn FnMut(StepProgress)>,
    ) -> SimResult<RunOutput<N>> {
        let results = self.run_in_place_with_progress(&mut network, progress_cb)?;
        Ok(RunOutput { network, results })
    }

    /// Like [`Self::run`], but the caller keeps the network whether or not
    /// the run succeeds.
    pub fn run_in_place<N: HydraulicNetwork>(&self, network: &mut N) -> SimResult<Results> {
        self.run_in_place_with_progress(network, None)
    }

    /// Run from the network's current time to the end of its duration.
    ///
    /// Each step rebuilds the model at the current time, solves it in place,
    /// stores the solution into the network and records a snapshot. The clock
    /// then advances one hydraulic step and snaps onto the step grid; the run
    /// ends once the time passes the duration, so the final instant is always
    /// recorded when it lies on the grid. If a step fails, the network is left
    /// as that step found it, with its simulated time set to the failing step.
    pub fn run_in_place_with_progress<N: HydraulicNetwork>(
        &self,
        network: &mut N,
        mut progress_cb: Option<&mut dyn FnMut(StepProgress)>,
    ) -> SimResult<Results> {
        let opts = network.time_options();
        let mut clock = SimClock::new(
            network.sim_time(),
            opts.hydraulic_timestep_s(),
            opts.duration_s(),
        )?;
        let mut aggregator = ResultsAggregator::new(network.name());

        info!(
            network = network.name(),
            solver = self.solver.name(),
            duration_s = clock.duration(),
            step_s = clock.step(),
            "starting run"
        );

        let mut step = 0;
        loop {
            if step >= self.config.max_steps {
                return Err(SimError::InvalidArg {
                    what: "max_steps reached before the end of the duration",
                });
            }

            network.set_sim_time(clock.time());
            let (mut model, context) = network.build_model(clock.time())?;
            let report = solve_in_place(
                &mut model,
                self.solver.as_ref(),
                &self.config.translate,
                &self.config.solve,
            )?;

            let time_s = clock.whole_seconds();
            if !report.status.is_success() {
                self.on_non_convergence(&mut aggregator, time_s, report.status)?;
            }

            let snapshot = network.store_results(&model, &context, clock.time())?;
            info!(
                step,
                time_s,
                status = %report.status,
                iterations = report.iterations,
                dropped = report.dropped.len(),
                "step solved"
            );
            let step_report = step_report(time_s, &report);
            aggregator.record(snapshot, step_report);

            if let Some(cb) = progress_cb.as_deref_mut() {
                cb(StepProgress {
                    step,
                    time_s,
                    duration_s: clock.duration(),
                    fraction_complete: clock.fraction_complete(),
                    status: report.status,
                    dropped: report.dropped.len(),
                });
            }

            step += 1;
            clock.advance();
            if clock.finished() {
                break;
            }
        }

        network.set_sim_time(clock.time());
        let results = aggregator.finish();
        info!(steps = results.time.len(), converged = results.converged(), "run finished");
        Ok(results)
    }

    fn on_non_convergence(
        &self,
        aggregator: &mut ResultsAggregator,
        time_s: i64,
        status: SolveStatus,
    ) -> SimResult<()> {
        warn!(time_s, %status, policy = ?self.config.convergence, "step did not converge");
        match self.config.convergence {
            ConvergencePolicy::Ignore => Ok(()),
            ConvergencePolicy::Record => {
                aggregator.flag(ErrorIndicator::SolverNonConvergence {
                    time: time_s,
                    status: status.as_str().to_string(),
                });
                Ok(())
            }
            ConvergencePolicy::Abort => Err(SimError::ConvergenceFailed {
                time: time_s,
                status: status.as_str().to_string(),
            }),
        }
    }
}

fn step_report(time_s: i64, report: &SolveReport) -> StepReport {
    StepReport {
        time: time_s,
        constraints: report.constraints,
        dropped: report.dropped.iter().map(|d| d.name.clone()).collect(),
        iterations: report.iterations,
        residual_norm: report.residual_norm,
        status: report.status.as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_solver_fails_setup() {
        let config = StepperConfig {
            solver: "ipopt".to_string(),
            ..StepperConfig::default()
        };
        assert!(matches!(
            TimeStepper::new(config),
            Err(SimError::Setup { .. })
        ));
    }

    #[test]
    fn zero_max_steps_rejected() {
        let config = StepperConfig {
            max_steps: 0,
            ..StepperConfig::default()
        };
        assert!(matches!(
            TimeStepper::new(config),
            Err(SimError::InvalidArg { .. })
        ));
    }

    #[test]
    fn default_config_resolves_newton() {
        let stepper = TimeStepper::new(StepperConfig::default()).unwrap();
        assert_eq!(stepper.solver_name(), "newton");
        assert_eq!(stepper.config().convergence, ConvergencePolicy::Record);
    }
}
