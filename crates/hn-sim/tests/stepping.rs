use hn_aml::{Expr, Model};
use hn_core::{hours, lps, m, s};
use hn_network::{
    Junction, NetworkBuilder, PipeProps, Reservoir, Tank, TimeOptions, WaterNetwork,
};
use hn_results::{ErrorIndicator, StepSnapshot};
use hn_sim::*;
use hn_solver::{ConcreteModel, NlpSolver, SolveOptions, SolveOutcome, SolveStatus, SolverResult};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Tracks `x = t / 3600` with one variable and one constraint.
#[derive(Debug)]
struct Ramp {
    time: TimeOptions,
    sim_time: f64,
    x: f64,
    builds: usize,
}

impl Ramp {
    fn new(duration_s: f64, step_s: f64) -> Self {
        Self {
            time: TimeOptions {
                duration: s(duration_s),
                hydraulic_timestep: s(step_s),
                pattern_timestep: s(step_s.max(1.0)),
            },
            sim_time: 0.0,
            x: 0.0,
            builds: 0,
        }
    }
}

impl HydraulicNetwork for Ramp {
    type Context = hn_core::VarId;

    fn name(&self) -> &str {
        "ramp"
    }

    fn time_options(&self) -> TimeOptions {
        self.time
    }

    fn sim_time(&self) -> f64 {
        self.sim_time
    }

    fn set_sim_time(&mut self, time_s: f64) {
        self.sim_time = time_s;
    }

    fn build_model(&self, time_s: f64) -> SimResult<(Model, hn_core::VarId)> {
        let mut model = Model::new("ramp");
        let target = model.add_param("target", time_s / 3600.0)?;
        let x = model.add_var("x", self.x)?;
        model.add_constraint("track", Expr::from(x) - target)?;
        Ok((model, x))
    }

    fn store_results(
        &mut self,
        model: &Model,
        x: &hn_core::VarId,
        time_s: f64,
    ) -> SimResult<StepSnapshot> {
        self.x = model.var_value(*x)?;
        self.builds += 1;
        let mut snapshot = StepSnapshot::new(time_s.round() as i64);
        snapshot.set_node("head", "X", self.x);
        Ok(snapshot)
    }
}

/// Hands back the starting point and reports it did not converge.
struct Stuck;

impl NlpSolver for Stuck {
    fn name(&self) -> &str {
        "stuck"
    }

    fn solve(&self, model: &ConcreteModel, _options: &SolveOptions) -> SolverResult<SolveOutcome> {
        Ok(SolveOutcome {
            values: model.initial_values().to_vec(),
            status: SolveStatus::MaxIterations,
            iterations: 3,
            residual_norm: 1.0,
        })
    }
}

/// Converges (trivially) for the first `healthy` solves, then gets stuck.
struct FailsAfter {
    healthy: usize,
    calls: AtomicUsize,
}

impl NlpSolver for FailsAfter {
    fn name(&self) -> &str {
        "fails-after"
    }

    fn solve(&self, model: &ConcreteModel, _options: &SolveOptions) -> SolverResult<SolveOutcome> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let status = if call < self.healthy {
            SolveStatus::Converged
        } else {
            SolveStatus::MaxIterations
        };
        Ok(SolveOutcome {
            values: model.initial_values().to_vec(),
            status,
            iterations: 1,
            residual_norm: 0.0,
        })
    }
}

fn newton() -> TimeStepper {
    TimeStepper::new(StepperConfig::default()).unwrap()
}

fn stuck(policy: ConvergencePolicy) -> TimeStepper {
    TimeStepper::with_solver(
        Box::new(Stuck),
        StepperConfig {
            convergence: policy,
            ..StepperConfig::default()
        },
    )
}

#[test]
fn zero_duration_runs_exactly_one_step() {
    let out = newton().run(Ramp::new(0.0, 3600.0)).unwrap();
    assert_eq!(out.results.time, vec![0]);
    assert_eq!(out.network.builds, 1);
}

#[test]
fn final_instant_on_grid_is_recorded() {
    let out = newton().run(Ramp::new(7200.0, 3600.0)).unwrap();
    assert_eq!(out.results.time, vec![0, 3600, 7200]);
    assert!(out.results.error.is_none());
    assert!(out.results.converged());
    assert!((out.network.x - 2.0).abs() < 1e-9);
    assert_eq!(out.network.sim_time, 10800.0);
}

#[test]
fn duration_off_grid_stops_before_it() {
    let out = newton().run(Ramp::new(5400.0, 3600.0)).unwrap();
    assert_eq!(out.results.time, vec![0, 3600]);
}

#[test]
fn each_step_starts_from_the_previous_solution() {
    let out = newton().run(Ramp::new(10800.0, 3600.0)).unwrap();
    let series = out.results.node["head"].series("X").unwrap();
    assert_eq!(series.len(), 4);
    for (i, (t, x)) in series.iter().enumerate() {
        assert_eq!(*t, i as i64 * 3600);
        assert!((x - i as f64).abs() < 1e-9);
    }
}

#[test]
fn invalid_time_options_are_rejected() {
    assert!(matches!(
        newton().run(Ramp::new(3600.0, 0.0)),
        Err(SimError::InvalidArg { .. })
    ));
    assert!(matches!(
        newton().run(Ramp::new(-1.0, 60.0)),
        Err(SimError::InvalidArg { .. })
    ));
    assert!(matches!(
        newton().run(Ramp::new(1.0, 0.1)),
        Err(SimError::InvalidArg { .. })
    ));
}

#[test]
fn fractional_step_reaches_the_end() {
    let stepper = TimeStepper::new(StepperConfig {
        max_steps: 1000,
        ..StepperConfig::default()
    })
    .unwrap();
    let out = stepper.run(Ramp::new(11.0, 1.1)).unwrap();

    assert_eq!(out.results.time.len(), 11);
    assert!(out.results.time.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(out.results.time.last(), Some(&11));
    assert_eq!(out.network.builds, 11);
}

#[test]
fn max_steps_caps_the_run() {
    let stepper = TimeStepper::new(StepperConfig {
        max_steps: 2,
        ..StepperConfig::default()
    })
    .unwrap();
    assert!(matches!(
        stepper.run(Ramp::new(7200.0, 3600.0)),
        Err(SimError::InvalidArg { .. })
    ));
}

#[test]
fn unknown_solver_fails_before_stepping() {
    let err = TimeStepper::new(StepperConfig {
        solver: "cplex".to_string(),
        ..StepperConfig::default()
    })
    .err()
    .unwrap();
    assert!(matches!(err, SimError::Setup { .. }));
    assert!(err.to_string().contains("cplex"));
}

#[test]
fn record_policy_flags_first_failing_step_and_continues() {
    let out = stuck(ConvergencePolicy::Record)
        .run(Ramp::new(7200.0, 3600.0))
        .unwrap();
    assert_eq!(out.results.time, vec![0, 3600, 7200]);
    assert_eq!(
        out.results.error,
        Some(ErrorIndicator::SolverNonConvergence {
            time: 0,
            status: "max_iterations".to_string(),
        })
    );
    assert!(!out.results.converged());
}

#[test]
fn ignore_policy_leaves_no_indicator() {
    let out = stuck(ConvergencePolicy::Ignore)
        .run(Ramp::new(3600.0, 3600.0))
        .unwrap();
    assert_eq!(out.results.time.len(), 2);
    assert!(out.results.error.is_none());
    assert_eq!(out.results.steps[0].status, "max_iterations");
}

#[test]
fn abort_policy_stops_at_failing_step() {
    match stuck(ConvergencePolicy::Abort).run(Ramp::new(3600.0, 3600.0)) {
        Err(SimError::ConvergenceFailed { time, status }) => {
            assert_eq!(time, 0);
            assert_eq!(status, "max_iterations");
        }
        other => panic!("expected convergence failure, got {other:?}"),
    }
}

#[test]
fn failed_run_in_place_keeps_network_state() {
    let stepper = TimeStepper::with_solver(
        Box::new(FailsAfter {
            healthy: 2,
            calls: AtomicUsize::new(0),
        }),
        StepperConfig {
            convergence: ConvergencePolicy::Abort,
            ..StepperConfig::default()
        },
    );
    let mut ramp = Ramp::new(7200.0, 3600.0);

    match stepper.run_in_place(&mut ramp) {
        Err(SimError::ConvergenceFailed { time, .. }) => assert_eq!(time, 7200),
        other => panic!("expected convergence failure, got {other:?}"),
    }
    assert_eq!(ramp.builds, 2);
    assert_eq!(ramp.sim_time, 7200.0);
}

#[test]
fn run_in_place_matches_run() {
    let mut ramp = Ramp::new(7200.0, 3600.0);
    let results = newton().run_in_place(&mut ramp).unwrap();
    assert_eq!(results.time, vec![0, 3600, 7200]);
    assert_eq!(ramp.sim_time, 10800.0);
    assert!((ramp.x - 2.0).abs() < 1e-9);
}

#[test]
fn progress_is_reported_per_step() {
    let mut seen = Vec::new();
    let mut cb = |p: StepProgress| seen.push((p.step, p.time_s, p.fraction_complete));
    newton()
        .run_with_progress(Ramp::new(7200.0, 3600.0), Some(&mut cb))
        .unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0], (0, 0, 0.0));
    assert_eq!(seen[2].1, 7200);
    assert_eq!(seen[2].2, 1.0);
}

fn network_with_closed_pipe() -> WaterNetwork {
    let mut b = NetworkBuilder::new("closed");
    let r = b.add_reservoir(
        "R",
        Reservoir {
            base_head: m(40.0),
            pattern: None,
        },
    );
    let j = b.add_junction(
        "J",
        Junction {
            elevation: m(5.0),
            base_demand: lps(5.0),
            pattern: Some("day".to_string()),
        },
    );
    let t = b.add_tank(
        "T",
        Tank {
            elevation: m(20.0),
            init_level: m(4.0),
            min_level: m(0.5),
            max_level: m(8.0),
            diameter: m(8.0),
        },
    );
    b.add_pipe("P1", r, j, PipeProps::new(m(600.0), m(0.25), 130.0));
    b.add_pipe("P2", j, t, PipeProps::new(m(400.0), m(0.2), 120.0));
    b.add_pipe("P3", r, t, PipeProps::new(m(900.0), m(0.15), 110.0).closed());
    b.add_pattern("day", vec![1.0, 1.5]);
    b.time_options(TimeOptions {
        duration: hours(2.0),
        hydraulic_timestep: hours(1.0),
        pattern_timestep: hours(1.0),
    });
    b.build().unwrap()
}

#[test]
fn closed_pipe_run_completes_with_dropped_headloss() {
    let out = newton().run(network_with_closed_pipe()).unwrap();
    let results = &out.results;

    assert_eq!(results.time, vec![0, 3600, 7200]);
    assert!(results.error.is_none());
    for step in &results.steps {
        assert_eq!(step.dropped, vec!["headloss[P3]".to_string()]);
        assert_eq!(step.status, "converged");
    }
    for t in [0, 3600, 7200] {
        assert_eq!(results.link_value("flowrate", t, "P3"), Some(0.0));
    }

    // pattern multiplier 1.5 applies in the second hour
    let d0 = results.node_value("demand", 0, "J").unwrap();
    let d1 = results.node_value("demand", 3600, "J").unwrap();
    assert!((d1 / d0 - 1.5).abs() < 1e-9);
}

#[test]
fn tank_head_carries_between_steps() {
    let out = newton().run(network_with_closed_pipe()).unwrap();
    let h0 = out.results.node_value("head", 0, "T").unwrap();
    let h1 = out.results.node_value("head", 3600, "T").unwrap();
    assert!((h0 - 24.0).abs() < 1e-9);
    assert!(h1 > h0, "reservoir above the tank fills it");

    let tank = out.network.node_by_name("T").unwrap();
    assert!(tank.level() <= 8.0 + 1e-12);
    assert!((tank.head() - (20.0 + tank.level())).abs() < 1e-12);
}
