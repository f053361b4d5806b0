//! Compilation of project definitions into runnable networks and stepper
//! settings.

use std::collections::HashMap;

use hn_core::{m, m3ps, s};
use hn_network::{
    HeadLossApprox, Junction, NetworkBuilder, PipeProps, Reservoir, Tank, TimeOptions,
    WaterNetwork,
};
use hn_project::schema::{ConvergencePolicyDef, HeadLossDef, NetworkDef, PipeStatusDef, RunDef};
use hn_sim::{ConvergencePolicy, StepperConfig};
use hn_solver::{SolveOptions, TranslateOptions};

use crate::error::{AppError, AppResult};

/// Build a [`WaterNetwork`] from its definition, tracking the parameters
/// listed in `run`.
pub fn build_network(def: &NetworkDef, run: &RunDef) -> AppResult<WaterNetwork> {
    let mut builder = NetworkBuilder::new(&def.name);
    let mut node_map = HashMap::new();

    for pattern in &def.patterns {
        builder.add_pattern(&pattern.id, pattern.multipliers.clone());
    }

    for j in &def.junctions {
        let id = builder.add_junction(
            &j.id,
            Junction {
                elevation: m(j.elevation_m),
                base_demand: m3ps(j.base_demand_m3s),
                pattern: j.pattern.clone(),
            },
        );
        node_map.insert(j.id.as_str(), id);
    }
    for r in &def.reservoirs {
        let id = builder.add_reservoir(
            &r.id,
            Reservoir {
                base_head: m(r.head_m),
                pattern: r.pattern.clone(),
            },
        );
        node_map.insert(r.id.as_str(), id);
    }
    for t in &def.tanks {
        let id = builder.add_tank(
            &t.id,
            Tank {
                elevation: m(t.elevation_m),
                init_level: m(t.init_level_m),
                min_level: m(t.min_level_m),
                max_level: m(t.max_level_m),
                diameter: m(t.diameter_m),
            },
        );
        node_map.insert(t.id.as_str(), id);
    }

    for pipe in &def.pipes {
        let start = *node_map
            .get(pipe.from_node_id.as_str())
            .ok_or_else(|| AppError::Compile(format!("Node not found: {}", pipe.from_node_id)))?;
        let end = *node_map
            .get(pipe.to_node_id.as_str())
            .ok_or_else(|| AppError::Compile(format!("Node not found: {}", pipe.to_node_id)))?;
        let mut props = PipeProps::new(m(pipe.length_m), m(pipe.diameter_m), pipe.roughness)
            .with_minor_loss(pipe.minor_loss);
        if pipe.status == PipeStatusDef::Closed {
            props = props.closed();
        }
        builder.add_pipe(&pipe.id, start, end, props);
    }

    builder
        .time_options(TimeOptions {
            duration: s(def.time.duration_s),
            hydraulic_timestep: s(def.time.hydraulic_timestep_s),
            pattern_timestep: s(def.time.pattern_timestep_s),
        })
        .headloss(match def.headloss {
            HeadLossDef::Piecewise => HeadLossApprox::Piecewise,
            HeadLossDef::Smooth => HeadLossApprox::Smooth,
        });
    for name in &run.tracked_params {
        builder.track_param(name);
    }

    Ok(builder.build()?)
}

/// Stepper settings for a run definition.
pub fn stepper_config(run: &RunDef) -> StepperConfig {
    StepperConfig {
        solver: run.solver.clone(),
        solve: SolveOptions {
            tee: run.tee,
            max_iterations: run.max_iterations,
            abs_tol: run.abs_tol,
            ..SolveOptions::default()
        },
        translate: TranslateOptions {
            strict: run.strict,
            ..TranslateOptions::default()
        },
        convergence: match run.convergence {
            ConvergencePolicyDef::Ignore => ConvergencePolicy::Ignore,
            ConvergencePolicyDef::Record => ConvergencePolicy::Record,
            ConvergencePolicyDef::Abort => ConvergencePolicy::Abort,
        },
        ..StepperConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hn_project::schema::*;

    fn def() -> NetworkDef {
        NetworkDef {
            id: "n".to_string(),
            name: "Tiny".to_string(),
            junctions: vec![JunctionDef {
                id: "J".to_string(),
                elevation_m: 5.0,
                base_demand_m3s: 0.002,
                pattern: None,
            }],
            reservoirs: vec![ReservoirDef {
                id: "R".to_string(),
                head_m: 30.0,
                pattern: None,
            }],
            tanks: vec![],
            pipes: vec![PipeDef {
                id: "P".to_string(),
                from_node_id: "R".to_string(),
                to_node_id: "J".to_string(),
                length_m: 100.0,
                diameter_m: 0.1,
                roughness: 120.0,
                minor_loss: 0.0,
                status: PipeStatusDef::Closed,
            }],
            patterns: vec![],
            time: TimeDef::default(),
            headloss: HeadLossDef::Smooth,
        }
    }

    #[test]
    fn compiles_nodes_pipes_and_options() {
        let run = RunDef {
            tracked_params: vec!["hw_resistance[P]".to_string()],
            ..RunDef::default()
        };
        let net = build_network(&def(), &run).unwrap();
        assert_eq!(net.name(), "Tiny");
        assert_eq!(net.nodes().len(), 2);
        assert!(!net.pipe_by_name("P").unwrap().is_open());
        assert_eq!(net.hydraulic_options().headloss, HeadLossApprox::Smooth);
        assert_eq!(net.hydraulic_options().tracked_params, run.tracked_params);
        assert_eq!(net.time_options().hydraulic_timestep_s(), 3600.0);
    }

    #[test]
    fn dangling_pipe_endpoint_is_a_compile_error() {
        let mut d = def();
        d.pipes[0].to_node_id = "nowhere".to_string();
        assert!(matches!(
            build_network(&d, &RunDef::default()),
            Err(AppError::Compile(_))
        ));
    }

    #[test]
    fn run_settings_map_onto_stepper_config() {
        let run = RunDef {
            tee: true,
            max_iterations: 7,
            strict: true,
            convergence: ConvergencePolicyDef::Abort,
            ..RunDef::default()
        };
        let config = stepper_config(&run);
        assert_eq!(config.solver, "newton");
        assert!(config.solve.tee);
        assert_eq!(config.solve.max_iterations, 7);
        assert!(config.translate.strict);
        assert!(config.translate.inline_params);
        assert_eq!(config.convergence, ConvergencePolicy::Abort);
    }
}
