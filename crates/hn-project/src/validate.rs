//! Project validation logic.

use crate::schema::{NetworkDef, PipeDef, Project, RunDef, TankDef, TimeDef};
use std::collections::HashSet;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported feature: {feature} - {reason}")]
    Unsupported { feature: String, reason: String },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_project(project: &Project) -> Result<(), ValidationError> {
    if project.version > crate::migrate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: project.version,
        });
    }

    validate_network(&project.network)?;
    validate_run(&project.run, &project.network)?;
    Ok(())
}

fn invalid(field: String, value: f64, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn require_finite(field: impl Into<String>, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field.into(), value, "must be finite"))
    }
}

fn require_positive(field: impl Into<String>, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field.into(), value, "must be positive"))
    }
}

fn validate_network(network: &NetworkDef) -> Result<(), ValidationError> {
    let mut pattern_ids = HashSet::new();
    for pattern in &network.patterns {
        if !pattern_ids.insert(pattern.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: pattern.id.clone(),
                context: "patterns".to_string(),
            });
        }
        if pattern.multipliers.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: format!("pattern '{}' multipliers", pattern.id),
                value: "[]".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        for (i, &m) in pattern.multipliers.iter().enumerate() {
            require_finite(format!("pattern '{}' multipliers[{}]", pattern.id, i), m)?;
        }
    }

    let check_pattern = |pattern: &Option<String>, owner: &str| match pattern {
        Some(p) if !pattern_ids.contains(p.as_str()) => Err(ValidationError::MissingReference {
            id: p.clone(),
            context: format!("pattern of '{}'", owner),
        }),
        _ => Ok(()),
    };

    let mut node_ids = HashSet::new();
    for id in network.node_ids() {
        if !node_ids.insert(id) {
            return Err(ValidationError::DuplicateId {
                id: id.to_string(),
                context: format!("network '{}' nodes", network.name),
            });
        }
    }

    for junction in &network.junctions {
        require_finite(format!("junction '{}' elevation_m", junction.id), junction.elevation_m)?;
        require_finite(
            format!("junction '{}' base_demand_m3s", junction.id),
            junction.base_demand_m3s,
        )?;
        check_pattern(&junction.pattern, &junction.id)?;
    }

    for reservoir in &network.reservoirs {
        require_finite(format!("reservoir '{}' head_m", reservoir.id), reservoir.head_m)?;
        check_pattern(&reservoir.pattern, &reservoir.id)?;
    }

    for tank in &network.tanks {
        validate_tank(tank)?;
    }

    if network.reservoirs.is_empty() && network.tanks.is_empty() {
        return Err(ValidationError::Unsupported {
            feature: format!("network '{}'", network.name),
            reason: "at least one reservoir or tank is required to fix heads".to_string(),
        });
    }

    let mut pipe_ids = HashSet::new();
    for pipe in &network.pipes {
        if !pipe_ids.insert(pipe.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: pipe.id.clone(),
                context: format!("network '{}' pipes", network.name),
            });
        }
        validate_pipe(pipe, &node_ids)?;
    }

    validate_time(&network.time)
}

fn validate_tank(tank: &TankDef) -> Result<(), ValidationError> {
    require_finite(format!("tank '{}' elevation_m", tank.id), tank.elevation_m)?;
    require_positive(format!("tank '{}' diameter_m", tank.id), tank.diameter_m)?;
    require_finite(format!("tank '{}' min_level_m", tank.id), tank.min_level_m)?;
    require_finite(format!("tank '{}' max_level_m", tank.id), tank.max_level_m)?;
    if tank.min_level_m > tank.max_level_m {
        return Err(invalid(
            format!("tank '{}' min_level_m", tank.id),
            tank.min_level_m,
            "must not exceed max_level_m",
        ));
    }
    if !(tank.min_level_m..=tank.max_level_m).contains(&tank.init_level_m) {
        return Err(invalid(
            format!("tank '{}' init_level_m", tank.id),
            tank.init_level_m,
            "must lie between min_level_m and max_level_m",
        ));
    }
    Ok(())
}

fn validate_pipe(pipe: &PipeDef, node_ids: &HashSet<&str>) -> Result<(), ValidationError> {
    for node in [&pipe.from_node_id, &pipe.to_node_id] {
        if !node_ids.contains(node.as_str()) {
            return Err(ValidationError::MissingReference {
                id: node.clone(),
                context: format!("pipe '{}'", pipe.id),
            });
        }
    }
    if pipe.from_node_id == pipe.to_node_id {
        return Err(ValidationError::InvalidValue {
            field: format!("pipe '{}' to_node_id", pipe.id),
            value: pipe.to_node_id.clone(),
            reason: "pipe must connect two different nodes".to_string(),
        });
    }
    require_positive(format!("pipe '{}' length_m", pipe.id), pipe.length_m)?;
    require_positive(format!("pipe '{}' diameter_m", pipe.id), pipe.diameter_m)?;
    require_positive(format!("pipe '{}' roughness", pipe.id), pipe.roughness)?;
    if !pipe.minor_loss.is_finite() || pipe.minor_loss < 0.0 {
        return Err(invalid(
            format!("pipe '{}' minor_loss", pipe.id),
            pipe.minor_loss,
            "must be non-negative",
        ));
    }
    Ok(())
}

fn validate_time(time: &TimeDef) -> Result<(), ValidationError> {
    if !time.duration_s.is_finite() || time.duration_s < 0.0 {
        return Err(invalid(
            "time.duration_s".to_string(),
            time.duration_s,
            "must be non-negative",
        ));
    }
    require_positive("time.hydraulic_timestep_s", time.hydraulic_timestep_s)?;
    if time.hydraulic_timestep_s < 1.0 {
        return Err(invalid(
            "time.hydraulic_timestep_s".to_string(),
            time.hydraulic_timestep_s,
            "must be at least one second",
        ));
    }
    require_positive("time.pattern_timestep_s", time.pattern_timestep_s)?;
    Ok(())
}

fn validate_run(run: &RunDef, network: &NetworkDef) -> Result<(), ValidationError> {
    if run.solver.trim().is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "run.solver".to_string(),
            value: run.solver.clone(),
            reason: "solver name must not be empty".to_string(),
        });
    }
    if run.max_iterations == 0 {
        return Err(ValidationError::InvalidValue {
            field: "run.max_iterations".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        });
    }
    require_positive("run.abs_tol", run.abs_tol)?;

    let element_ids: HashSet<&str> = network
        .node_ids()
        .chain(network.pipes.iter().map(|p| p.id.as_str()))
        .collect();
    for name in &run.tracked_params {
        let element = tracked_element(name).ok_or_else(|| ValidationError::InvalidValue {
            field: "run.tracked_params".to_string(),
            value: name.clone(),
            reason: "expected '<parameter>[<element>]'".to_string(),
        })?;
        if !element_ids.contains(element) {
            return Err(ValidationError::MissingReference {
                id: element.to_string(),
                context: format!("tracked parameter '{}'", name),
            });
        }
    }
    Ok(())
}

/// Element id inside a `kind[element]` parameter name.
pub fn tracked_element(name: &str) -> Option<&str> {
    let (kind, rest) = name.split_once('[')?;
    let element = rest.strip_suffix(']')?;
    (!kind.is_empty() && !element.is_empty()).then_some(element)
}
