//! Incremental network builder.

use crate::error::{NetworkError, NetworkResult};
use crate::network::{
    HeadLossApprox, HydraulicOptions, Junction, Node, NodeKind, Pattern, Pipe, PipeProps,
    Reservoir, Tank, TimeOptions, WaterNetwork,
};
use hn_core::{LinkId, NodeId};
use std::collections::HashMap;
use uom::si::length::meter;

/// Builder for constructing a water network incrementally.
///
/// Use the `add_*` methods to build up the network, then call `build()` to
/// validate and freeze it into a [`WaterNetwork`].
#[derive(Debug, Default)]
pub struct NetworkBuilder {
    name: String,
    nodes: Vec<Node>,
    pipes: Vec<Pipe>,
    patterns: Vec<Pattern>,
    time: TimeOptions,
    hydraulic: HydraulicOptions,
}

impl NetworkBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn add_node(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        let id = NodeId::from_index(self.nodes.len() as u32);
        self.nodes.push(Node::new(id, name.into(), kind));
        id
    }

    pub fn add_junction(&mut self, name: impl Into<String>, junction: Junction) -> NodeId {
        self.add_node(name, NodeKind::Junction(junction))
    }

    pub fn add_reservoir(&mut self, name: impl Into<String>, reservoir: Reservoir) -> NodeId {
        self.add_node(name, NodeKind::Reservoir(reservoir))
    }

    pub fn add_tank(&mut self, name: impl Into<String>, tank: Tank) -> NodeId {
        self.add_node(name, NodeKind::Tank(tank))
    }

    /// Add a pipe from `start` to `end`; positive flow runs start to end.
    pub fn add_pipe(
        &mut self,
        name: impl Into<String>,
        start: NodeId,
        end: NodeId,
        props: PipeProps,
    ) -> LinkId {
        let id = LinkId::from_index(self.pipes.len() as u32);
        self.pipes.push(Pipe {
            id,
            name: name.into(),
            start,
            end,
            props,
            flow: 0.0,
        });
        id
    }

    pub fn add_pattern(&mut self, name: impl Into<String>, multipliers: Vec<f64>) {
        self.patterns.push(Pattern {
            name: name.into(),
            multipliers,
        });
    }

    pub fn time_options(&mut self, time: TimeOptions) -> &mut Self {
        self.time = time;
        self
    }

    pub fn headloss(&mut self, approx: HeadLossApprox) -> &mut Self {
        self.hydraulic.headloss = approx;
        self
    }

    pub fn track_param(&mut self, name: impl Into<String>) -> &mut Self {
        self.hydraulic.tracked_params.push(name.into());
        self
    }

    /// Validate and freeze the network.
    pub fn build(self) -> NetworkResult<WaterNetwork> {
        self.time.validate()?;

        let mut patterns = HashMap::new();
        for pattern in self.patterns {
            if pattern.multipliers.is_empty() || pattern.multipliers.iter().any(|m| !m.is_finite())
            {
                return Err(NetworkError::InvalidGeometry {
                    element: pattern.name,
                    what: "pattern needs at least one finite multiplier",
                });
            }
            if patterns.contains_key(&pattern.name) {
                return Err(NetworkError::DuplicateName {
                    kind: "pattern",
                    name: pattern.name,
                });
            }
            patterns.insert(pattern.name.clone(), pattern);
        }

        let mut node_names = HashMap::new();
        for node in &self.nodes {
            if node_names.insert(node.name.clone(), node.id).is_some() {
                return Err(NetworkError::DuplicateName {
                    kind: "node",
                    name: node.name.clone(),
                });
            }
            validate_node(node, &patterns)?;
        }
        if !self.nodes.iter().any(|n| n.kind.is_fixed_head()) {
            return Err(NetworkError::NoFixedHead);
        }

        let mut pipe_names = HashMap::new();
        for pipe in &self.pipes {
            if pipe_names.insert(pipe.name.clone(), pipe.id).is_some() {
                return Err(NetworkError::DuplicateName {
                    kind: "pipe",
                    name: pipe.name.clone(),
                });
            }
            for node in [pipe.start, pipe.end] {
                if node.slot() >= self.nodes.len() {
                    return Err(NetworkError::UnknownNode {
                        pipe: pipe.name.clone(),
                        node,
                    });
                }
            }
            validate_pipe(pipe)?;
        }

        Ok(WaterNetwork {
            name: self.name,
            nodes: self.nodes,
            pipes: self.pipes,
            patterns,
            node_names,
            pipe_names,
            time: self.time,
            hydraulic: self.hydraulic,
            sim_time: 0.0,
        })
    }
}

fn validate_node(node: &Node, patterns: &HashMap<String, Pattern>) -> NetworkResult<()> {
    let check_pattern = |pattern: &Option<String>| match pattern {
        Some(p) if !patterns.contains_key(p) => Err(NetworkError::UnknownPattern {
            element: node.name.clone(),
            pattern: p.clone(),
        }),
        _ => Ok(()),
    };
    let geometry = |what| NetworkError::InvalidGeometry {
        element: node.name.clone(),
        what,
    };

    match &node.kind {
        NodeKind::Junction(j) => check_pattern(&j.pattern),
        NodeKind::Reservoir(r) => check_pattern(&r.pattern),
        NodeKind::Tank(t) => {
            let min = t.min_level.get::<meter>();
            let max = t.max_level.get::<meter>();
            let init = t.init_level.get::<meter>();
            if !positive(t.diameter.get::<meter>()) {
                return Err(geometry("tank diameter must be positive"));
            }
            if min > max {
                return Err(geometry("tank min level exceeds max level"));
            }
            if !(min..=max).contains(&init) {
                return Err(geometry("tank initial level outside [min, max]"));
            }
            Ok(())
        }
    }
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

fn validate_pipe(pipe: &Pipe) -> NetworkResult<()> {
    let geometry = |what| NetworkError::InvalidGeometry {
        element: pipe.name.clone(),
        what,
    };
    if pipe.start == pipe.end {
        return Err(geometry("pipe must connect two different nodes"));
    }
    if !positive(pipe.props.length.get::<meter>()) {
        return Err(geometry("length must be positive"));
    }
    if !positive(pipe.props.diameter.get::<meter>()) {
        return Err(geometry("diameter must be positive"));
    }
    if !positive(pipe.props.roughness) {
        return Err(geometry("roughness must be positive"));
    }
    if !pipe.props.minor_loss.is_finite() || pipe.props.minor_loss < 0.0 {
        return Err(geometry("minor loss must be non-negative"));
    }
    Ok(())
}
