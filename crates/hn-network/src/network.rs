//! Water network elements and their mutable state.

use crate::error::{NetworkError, NetworkResult};
use hn_core::{Length, LinkId, NodeId, Time, VolumeRate, circle_area};
use std::collections::HashMap;
use uom::si::area::square_meter;
use uom::si::length::meter;
use uom::si::time::second;
use uom::si::volume_rate::cubic_meter_per_second;

/// Demand node with unknown head.
#[derive(Debug, Clone, PartialEq)]
pub struct Junction {
    pub elevation: Length,
    pub base_demand: VolumeRate,
    pub pattern: Option<String>,
}

/// Infinite source with a (possibly patterned) fixed head.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservoir {
    pub base_head: Length,
    pub pattern: Option<String>,
}

/// Cylindrical storage; its head is fixed within a step and its level
/// follows the net inflow between steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Tank {
    pub elevation: Length,
    pub init_level: Length,
    pub min_level: Length,
    pub max_level: Length,
    pub diameter: Length,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Junction(Junction),
    Reservoir(Reservoir),
    Tank(Tank),
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Junction(_) => "junction",
            NodeKind::Reservoir(_) => "reservoir",
            NodeKind::Tank(_) => "tank",
        }
    }

    /// Reservoirs and tanks pin the head at their node.
    pub fn is_fixed_head(&self) -> bool {
        !matches!(self, NodeKind::Junction(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub(crate) head: f64,
    pub(crate) demand: f64,
    pub(crate) level: f64,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: String, kind: NodeKind) -> Self {
        let (head, level) = match &kind {
            NodeKind::Junction(j) => (j.elevation.get::<meter>(), 0.0),
            NodeKind::Reservoir(r) => (r.base_head.get::<meter>(), 0.0),
            NodeKind::Tank(t) => {
                let level = t.init_level.get::<meter>();
                (t.elevation.get::<meter>() + level, level)
            }
        };
        Self {
            id,
            name,
            kind,
            head,
            demand: 0.0,
            level,
        }
    }

    /// Hydraulic head, m.
    pub fn head(&self) -> f64 {
        self.head
    }

    /// Demand at the last step, m^3/s.
    pub fn demand(&self) -> f64 {
        self.demand
    }

    /// Tank level, m; zero for other nodes.
    pub fn level(&self) -> f64 {
        self.level
    }

    /// Elevation used for pressure; reservoirs sit at their own head.
    pub fn elevation(&self) -> f64 {
        match &self.kind {
            NodeKind::Junction(j) => j.elevation.get::<meter>(),
            NodeKind::Reservoir(_) => self.head,
            NodeKind::Tank(t) => t.elevation.get::<meter>(),
        }
    }

    pub fn pressure(&self) -> f64 {
        self.head - self.elevation()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkStatus {
    #[default]
    Open,
    Closed,
}

/// Pipe properties as given to the builder.
#[derive(Debug, Clone, PartialEq)]
pub struct PipeProps {
    pub length: Length,
    pub diameter: Length,
    /// Hazen-Williams C factor.
    pub roughness: f64,
    pub minor_loss: f64,
    pub status: LinkStatus,
}

impl PipeProps {
    pub fn new(length: Length, diameter: Length, roughness: f64) -> Self {
        Self {
            length,
            diameter,
            roughness,
            minor_loss: 0.0,
            status: LinkStatus::Open,
        }
    }

    pub fn with_minor_loss(mut self, k: f64) -> Self {
        self.minor_loss = k;
        self
    }

    pub fn closed(mut self) -> Self {
        self.status = LinkStatus::Closed;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pipe {
    pub id: LinkId,
    pub name: String,
    pub start: NodeId,
    pub end: NodeId,
    pub props: PipeProps,
    pub(crate) flow: f64,
}

impl Pipe {
    pub fn is_open(&self) -> bool {
        self.props.status == LinkStatus::Open
    }

    /// Flow from start to end at the last step, m^3/s.
    pub fn flow(&self) -> f64 {
        self.flow
    }

    pub fn velocity(&self) -> f64 {
        self.flow / circle_area(self.props.diameter).get::<square_meter>()
    }
}

/// Multipliers applied per pattern step, wrapping around at the end.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub name: String,
    pub multipliers: Vec<f64>,
}

impl Pattern {
    pub fn multiplier(&self, time_s: f64, step_s: f64) -> f64 {
        if self.multipliers.is_empty() {
            return 1.0;
        }
        let slot = (time_s / step_s).floor().max(0.0) as usize;
        self.multipliers[slot % self.multipliers.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeOptions {
    pub duration: Time,
    pub hydraulic_timestep: Time,
    pub pattern_timestep: Time,
}

impl Default for TimeOptions {
    fn default() -> Self {
        Self {
            duration: hn_core::s(0.0),
            hydraulic_timestep: hn_core::hours(1.0),
            pattern_timestep: hn_core::hours(1.0),
        }
    }
}

impl TimeOptions {
    pub fn duration_s(&self) -> f64 {
        self.duration.get::<second>()
    }

    pub fn hydraulic_timestep_s(&self) -> f64 {
        self.hydraulic_timestep.get::<second>()
    }

    pub fn pattern_timestep_s(&self) -> f64 {
        self.pattern_timestep.get::<second>()
    }

    pub(crate) fn validate(&self) -> NetworkResult<()> {
        let duration = self.duration_s();
        if !duration.is_finite() || duration < 0.0 {
            return Err(NetworkError::InvalidTimeOptions {
                what: "duration must be non-negative",
            });
        }
        let step = self.hydraulic_timestep_s();
        if !step.is_finite() || step <= 0.0 {
            return Err(NetworkError::InvalidTimeOptions {
                what: "hydraulic timestep must be positive",
            });
        }
        if step < 1.0 {
            return Err(NetworkError::InvalidTimeOptions {
                what: "hydraulic timestep must be at least one second",
            });
        }
        let pattern = self.pattern_timestep_s();
        if !pattern.is_finite() || pattern <= 0.0 {
            return Err(NetworkError::InvalidTimeOptions {
                what: "pattern timestep must be positive",
            });
        }
        Ok(())
    }
}

/// Head-loss formulation for the pipe equations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeadLossApprox {
    /// Hazen-Williams with a linear segment around zero flow.
    #[default]
    Piecewise,
    /// `r q |q|^0.852` everywhere.
    Smooth,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HydraulicOptions {
    pub headloss: HeadLossApprox,
    /// Parameter names reported in each step's calibration table.
    pub tracked_params: Vec<String>,
}

/// A validated water network plus its evolving hydraulic state.
#[derive(Debug, Clone)]
pub struct WaterNetwork {
    pub(crate) name: String,
    pub(crate) nodes: Vec<Node>,
    pub(crate) pipes: Vec<Pipe>,
    pub(crate) patterns: HashMap<String, Pattern>,
    pub(crate) node_names: HashMap<String, NodeId>,
    pub(crate) pipe_names: HashMap<String, LinkId>,
    pub(crate) time: TimeOptions,
    pub(crate) hydraulic: HydraulicOptions,
    pub(crate) sim_time: f64,
}

impl WaterNetwork {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn pipes(&self) -> &[Pipe] {
        &self.pipes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.slot())
    }

    pub fn pipe(&self, id: LinkId) -> Option<&Pipe> {
        self.pipes.get(id.slot())
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.node_names.get(name).and_then(|&id| self.node(id))
    }

    pub fn pipe_by_name(&self, name: &str) -> Option<&Pipe> {
        self.pipe_names.get(name).and_then(|&id| self.pipe(id))
    }

    pub fn pattern(&self, name: &str) -> Option<&Pattern> {
        self.patterns.get(name)
    }

    pub fn time_options(&self) -> &TimeOptions {
        &self.time
    }

    pub fn hydraulic_options(&self) -> &HydraulicOptions {
        &self.hydraulic
    }

    pub fn set_headloss(&mut self, approx: HeadLossApprox) {
        self.hydraulic.headloss = approx;
    }

    pub fn track_param(&mut self, name: impl Into<String>) {
        self.hydraulic.tracked_params.push(name.into());
    }

    /// Current simulated time, s.
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn set_sim_time(&mut self, time_s: f64) {
        self.sim_time = time_s;
    }

    pub fn set_pipe_status(&mut self, name: &str, status: LinkStatus) -> NetworkResult<()> {
        let pipe = self.pipe_mut(name)?;
        pipe.props.status = status;
        if status == LinkStatus::Closed {
            pipe.flow = 0.0;
        }
        Ok(())
    }

    pub fn set_roughness(&mut self, name: &str, roughness: f64) -> NetworkResult<()> {
        if !roughness.is_finite() || roughness <= 0.0 {
            return Err(NetworkError::InvalidGeometry {
                element: name.to_string(),
                what: "roughness must be positive",
            });
        }
        self.pipe_mut(name)?.props.roughness = roughness;
        Ok(())
    }

    fn pipe_mut(&mut self, name: &str) -> NetworkResult<&mut Pipe> {
        let id = self
            .pipe_names
            .get(name)
            .copied()
            .ok_or_else(|| NetworkError::UnknownElement {
                kind: "pipe",
                name: name.to_string(),
            })?;
        Ok(&mut self.pipes[id.slot()])
    }

    /// Pattern multiplier at `time_s`; 1 when no pattern is attached.
    pub(crate) fn multiplier(&self, pattern: Option<&str>, time_s: f64) -> f64 {
        pattern
            .and_then(|p| self.patterns.get(p))
            .map_or(1.0, |p| p.multiplier(time_s, self.time.pattern_timestep_s()))
    }

    /// Flow into `node` minus flow out of it over open pipes, m^3/s.
    pub fn net_inflow(&self, node: NodeId) -> f64 {
        self.pipes
            .iter()
            .filter(|p| p.is_open())
            .map(|p| {
                if p.end == node {
                    p.flow
                } else if p.start == node {
                    -p.flow
                } else {
                    0.0
                }
            })
            .sum()
    }
}

pub(crate) fn base_demand_m3s(j: &Junction) -> f64 {
    j.base_demand.get::<cubic_meter_per_second>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_wraps() {
        let p = Pattern {
            name: "p".to_string(),
            multipliers: vec![1.0, 2.0, 3.0],
        };
        assert_eq!(p.multiplier(0.0, 3600.0), 1.0);
        assert_eq!(p.multiplier(3599.0, 3600.0), 1.0);
        assert_eq!(p.multiplier(7200.0, 3600.0), 3.0);
        assert_eq!(p.multiplier(10800.0, 3600.0), 1.0);
    }

    #[test]
    fn tank_starts_at_initial_level() {
        let tank = Node::new(
            NodeId::from_index(0),
            "T".to_string(),
            NodeKind::Tank(Tank {
                elevation: hn_core::m(20.0),
                init_level: hn_core::m(3.0),
                min_level: hn_core::m(0.0),
                max_level: hn_core::m(5.0),
                diameter: hn_core::m(10.0),
            }),
        );
        assert_eq!(tank.head(), 23.0);
        assert_eq!(tank.level(), 3.0);
        assert_eq!(tank.pressure(), 3.0);
    }

    #[test]
    fn time_options_reject_zero_step() {
        let opts = TimeOptions {
            hydraulic_timestep: hn_core::s(0.0),
            ..TimeOptions::default()
        };
        assert!(matches!(
            opts.validate(),
            Err(NetworkError::InvalidTimeOptions { .. })
        ));
    }
}
