//! Project schema definitions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub version: u32,
    pub name: String,
    pub network: NetworkDef,
    #[serde(default)]
    pub run: RunDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub junctions: Vec<JunctionDef>,
    #[serde(default)]
    pub reservoirs: Vec<ReservoirDef>,
    #[serde(default)]
    pub tanks: Vec<TankDef>,
    #[serde(default)]
    pub pipes: Vec<PipeDef>,
    #[serde(default)]
    pub patterns: Vec<PatternDef>,
    #[serde(default)]
    pub time: TimeDef,
    #[serde(default)]
    pub headloss: HeadLossDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JunctionDef {
    pub id: String,
    pub elevation_m: f64,
    #[serde(default)]
    pub base_demand_m3s: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReservoirDef {
    pub id: String,
    pub head_m: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TankDef {
    pub id: String,
    pub elevation_m: f64,
    pub init_level_m: f64,
    #[serde(default)]
    pub min_level_m: f64,
    pub max_level_m: f64,
    pub diameter_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipeDef {
    pub id: String,
    pub from_node_id: String,
    pub to_node_id: String,
    pub length_m: f64,
    pub diameter_m: f64,
    /// Hazen-Williams C factor.
    pub roughness: f64,
    #[serde(default)]
    pub minor_loss: f64,
    #[serde(default)]
    pub status: PipeStatusDef,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipeStatusDef {
    #[default]
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternDef {
    pub id: String,
    pub multipliers: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeDef {
    #[serde(default)]
    pub duration_s: f64,
    #[serde(default = "default_timestep")]
    pub hydraulic_timestep_s: f64,
    #[serde(default = "default_timestep")]
    pub pattern_timestep_s: f64,
}

fn default_timestep() -> f64 {
    3600.0
}

impl Default for TimeDef {
    fn default() -> Self {
        Self {
            duration_s: 0.0,
            hydraulic_timestep_s: default_timestep(),
            pattern_timestep_s: default_timestep(),
        }
    }
}

/// Head-loss formulation used in the pipe equations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HeadLossDef {
    #[default]
    Piecewise,
    Smooth,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConvergencePolicyDef {
    Ignore,
    #[default]
    Record,
    Abort,
}

/// Run settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunDef {
    #[serde(default = "default_solver")]
    pub solver: String,
    #[serde(default)]
    pub tee: bool,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_abs_tol")]
    pub abs_tol: f64,
    /// Refuse to drop constraints that cannot be translated.
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub convergence: ConvergencePolicyDef,
    /// Parameter names (e.g. `hw_resistance[11]`) reported every step.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracked_params: Vec<String>,
}

fn default_solver() -> String {
    "newton".to_string()
}

fn default_max_iterations() -> usize {
    100
}

fn default_abs_tol() -> f64 {
    1e-8
}

impl Default for RunDef {
    fn default() -> Self {
        Self {
            solver: default_solver(),
            tee: false,
            max_iterations: default_max_iterations(),
            abs_tol: default_abs_tol(),
            strict: false,
            convergence: ConvergencePolicyDef::default(),
            tracked_params: Vec::new(),
        }
    }
}

impl NetworkDef {
    /// Ids of every node, in junction, reservoir, tank order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.junctions
            .iter()
            .map(|j| j.id.as_str())
            .chain(self.reservoirs.iter().map(|r| r.id.as_str()))
            .chain(self.tanks.iter().map(|t| t.id.as_str()))
    }
}
