//! hn-network: water network state and its hydraulic model.
//!
//! Provides:
//! - network elements (junctions, reservoirs, tanks, pipes, patterns)
//! - a validating [`NetworkBuilder`]
//! - [`build_hydraulic_model`]: the algebraic model of the network at one instant
//! - [`store_results`]: write a solved model back and snapshot the state

pub mod builder;
pub mod error;
pub mod hydraulics;
pub mod network;
pub mod updater;

pub use builder::NetworkBuilder;
pub use error::{NetworkError, NetworkResult};
pub use hydraulics::{ModelContext, build_hydraulic_model, hw_resistance};
pub use network::{
    HeadLossApprox, HydraulicOptions, Junction, LinkStatus, Node, NodeKind, Pattern, Pipe,
    PipeProps, Reservoir, Tank, TimeOptions, WaterNetwork,
};
pub use updater::store_results;
