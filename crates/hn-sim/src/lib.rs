//! Extended-period simulation for hydraulic networks.
//!
//! Provides:
//! - a [`HydraulicNetwork`] seam between networks and the stepper
//! - a grid-snapping simulation clock
//! - [`TimeStepper`]: build, solve, store and record once per hydraulic step

pub mod clock;
pub mod error;
pub mod network;
pub mod stepper;

pub use clock::SimClock;
pub use error::{SimError, SimResult};
pub use network::HydraulicNetwork;
pub use stepper::{ConvergencePolicy, RunOutput, StepProgress, StepperConfig, TimeStepper};
