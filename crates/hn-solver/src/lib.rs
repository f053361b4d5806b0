//! Translation of algebraic models into solver-ready form, and the solvers.
//!
//! One solve is always the same pipeline:
//!
//! 1. [`translate`] an [`hn_aml::Model`] into a [`ConcreteModel`] plus an
//!    [`IndexMap`] tying model ids to contiguous solver positions;
//! 2. hand the concrete model to an [`NlpSolver`] (a damped Newton method
//!    ships with the crate, resolved by name through [`solver_factory`]);
//! 3. [`harvest`] the solved values back into the model's variables.
//!
//! [`solve_in_place`] runs all three.

pub mod concrete;
pub mod error;
pub mod harvest;
pub mod index_map;
pub mod invoker;
pub mod jacobian;
pub mod newton;
pub mod solve;
pub mod translate;

pub use concrete::{CExpr, CPred, ConcreteModel, Objective};
pub use error::{SolverError, SolverResult};
pub use harvest::harvest;
pub use index_map::IndexMap;
pub use invoker::{
    AVAILABLE_SOLVERS, JacobianScheme, NewtonSolver, NlpSolver, SolveOptions, SolveOutcome,
    SolveStatus, solver_factory,
};
pub use solve::{SolveReport, solve_in_place};
pub use translate::{DroppedConstraint, TranslateOptions, Translation, translate};
