//! hn-aml: solver-independent algebraic model.
//!
//! An algebraic model is three ordered collections (parameters, variables,
//! equality constraints) plus optional named sub-expressions shared between
//! constraints. Expressions are plain trees; anything that needs to turn them
//! into something else (a number, a solver expression) implements
//! [`ExprVisitor`] and lets [`Model::evaluate`] drive the walk.
//!
//! # Example
//!
//! ```
//! use hn_aml::{Expr, Model};
//!
//! let mut model = Model::new("demo");
//! let demand = model.add_param("demand", 2.0).unwrap();
//! let q = model.add_var("q", 0.0).unwrap();
//! model
//!     .add_constraint("balance", Expr::from(q) - Expr::from(demand))
//!     .unwrap();
//!
//! model.set_var_value(q, 2.0).unwrap();
//! let residual = model.constraint_residual(model.cons()[0].id).unwrap();
//! assert_eq!(residual, 0.0);
//! ```

pub mod error;
pub mod expr;
pub mod model;
pub mod visit;

pub use error::{AmlError, AmlResult, EvalError};
pub use expr::{BinaryOp, CmpOp, Condition, Expr, UnaryOp};
pub use model::{Constraint, Model, NamedExpr, Param, Var};
pub use visit::{ExprVisitor, NumericEval};
