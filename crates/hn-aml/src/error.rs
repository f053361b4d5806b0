//! Error types for model construction and expression evaluation.

use hn_core::{ConId, ExprId, ParamId, VarId};
use thiserror::Error;

/// Errors raised while building or mutating a model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AmlError {
    #[error("Duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Unknown parameter {0:?}")]
    UnknownParam(ParamId),

    #[error("Unknown variable {0:?}")]
    UnknownVar(VarId),

    #[error("Unknown constraint {0:?}")]
    UnknownConstraint(ConId),

    #[error("Unknown expression {0:?}")]
    UnknownExpression(ExprId),

    #[error("Evaluation failed: {0}")]
    Eval(#[from] EvalError),
}

pub type AmlResult<T> = Result<T, AmlError>;

/// Errors raised while walking an expression.
///
/// Dangling references are local to one expression and leave the rest of the
/// model usable; a cycle through named expressions means the model itself is
/// malformed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Reference to unknown parameter {0:?}")]
    UnknownParam(ParamId),

    #[error("Reference to unknown variable {0:?}")]
    UnknownVar(VarId),

    #[error("Reference to unknown expression {0:?}")]
    UnknownExpression(ExprId),

    #[error("Named expression '{name}' refers to itself")]
    CyclicExpression { name: String },

    #[error("{0}")]
    Visitor(String),
}

impl EvalError {
    /// Whether the failure invalidates the whole model rather than one expression.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EvalError::CyclicExpression { .. })
    }
}
