//! Solver-ready model: dense positions instead of ids, no named
//! sub-expressions and no piecewise branches left, only nested selects.

use hn_aml::{BinaryOp, CmpOp, UnaryOp};
use std::fmt;

/// Concrete residual expression over positional parameters and variables.
#[derive(Debug, Clone, PartialEq)]
pub enum CExpr {
    Const(f64),
    /// Mutable constant at this position.
    Param(usize),
    /// Decision variable at this position.
    Var(usize),
    Unary(UnaryOp, Box<CExpr>),
    Binary(BinaryOp, Box<CExpr>, Box<CExpr>),
    /// `cond ? then : otherwise`
    Select(Box<CPred>, Box<CExpr>, Box<CExpr>),
}

/// Concrete guard of a select.
#[derive(Debug, Clone, PartialEq)]
pub enum CPred {
    Always,
    Compare(CmpOp, Box<CExpr>, Box<CExpr>),
    And(Box<CPred>, Box<CPred>),
    Or(Box<CPred>, Box<CPred>),
    Not(Box<CPred>),
}

impl CExpr {
    /// Evaluate at parameter values `p` and variable values `x`.
    ///
    /// Positions are assigned by the translator, so they are always in range
    /// for the model the expression belongs to.
    pub fn eval(&self, p: &[f64], x: &[f64]) -> f64 {
        match self {
            CExpr::Const(c) => *c,
            CExpr::Param(i) => p[*i],
            CExpr::Var(i) => x[*i],
            CExpr::Unary(op, a) => op.apply(a.eval(p, x)),
            CExpr::Binary(op, a, b) => op.apply(a.eval(p, x), b.eval(p, x)),
            CExpr::Select(c, t, e) => {
                if c.holds(p, x) {
                    t.eval(p, x)
                } else {
                    e.eval(p, x)
                }
            }
        }
    }

    /// Largest variable position referenced, if any.
    pub fn max_var(&self) -> Option<usize> {
        match self {
            CExpr::Const(_) | CExpr::Param(_) => None,
            CExpr::Var(i) => Some(*i),
            CExpr::Unary(_, a) => a.max_var(),
            CExpr::Binary(_, a, b) => a.max_var().max(b.max_var()),
            CExpr::Select(c, t, e) => c.max_var().max(t.max_var()).max(e.max_var()),
        }
    }

    /// Depth of nested selects; a piecewise expression with `n` branches
    /// becomes `n` nested selects.
    pub fn select_depth(&self) -> usize {
        match self {
            CExpr::Const(_) | CExpr::Param(_) | CExpr::Var(_) => 0,
            CExpr::Unary(_, a) => a.select_depth(),
            CExpr::Binary(_, a, b) => a.select_depth().max(b.select_depth()),
            CExpr::Select(_, t, e) => 1 + t.select_depth().max(e.select_depth()),
        }
    }
}

impl CPred {
    pub fn holds(&self, p: &[f64], x: &[f64]) -> bool {
        match self {
            CPred::Always => true,
            CPred::Compare(op, a, b) => op.holds(a.eval(p, x), b.eval(p, x)),
            CPred::And(a, b) => a.holds(p, x) && b.holds(p, x),
            CPred::Or(a, b) => a.holds(p, x) || b.holds(p, x),
            CPred::Not(a) => !a.holds(p, x),
        }
    }

    fn max_var(&self) -> Option<usize> {
        match self {
            CPred::Always => None,
            CPred::Compare(_, a, b) => a.max_var().max(b.max_var()),
            CPred::And(a, b) | CPred::Or(a, b) => a.max_var().max(b.max_var()),
            CPred::Not(a) => a.max_var(),
        }
    }
}

impl fmt::Display for CExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CExpr::Const(c) => write!(f, "{}", c),
            CExpr::Param(i) => write!(f, "params[{}]", i),
            CExpr::Var(i) => write!(f, "vars[{}]", i),
            CExpr::Unary(op, a) => write!(f, "{:?}({})", op, a),
            CExpr::Binary(op, a, b) => write!(f, "{:?}({}, {})", op, a, b),
            CExpr::Select(c, t, e) => write!(f, "if({:?}, {}, {})", c, t, e),
        }
    }
}

/// Objective attached to the concrete model.
///
/// The networks solved here are systems of equations, so the objective is a
/// constant and only feasibility matters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Objective {
    /// Minimize a constant.
    Constant(f64),
}

impl Objective {
    pub fn value(&self) -> f64 {
        match self {
            Objective::Constant(c) => *c,
        }
    }
}

/// Concrete model handed to a solver.
#[derive(Debug, Clone)]
pub struct ConcreteModel {
    pub(crate) params: Vec<f64>,
    pub(crate) vars: Vec<f64>,
    pub(crate) cons: Vec<CExpr>,
    pub(crate) objective: Objective,
}

impl ConcreteModel {
    pub fn new(params: Vec<f64>, vars: Vec<f64>, cons: Vec<CExpr>) -> Self {
        Self {
            params,
            vars,
            cons,
            objective: Objective::Constant(1.0),
        }
    }

    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn num_cons(&self) -> usize {
        self.cons.len()
    }

    pub fn params(&self) -> &[f64] {
        &self.params
    }

    /// Mutable constants may be changed between solves without retranslating.
    pub fn set_param(&mut self, index: usize, value: f64) -> Option<()> {
        let slot = self.params.get_mut(index)?;
        *slot = value;
        Some(())
    }

    /// Initial values of the decision variables.
    pub fn initial_values(&self) -> &[f64] {
        &self.vars
    }

    /// Residual expressions; each must equal zero at a solution.
    pub fn constraints(&self) -> &[CExpr] {
        &self.cons
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    /// All constraint residuals at `x`.
    pub fn residuals(&self, x: &[f64]) -> Vec<f64> {
        self.cons.iter().map(|c| c.eval(&self.params, x)).collect()
    }
}
