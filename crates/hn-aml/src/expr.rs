//! Expression trees.

use hn_core::{ExprId, ParamId, VarId};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Single-argument operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Abs,
    Sqrt,
    Exp,
    Ln,
}

impl UnaryOp {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            UnaryOp::Neg => -x,
            UnaryOp::Abs => x.abs(),
            UnaryOp::Sqrt => x.sqrt(),
            UnaryOp::Exp => x.exp(),
            UnaryOp::Ln => x.ln(),
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Abs => "abs",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Exp => "exp",
            UnaryOp::Ln => "ln",
        }
    }
}

/// Two-argument operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => a.powf(b),
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
        }
    }
}

/// Comparison operators used in conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CmpOp {
    pub fn holds(self, a: f64, b: f64) -> bool {
        match self {
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
        }
    }
}

/// Guard of a conditional branch.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Always true; the usual guard of a trailing "otherwise" branch.
    Always,
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn and(self, other: Condition) -> Condition {
        Condition::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Condition) -> Condition {
        Condition::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Condition {
        Condition::Not(Box::new(self))
    }
}

/// Algebraic expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f64),
    Param(ParamId),
    Var(VarId),
    /// Reference to a named sub-expression stored in the model.
    Named(ExprId),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// Ordered `(guard, value)` branches; the first guard that holds selects
    /// its value, and the expression is zero when none does.
    Conditional(Vec<(Condition, Expr)>),
}

impl Expr {
    pub fn constant(v: f64) -> Expr {
        Expr::Const(v)
    }

    pub fn zero() -> Expr {
        Expr::Const(0.0)
    }

    /// Build a conditional expression from ordered branches.
    pub fn piecewise(branches: impl IntoIterator<Item = (Condition, Expr)>) -> Expr {
        Expr::Conditional(branches.into_iter().collect())
    }

    /// Ordered branches when this is a conditional expression.
    pub fn as_conditional(&self) -> Option<&[(Condition, Expr)]> {
        match self {
            Expr::Conditional(branches) => Some(branches),
            _ => None,
        }
    }

    pub fn is_conditional(&self) -> bool {
        matches!(self, Expr::Conditional(_))
    }

    /// Sum of an iterator of expressions; an empty sum is the constant zero.
    pub fn sum(terms: impl IntoIterator<Item = Expr>) -> Expr {
        terms
            .into_iter()
            .reduce(|acc, t| acc + t)
            .unwrap_or_else(Expr::zero)
    }

    pub fn pow(self, exponent: impl Into<Expr>) -> Expr {
        Expr::Binary(BinaryOp::Pow, Box::new(self), Box::new(exponent.into()))
    }

    pub fn abs(self) -> Expr {
        Expr::Unary(UnaryOp::Abs, Box::new(self))
    }

    pub fn sqrt(self) -> Expr {
        Expr::Unary(UnaryOp::Sqrt, Box::new(self))
    }

    pub fn exp(self) -> Expr {
        Expr::Unary(UnaryOp::Exp, Box::new(self))
    }

    pub fn ln(self) -> Expr {
        Expr::Unary(UnaryOp::Ln, Box::new(self))
    }

    pub fn lt(self, rhs: impl Into<Expr>) -> Condition {
        self.compare(CmpOp::Lt, rhs)
    }

    pub fn le(self, rhs: impl Into<Expr>) -> Condition {
        self.compare(CmpOp::Le, rhs)
    }

    pub fn gt(self, rhs: impl Into<Expr>) -> Condition {
        self.compare(CmpOp::Gt, rhs)
    }

    pub fn ge(self, rhs: impl Into<Expr>) -> Condition {
        self.compare(CmpOp::Ge, rhs)
    }

    pub fn compare(self, op: CmpOp, rhs: impl Into<Expr>) -> Condition {
        Condition::Compare(op, Box::new(self), Box::new(rhs.into()))
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Expr::Const(v)
    }
}

impl From<ParamId> for Expr {
    fn from(id: ParamId) -> Self {
        Expr::Param(id)
    }
}

impl From<VarId> for Expr {
    fn from(id: VarId) -> Self {
        Expr::Var(id)
    }
}

impl From<ExprId> for Expr {
    fn from(id: ExprId) -> Self {
        Expr::Named(id)
    }
}

macro_rules! impl_arith {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<R: Into<Expr>> $trait<R> for Expr {
            type Output = Expr;

            fn $method(self, rhs: R) -> Expr {
                Expr::binary($op, self, rhs.into())
            }
        }

        impl $trait<Expr> for f64 {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, Expr::Const(self), rhs)
            }
        }
    };
}

impl_arith!(Add, add, BinaryOp::Add);
impl_arith!(Sub, sub, BinaryOp::Sub);
impl_arith!(Mul, mul, BinaryOp::Mul);
impl_arith!(Div, div, BinaryOp::Div);

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Unary(UnaryOp::Neg, Box::new(self))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(v) => write!(f, "{}", v),
            Expr::Param(id) => write!(f, "p{}", id),
            Expr::Var(id) => write!(f, "x{}", id),
            Expr::Named(id) => write!(f, "e{}", id),
            Expr::Unary(UnaryOp::Neg, a) => write!(f, "-({})", a),
            Expr::Unary(op, a) => write!(f, "{}({})", op.symbol(), a),
            Expr::Binary(op, a, b) => write!(f, "({} {} {})", a, op.symbol(), b),
            Expr::Conditional(branches) => {
                write!(f, "piecewise[")?;
                for (i, (cond, value)) in branches.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{} => {}", cond, value)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Always => write!(f, "true"),
            Condition::Compare(op, a, b) => write!(f, "{} {} {}", a, op.symbol(), b),
            Condition::And(a, b) => write!(f, "({} && {})", a, b),
            Condition::Or(a, b) => write!(f, "({} || {})", a, b),
            Condition::Not(a) => write!(f, "!({})", a),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_build_binary_nodes() {
        let x = Expr::from(VarId::from_index(0));
        let e = x.clone() * 2.0 + 1.0;
        match e {
            Expr::Binary(BinaryOp::Add, lhs, rhs) => {
                assert_eq!(*rhs, Expr::Const(1.0));
                assert_eq!(*lhs, Expr::Binary(BinaryOp::Mul, Box::new(x), Box::new(Expr::Const(2.0))));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn empty_sum_is_zero() {
        assert_eq!(Expr::sum(Vec::new()), Expr::zero());
    }

    #[test]
    fn conditional_exposes_branches_in_order() {
        let x = Expr::from(VarId::from_index(0));
        let e = Expr::piecewise([
            (x.clone().ge(0.0), Expr::constant(1.0)),
            (Condition::Always, Expr::constant(2.0)),
        ]);
        let branches = e.as_conditional().unwrap();
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[1].0, Condition::Always);
        assert_eq!(branches[0].1, Expr::Const(1.0));
    }

    #[test]
    fn display_is_readable() {
        let e = Expr::from(VarId::from_index(1)) - Expr::from(ParamId::from_index(0));
        assert_eq!(e.to_string(), "(x1 - p0)");
    }

    #[test]
    fn ops_apply() {
        assert_eq!(BinaryOp::Pow.apply(2.0, 3.0), 8.0);
        assert_eq!(UnaryOp::Abs.apply(-2.0), 2.0);
        assert!(CmpOp::Ge.holds(0.0, 0.0));
        assert!(!CmpOp::Lt.holds(0.0, 0.0));
    }
}
