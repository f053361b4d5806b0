//! Expression visitors and the generic walker that drives them.

use crate::error::EvalError;
use crate::expr::{BinaryOp, CmpOp, Condition, Expr, UnaryOp};
use crate::model::{Model, Param, Var};
use hn_core::{ExprId, ParamId, VarId};

/// One method per expression node kind.
///
/// Implementors never recurse themselves: [`Model::evaluate`] walks the tree
/// bottom-up, resolves parameter/variable/named references against the model
/// and hands already-visited children to these methods.
///
/// Conditional expressions never reach a visitor as such. The walker folds
/// the branches `[(c1, e1), .., (cn, en)]` from the back, starting at zero:
/// `select(cn, en, 0)`, then `select(c(n-1), e(n-1), acc)`, up to `c1`. The
/// result is one nested if-then-else with first-match-wins semantics.
pub trait ExprVisitor {
    type Value;
    type Predicate;

    fn literal(&mut self, value: f64) -> Result<Self::Value, EvalError>;

    fn param(&mut self, id: ParamId, param: &Param) -> Result<Self::Value, EvalError>;

    fn var(&mut self, id: VarId, var: &Var) -> Result<Self::Value, EvalError>;

    fn unary(&mut self, op: UnaryOp, arg: Self::Value) -> Result<Self::Value, EvalError>;

    fn binary(
        &mut self,
        op: BinaryOp,
        lhs: Self::Value,
        rhs: Self::Value,
    ) -> Result<Self::Value, EvalError>;

    fn always(&mut self) -> Result<Self::Predicate, EvalError>;

    fn compare(
        &mut self,
        op: CmpOp,
        lhs: Self::Value,
        rhs: Self::Value,
    ) -> Result<Self::Predicate, EvalError>;

    fn and(
        &mut self,
        a: Self::Predicate,
        b: Self::Predicate,
    ) -> Result<Self::Predicate, EvalError>;

    fn or(&mut self, a: Self::Predicate, b: Self::Predicate)
    -> Result<Self::Predicate, EvalError>;

    fn not(&mut self, a: Self::Predicate) -> Result<Self::Predicate, EvalError>;

    /// `cond ? then : otherwise`
    fn select(
        &mut self,
        cond: Self::Predicate,
        then: Self::Value,
        otherwise: Self::Value,
    ) -> Result<Self::Value, EvalError>;
}

/// Recursive walker; tracks named expressions currently being expanded so a
/// self-referential definition is reported instead of overflowing the stack.
pub(crate) struct Walker<'m> {
    model: &'m Model,
    expanding: Vec<ExprId>,
}

impl<'m> Walker<'m> {
    pub(crate) fn new(model: &'m Model) -> Self {
        Self {
            model,
            expanding: Vec::new(),
        }
    }

    pub(crate) fn expr<V: ExprVisitor>(
        &mut self,
        expr: &Expr,
        v: &mut V,
    ) -> Result<V::Value, EvalError> {
        match expr {
            Expr::Const(c) => v.literal(*c),
            Expr::Param(id) => {
                let p = self.model.param(*id).ok_or(EvalError::UnknownParam(*id))?;
                v.param(*id, p)
            }
            Expr::Var(id) => {
                let x = self.model.var(*id).ok_or(EvalError::UnknownVar(*id))?;
                v.var(*id, x)
            }
            Expr::Named(id) => {
                let model = self.model;
                let named = model
                    .expression(*id)
                    .ok_or(EvalError::UnknownExpression(*id))?;
                if self.expanding.contains(id) {
                    return Err(EvalError::CyclicExpression {
                        name: named.name.clone(),
                    });
                }
                self.expanding.push(*id);
                let out = self.expr(&named.expr, v);
                self.expanding.pop();
                out
            }
            Expr::Unary(op, a) => {
                let a = self.expr(a, v)?;
                v.unary(*op, a)
            }
            Expr::Binary(op, a, b) => {
                let a = self.expr(a, v)?;
                let b = self.expr(b, v)?;
                v.binary(*op, a, b)
            }
            Expr::Conditional(branches) => {
                let mut acc = v.literal(0.0)?;
                for (cond, branch) in branches.iter().rev() {
                    let guard = self.condition(cond, v)?;
                    let value = self.expr(branch, v)?;
                    acc = v.select(guard, value, acc)?;
                }
                Ok(acc)
            }
        }
    }

    fn condition<V: ExprVisitor>(
        &mut self,
        cond: &Condition,
        v: &mut V,
    ) -> Result<V::Predicate, EvalError> {
        match cond {
            Condition::Always => v.always(),
            Condition::Compare(op, a, b) => {
                let a = self.expr(a, v)?;
                let b = self.expr(b, v)?;
                v.compare(*op, a, b)
            }
            Condition::And(a, b) => {
                let a = self.condition(a, v)?;
                let b = self.condition(b, v)?;
                v.and(a, b)
            }
            Condition::Or(a, b) => {
                let a = self.condition(a, v)?;
                let b = self.condition(b, v)?;
                v.or(a, b)
            }
            Condition::Not(a) => {
                let a = self.condition(a, v)?;
                v.not(a)
            }
        }
    }
}

/// Evaluates an expression to a number at the model's current values.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericEval;

impl ExprVisitor for NumericEval {
    type Value = f64;
    type Predicate = bool;

    fn literal(&mut self, value: f64) -> Result<f64, EvalError> {
        Ok(value)
    }

    fn param(&mut self, _id: ParamId, param: &Param) -> Result<f64, EvalError> {
        Ok(param.value())
    }

    fn var(&mut self, _id: VarId, var: &Var) -> Result<f64, EvalError> {
        Ok(var.value())
    }

    fn unary(&mut self, op: UnaryOp, arg: f64) -> Result<f64, EvalError> {
        Ok(op.apply(arg))
    }

    fn binary(&mut self, op: BinaryOp, lhs: f64, rhs: f64) -> Result<f64, EvalError> {
        Ok(op.apply(lhs, rhs))
    }

    fn always(&mut self) -> Result<bool, EvalError> {
        Ok(true)
    }

    fn compare(&mut self, op: CmpOp, lhs: f64, rhs: f64) -> Result<bool, EvalError> {
        Ok(op.holds(lhs, rhs))
    }

    fn and(&mut self, a: bool, b: bool) -> Result<bool, EvalError> {
        Ok(a && b)
    }

    fn or(&mut self, a: bool, b: bool) -> Result<bool, EvalError> {
        Ok(a || b)
    }

    fn not(&mut self, a: bool) -> Result<bool, EvalError> {
        Ok(!a)
    }

    fn select(&mut self, cond: bool, then: f64, otherwise: f64) -> Result<f64, EvalError> {
        Ok(if cond { then } else { otherwise })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_branch(model: &mut Model, swap: bool) -> (VarId, Expr) {
        let x = model.add_var("x", 0.0).unwrap();
        let a = Expr::constant(10.0);
        let b = Expr::constant(20.0);
        let first = (Expr::from(x).ge(0.0), a);
        let second = (Condition::Always, b);
        let branches = if swap {
            vec![second, first]
        } else {
            vec![first, second]
        };
        (x, Expr::piecewise(branches))
    }

    #[test]
    fn conditional_first_match_wins() {
        let mut m = Model::new("t");
        let (x, e) = two_branch(&mut m, false);

        m.set_var_value(x, 1.0).unwrap();
        assert_eq!(m.value_of(&e).unwrap(), 10.0);

        m.set_var_value(x, -1.0).unwrap();
        assert_eq!(m.value_of(&e).unwrap(), 20.0);
    }

    #[test]
    fn conditional_is_order_sensitive() {
        let mut m = Model::new("t");
        let (x, e) = two_branch(&mut m, true);

        // "true" now comes first and shadows the x >= 0 branch.
        m.set_var_value(x, 1.0).unwrap();
        assert_eq!(m.value_of(&e).unwrap(), 20.0);
    }

    #[test]
    fn conditional_defaults_to_zero() {
        let mut m = Model::new("t");
        let x = m.add_var("x", -5.0).unwrap();
        let e = Expr::piecewise([(Expr::from(x).gt(0.0), Expr::constant(3.0))]);
        assert_eq!(m.value_of(&e).unwrap(), 0.0);
        assert_eq!(m.value_of(&Expr::piecewise([])).unwrap(), 0.0);
    }

    #[test]
    fn compound_conditions() {
        let mut m = Model::new("t");
        let x = m.add_var("x", 0.5).unwrap();
        let inside = Expr::from(x).gt(0.0).and(Expr::from(x).lt(1.0));
        let e = Expr::piecewise([(inside.clone(), Expr::constant(1.0))]);
        assert_eq!(m.value_of(&e).unwrap(), 1.0);

        let outside = Expr::piecewise([(inside.negate(), Expr::constant(1.0))]);
        assert_eq!(m.value_of(&outside).unwrap(), 0.0);
    }

    #[test]
    fn dangling_references_are_reported() {
        let m = Model::new("t");
        let err = m.value_of(&Expr::from(VarId::from_index(3))).unwrap_err();
        assert_eq!(err, EvalError::UnknownVar(VarId::from_index(3)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn named_expressions_expand_and_cycles_are_fatal() {
        let mut m = Model::new("t");
        let x = m.add_var("x", 2.0).unwrap();
        let sq = m.add_expression("sq", Expr::from(x) * Expr::from(x)).unwrap();
        assert_eq!(m.value_of(&(Expr::from(sq) + 1.0)).unwrap(), 5.0);

        let e = m.add_expression("loop", Expr::constant(0.0)).unwrap();
        m.set_expression(e, Expr::from(e) + 1.0).unwrap();
        let err = m.value_of(&Expr::from(e)).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn shared_named_expression_is_not_a_cycle() {
        let mut m = Model::new("t");
        let x = m.add_var("x", 3.0).unwrap();
        let e = m.add_expression("e", Expr::from(x)).unwrap();
        // Same named expression used twice side by side.
        assert_eq!(m.value_of(&(Expr::from(e) + Expr::from(e))).unwrap(), 6.0);
    }
}
