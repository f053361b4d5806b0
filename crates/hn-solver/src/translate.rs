//! Model translation: algebraic model -> concrete model + index map.

use crate::concrete::{CExpr, CPred, ConcreteModel};
use crate::error::{SolverError, SolverResult};
use crate::index_map::IndexMap;
use hn_aml::{BinaryOp, CmpOp, EvalError, ExprVisitor, Model, Param, UnaryOp, Var};
use hn_core::{ConId, ParamId, VarId};
use tracing::{debug, warn};

/// Translation settings.
#[derive(Debug, Clone, Copy)]
pub struct TranslateOptions {
    /// Fail instead of dropping a constraint whose expression cannot be
    /// evaluated.
    pub strict: bool,
    /// Substitute parameter values as literals. When false, residuals refer
    /// to the concrete model's mutable constants instead, so parameters can be
    /// changed on the concrete model without translating again.
    pub inline_params: bool,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            strict: false,
            inline_params: true,
        }
    }
}

/// A constraint left out of the concrete model.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedConstraint {
    pub id: ConId,
    pub name: String,
    pub reason: EvalError,
}

/// Output of [`translate`].
#[derive(Debug, Clone)]
pub struct Translation {
    pub concrete: ConcreteModel,
    pub index_map: IndexMap,
    pub dropped: Vec<DroppedConstraint>,
}

/// Translate an algebraic model into a concrete model.
///
/// Parameters and variables get positions in model order and keep their
/// current values (variables start from the last known state). Each
/// constraint's expression is walked into a concrete residual. A constraint
/// whose expression fails to evaluate is dropped and reported, unless
/// `options.strict` is set; failures that mean the model itself is malformed
/// (non-finite values, self-referential named expressions) always abort.
pub fn translate(model: &Model, options: &TranslateOptions) -> SolverResult<Translation> {
    let mut index_map = IndexMap::new();

    let mut params = Vec::with_capacity(model.params().len());
    for p in model.params() {
        params.push(finite_value("parameter", &p.name, p.value())?);
        index_map.push_param(p.id);
    }

    let mut vars = Vec::with_capacity(model.vars().len());
    for v in model.vars() {
        vars.push(finite_value("variable", &v.name, v.value())?);
        index_map.push_var(v.id);
    }

    let mut cons = Vec::with_capacity(model.cons().len());
    let mut dropped = Vec::new();
    for con in model.cons() {
        let mut builder = ConcreteBuilder {
            index_map: &index_map,
            inline_params: options.inline_params,
        };
        match model.evaluate(&con.expr, &mut builder) {
            Ok(residual) => {
                index_map.push_constraint(con.id);
                cons.push(residual);
            }
            Err(err) if err.is_fatal() => {
                return Err(SolverError::Translation {
                    what: format!("constraint '{}': {}", con.name, err),
                });
            }
            Err(err) => {
                if options.strict {
                    return Err(SolverError::ConstraintDropped {
                        name: con.name.clone(),
                        reason: err.to_string(),
                    });
                }
                warn!(constraint = %con.name, reason = %err, "dropping constraint");
                dropped.push(DroppedConstraint {
                    id: con.id,
                    name: con.name.clone(),
                    reason: err,
                });
            }
        }
    }

    debug!(
        model = model.name(),
        params = params.len(),
        vars = vars.len(),
        cons = cons.len(),
        dropped = dropped.len(),
        "translated model"
    );

    Ok(Translation {
        concrete: ConcreteModel::new(params, vars, cons),
        index_map,
        dropped,
    })
}

fn finite_value(kind: &str, name: &str, value: f64) -> SolverResult<f64> {
    hn_core::ensure_finite(value, format!("{} '{}'", kind, name)).map_err(|e| {
        SolverError::Translation {
            what: e.to_string(),
        }
    })
}

/// Builds concrete expressions; variables become positional handles.
struct ConcreteBuilder<'a> {
    index_map: &'a IndexMap,
    inline_params: bool,
}

impl ExprVisitor for ConcreteBuilder<'_> {
    type Value = CExpr;
    type Predicate = CPred;

    fn literal(&mut self, value: f64) -> Result<CExpr, EvalError> {
        Ok(CExpr::Const(value))
    }

    fn param(&mut self, id: ParamId, param: &Param) -> Result<CExpr, EvalError> {
        if self.inline_params {
            return Ok(CExpr::Const(param.value()));
        }
        self.index_map
            .param_idx(id)
            .map(CExpr::Param)
            .map_err(|_| EvalError::UnknownParam(id))
    }

    fn var(&mut self, id: VarId, _var: &Var) -> Result<CExpr, EvalError> {
        self.index_map
            .var_idx(id)
            .map(CExpr::Var)
            .map_err(|_| EvalError::UnknownVar(id))
    }

    fn unary(&mut self, op: UnaryOp, arg: CExpr) -> Result<CExpr, EvalError> {
        Ok(CExpr::Unary(op, Box::new(arg)))
    }

    fn binary(&mut self, op: BinaryOp, lhs: CExpr, rhs: CExpr) -> Result<CExpr, EvalError> {
        Ok(CExpr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn always(&mut self) -> Result<CPred, EvalError> {
        Ok(CPred::Always)
    }

    fn compare(&mut self, op: CmpOp, lhs: CExpr, rhs: CExpr) -> Result<CPred, EvalError> {
        Ok(CPred::Compare(op, Box::new(lhs), Box::new(rhs)))
    }

    fn and(&mut self, a: CPred, b: CPred) -> Result<CPred, EvalError> {
        Ok(CPred::And(Box::new(a), Box::new(b)))
    }

    fn or(&mut self, a: CPred, b: CPred) -> Result<CPred, EvalError> {
        Ok(CPred::Or(Box::new(a), Box::new(b)))
    }

    fn not(&mut self, a: CPred) -> Result<CPred, EvalError> {
        Ok(CPred::Not(Box::new(a)))
    }

    fn select(&mut self, cond: CPred, then: CExpr, otherwise: CExpr) -> Result<CExpr, EvalError> {
        Ok(CExpr::Select(Box::new(cond), Box::new(then), Box::new(otherwise)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hn_aml::{Condition, Expr};

    fn sample() -> (Model, VarId) {
        let mut m = Model::new("sample");
        let demand = m.add_param("demand", 2.0).unwrap();
        let x = m.add_var("x", 0.5).unwrap();
        m.add_constraint("c0", Expr::from(x) - Expr::from(demand))
            .unwrap();
        (m, x)
    }

    #[test]
    fn variables_keep_their_values() {
        let (m, x) = sample();
        let t = translate(&m, &TranslateOptions::default()).unwrap();
        let pos = t.index_map.var_idx(x).unwrap();
        assert_eq!(t.concrete.initial_values()[pos], 0.5);
        assert_eq!(t.concrete.num_cons(), 1);
        assert!(t.dropped.is_empty());
    }

    #[test]
    fn params_are_inlined_by_default() {
        let (m, _) = sample();
        let t = translate(&m, &TranslateOptions::default()).unwrap();
        assert_eq!(
            t.concrete.constraints()[0],
            CExpr::Binary(
                BinaryOp::Sub,
                Box::new(CExpr::Var(0)),
                Box::new(CExpr::Const(2.0))
            )
        );
    }

    #[test]
    fn params_can_stay_mutable() {
        let (m, _) = sample();
        let opts = TranslateOptions {
            inline_params: false,
            ..TranslateOptions::default()
        };
        let mut t = translate(&m, &opts).unwrap();
        assert_eq!(t.concrete.residuals(&[2.0]), vec![0.0]);
        t.concrete.set_param(0, 5.0).unwrap();
        assert_eq!(t.concrete.residuals(&[2.0]), vec![-3.0]);
    }

    #[test]
    fn failing_constraint_is_dropped() {
        let (mut m, x) = sample();
        let ghost = VarId::from_index(42);
        m.add_constraint("broken", Expr::from(ghost) + Expr::from(x))
            .unwrap();
        m.add_constraint("c2", Expr::from(x) * 2.0).unwrap();

        let t = translate(&m, &TranslateOptions::default()).unwrap();
        assert_eq!(t.concrete.num_cons(), 2);
        assert_eq!(t.dropped.len(), 1);
        assert_eq!(t.dropped[0].name, "broken");
        assert_eq!(t.dropped[0].reason, EvalError::UnknownVar(ghost));
        // c2 moves up into position 1
        let c2 = m.constraint_by_name("c2").unwrap();
        assert_eq!(t.index_map.con_idx(c2).unwrap(), 1);
    }

    #[test]
    fn strict_mode_refuses_to_drop() {
        let (mut m, _) = sample();
        m.add_constraint("broken", Expr::from(VarId::from_index(9)))
            .unwrap();
        let opts = TranslateOptions {
            strict: true,
            ..TranslateOptions::default()
        };
        let err = translate(&m, &opts).unwrap_err();
        assert!(matches!(err, SolverError::ConstraintDropped { ref name, .. } if name == "broken"));
    }

    #[test]
    fn non_finite_value_is_fatal() {
        let (mut m, x) = sample();
        m.set_var_value(x, f64::NAN).unwrap();
        assert!(matches!(
            translate(&m, &TranslateOptions::default()),
            Err(SolverError::Translation { .. })
        ));
    }

    #[test]
    fn cyclic_expression_is_fatal_even_when_permissive() {
        let (mut m, _) = sample();
        let e = m.add_expression("e", Expr::zero()).unwrap();
        m.set_expression(e, Expr::from(e) * 2.0).unwrap();
        m.add_constraint("uses_e", Expr::from(e)).unwrap();
        assert!(matches!(
            translate(&m, &TranslateOptions::default()),
            Err(SolverError::Translation { .. })
        ));
    }

    #[test]
    fn conditional_becomes_nested_selects() {
        let mut m = Model::new("pw");
        let x = m.add_var("x", 0.0).unwrap();
        let e = Expr::piecewise([
            (Expr::from(x).ge(0.0), Expr::constant(1.0)),
            (Expr::from(x).ge(-1.0), Expr::constant(2.0)),
            (Condition::Always, Expr::constant(3.0)),
        ]);
        m.add_constraint("pw", e).unwrap();
        let t = translate(&m, &TranslateOptions::default()).unwrap();
        let residual = &t.concrete.constraints()[0];
        assert_eq!(residual.select_depth(), 3);
        assert_eq!(residual.eval(&[], &[0.5]), 1.0);
        assert_eq!(residual.eval(&[], &[-0.5]), 2.0);
        assert_eq!(residual.eval(&[], &[-5.0]), 3.0);
    }
}
