//! The algebraic model container.

use crate::error::{AmlError, AmlResult, EvalError};
use crate::expr::Expr;
use crate::visit::{ExprVisitor, NumericEval, Walker};
use hn_core::{ConId, ExprId, ParamId, VarId};
use std::collections::HashMap;

/// Named scalar constant; fixed during a solve, writable between solves.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub id: ParamId,
    pub name: String,
    pub(crate) value: f64,
}

impl Param {
    pub fn value(&self) -> f64 {
        self.value
    }
}

/// Named scalar unknown; its value is both the initial guess and the
/// write-back target of a solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    pub id: VarId,
    pub name: String,
    pub(crate) value: f64,
}

impl Var {
    pub fn value(&self) -> f64 {
        self.value
    }
}

/// Equality constraint `expr == 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub id: ConId,
    pub name: String,
    pub expr: Expr,
}

/// Sub-expression shared by reference from other expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedExpr {
    pub id: ExprId,
    pub name: String,
    pub expr: Expr,
}

/// Algebraic model: ordered parameters, variables and constraints.
///
/// Iteration order is insertion order and never changes, which is what lets a
/// translator hand out contiguous indices by enumerating the collections.
#[derive(Debug, Clone, Default)]
pub struct Model {
    name: String,
    params: Vec<Param>,
    vars: Vec<Var>,
    cons: Vec<Constraint>,
    exprs: Vec<NamedExpr>,
    param_names: HashMap<String, ParamId>,
    var_names: HashMap<String, VarId>,
    con_names: HashMap<String, ConId>,
    expr_names: HashMap<String, ExprId>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn vars(&self) -> &[Var] {
        &self.vars
    }

    pub fn cons(&self) -> &[Constraint] {
        &self.cons
    }

    pub fn expressions(&self) -> &[NamedExpr] {
        &self.exprs
    }

    pub fn add_param(&mut self, name: impl Into<String>, value: f64) -> AmlResult<ParamId> {
        let name = name.into();
        let id = ParamId::from_index(self.params.len() as u32);
        claim_name(&mut self.param_names, "parameter", &name, id)?;
        self.params.push(Param { id, name, value });
        Ok(id)
    }

    pub fn add_var(&mut self, name: impl Into<String>, value: f64) -> AmlResult<VarId> {
        let name = name.into();
        let id = VarId::from_index(self.vars.len() as u32);
        claim_name(&mut self.var_names, "variable", &name, id)?;
        self.vars.push(Var { id, name, value });
        Ok(id)
    }

    pub fn add_constraint(&mut self, name: impl Into<String>, expr: Expr) -> AmlResult<ConId> {
        let name = name.into();
        let id = ConId::from_index(self.cons.len() as u32);
        claim_name(&mut self.con_names, "constraint", &name, id)?;
        self.cons.push(Constraint { id, name, expr });
        Ok(id)
    }

    pub fn add_expression(&mut self, name: impl Into<String>, expr: Expr) -> AmlResult<ExprId> {
        let name = name.into();
        let id = ExprId::from_index(self.exprs.len() as u32);
        claim_name(&mut self.expr_names, "expression", &name, id)?;
        self.exprs.push(NamedExpr { id, name, expr });
        Ok(id)
    }

    /// Replace the body of an existing named expression.
    pub fn set_expression(&mut self, id: ExprId, expr: Expr) -> AmlResult<()> {
        let slot = self
            .exprs
            .get_mut(id.slot())
            .ok_or(AmlError::UnknownExpression(id))?;
        slot.expr = expr;
        Ok(())
    }

    pub fn param(&self, id: ParamId) -> Option<&Param> {
        self.params.get(id.slot())
    }

    pub fn var(&self, id: VarId) -> Option<&Var> {
        self.vars.get(id.slot())
    }

    pub fn constraint(&self, id: ConId) -> Option<&Constraint> {
        self.cons.get(id.slot())
    }

    pub fn expression(&self, id: ExprId) -> Option<&NamedExpr> {
        self.exprs.get(id.slot())
    }

    pub fn param_value(&self, id: ParamId) -> AmlResult<f64> {
        self.param(id)
            .map(Param::value)
            .ok_or(AmlError::UnknownParam(id))
    }

    pub fn set_param_value(&mut self, id: ParamId, value: f64) -> AmlResult<()> {
        let p = self
            .params
            .get_mut(id.slot())
            .ok_or(AmlError::UnknownParam(id))?;
        p.value = value;
        Ok(())
    }

    pub fn var_value(&self, id: VarId) -> AmlResult<f64> {
        self.var(id).map(Var::value).ok_or(AmlError::UnknownVar(id))
    }

    pub fn set_var_value(&mut self, id: VarId, value: f64) -> AmlResult<()> {
        let v = self
            .vars
            .get_mut(id.slot())
            .ok_or(AmlError::UnknownVar(id))?;
        v.value = value;
        Ok(())
    }

    pub fn param_by_name(&self, name: &str) -> Option<ParamId> {
        self.param_names.get(name).copied()
    }

    pub fn var_by_name(&self, name: &str) -> Option<VarId> {
        self.var_names.get(name).copied()
    }

    pub fn constraint_by_name(&self, name: &str) -> Option<ConId> {
        self.con_names.get(name).copied()
    }

    pub fn expression_by_name(&self, name: &str) -> Option<ExprId> {
        self.expr_names.get(name).copied()
    }

    /// Walk `expr` with `visitor`, resolving references against this model.
    pub fn evaluate<V: ExprVisitor>(
        &self,
        expr: &Expr,
        visitor: &mut V,
    ) -> Result<V::Value, EvalError> {
        Walker::new(self).expr(expr, visitor)
    }

    /// Numeric value of `expr` at the current parameter and variable values.
    pub fn value_of(&self, expr: &Expr) -> Result<f64, EvalError> {
        self.evaluate(expr, &mut NumericEval)
    }

    /// Residual of a constraint at the current values (zero when satisfied).
    pub fn constraint_residual(&self, id: ConId) -> AmlResult<f64> {
        let con = self.constraint(id).ok_or(AmlError::UnknownConstraint(id))?;
        Ok(self.value_of(&con.expr)?)
    }
}

fn claim_name<I: Copy>(
    names: &mut HashMap<String, I>,
    kind: &'static str,
    name: &str,
    id: I,
) -> AmlResult<()> {
    if names.contains_key(name) {
        return Err(AmlError::DuplicateName {
            kind,
            name: name.to_string(),
        });
    }
    names.insert(name.to_string(), id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_insertion_order() {
        let mut m = Model::new("t");
        let a = m.add_var("a", 1.0).unwrap();
        let b = m.add_var("b", 2.0).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(m.vars()[1].name, "b");
        assert_eq!(m.var_by_name("a"), Some(a));
    }

    #[test]
    fn duplicate_names_rejected_per_kind() {
        let mut m = Model::new("t");
        m.add_var("x", 0.0).unwrap();
        assert!(matches!(
            m.add_var("x", 1.0),
            Err(AmlError::DuplicateName { kind: "variable", .. })
        ));
        // Same name in a different collection is fine.
        assert!(m.add_param("x", 1.0).is_ok());
    }

    #[test]
    fn values_are_read_and_written() {
        let mut m = Model::new("t");
        let p = m.add_param("p", 3.0).unwrap();
        let x = m.add_var("x", 0.0).unwrap();
        m.set_param_value(p, 4.0).unwrap();
        m.set_var_value(x, 1.5).unwrap();
        assert_eq!(m.param_value(p).unwrap(), 4.0);
        assert_eq!(m.var_value(x).unwrap(), 1.5);
        assert!(m.set_var_value(VarId::from_index(7), 0.0).is_err());
    }

    #[test]
    fn residual_uses_current_values() {
        let mut m = Model::new("t");
        let p = m.add_param("p", 3.0).unwrap();
        let x = m.add_var("x", 1.0).unwrap();
        let c = m
            .add_constraint("c", Expr::from(x) * 2.0 - Expr::from(p))
            .unwrap();
        assert_eq!(m.constraint_residual(c).unwrap(), -1.0);
        m.set_var_value(x, 1.5).unwrap();
        assert_eq!(m.constraint_residual(c).unwrap(), 0.0);
    }

    #[test]
    fn set_expression_replaces_body() {
        let mut m = Model::new("t");
        let e = m.add_expression("e", Expr::constant(1.0)).unwrap();
        m.set_expression(e, Expr::constant(2.0)).unwrap();
        assert_eq!(m.value_of(&Expr::from(e)).unwrap(), 2.0);
    }
}
