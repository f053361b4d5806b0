//! Bidirectional mapping between model ids and contiguous solver positions.

use crate::error::{SolverError, SolverResult};
use hn_core::{ConId, ParamId, VarId};

/// Index map for one translation.
///
/// Positions are `0..n` in the order objects were pushed. Dropped
/// constraints are never pushed, so constraint positions stay contiguous even
/// when model constraint ids have gaps. A map is only valid for the concrete
/// model it was built with.
#[derive(Debug, Clone, Default)]
pub struct IndexMap {
    /// Contiguous list of ids (position -> id).
    param_ids: Vec<ParamId>,
    var_ids: Vec<VarId>,
    con_ids: Vec<ConId>,

    /// Reverse lookup, sized to max(id.index) + 1; None if not mapped.
    param_to_idx: Vec<Option<usize>>,
    var_to_idx: Vec<Option<usize>>,
    con_to_idx: Vec<Option<usize>>,
}

fn insert_reverse(reverse: &mut Vec<Option<usize>>, slot: usize, position: usize) {
    if reverse.len() <= slot {
        reverse.resize(slot + 1, None);
    }
    reverse[slot] = Some(position);
}

fn lookup(reverse: &[Option<usize>], slot: usize, what: &'static str) -> SolverResult<usize> {
    reverse
        .get(slot)
        .and_then(|&opt| opt)
        .ok_or(SolverError::IndexNotFound { what })
}

impl IndexMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a parameter to the next free position and return it.
    pub fn push_param(&mut self, id: ParamId) -> usize {
        let position = self.param_ids.len();
        self.param_ids.push(id);
        insert_reverse(&mut self.param_to_idx, id.slot(), position);
        position
    }

    pub fn push_var(&mut self, id: VarId) -> usize {
        let position = self.var_ids.len();
        self.var_ids.push(id);
        insert_reverse(&mut self.var_to_idx, id.slot(), position);
        position
    }

    pub fn push_constraint(&mut self, id: ConId) -> usize {
        let position = self.con_ids.len();
        self.con_ids.push(id);
        insert_reverse(&mut self.con_to_idx, id.slot(), position);
        position
    }

    pub fn param_count(&self) -> usize {
        self.param_ids.len()
    }

    pub fn var_count(&self) -> usize {
        self.var_ids.len()
    }

    pub fn con_count(&self) -> usize {
        self.con_ids.len()
    }

    pub fn param_idx(&self, id: ParamId) -> SolverResult<usize> {
        lookup(&self.param_to_idx, id.slot(), "ParamId")
    }

    pub fn var_idx(&self, id: VarId) -> SolverResult<usize> {
        lookup(&self.var_to_idx, id.slot(), "VarId")
    }

    pub fn con_idx(&self, id: ConId) -> SolverResult<usize> {
        lookup(&self.con_to_idx, id.slot(), "ConId")
    }

    pub fn param_id(&self, i: usize) -> Option<ParamId> {
        self.param_ids.get(i).copied()
    }

    pub fn var_id(&self, i: usize) -> Option<VarId> {
        self.var_ids.get(i).copied()
    }

    pub fn con_id(&self, i: usize) -> Option<ConId> {
        self.con_ids.get(i).copied()
    }

    pub fn param_ids(&self) -> &[ParamId] {
        &self.param_ids
    }

    pub fn var_ids(&self) -> &[VarId] {
        &self.var_ids
    }

    pub fn con_ids(&self) -> &[ConId] {
        &self.con_ids
    }
}
