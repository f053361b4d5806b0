//! Write solved values back into the algebraic model.

use crate::error::{SolverError, SolverResult};
use crate::index_map::IndexMap;
use hn_aml::Model;

/// Copy solved values into the model variables they came from.
///
/// `values` must hold exactly one entry per concrete variable, in position
/// order. Each value is copied bit for bit.
pub fn harvest(values: &[f64], index_map: &IndexMap, model: &mut Model) -> SolverResult<()> {
    if values.len() != index_map.var_count() {
        return Err(SolverError::Harvest {
            what: format!(
                "expected {} values, got {}",
                index_map.var_count(),
                values.len()
            ),
        });
    }

    for (&id, &value) in index_map.var_ids().iter().zip(values) {
        model.set_var_value(id, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_land_on_their_variables() {
        let mut m = Model::new("h");
        let a = m.add_var("a", 0.0).unwrap();
        let b = m.add_var("b", 0.0).unwrap();
        let mut map = IndexMap::new();
        map.push_var(b);
        map.push_var(a);

        harvest(&[1.5, -2.25], &map, &mut m).unwrap();
        assert_eq!(m.var_value(b).unwrap(), 1.5);
        assert_eq!(m.var_value(a).unwrap(), -2.25);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let mut m = Model::new("h");
        let a = m.add_var("a", 0.0).unwrap();
        let mut map = IndexMap::new();
        map.push_var(a);
        assert!(matches!(
            harvest(&[1.0, 2.0], &map, &mut m),
            Err(SolverError::Harvest { .. })
        ));
        assert_eq!(m.var_value(a).unwrap(), 0.0);
    }
}
