use crate::CoreError;

/// Floating point type used throughout the system.
pub type Real = f64;

/// Absolute + relative tolerance pair.
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: impl Into<String>) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite {
            what: what.into(),
            value: v,
        })
    }
}

/// Relative slack under which a remainder counts as rounding drift.
const GRID_SLACK: Real = 1e-9;

/// Floor-style remainder that stays non-negative for a positive modulus.
///
/// Simulated time is snapped back onto the step grid with this. A value that
/// sits just below a grid point (rounding drift from a step that is not
/// exactly representable) has a remainder of almost `modulus`; that counts
/// as on the grid, so the snap never undoes a whole step.
pub fn overstep(value: Real, modulus: Real) -> Real {
    let r = value.rem_euclid(modulus);
    let slack = GRID_SLACK * modulus.max(value.abs());
    if modulus - r <= slack { 0.0 } else { r }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        };
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
        assert!(msg.contains("test"));
    }

    #[test]
    fn overstep_on_grid_is_zero() {
        assert_eq!(overstep(7200.0, 3600.0), 0.0);
        assert_eq!(overstep(3700.0, 3600.0), 100.0);
        assert!(overstep(-1.0, 3600.0) >= 0.0);
    }

    #[test]
    fn overstep_absorbs_drift_below_grid_point() {
        // 0.5 % 0.1 is just under 0.1
        assert_eq!(overstep(0.5, 0.1), 0.0);
        assert!(overstep(0.1 * 3.0, 0.1) < 1e-12);

        let mut t = 0.0;
        for n in 1..=10 {
            let next = t + 0.1;
            let next = next - overstep(next, 0.1);
            assert!(next > t, "stalled at step {n}: {t}");
            assert!((next - 0.1 * n as f64).abs() < 1e-12);
            t = next;
        }
        assert!((t - 1.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn overstep_lands_in_step(value in -1e7_f64..1e7, step in 1.0_f64..1e4) {
            let r = overstep(value, step);
            prop_assert!(r >= 0.0);
            prop_assert!(r <= step);
        }

        #[test]
        fn grid_multiples_have_no_overstep(k in 1_u32..1000, step in 0.1_f64..100.0) {
            let value = f64::from(k) * step;
            prop_assert!(overstep(value, step) <= 1e-9 * value.max(step));
        }
    }
}
