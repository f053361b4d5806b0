//! Simulated time cursor.

use crate::error::{SimError, SimResult};
use hn_core::overstep;

/// Results are recorded in whole seconds, so steps must not be shorter.
pub const MIN_STEP_S: f64 = 1.0;

/// Current simulated time plus the grid it steps on, all in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimClock {
    time: f64,
    step: f64,
    duration: f64,
}

impl SimClock {
    pub fn new(start: f64, step: f64, duration: f64) -> SimResult<Self> {
        if !step.is_finite() || step <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "hydraulic timestep must be positive",
            });
        }
        if step < MIN_STEP_S {
            return Err(SimError::InvalidArg {
                what: "hydraulic timestep must be at least one second",
            });
        }
        if !duration.is_finite() || duration < 0.0 {
            return Err(SimError::InvalidArg {
                what: "duration must be non-negative",
            });
        }
        if !start.is_finite() {
            return Err(SimError::InvalidArg {
                what: "start time must be finite",
            });
        }
        Ok(Self {
            time: start,
            step,
            duration,
        })
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Time rounded to whole seconds, as recorded in results.
    pub fn whole_seconds(&self) -> i64 {
        self.time.round() as i64
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Move one step forward and snap back onto the step grid.
    pub fn advance(&mut self) {
        self.time += self.step;
        self.quantize();
    }

    /// Subtract `time mod step`.
    pub fn quantize(&mut self) {
        self.time -= overstep(self.time, self.step);
    }

    /// Past the end of the simulation.
    pub fn finished(&self) -> bool {
        self.time > self.duration
    }

    /// Share of the duration covered, in `[0, 1]`.
    pub fn fraction_complete(&self) -> f64 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        (self.time / self.duration).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_stays_on_grid() {
        let mut c = SimClock::new(0.0, 3600.0, 7200.0).unwrap();
        c.advance();
        assert_eq!(c.time(), 3600.0);
        c.advance();
        assert_eq!(c.time(), 7200.0);
        assert!(!c.finished());
        c.advance();
        assert!(c.finished());
    }

    #[test]
    fn off_grid_start_is_snapped() {
        let mut c = SimClock::new(100.0, 3600.0, 7200.0).unwrap();
        c.advance();
        assert_eq!(c.time(), 3600.0);
    }

    #[test]
    fn overshoot_is_removed() {
        let mut c = SimClock::new(0.0, 900.0, 3600.0).unwrap();
        c.time = 1800.5;
        c.quantize();
        assert_eq!(c.time(), 1800.0);
    }

    #[test]
    fn zero_duration_finishes_after_one_advance() {
        let mut c = SimClock::new(0.0, 3600.0, 0.0).unwrap();
        assert!(!c.finished());
        c.advance();
        assert!(c.finished());
    }

    #[test]
    fn fractional_steps_keep_moving_forward() {
        for k in 10..200 {
            let step = f64::from(k) * 0.1;
            let mut c = SimClock::new(0.0, step, 1e6).unwrap();
            for n in 1..=50 {
                let before = c.time();
                c.advance();
                assert!(c.time() > before, "step {step} stalled at {before}");
                assert!((c.time() - step * f64::from(n)).abs() < 1e-9 * step * f64::from(n));
            }
        }
    }

    #[test]
    fn fractional_step_records_every_instant() {
        let mut c = SimClock::new(0.0, 1.1, 11.0).unwrap();
        let mut recorded = Vec::new();
        loop {
            recorded.push(c.whole_seconds());
            c.advance();
            if c.finished() {
                break;
            }
        }
        assert_eq!(recorded.len(), 11);
        assert!(recorded.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(recorded.last(), Some(&11));
    }

    #[test]
    fn sub_second_steps_are_rejected() {
        assert!(matches!(
            SimClock::new(0.0, 0.1, 1.0),
            Err(SimError::InvalidArg { .. })
        ));
        assert!(SimClock::new(0.0, MIN_STEP_S, 1.0).is_ok());
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(matches!(
            SimClock::new(0.0, 0.0, 10.0),
            Err(SimError::InvalidArg { .. })
        ));
        assert!(matches!(
            SimClock::new(0.0, 60.0, -1.0),
            Err(SimError::InvalidArg { .. })
        ));
    }
}
