//! Solver time and step bookkeeping.

use crate::error::{SimError, SimResult};
use lf_models::StepContext;

/// Fixed-step solver clock.
///
/// `time` is the end of the step currently being solved, which is the time
/// marker boundary conditions are evaluated at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverClock {
    time: f64,
    dt: f64,
    step: usize,
}

impl SolverClock {
    pub fn new(start: f64, dt: f64) -> SimResult<Self> {
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(SimError::InvalidArg {
                what: "dt must be positive",
            });
        }
        if !start.is_finite() {
            return Err(SimError::InvalidArg {
                what: "start time must be finite",
            });
        }
        Ok(Self {
            time: start,
            dt,
            step: 0,
        })
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// Move to the next timestep.
    pub fn advance(&mut self) {
        self.step += 1;
        self.time += self.dt;
    }

    pub fn context(&self) -> StepContext {
        StepContext {
            time: self.time,
            dt: self.dt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_moves_time_by_dt() {
        let mut clock = SolverClock::new(0.0, 0.25).unwrap();
        clock.advance();
        clock.advance();
        assert_eq!(clock.time(), 0.5);
        assert_eq!(clock.step(), 2);
        assert_eq!(clock.context().dt, 0.25);
    }

    #[test]
    fn rejects_bad_dt() {
        assert!(SolverClock::new(0.0, 0.0).is_err());
        assert!(SolverClock::new(0.0, f64::NAN).is_err());
    }
}
