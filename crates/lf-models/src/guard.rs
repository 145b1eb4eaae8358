//! One-update-per-timestep discipline.
//!
//! Outer-iteration solvers query a boundary several times inside one timestep.
//! The guard records the solver time of the last committed update; any call at
//! the same time is answered from the cached result instead of advancing state.

use lf_core::numeric::{GREAT, same_time};
use serde::{Deserialize, Serialize};

/// Tracks the solver time at which the owning boundary last advanced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpdateGuard {
    /// Time of the last committed update (`-GREAT` before the first one).
    pub last_update_time: f64,
}

impl Default for UpdateGuard {
    fn default() -> Self {
        Self {
            last_update_time: -GREAT,
        }
    }
}

impl UpdateGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if state has not yet advanced at `time`.
    pub fn is_due(&self, time: f64) -> bool {
        !same_time(time, self.last_update_time)
    }

    /// Record that the update at `time` completed.
    pub fn commit(&mut self, time: f64) {
        self.last_update_time = time;
    }

    /// Forget the last update, forcing the next call to recompute.
    pub fn reset(&mut self) {
        self.last_update_time = -GREAT;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_guard_is_due_at_zero() {
        let guard = UpdateGuard::new();
        assert!(guard.is_due(0.0));
    }

    #[test]
    fn commit_blocks_same_time_only() {
        let mut guard = UpdateGuard::new();
        guard.commit(0.01);
        assert!(!guard.is_due(0.01));
        assert!(guard.is_due(0.02));

        guard.reset();
        assert!(guard.is_due(0.01));
    }
}
