//! Boundary updaters and the update-once wrapper.

use crate::backflow::{BackflowStabilizer, VelocitySample};
use crate::error::{ModelError, ModelResult};
use crate::guard::UpdateGuard;
use crate::outcome::{BoundaryOutcome, BoundaryValue};
use crate::pole_residue::PoleResidueImpedance;
use crate::windkessel::Windkessel;
use lf_core::numeric::ensure_finite;

/// Solver time and step length of one boundary evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepContext {
    pub time: f64,
    pub dt: f64,
}

impl StepContext {
    pub fn new(time: f64, dt: f64) -> ModelResult<Self> {
        ensure_finite(time, "time")?;
        ensure_finite(dt, "dt")?;
        if dt <= 0.0 {
            return Err(ModelError::InvalidArg {
                what: "dt must be positive",
            });
        }
        Ok(Self { time, dt })
    }
}

/// What the host measured on the patch this iteration.
#[derive(Debug, Clone, Copy)]
pub enum PatchSample<'a> {
    /// Globally reduced volumetric flux through the patch.
    Flux(f64),
    /// Face velocities for velocity outlets.
    Velocity(VelocitySample<'a>),
}

impl PatchSample<'_> {
    fn flux(&self, kind: &'static str) -> ModelResult<f64> {
        match self {
            PatchSample::Flux(q) => Ok(ensure_finite(*q, "patch flux")?),
            PatchSample::Velocity(_) => Err(ModelError::SampleMismatch {
                what: format!("{kind} outlet needs a flux sample, got velocities"),
            }),
        }
    }
}

/// Closed set of outlet models.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryUpdater {
    Windkessel(Windkessel),
    PoleResidue(PoleResidueImpedance),
    Backflow(BackflowStabilizer),
}

impl BoundaryUpdater {
    pub fn kind(&self) -> &'static str {
        match self {
            BoundaryUpdater::Windkessel(_) => "windkessel",
            BoundaryUpdater::PoleResidue(_) => "vector_fitting_impedance",
            BoundaryUpdater::Backflow(_) => "backflow_stabilized",
        }
    }

    /// Whether this outlet consumes a scalar flux (vs face velocities).
    pub fn needs_flux(&self) -> bool {
        !matches!(self, BoundaryUpdater::Backflow(_))
    }

    /// Advance internal state by one step. Inputs are fully validated
    /// before any state is touched.
    pub fn advance(
        &mut self,
        ctx: StepContext,
        sample: &PatchSample<'_>,
    ) -> ModelResult<BoundaryOutcome> {
        let kind = self.kind();
        match self {
            BoundaryUpdater::Windkessel(wk) => {
                let q = sample.flux(kind)?;
                let p = wk.advance(q, ctx.dt);
                Ok(BoundaryOutcome::uniform(p))
            }
            BoundaryUpdater::PoleResidue(imp) => {
                let q = sample.flux(kind)?;
                let p = imp.advance(q, ctx.dt);
                Ok(BoundaryOutcome {
                    value: BoundaryValue::Uniform(p),
                    coeffs: imp.implicit_coeffs(ctx.dt),
                    value_fraction: None,
                })
            }
            BoundaryUpdater::Backflow(stab) => {
                let PatchSample::Velocity(v) = sample else {
                    return Err(ModelError::SampleMismatch {
                        what: format!("{kind} outlet needs face velocities, got a flux"),
                    });
                };
                let out = stab.evaluate(v)?;
                Ok(BoundaryOutcome {
                    value: BoundaryValue::Vectors(out.values),
                    coeffs: None,
                    value_fraction: out.value_fraction,
                })
            }
        }
    }
}

impl BoundaryUpdater {
    /// Outcome implied by the committed state, without advancing it.
    ///
    /// Used when a restored outlet is queried at the time it was saved at.
    /// Backflow has no history, so it is simply evaluated again.
    pub fn committed_outcome(
        &self,
        ctx: StepContext,
        sample: &PatchSample<'_>,
    ) -> ModelResult<BoundaryOutcome> {
        match self {
            BoundaryUpdater::Windkessel(wk) => Ok(BoundaryOutcome::uniform(wk.pressure())),
            BoundaryUpdater::PoleResidue(imp) => Ok(BoundaryOutcome {
                value: BoundaryValue::Uniform(imp.pressure()),
                coeffs: imp.implicit_coeffs(ctx.dt),
                value_fraction: None,
            }),
            BoundaryUpdater::Backflow(_) => self.clone().advance(ctx, sample),
        }
    }
}

/// A [`BoundaryUpdater`] that advances at most once per solver time.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardedUpdater {
    updater: BoundaryUpdater,
    guard: UpdateGuard,
    last: Option<BoundaryOutcome>,
}

impl GuardedUpdater {
    pub fn new(updater: BoundaryUpdater) -> Self {
        Self::restore(updater, UpdateGuard::new())
    }

    /// Resume with a guard read back from a checkpoint.
    pub fn restore(updater: BoundaryUpdater, guard: UpdateGuard) -> Self {
        Self {
            updater,
            guard,
            last: None,
        }
    }

    pub fn updater(&self) -> &BoundaryUpdater {
        &self.updater
    }

    pub fn guard(&self) -> &UpdateGuard {
        &self.guard
    }

    pub fn last_outcome(&self) -> Option<&BoundaryOutcome> {
        self.last.as_ref()
    }

    /// Evaluate the boundary at `ctx.time`.
    ///
    /// The first call at a given time advances state and caches the outcome;
    /// later calls at the same time return the cache. After a restore the
    /// cache is rebuilt from the committed state instead, so a step that was
    /// already taken before the checkpoint is never taken twice. A failed
    /// update leaves the guard untouched so the step can be retried.
    pub fn update(
        &mut self,
        ctx: StepContext,
        sample: &PatchSample<'_>,
    ) -> ModelResult<&BoundaryOutcome> {
        let outcome = if self.guard.is_due(ctx.time) {
            let outcome = self.updater.advance(ctx, sample)?;
            self.guard.commit(ctx.time);
            outcome
        } else {
            match self.last.take() {
                Some(outcome) => {
                    tracing::trace!(
                        kind = self.updater.kind(),
                        time = ctx.time,
                        "reusing boundary outcome"
                    );
                    outcome
                }
                None => self.updater.committed_outcome(ctx, sample)?,
            }
        };
        Ok(self.last.insert(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backflow::{BackflowConfig, StabilizationMode};
    use crate::pole_residue::{CouplingMode, ImpedanceSetup, ImpedanceUnits, PoleResidueParams};
    use crate::windkessel::{FdOrder, WindkesselHistory, WindkesselParams};
    use nalgebra::Vector3;

    fn windkessel() -> GuardedUpdater {
        GuardedUpdater::new(BoundaryUpdater::Windkessel(Windkessel::new(
            WindkesselParams {
                r: 1.0,
                c: 1.0,
                z: 0.0,
            },
            FdOrder::First,
            WindkesselHistory::new([0.0; 3], [0.0; 3]),
        )))
    }

    fn impedance() -> GuardedUpdater {
        let params = PoleResidueParams::new(2, vec![-1.0, -3.0], vec![2.0, 1.0], 0.5).unwrap();
        let setup = ImpedanceSetup {
            coupling: CouplingMode::Implicit,
            units: ImpedanceUnits::Kinematic,
            rho: 1060.0,
            patch_area: 2.0,
        };
        GuardedUpdater::new(BoundaryUpdater::PoleResidue(
            PoleResidueImpedance::new(params, setup, None, 0.0).unwrap(),
        ))
    }

    fn velocity<'a>(v: &'a [Vector3<f64>], n: &'a [Vector3<f64>]) -> PatchSample<'a> {
        PatchSample::Velocity(VelocitySample {
            internal: v,
            normals: n,
            face_flux: None,
            rho: None,
        })
    }

    #[test]
    fn windkessel_advances_once_per_time() {
        let mut bc = windkessel();
        let ctx = StepContext::new(0.01, 0.01).unwrap();
        let first = bc.update(ctx, &PatchSample::Flux(1.0)).unwrap().clone();
        let history = match bc.updater() {
            BoundaryUpdater::Windkessel(wk) => *wk.history(),
            _ => unreachable!(),
        };
        // different flux in a later outer iteration is ignored
        let second = bc.update(ctx, &PatchSample::Flux(5.0)).unwrap().clone();
        assert_eq!(first, second);
        match bc.updater() {
            BoundaryUpdater::Windkessel(wk) => assert_eq!(*wk.history(), history),
            _ => unreachable!(),
        }

        let ctx = StepContext::new(0.02, 0.01).unwrap();
        let third = bc.update(ctx, &PatchSample::Flux(1.0)).unwrap().clone();
        assert_ne!(first, third);
    }

    #[test]
    fn impedance_caches_value_and_coeffs() {
        let mut bc = impedance();
        let ctx = StepContext::new(0.1, 0.1).unwrap();
        let first = bc.update(ctx, &PatchSample::Flux(2.0)).unwrap().clone();
        assert!(first.coeffs.is_some());
        let state = match bc.updater() {
            BoundaryUpdater::PoleResidue(imp) => imp.state_variables().to_vec(),
            _ => unreachable!(),
        };
        let second = bc.update(ctx, &PatchSample::Flux(-3.0)).unwrap().clone();
        assert_eq!(first, second);
        match bc.updater() {
            BoundaryUpdater::PoleResidue(imp) => assert_eq!(imp.state_variables(), &state[..]),
            _ => unreachable!(),
        }
    }

    #[test]
    fn backflow_outcome_is_cached_within_step() {
        let mut bc = GuardedUpdater::new(BoundaryUpdater::Backflow(
            BackflowStabilizer::new(BackflowConfig {
                mode: StabilizationMode::Proportional,
                ..BackflowConfig::default()
            })
            .unwrap(),
        ));
        let n = [Vector3::new(0.0, 0.0, 1.0)];
        let v1 = [Vector3::new(0.0, 0.0, -1.0)];
        let v2 = [Vector3::new(0.0, 0.0, 4.0)];
        let ctx = StepContext::new(1.0, 0.1).unwrap();
        let first = bc.update(ctx, &velocity(&v1, &n)).unwrap().clone();
        let second = bc.update(ctx, &velocity(&v2, &n)).unwrap().clone();
        assert_eq!(first, second);
    }

    #[test]
    fn failed_update_leaves_guard_unmarked() {
        let mut bc = windkessel();
        let ctx = StepContext::new(0.5, 0.01).unwrap();
        let err = bc.update(ctx, &PatchSample::Flux(f64::NAN)).unwrap_err();
        assert!(matches!(err, ModelError::NonPhysical { .. }));
        assert!(bc.guard().is_due(0.5));
        assert!(bc.last_outcome().is_none());

        assert!(bc.update(ctx, &PatchSample::Flux(1.0)).is_ok());
        assert!(!bc.guard().is_due(0.5));
    }

    #[test]
    fn restored_guard_does_not_repeat_the_saved_step() {
        let mut bc = impedance();
        let ctx = StepContext::new(0.1, 0.1).unwrap();
        let first = bc.update(ctx, &PatchSample::Flux(2.0)).unwrap().clone();

        let mut resumed = GuardedUpdater::restore(bc.updater().clone(), *bc.guard());
        assert!(resumed.last_outcome().is_none());
        let again = resumed
            .update(ctx, &PatchSample::Flux(7.0))
            .unwrap()
            .clone();
        assert_eq!(first, again);
        assert_eq!(resumed.updater(), bc.updater());

        let next = StepContext::new(0.2, 0.1).unwrap();
        assert_eq!(
            resumed.update(next, &PatchSample::Flux(1.0)).unwrap(),
            bc.update(next, &PatchSample::Flux(1.0)).unwrap()
        );
    }

    #[test]
    fn restored_windkessel_reports_saved_pressure() {
        let mut bc = windkessel();
        let ctx = StepContext::new(0.01, 0.01).unwrap();
        let p = bc
            .update(ctx, &PatchSample::Flux(1.0))
            .unwrap()
            .value
            .as_uniform()
            .unwrap();

        let mut resumed = GuardedUpdater::restore(bc.updater().clone(), *bc.guard());
        let again = resumed.update(ctx, &PatchSample::Flux(3.0)).unwrap();
        assert_eq!(again.value.as_uniform(), Some(p));
        assert_eq!(resumed.updater(), bc.updater());
    }

    #[test]
    fn wrong_sample_kind_is_rejected() {
        let mut bc = windkessel();
        let ctx = StepContext::new(0.0, 0.01).unwrap();
        assert!(matches!(
            bc.update(ctx, &velocity(&[], &[])),
            Err(ModelError::SampleMismatch { .. })
        ));
    }

    #[test]
    fn step_context_rejects_bad_dt() {
        assert!(StepContext::new(0.0, 0.0).is_err());
        assert!(StepContext::new(0.0, -1.0).is_err());
        assert!(StepContext::new(f64::INFINITY, 0.1).is_err());
    }
}
