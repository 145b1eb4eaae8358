//! A boundary model attached to one patch of the host mesh.

use crate::error::{SimError, SimResult};
use crate::patch::Patch;
use crate::registry::FieldRegistry;
use lf_case::{BoundaryDef, ImpedanceDef, PatchDef, WindkesselDef};
use lf_core::numeric::GREAT;
use lf_models::{
    BoundaryOutcome, BoundaryUpdater, BoundaryValue, FaceCoeffs, GuardedUpdater, PatchSample,
    StepContext, VelocitySample,
};

/// Patch geometry, its case record, and the live updater.
#[derive(Debug, Clone)]
pub struct PatchBoundary {
    pub patch: Patch,
    def: PatchDef,
    updater: GuardedUpdater,
}

impl PatchBoundary {
    pub(crate) fn new(patch: Patch, def: PatchDef, updater: GuardedUpdater) -> Self {
        Self {
            patch,
            def,
            updater,
        }
    }

    pub fn name(&self) -> &str {
        &self.patch.name
    }

    pub fn kind(&self) -> &'static str {
        self.updater.updater().kind()
    }

    pub fn updater(&self) -> &GuardedUpdater {
        &self.updater
    }

    /// Scalar face field this boundary reads, if any.
    pub fn flux_field(&self) -> Option<&str> {
        match &self.def.boundary {
            BoundaryDef::Windkessel(wk) => Some(&wk.phi),
            BoundaryDef::VectorFittingImpedance(imp) => Some(&imp.phi),
            BoundaryDef::BackflowStabilized(bf) => bf.phi.as_deref(),
        }
    }

    /// Patch-internal vector field this boundary reads, if any.
    pub fn velocity_field(&self) -> Option<&str> {
        match &self.def.boundary {
            BoundaryDef::BackflowStabilized(bf) => Some(&bf.u),
            _ => None,
        }
    }

    /// Sample the registry and update the boundary at `ctx.time`.
    pub fn evaluate(
        &mut self,
        ctx: StepContext,
        registry: &FieldRegistry,
    ) -> SimResult<&BoundaryOutcome> {
        let name = &self.patch.name;
        let outcome = match &self.def.boundary {
            BoundaryDef::Windkessel(WindkesselDef { phi, .. })
            | BoundaryDef::VectorFittingImpedance(ImpedanceDef { phi, .. }) => {
                let q = registry.patch_sum(phi, name)?;
                self.updater.update(ctx, &PatchSample::Flux(q))
            }
            BoundaryDef::BackflowStabilized(bf) => {
                let internal = registry.patch_internal(&bf.u, name)?;
                let face_flux = bf
                    .phi
                    .as_deref()
                    .map(|phi| registry.face_values(phi, name))
                    .transpose()?;
                let sample = PatchSample::Velocity(VelocitySample {
                    internal,
                    normals: self.patch.normals(),
                    face_flux: face_flux.as_deref(),
                    rho: registry.property("rho"),
                });
                self.updater.update(ctx, &sample)
            }
        };
        outcome.map_err(|source| SimError::Model {
            patch: self.patch.name.clone(),
            source,
        })
    }

    /// Per-face matrix coefficients of the last scalar outcome.
    pub fn face_coeffs(&self) -> Option<FaceCoeffs> {
        self.updater
            .last_outcome()?
            .face_coeffs(self.patch.weights())
    }

    /// Scalar imposed before any update has run.
    fn initial_value(&self) -> Option<f64> {
        match (&self.def.boundary, self.updater.updater()) {
            (_, BoundaryUpdater::Windkessel(wk)) => Some(wk.pressure()),
            (BoundaryDef::VectorFittingImpedance(imp), _) => imp.value,
            _ => None,
        }
    }

    /// One number per patch for reporting: the imposed scalar, or the
    /// area-weighted normal velocity of a velocity outlet.
    pub fn summary_value(&self) -> Option<f64> {
        match self.updater.last_outcome().map(|o| &o.value) {
            Some(BoundaryValue::Uniform(v)) => Some(*v),
            Some(BoundaryValue::Vectors(v)) => Some(self.patch.mean_normal_velocity(v)),
            None => self.initial_value(),
        }
    }

    fn last_update_time(&self) -> Option<f64> {
        let t = self.updater.guard().last_update_time;
        (t > -GREAT).then_some(t)
    }

    /// Case record carrying the live state, for restart.
    pub fn checkpoint(&self) -> PatchDef {
        let boundary = match (&self.def.boundary, self.updater.updater()) {
            (BoundaryDef::Windkessel(def), BoundaryUpdater::Windkessel(wk)) => {
                let [p0, p_1, p_2] = wk.history().pressure.as_array();
                let [q_1, q_2, q_3] = wk.history().flow.as_array();
                BoundaryDef::Windkessel(WindkesselDef {
                    order: wk.order.label(),
                    p0,
                    p_1: Some(p_1),
                    p_2: Some(p_2),
                    q_1,
                    q_2: Some(q_2),
                    q_3: Some(q_3),
                    ..def.clone()
                })
            }
            (BoundaryDef::VectorFittingImpedance(def), BoundaryUpdater::PoleResidue(imp)) => {
                BoundaryDef::VectorFittingImpedance(ImpedanceDef {
                    q_1: imp.last_flow(),
                    state_variables: Some(imp.state_variables().to_vec()),
                    value: self.summary_value(),
                    ..def.clone()
                })
            }
            (other, _) => other.clone(),
        };
        PatchDef {
            name: self.def.name.clone(),
            faces: self.def.faces.clone(),
            boundary,
            last_update_time: self.last_update_time(),
        }
    }
}
