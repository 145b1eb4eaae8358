//! Build live outlets from case records and write them back for restart.

use crate::coupling::PatchBoundary;
use crate::error::{SimError, SimResult};
use crate::patch::Patch;
use lf_case::{BoundaryDef, Case, validate_case};
use lf_core::PatchId;
use lf_core::numeric::GREAT;
use lf_models::{
    BackflowConfig, BackflowStabilizer, BoundaryUpdater, CouplingMode, FdOrder, GuardedUpdater,
    ImpedanceSetup, ImpedanceUnits, ModelError, PoleResidueImpedance, PoleResidueParams,
    StabilizationMode, UpdateGuard, Windkessel, WindkesselHistory, WindkesselParams,
};

/// Construct the updater described by `def` on `patch`.
pub fn build_updater(patch: &Patch, def: &BoundaryDef) -> SimResult<BoundaryUpdater> {
    let model_err = |source: ModelError| SimError::Model {
        patch: patch.name.clone(),
        source,
    };

    let updater = match def {
        BoundaryDef::Windkessel(wk) => BoundaryUpdater::Windkessel(Windkessel::new(
            WindkesselParams {
                r: wk.r,
                c: wk.c,
                z: wk.z,
            },
            FdOrder::from_label(wk.order),
            WindkesselHistory::new(wk.pressure_history(), wk.flow_history()),
        )),
        BoundaryDef::VectorFittingImpedance(imp) => {
            let coupling: CouplingMode = imp.coupling_mode.parse().map_err(model_err)?;
            let units: ImpedanceUnits = imp.impedance_units.parse().map_err(model_err)?;
            let params = PoleResidueParams::new(
                imp.n_poles,
                imp.poles.clone(),
                imp.residues.clone(),
                imp.direct_term,
            )
            .map_err(model_err)?;
            let setup = ImpedanceSetup {
                coupling,
                units,
                rho: imp.rho,
                patch_area: patch.area(),
            };
            BoundaryUpdater::PoleResidue(
                PoleResidueImpedance::new(params, setup, imp.state_variables.clone(), imp.q_1)
                    .map_err(model_err)?,
            )
        }
        BoundaryDef::BackflowStabilized(bf) => {
            let mode: StabilizationMode = bf.mode.parse().map_err(model_err)?;
            let config = BackflowConfig {
                mode,
                beta: bf.beta,
                beta_n: bf.effective_beta_n(),
                beta_t: bf.beta_t,
                enabled: bf.enable_stabilization,
                damping_factor: bf.damping_factor,
                rho: bf.rho,
            };
            BoundaryUpdater::Backflow(BackflowStabilizer::new(config).map_err(model_err)?)
        }
    };
    Ok(updater)
}

/// Validate `case` and build one [`PatchBoundary`] per patch, resuming any
/// stored update times.
pub fn compile_case(case: &Case) -> SimResult<Vec<PatchBoundary>> {
    validate_case(case)?;

    case.patches
        .iter()
        .enumerate()
        .map(|(index, def)| {
            let index = u32::try_from(index).map_err(|_| SimError::InvalidArg {
                what: "too many patches",
            })?;
            let patch = Patch::new(PatchId::from_index(index), &def.name, &def.faces);
            let updater = build_updater(&patch, &def.boundary)?;
            let guard = UpdateGuard {
                last_update_time: def.last_update_time.unwrap_or(-GREAT),
            };
            tracing::debug!(
                patch = %patch.name,
                kind = updater.kind(),
                faces = patch.n_faces(),
                "compiled outlet"
            );
            Ok(PatchBoundary::new(
                patch,
                def.clone(),
                GuardedUpdater::restore(updater, guard),
            ))
        })
        .collect()
}

/// Copy of `case` whose patches carry the current outlet state.
pub fn checkpoint_case(case: &Case, boundaries: &[PatchBoundary]) -> Case {
    Case {
        patches: boundaries.iter().map(PatchBoundary::checkpoint).collect(),
        ..case.clone()
    }
}
