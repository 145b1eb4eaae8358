//! Case validation logic.

use crate::schema::{
    BackflowDef, BoundaryDef, Case, FacesDef, ImpedanceDef, LATEST_VERSION, PatchDef,
    WindkesselDef,
};
use lf_models::{
    CouplingMode, ImpedanceUnits, ModelError, PoleResidueParams, StabilizationMode,
};
use std::collections::HashSet;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Patch '{patch}': {source}")]
    Model {
        patch: String,
        #[source]
        source: ModelError,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

fn invalid(field: String, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn require_positive(field: String, value: f64) -> Result<(), ValidationError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, value, "must be positive and finite"))
    }
}

fn require_finite(field: String, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, value, "must be finite"))
    }
}

pub fn validate_case(case: &Case) -> Result<(), ValidationError> {
    if case.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: case.version,
        });
    }

    require_positive("fluid.rho".to_string(), case.fluid.rho)?;

    let mut names = HashSet::new();
    for patch in &case.patches {
        if !names.insert(&patch.name) {
            return Err(ValidationError::DuplicateId {
                id: patch.name.clone(),
                context: "patches".to_string(),
            });
        }
        validate_patch(patch)?;
    }

    Ok(())
}

fn validate_patch(patch: &PatchDef) -> Result<(), ValidationError> {
    validate_faces(&patch.name, &patch.faces)?;
    if let Some(t) = patch.last_update_time {
        require_finite(format!("{}.lastUpdateTime", patch.name), t)?;
    }
    match &patch.boundary {
        BoundaryDef::Windkessel(wk) => validate_windkessel(&patch.name, wk),
        BoundaryDef::VectorFittingImpedance(imp) => validate_impedance(&patch.name, imp),
        BoundaryDef::BackflowStabilized(bf) => validate_backflow(&patch.name, bf),
    }
}

fn validate_faces(patch: &str, faces: &FacesDef) -> Result<(), ValidationError> {
    if faces.areas.is_empty() {
        return Err(invalid(
            format!("{patch}.faces.areas"),
            "[]",
            "patch must have at least one face",
        ));
    }
    if faces.normals.len() != faces.areas.len() {
        return Err(invalid(
            format!("{patch}.faces.normals"),
            faces.normals.len(),
            "one normal per face area required",
        ));
    }
    for (i, &a) in faces.areas.iter().enumerate() {
        require_positive(format!("{patch}.faces.areas[{i}]"), a)?;
    }
    for (i, n) in faces.normals.iter().enumerate() {
        let len = n.iter().map(|c| c * c).sum::<f64>().sqrt();
        if !(len > 0.0) || !len.is_finite() {
            return Err(invalid(
                format!("{patch}.faces.normals[{i}]"),
                format!("{n:?}"),
                "normal must be a non-zero finite vector",
            ));
        }
    }
    Ok(())
}

fn validate_windkessel(patch: &str, wk: &WindkesselDef) -> Result<(), ValidationError> {
    require_positive(format!("{patch}.R"), wk.r)?;
    require_positive(format!("{patch}.C"), wk.c)?;
    if !(wk.z >= 0.0) || !wk.z.is_finite() {
        return Err(invalid(
            format!("{patch}.Z"),
            wk.z,
            "must be non-negative and finite",
        ));
    }
    for (key, v) in ["p0", "p_1", "p_2"].iter().zip(wk.pressure_history()) {
        require_finite(format!("{patch}.{key}"), v)?;
    }
    for (key, v) in ["q_1", "q_2", "q_3"].iter().zip(wk.flow_history()) {
        require_finite(format!("{patch}.{key}"), v)?;
    }
    Ok(())
}

fn validate_impedance(patch: &str, imp: &ImpedanceDef) -> Result<(), ValidationError> {
    let model_err = |source: ModelError| ValidationError::Model {
        patch: patch.to_string(),
        source,
    };
    let _: CouplingMode = imp.coupling_mode.parse().map_err(model_err)?;
    let units: ImpedanceUnits = imp.impedance_units.parse().map_err(model_err)?;
    PoleResidueParams::new(
        imp.n_poles,
        imp.poles.clone(),
        imp.residues.clone(),
        imp.direct_term,
    )
    .map_err(model_err)?;
    if units == ImpedanceUnits::Dynamic {
        require_positive(format!("{patch}.rho"), imp.rho)?;
    }
    require_finite(format!("{patch}.q_1"), imp.q_1)?;
    if let Some(state) = &imp.state_variables {
        if let Some(i) = state.iter().position(|z| !z.is_finite()) {
            return Err(invalid(
                format!("{patch}.stateVariables[{i}]"),
                state[i],
                "must be finite",
            ));
        }
    }
    if let Some(v) = imp.value {
        require_finite(format!("{patch}.value"), v)?;
    }
    Ok(())
}

fn validate_backflow(patch: &str, bf: &BackflowDef) -> Result<(), ValidationError> {
    let _: StabilizationMode = bf.mode.parse().map_err(|source| ValidationError::Model {
        patch: patch.to_string(),
        source,
    })?;
    require_finite(format!("{patch}.beta"), bf.beta)?;
    require_finite(format!("{patch}.betaN"), bf.effective_beta_n())?;
    require_finite(format!("{patch}.betaT"), bf.beta_t)?;
    require_finite(format!("{patch}.dampingFactor"), bf.damping_factor)?;
    if let Some(rho) = bf.rho {
        require_positive(format!("{patch}.rho"), rho)?;
    }
    Ok(())
}
