//! Case file schema definitions.
//!
//! Boundary keys keep the spelling used in solver dictionaries (`R`, `p_1`,
//! `nPoles`, `stateVariables`, ...) so a case can be filled in directly from
//! an existing outlet setup.

use lf_core::units::constants::BLOOD_RHO_KGPM3;
use serde::{Deserialize, Serialize};

pub const LATEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Case {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub fluid: FluidDef,
    #[serde(default)]
    pub patches: Vec<PatchDef>,
}

impl Case {
    pub fn patch(&self, name: &str) -> Option<&PatchDef> {
        self.patches.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FluidDef {
    /// Density used to sample the `rho` property [kg/m³].
    #[serde(default = "default_blood_rho")]
    pub rho: f64,
}

impl Default for FluidDef {
    fn default() -> Self {
        Self {
            rho: BLOOD_RHO_KGPM3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatchDef {
    pub name: String,
    pub faces: FacesDef,
    pub boundary: BoundaryDef,
    /// Solver time of the last boundary update; written by checkpoints.
    #[serde(
        rename = "lastUpdateTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_update_time: Option<f64>,
}

/// Face geometry of one boundary patch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FacesDef {
    /// Face area magnitudes [m²].
    pub areas: Vec<f64>,
    /// Unit outward face normals.
    pub normals: Vec<[f64; 3]>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoundaryDef {
    Windkessel(WindkesselDef),
    VectorFittingImpedance(ImpedanceDef),
    BackflowStabilized(BackflowDef),
}

impl BoundaryDef {
    pub fn kind(&self) -> &'static str {
        match self {
            BoundaryDef::Windkessel(_) => "windkessel",
            BoundaryDef::VectorFittingImpedance(_) => "vector_fitting_impedance",
            BoundaryDef::BackflowStabilized(_) => "backflow_stabilized",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindkesselDef {
    #[serde(default = "default_phi")]
    pub phi: String,
    pub order: u32,
    #[serde(rename = "R")]
    pub r: f64,
    #[serde(rename = "C")]
    pub c: f64,
    #[serde(rename = "Z")]
    pub z: f64,
    pub p0: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_2: Option<f64>,
    pub q_1: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q_2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q_3: Option<f64>,
}

impl WindkesselDef {
    /// `[p0, p_1, p_2]`, each missing entry defaulting to the newer one.
    pub fn pressure_history(&self) -> [f64; 3] {
        let p_1 = self.p_1.unwrap_or(self.p0);
        let p_2 = self.p_2.unwrap_or(p_1);
        [self.p0, p_1, p_2]
    }

    /// `[q_1, q_2, q_3]`, each missing entry defaulting to the newer one.
    pub fn flow_history(&self) -> [f64; 3] {
        let q_2 = self.q_2.unwrap_or(self.q_1);
        let q_3 = self.q_3.unwrap_or(q_2);
        [self.q_1, q_2, q_3]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImpedanceDef {
    #[serde(default = "default_phi")]
    pub phi: String,
    #[serde(rename = "U", default = "default_u")]
    pub u: String,
    #[serde(rename = "couplingMode", default = "default_coupling_mode")]
    pub coupling_mode: String,
    #[serde(rename = "nPoles", alias = "order")]
    pub n_poles: usize,
    pub poles: Vec<f64>,
    pub residues: Vec<f64>,
    #[serde(rename = "directTerm")]
    pub direct_term: f64,
    #[serde(default = "default_blood_rho")]
    pub rho: f64,
    #[serde(rename = "impedanceUnits", default = "default_impedance_units")]
    pub impedance_units: String,
    #[serde(default)]
    pub q_1: f64,
    #[serde(
        rename = "stateVariables",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub state_variables: Option<Vec<f64>>,
    /// Last imposed pressure, used before the first update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackflowDef {
    #[serde(rename = "U", default = "default_u")]
    pub u: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phi: Option<String>,
    #[serde(default = "default_stabilization_mode")]
    pub mode: String,
    #[serde(default = "default_beta")]
    pub beta: f64,
    /// Defaults to `beta`.
    #[serde(rename = "betaN", default, skip_serializing_if = "Option::is_none")]
    pub beta_n: Option<f64>,
    #[serde(rename = "betaT", default = "default_beta_t")]
    pub beta_t: f64,
    #[serde(rename = "enableStabilization", default = "default_true")]
    pub enable_stabilization: bool,
    #[serde(rename = "dampingFactor", default = "default_damping_factor")]
    pub damping_factor: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rho: Option<f64>,
}

impl BackflowDef {
    pub fn effective_beta_n(&self) -> f64 {
        self.beta_n.unwrap_or(self.beta)
    }
}

fn default_phi() -> String {
    "phi".to_string()
}

fn default_u() -> String {
    "U".to_string()
}

fn default_coupling_mode() -> String {
    "explicit".to_string()
}

fn default_impedance_units() -> String {
    "dynamic".to_string()
}

fn default_stabilization_mode() -> String {
    "direction_mixed".to_string()
}

fn default_blood_rho() -> f64 {
    BLOOD_RHO_KGPM3
}

fn default_beta() -> f64 {
    1.0
}

fn default_beta_t() -> f64 {
    0.2
}

fn default_damping_factor() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}
