//! lf-models: lumped-parameter outlet boundary models.
//!
//! Each outlet turns the flow measured on a boundary patch into a value to
//! impose on it, advancing a small internal state once per timestep.
//!
//! Contains:
//! - windkessel (three-element RCR circuit, BDF orders 1-3)
//! - pole_residue (vector-fitting impedance via recursive convolution)
//! - backflow (velocity outlet with reversed-flow damping)
//! - updater (closed updater enum + update-once wrapper)
//! - convolution, history, guard (building blocks)
//! - outcome (boundary values and implicit-coupling coefficients)
//! - frequency (frequency response of a fitted impedance)
//! - spectrum (impedance spectrum from recorded pressure and flow)
//! - fitting (vector fitting of a spectrum to poles and residues)

pub mod backflow;
pub mod convolution;
pub mod error;
pub mod fitting;
pub mod frequency;
pub mod guard;
pub mod history;
pub mod outcome;
pub mod pole_residue;
pub mod spectrum;
pub mod updater;
pub mod windkessel;

pub use backflow::{BackflowConfig, BackflowStabilizer, StabilizationMode, VelocitySample};
pub use error::{ModelError, ModelResult};
pub use fitting::{FitOptions, FitResult, vector_fit};
pub use frequency::ImpedanceSample;
pub use guard::UpdateGuard;
pub use outcome::{BoundaryOutcome, BoundaryValue, FaceCoeffs, ImplicitCoeffs};
pub use pole_residue::{
    CouplingMode, ImpedanceSetup, ImpedanceUnits, PoleResidueImpedance, PoleResidueParams,
};
pub use spectrum::{Window, impedance_from_series};
pub use updater::{BoundaryUpdater, GuardedUpdater, PatchSample, StepContext};
pub use windkessel::{FdOrder, Windkessel, WindkesselHistory, WindkesselParams};
