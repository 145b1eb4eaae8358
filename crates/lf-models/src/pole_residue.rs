//! Vector-fitting impedance outlet (pole-residue recursive convolution).
//!
//! The downstream impedance is a rational fit
//! `Z(s) = d + Σ r_i/(s - p_i)` with real, stable poles. In the time domain
//! each term becomes a first-order accumulator advanced exactly by
//! [`PoleStep`], so memory is O(N) regardless of simulation length.
//!
//! Two coupling modes are supported:
//! - **Explicit**: the computed pressure is imposed as a fixed value.
//! - **Implicit**: the outlet additionally exposes `P = Z_eff·Q + H` so the
//!   pressure equation can solve for flow and pressure together.

use crate::convolution::PoleStep;
use crate::error::{ModelError, ModelResult};
use crate::outcome::ImplicitCoeffs;
use lf_core::units::{kgpm3, kinematic, kinematic_value, pa};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Poles more negative than this (rad/s) make the recursion step-size sensitive.
pub const STIFF_POLE_BOUND: f64 = -1000.0;

/// How the outlet enters the flow solver's linear system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CouplingMode {
    #[default]
    Explicit,
    Implicit,
}

impl CouplingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CouplingMode::Explicit => "explicit",
            CouplingMode::Implicit => "implicit",
        }
    }
}

impl FromStr for CouplingMode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "explicit" => Ok(CouplingMode::Explicit),
            "implicit" => Ok(CouplingMode::Implicit),
            other => Err(ModelError::UnknownVariant {
                what: "couplingMode",
                value: other.to_string(),
                expected: "explicit, implicit",
            }),
        }
    }
}

impl fmt::Display for CouplingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit system the fitted parameters were expressed in.
///
/// - `Dynamic`: directTerm [Pa·s/m³], residues [Pa/m³]; results are divided by ρ.
/// - `Kinematic`: directTerm [s/m], residues [1/m]; used as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImpedanceUnits {
    #[default]
    Dynamic,
    Kinematic,
}

impl ImpedanceUnits {
    pub fn as_str(self) -> &'static str {
        match self {
            ImpedanceUnits::Dynamic => "dynamic",
            ImpedanceUnits::Kinematic => "kinematic",
        }
    }
}

impl FromStr for ImpedanceUnits {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dynamic" => Ok(ImpedanceUnits::Dynamic),
            "kinematic" => Ok(ImpedanceUnits::Kinematic),
            other => Err(ModelError::UnknownVariant {
                what: "impedanceUnits",
                value: other.to_string(),
                expected: "dynamic, kinematic",
            }),
        }
    }
}

impl fmt::Display for ImpedanceUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fitted rational impedance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoleResidueParams {
    pub poles: Vec<f64>,
    pub residues: Vec<f64>,
    pub direct_term: f64,
}

impl PoleResidueParams {
    /// Build and validate a fit declared to have `n_poles` terms.
    ///
    /// # Errors
    ///
    /// - `LengthMismatch` if either list disagrees with `n_poles`
    /// - `UnstablePole` for the first pole that is not strictly negative
    ///
    /// Stiff poles are accepted here; the live outlet warns about them when built.
    pub fn new(
        n_poles: usize,
        poles: Vec<f64>,
        residues: Vec<f64>,
        direct_term: f64,
    ) -> ModelResult<Self> {
        if poles.len() != n_poles {
            return Err(ModelError::LengthMismatch {
                what: "poles",
                expected: n_poles,
                found: poles.len(),
            });
        }
        if residues.len() != n_poles {
            return Err(ModelError::LengthMismatch {
                what: "residues",
                expected: n_poles,
                found: residues.len(),
            });
        }
        validate_poles(&poles)?;
        if !direct_term.is_finite() || residues.iter().any(|r| !r.is_finite()) {
            return Err(ModelError::NonPhysical {
                what: "directTerm and residues must be finite",
            });
        }
        Ok(Self {
            poles,
            residues,
            direct_term,
        })
    }

    pub fn n_poles(&self) -> usize {
        self.poles.len()
    }

    /// `∂P/∂Q` over one step of length `dt`, in the units of the fit.
    pub fn effective_impedance(&self, dt: f64) -> f64 {
        self.poles
            .iter()
            .zip(&self.residues)
            .fold(self.direct_term, |acc, (&p, &r)| {
                acc + r * PoleStep::new(p, dt).weight
            })
    }
}

/// Reject unstable poles.
pub fn validate_poles(poles: &[f64]) -> ModelResult<()> {
    for (index, &value) in poles.iter().enumerate() {
        // NaN fails this comparison too
        if !(value < 0.0) {
            return Err(ModelError::UnstablePole { index, value });
        }
    }
    Ok(())
}

/// Indices of poles below [`STIFF_POLE_BOUND`].
pub fn stiff_poles(poles: &[f64]) -> impl Iterator<Item = usize> + '_ {
    poles
        .iter()
        .enumerate()
        .filter(|(_, p)| **p < STIFF_POLE_BOUND)
        .map(|(i, _)| i)
}

/// Unit handling and geometry shared by all poles of one outlet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpedanceSetup {
    pub coupling: CouplingMode,
    pub units: ImpedanceUnits,
    /// Density for dynamic → kinematic conversion.
    pub rho: f64,
    /// Total area of the patch the outlet is attached to.
    pub patch_area: f64,
}

/// Live state of a vector-fitting impedance outlet.
#[derive(Debug, Clone, PartialEq)]
pub struct PoleResidueImpedance {
    params: PoleResidueParams,
    setup: ImpedanceSetup,
    state: Vec<f64>,
    state_old: Vec<f64>,
    q_1: f64,
}

impl PoleResidueImpedance {
    /// Create an outlet, optionally resuming from stored accumulators.
    ///
    /// A restart seed of the wrong length is discarded with a warning and the
    /// accumulators start from zero.
    pub fn new(
        params: PoleResidueParams,
        setup: ImpedanceSetup,
        seed: Option<Vec<f64>>,
        q_1: f64,
    ) -> ModelResult<Self> {
        if setup.units == ImpedanceUnits::Dynamic && !(setup.rho > 0.0) {
            return Err(ModelError::NonPhysical {
                what: "rho must be positive for dynamic impedance units",
            });
        }
        if !(setup.patch_area >= 0.0) {
            return Err(ModelError::NonPhysical {
                what: "patch area must be non-negative",
            });
        }

        for index in stiff_poles(&params.poles) {
            tracing::warn!(
                pole = index,
                value = params.poles[index],
                "very negative pole may lead to a stiff ODE requiring small timesteps"
            );
        }

        let n = params.n_poles();
        let state = match seed {
            Some(seed) if seed.len() == n => seed,
            Some(seed) => {
                tracing::warn!(
                    expected = n,
                    found = seed.len(),
                    "stateVariables list size mismatch, reinitializing to zero"
                );
                vec![0.0; n]
            }
            None => vec![0.0; n],
        };

        Ok(Self {
            params,
            setup,
            state_old: state.clone(),
            state,
            q_1,
        })
    }

    pub fn params(&self) -> &PoleResidueParams {
        &self.params
    }

    pub fn setup(&self) -> &ImpedanceSetup {
        &self.setup
    }

    /// Current convolution accumulators, one per pole.
    pub fn state_variables(&self) -> &[f64] {
        &self.state
    }

    /// Snapshot used by [`Self::historical_source`].
    pub fn previous_state(&self) -> &[f64] {
        &self.state_old
    }

    /// Flow of the last committed step.
    pub fn last_flow(&self) -> f64 {
        self.q_1
    }

    fn to_solver_units(&self, v: f64) -> f64 {
        match self.setup.units {
            ImpedanceUnits::Kinematic => v,
            ImpedanceUnits::Dynamic => kinematic_value(kinematic(pa(v), kgpm3(self.setup.rho))),
        }
    }

    /// Pressure implied by the committed state, `d·q_1 + Σ z_i`, in solver units.
    ///
    /// Equals the value returned by the last [`Self::advance`].
    pub fn pressure(&self) -> f64 {
        let p = self
            .state
            .iter()
            .fold(self.params.direct_term * self.q_1, |acc, z| acc + z);
        self.to_solver_units(p)
    }

    /// Advance all accumulators with flow `q` and return the pressure to impose
    /// (kinematic when the fit is dynamic).
    pub fn advance(&mut self, q: f64, dt: f64) -> f64 {
        let mut p = self.params.direct_term * q;

        for ((z, &pole), &residue) in self
            .state
            .iter_mut()
            .zip(&self.params.poles)
            .zip(&self.params.residues)
        {
            *z = PoleStep::new(pole, dt).advance(*z, residue, q);
            p += *z;
        }

        self.state_old.copy_from_slice(&self.state);
        self.q_1 = q;

        self.to_solver_units(p)
    }

    /// `∂P/∂Q` in the solver's pressure units.
    pub fn effective_impedance(&self, dt: f64) -> f64 {
        self.to_solver_units(self.params.effective_impedance(dt))
    }

    /// `Σ exp(p_i·dt)·z_i` over the previous-step snapshot, in solver units.
    pub fn historical_source(&self, dt: f64) -> f64 {
        let h: f64 = self
            .params
            .poles
            .iter()
            .zip(&self.state_old)
            .map(|(&p, &z)| PoleStep::new(p, dt).decay * z)
            .sum();
        self.to_solver_units(h)
    }

    /// Linear coefficients for implicit coupling; `None` in explicit mode.
    pub fn implicit_coeffs(&self, dt: f64) -> Option<ImplicitCoeffs> {
        match self.setup.coupling {
            CouplingMode::Explicit => None,
            CouplingMode::Implicit => Some(ImplicitCoeffs {
                effective_impedance: self.effective_impedance(dt),
                historical_source: self.historical_source(dt),
                patch_area: self.setup.patch_area,
            }),
        }
    }
}
