//! What a boundary update hands back to the flow solver.

use lf_core::numeric::SMALL;
use nalgebra::{Matrix3, Vector3};

/// Value to impose on the patch faces.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryValue {
    /// One scalar for every face (pressure outlets).
    Uniform(f64),
    /// Per-face vectors (velocity outlets).
    Vectors(Vec<Vector3<f64>>),
}

impl BoundaryValue {
    pub fn as_uniform(&self) -> Option<f64> {
        match self {
            BoundaryValue::Uniform(v) => Some(*v),
            BoundaryValue::Vectors(_) => None,
        }
    }

    pub fn as_vectors(&self) -> Option<&[Vector3<f64>]> {
        match self {
            BoundaryValue::Uniform(_) => None,
            BoundaryValue::Vectors(v) => Some(v),
        }
    }
}

/// Linearization of an impedance outlet for implicit coupling.
///
/// The imposed pressure is `P = Z_eff·Q + H`, where `Q` is the still-unknown
/// flow of the step. Both quantities are already in the solver's pressure units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImplicitCoeffs {
    /// `∂P/∂Q` over one step.
    pub effective_impedance: f64,
    /// Pressure contributed by decaying past state alone.
    pub historical_source: f64,
    /// Total patch area used to spread the contribution over faces.
    pub patch_area: f64,
}

impl ImplicitCoeffs {
    /// Change applied to the diagonal (internal) coefficient per unit weight.
    pub fn internal_delta(&self) -> f64 {
        -self.effective_impedance / (self.patch_area + SMALL)
    }

    /// Change applied to the source (boundary) coefficient per unit weight.
    pub fn boundary_delta(&self) -> f64 {
        self.historical_source / (self.patch_area + SMALL)
    }

    /// Pressure predicted for flow `q`.
    pub fn pressure_for(&self, q: f64) -> f64 {
        self.effective_impedance * q + self.historical_source
    }
}

/// Per-face linear-system coefficients handed to matrix assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceCoeffs {
    pub internal: Vec<f64>,
    pub boundary: Vec<f64>,
}

impl FaceCoeffs {
    /// Fixed-value coefficients: no diagonal contribution, the value as source.
    pub fn fixed_value(value: f64, n_faces: usize) -> Self {
        Self {
            internal: vec![0.0; n_faces],
            boundary: vec![value; n_faces],
        }
    }

    /// Fixed-value coefficients modified by an implicit impedance.
    ///
    /// `weights` are the solver's dimensionless boundary weights (1 on every
    /// face of a boundary patch), not face areas: each face sees the whole
    /// patch impedance spread over the total area.
    pub fn with_impedance(value: f64, weights: &[f64], coeffs: &ImplicitCoeffs) -> Self {
        let internal_delta = coeffs.internal_delta();
        let boundary_delta = coeffs.boundary_delta();
        Self {
            internal: weights.iter().map(|w| internal_delta * w).collect(),
            boundary: weights.iter().map(|w| value + boundary_delta * w).collect(),
        }
    }
}

/// Result of one (possibly cached) boundary update.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryOutcome {
    pub value: BoundaryValue,
    /// Present only for implicitly coupled impedance outlets.
    pub coeffs: Option<ImplicitCoeffs>,
    /// Per-face blend tensors for direction-mixed velocity outlets.
    pub value_fraction: Option<Vec<Matrix3<f64>>>,
}

impl BoundaryOutcome {
    pub fn uniform(value: f64) -> Self {
        Self {
            value: BoundaryValue::Uniform(value),
            coeffs: None,
            value_fraction: None,
        }
    }

    /// Assemble per-face coefficients for a scalar outcome.
    pub fn face_coeffs(&self, weights: &[f64]) -> Option<FaceCoeffs> {
        let value = self.value.as_uniform()?;
        Some(match &self.coeffs {
            Some(c) => FaceCoeffs::with_impedance(value, weights, c),
            None => FaceCoeffs::fixed_value(value, weights.len()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_value_coeffs() {
        let outcome = BoundaryOutcome::uniform(4.0);
        let fc = outcome.face_coeffs(&[1.0, 1.0]).unwrap();
        assert_eq!(fc.internal, vec![0.0, 0.0]);
        assert_eq!(fc.boundary, vec![4.0, 4.0]);
    }

    #[test]
    fn impedance_coeffs_divide_by_patch_area() {
        let coeffs = ImplicitCoeffs {
            effective_impedance: 2.0,
            historical_source: 3.0,
            patch_area: 0.5,
        };
        let fc = FaceCoeffs::with_impedance(1.0, &[1.0, 1.0, 1.0], &coeffs);
        for (internal, boundary) in fc.internal.iter().zip(&fc.boundary) {
            assert!((internal + 4.0).abs() < 1e-12);
            assert!((boundary - 7.0).abs() < 1e-12);
        }
    }

    #[test]
    fn impedance_coeffs_are_independent_of_face_size() {
        let coeffs = ImplicitCoeffs {
            effective_impedance: 1.6e8,
            historical_source: 2.0e3,
            patch_area: 1.5e-4,
        };
        let outcome = BoundaryOutcome {
            value: BoundaryValue::Uniform(10.0),
            coeffs: Some(coeffs),
            value_fraction: None,
        };
        let fc = outcome.face_coeffs(&[1.0; 3]).unwrap();
        let expected = -1.6e8 / (1.5e-4 + SMALL);
        assert!(fc.internal.iter().all(|&c| c == expected));
        assert!(fc.boundary.iter().all(|&c| c == 10.0 + 2.0e3 / (1.5e-4 + SMALL)));
    }

    #[test]
    fn vector_outcome_has_no_scalar_coeffs() {
        let outcome = BoundaryOutcome {
            value: BoundaryValue::Vectors(vec![Vector3::zeros()]),
            coeffs: None,
            value_fraction: None,
        };
        assert!(outcome.face_coeffs(&[1.0]).is_none());
    }
}
