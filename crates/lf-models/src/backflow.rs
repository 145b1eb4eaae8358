//! Directional backflow stabilization for velocity outlets.
//!
//! Outside of reversed-flow faces the outlet is a plain zero-gradient
//! condition. On faces where fluid re-enters the domain the extrapolated
//! velocity is damped by one of three strategies:
//!
//! | Mode | Backflow face treatment |
//! |------|-------------------------|
//! | `DirectCorrection` | add a damped quadratic drag correction along the normal |
//! | `Proportional` | scale the normal component by `(1 - β)` |
//! | `DirectionMixed` | blend towards zero with `F = βN·nn + βT·(I - nn)` |
//!
//! All β values are `clamp(β·dampingFactor, 0, 1)`.

use crate::error::{ModelError, ModelResult};
use lf_core::units::constants::WATER_RHO_KGPM3;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Detector values above `-BACKFLOW_MARGIN` count as outflow.
pub const BACKFLOW_MARGIN: f64 = 1e-12;

/// Fixed extra damping applied to the direct drag correction.
pub const CORRECTION_DAMPING: f64 = 0.1;

/// Backflow treatment strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StabilizationMode {
    DirectCorrection,
    Proportional,
    #[default]
    DirectionMixed,
}

impl StabilizationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            StabilizationMode::DirectCorrection => "direct_correction",
            StabilizationMode::Proportional => "proportional",
            StabilizationMode::DirectionMixed => "direction_mixed",
        }
    }
}

impl FromStr for StabilizationMode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct_correction" => Ok(StabilizationMode::DirectCorrection),
            "proportional" => Ok(StabilizationMode::Proportional),
            "direction_mixed" => Ok(StabilizationMode::DirectionMixed),
            other => Err(ModelError::UnknownVariant {
                what: "stabilization mode",
                value: other.to_string(),
                expected: "direct_correction, proportional, direction_mixed",
            }),
        }
    }
}

impl fmt::Display for StabilizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configured (unclamped) stabilizer settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackflowConfig {
    pub mode: StabilizationMode,
    pub beta: f64,
    pub beta_n: f64,
    pub beta_t: f64,
    pub enabled: bool,
    pub damping_factor: f64,
    /// Density override; otherwise taken from the sample.
    pub rho: Option<f64>,
}

impl Default for BackflowConfig {
    fn default() -> Self {
        Self {
            mode: StabilizationMode::default(),
            beta: 1.0,
            beta_n: 1.0,
            beta_t: 0.2,
            enabled: true,
            damping_factor: 1.0,
            rho: None,
        }
    }
}

/// `β·dampingFactor` restricted to `[0, 1]`.
pub fn effective_beta(beta: f64, damping_factor: f64) -> f64 {
    let scaled = beta * damping_factor;
    if scaled.is_nan() {
        0.0
    } else {
        scaled.clamp(0.0, 1.0)
    }
}

/// Per-face inputs of one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct VelocitySample<'a> {
    /// Patch-internal (zero-gradient) velocity per face.
    pub internal: &'a [Vector3<f64>],
    /// Unit outward normal per face.
    pub normals: &'a [Vector3<f64>],
    /// Face flux; when present its sign decides backflow instead of `v·n`.
    pub face_flux: Option<&'a [f64]>,
    /// Density supplied by the host, if any.
    pub rho: Option<f64>,
}

/// Stabilized face velocities.
#[derive(Debug, Clone, PartialEq)]
pub struct StabilizedVelocity {
    pub values: Vec<Vector3<f64>>,
    /// Blend tensors, direction-mixed mode only.
    pub value_fraction: Option<Vec<Matrix3<f64>>>,
    pub backflow_faces: usize,
}

/// Velocity outlet with backflow damping.
#[derive(Debug, Clone, PartialEq)]
pub struct BackflowStabilizer {
    config: BackflowConfig,
    beta: f64,
    beta_n: f64,
    beta_t: f64,
}

impl BackflowStabilizer {
    pub fn new(config: BackflowConfig) -> ModelResult<Self> {
        if let Some(rho) = config.rho {
            if !(rho > 0.0) {
                return Err(ModelError::NonPhysical {
                    what: "rho must be positive",
                });
            }
        }
        Ok(Self {
            beta: effective_beta(config.beta, config.damping_factor),
            beta_n: effective_beta(config.beta_n, config.damping_factor),
            beta_t: effective_beta(config.beta_t, config.damping_factor),
            config,
        })
    }

    pub fn config(&self) -> &BackflowConfig {
        &self.config
    }

    /// Clamped `(β, βN, βT)` actually used.
    pub fn effective_betas(&self) -> (f64, f64, f64) {
        (self.beta, self.beta_n, self.beta_t)
    }

    fn mask(&self, sample: &VelocitySample<'_>) -> Vec<bool> {
        match sample.face_flux {
            Some(phi) => phi.iter().map(|&f| f < -BACKFLOW_MARGIN).collect(),
            None => sample
                .internal
                .iter()
                .zip(sample.normals)
                .map(|(v, n)| v.dot(n) < -BACKFLOW_MARGIN)
                .collect(),
        }
    }

    /// Evaluate the outlet velocity for one set of face samples.
    pub fn evaluate(&self, sample: &VelocitySample<'_>) -> ModelResult<StabilizedVelocity> {
        let n_faces = sample.internal.len();
        if sample.normals.len() != n_faces {
            return Err(ModelError::SampleMismatch {
                what: format!(
                    "{} normals for {} velocity faces",
                    sample.normals.len(),
                    n_faces
                ),
            });
        }
        if let Some(phi) = sample.face_flux {
            if phi.len() != n_faces {
                return Err(ModelError::SampleMismatch {
                    what: format!("{} flux faces for {} velocity faces", phi.len(), n_faces),
                });
            }
        }

        let mask = if self.config.enabled {
            self.mask(sample)
        } else {
            vec![false; n_faces]
        };
        let backflow_faces = mask.iter().filter(|&&m| m).count();

        if backflow_faces == 0 {
            return Ok(StabilizedVelocity {
                values: sample.internal.to_vec(),
                value_fraction: match self.config.mode {
                    StabilizationMode::DirectionMixed => Some(vec![Matrix3::zeros(); n_faces]),
                    _ => None,
                },
                backflow_faces,
            });
        }

        let faces = sample.internal.iter().zip(sample.normals).zip(&mask);
        let result = match self.config.mode {
            StabilizationMode::DirectCorrection => {
                let rho = self
                    .config
                    .rho
                    .or(sample.rho)
                    .unwrap_or(WATER_RHO_KGPM3);
                StabilizedVelocity {
                    values: faces
                        .map(|((v, n), &back)| {
                            if back {
                                self.direct_correction(v, n, rho)
                            } else {
                                *v
                            }
                        })
                        .collect(),
                    value_fraction: None,
                    backflow_faces,
                }
            }
            StabilizationMode::Proportional => StabilizedVelocity {
                values: faces
                    .map(|((v, n), &back)| if back { self.proportional(v, n) } else { *v })
                    .collect(),
                value_fraction: None,
                backflow_faces,
            },
            StabilizationMode::DirectionMixed => {
                let mut values = Vec::with_capacity(n_faces);
                let mut fractions = Vec::with_capacity(n_faces);
                for ((v, n), &back) in faces {
                    if back {
                        let f = self.value_fraction(n);
                        // ref value and ref gradient are both zero
                        values.push((Matrix3::identity() - f) * v);
                        fractions.push(f);
                    } else {
                        values.push(*v);
                        fractions.push(Matrix3::zeros());
                    }
                }
                StabilizedVelocity {
                    values,
                    value_fraction: Some(fractions),
                    backflow_faces,
                }
            }
        };
        Ok(result)
    }

    /// Subtract the damped drag term `-β·ρ·(v·n)·v` projected on the normal.
    ///
    /// The correction never reverses the sign of the normal component.
    fn direct_correction(&self, v: &Vector3<f64>, n: &Vector3<f64>, rho: f64) -> Vector3<f64> {
        let vn = v.dot(n);
        let drag_n = -self.beta * rho * vn * vn;
        let lift = (-CORRECTION_DAMPING * drag_n).min(-vn);
        v + n * lift
    }

    fn proportional(&self, v: &Vector3<f64>, n: &Vector3<f64>) -> Vector3<f64> {
        let vn = v.dot(n);
        let tangential = v - n * vn;
        n * ((1.0 - self.beta) * vn) + tangential
    }

    /// `βN·(n⊗n) + βT·(I - n⊗n)` for one backflow face.
    pub fn value_fraction(&self, n: &Vector3<f64>) -> Matrix3<f64> {
        let nn = n * n.transpose();
        nn * self.beta_n + (Matrix3::identity() - nn) * self.beta_t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Vector3<f64> {
        Vector3::new(1.0, 0.0, 0.0)
    }

    fn stabilizer(mode: StabilizationMode, beta_n: f64, beta_t: f64) -> BackflowStabilizer {
        BackflowStabilizer::new(BackflowConfig {
            mode,
            beta: beta_n,
            beta_n,
            beta_t,
            ..BackflowConfig::default()
        })
        .unwrap()
    }

    fn sample<'a>(v: &'a [Vector3<f64>], n: &'a [Vector3<f64>]) -> VelocitySample<'a> {
        VelocitySample {
            internal: v,
            normals: n,
            face_flux: None,
            rho: Some(1000.0),
        }
    }

    #[test]
    fn pure_outflow_is_untouched_in_every_mode() {
        let v = [
            Vector3::new(0.3, 0.1, -0.2),
            Vector3::new(0.0, 0.5, 0.0),
            Vector3::new(2.0, -1.0, 1.0),
        ];
        let n = [x(), x(), x()];
        for mode in [
            StabilizationMode::DirectCorrection,
            StabilizationMode::Proportional,
            StabilizationMode::DirectionMixed,
        ] {
            let out = stabilizer(mode, 1.0, 1.0).evaluate(&sample(&v, &n)).unwrap();
            assert_eq!(out.values, v.to_vec(), "{mode}");
            assert_eq!(out.backflow_faces, 0);
        }
    }

    #[test]
    fn disabled_stabilizer_passes_backflow_through() {
        let v = [Vector3::new(-1.0, 0.2, 0.0)];
        let n = [x()];
        let s = BackflowStabilizer::new(BackflowConfig {
            enabled: false,
            ..BackflowConfig::default()
        })
        .unwrap();
        let out = s.evaluate(&sample(&v, &n)).unwrap();
        assert_eq!(out.values, v.to_vec());
    }

    #[test]
    fn proportional_scales_normal_keeps_tangential() {
        let v = [Vector3::new(-2.0, 0.5, 0.0)];
        let n = [x()];
        let out = stabilizer(StabilizationMode::Proportional, 0.75, 0.0)
            .evaluate(&sample(&v, &n))
            .unwrap();
        let u = out.values[0];
        assert!((u.x + 0.5).abs() < 1e-14);
        assert!((u.y - 0.5).abs() < 1e-14);
        assert_eq!(out.backflow_faces, 1);
    }

    #[test]
    fn full_proportional_damping_suppresses_backflow() {
        let v = [Vector3::new(-2.0, 0.5, 0.0)];
        let n = [x()];
        let out = stabilizer(StabilizationMode::Proportional, 1.0, 0.0)
            .evaluate(&sample(&v, &n))
            .unwrap();
        assert!(out.values[0].x.abs() < 1e-14);
    }

    #[test]
    fn direct_correction_opposes_inflow_without_flipping() {
        let n = [x()];
        // small inflow: correction 0.1·β·ρ·vn² = 0.1·1·1000·1e-6 = 1e-4
        let v = [Vector3::new(-1e-3, 0.2, 0.0)];
        let out = stabilizer(StabilizationMode::DirectCorrection, 1.0, 0.0)
            .evaluate(&sample(&v, &n))
            .unwrap();
        assert!((out.values[0].x - (-1e-3 + 1e-4)).abs() < 1e-15);
        assert_eq!(out.values[0].y, 0.2);

        // strong inflow: capped at zero normal velocity
        let v = [Vector3::new(-1.0, 0.0, 0.0)];
        let out = stabilizer(StabilizationMode::DirectCorrection, 1.0, 0.0)
            .evaluate(&sample(&v, &n))
            .unwrap();
        assert_eq!(out.values[0].x, 0.0);
    }

    #[test]
    fn direction_mixed_blends_normal_and_tangential() {
        let v = [Vector3::new(-1.0, 2.0, 0.0), Vector3::new(1.0, 2.0, 0.0)];
        let n = [x(), x()];
        let out = stabilizer(StabilizationMode::DirectionMixed, 1.0, 0.25)
            .evaluate(&sample(&v, &n))
            .unwrap();
        let u = out.values[0];
        assert!(u.x.abs() < 1e-14);
        assert!((u.y - 1.5).abs() < 1e-14);
        // outflow face untouched, zero blend tensor
        assert_eq!(out.values[1], v[1]);
        let f = out.value_fraction.unwrap();
        assert_eq!(f[1], Matrix3::zeros());
        assert!((f[0][(0, 0)] - 1.0).abs() < 1e-14);
        assert!((f[0][(1, 1)] - 0.25).abs() < 1e-14);
    }

    #[test]
    fn flux_sign_overrides_velocity_projection() {
        let v = [Vector3::new(1.0, 0.0, 0.0)];
        let n = [x()];
        let phi = [-1e-6];
        let s = stabilizer(StabilizationMode::Proportional, 1.0, 0.0);
        let out = s
            .evaluate(&VelocitySample {
                face_flux: Some(&phi),
                ..sample(&v, &n)
            })
            .unwrap();
        assert_eq!(out.backflow_faces, 1);
    }

    #[test]
    fn near_zero_normal_velocity_is_not_backflow() {
        let v = [Vector3::new(-1e-14, 1.0, 0.0)];
        let n = [x()];
        let out = stabilizer(StabilizationMode::Proportional, 1.0, 0.0)
            .evaluate(&sample(&v, &n))
            .unwrap();
        assert_eq!(out.backflow_faces, 0);
        assert_eq!(out.values[0], v[0]);
    }

    #[test]
    fn out_of_range_betas_are_clamped() {
        let s = BackflowStabilizer::new(BackflowConfig {
            beta: 1.5,
            beta_n: -0.3,
            beta_t: 0.8,
            damping_factor: 2.0,
            ..BackflowConfig::default()
        })
        .unwrap();
        assert_eq!(s.effective_betas(), (1.0, 0.0, 1.0));

        let s = BackflowStabilizer::new(BackflowConfig {
            beta: 0.6,
            beta_n: 0.6,
            beta_t: 0.6,
            damping_factor: 0.5,
            ..BackflowConfig::default()
        })
        .unwrap();
        let (b, bn, bt) = s.effective_betas();
        assert!((b - 0.3).abs() < 1e-15 && (bn - 0.3).abs() < 1e-15 && (bt - 0.3).abs() < 1e-15);
    }

    #[test]
    fn mismatched_sample_lengths_are_rejected() {
        let v = [x(), x()];
        let n = [x()];
        let err = stabilizer(StabilizationMode::DirectionMixed, 1.0, 0.2)
            .evaluate(&sample(&v, &n))
            .unwrap_err();
        assert!(matches!(err, ModelError::SampleMismatch { .. }));
    }

    #[test]
    fn unknown_mode_word() {
        assert!("tensor".parse::<StabilizationMode>().is_err());
        assert_eq!(
            "proportional".parse::<StabilizationMode>().unwrap(),
            StabilizationMode::Proportional
        );
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn effective_beta_stays_in_unit_interval(beta in -10.0_f64..10.0, damping in -5.0_f64..5.0) {
            let b = effective_beta(beta, damping);
            prop_assert!((0.0..=1.0).contains(&b));
        }

        #[test]
        fn stabilized_normal_speed_never_exceeds_inflow(
            vx in -5.0_f64..-1e-6,
            vy in -5.0_f64..5.0,
            beta in 0.0_f64..1.0,
        ) {
            let v = [Vector3::new(vx, vy, 0.0)];
            let n = [Vector3::new(1.0, 0.0, 0.0)];
            for mode in [
                StabilizationMode::DirectCorrection,
                StabilizationMode::Proportional,
                StabilizationMode::DirectionMixed,
            ] {
                let s = BackflowStabilizer::new(BackflowConfig {
                    mode,
                    beta,
                    beta_n: beta,
                    beta_t: 0.0,
                    ..BackflowConfig::default()
                })
                .unwrap();
                let out = s
                    .evaluate(&VelocitySample { internal: &v, normals: &n, face_flux: None, rho: None })
                    .unwrap();
                let un = out.values[0].x;
                prop_assert!(un <= 1e-15 && un >= vx - 1e-15, "{mode}: {un} vs {vx}");
            }
        }
    }
}
