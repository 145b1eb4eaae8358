//! Impedance spectra from recorded outlet pressure and flow.
//!
//! `Z(f) = P(f)/Q(f)` from a discrete Fourier transform of both series.
//! Only strictly positive frequencies below Nyquist are returned, so the
//! result can be fed straight into [`crate::fitting::vector_fit`].

use crate::error::{ModelError, ModelResult};
use crate::frequency::ImpedanceSample;
use nalgebra::Complex;
use std::f64::consts::PI;

/// Relative spread of the step sizes above which a series is resampled.
const NON_UNIFORM_TOL: f64 = 0.01;

/// Bins whose flow amplitude is below this are reported as zero impedance.
const FLOW_FLOOR: f64 = 1e-15;

/// Taper applied to both series before the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Window {
    None,
    #[default]
    Hann,
    Hamming,
    Blackman,
}

impl Window {
    pub fn parse(s: &str) -> ModelResult<Self> {
        match s {
            "none" => Ok(Window::None),
            "hann" => Ok(Window::Hann),
            "hamming" => Ok(Window::Hamming),
            "blackman" => Ok(Window::Blackman),
            other => Err(ModelError::UnknownVariant {
                what: "window",
                value: other.to_string(),
                expected: "none, hann, hamming, blackman",
            }),
        }
    }

    /// Symmetric window coefficients of length `n`.
    fn coefficients(self, n: usize) -> Vec<f64> {
        let m = (n.max(2) - 1) as f64;
        (0..n)
            .map(|i| {
                let x = 2.0 * PI * i as f64 / m;
                match self {
                    Window::None => 1.0,
                    Window::Hann => 0.5 - 0.5 * x.cos(),
                    Window::Hamming => 0.54 - 0.46 * x.cos(),
                    Window::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                }
            })
            .collect()
    }
}

/// Linear interpolation of `(times, values)` at `t`; `times` must be increasing.
fn interpolate(times: &[f64], values: &[f64], t: f64) -> f64 {
    let hi = times.partition_point(|&x| x < t).clamp(1, times.len() - 1);
    let (t0, t1) = (times[hi - 1], times[hi]);
    let w = ((t - t0) / (t1 - t0)).clamp(0.0, 1.0);
    values[hi - 1] + w * (values[hi] - values[hi - 1])
}

fn dft(values: &[f64]) -> Vec<Complex<f64>> {
    let n = values.len();
    (0..n)
        .map(|k| {
            values
                .iter()
                .enumerate()
                .fold(Complex::new(0.0, 0.0), |acc, (i, &v)| {
                    // reduce k·i first so the phase stays accurate on long series
                    let phase = -2.0 * PI * ((k * i) % n) as f64 / n as f64;
                    acc + Complex::from_polar(v, phase)
                })
        })
        .collect()
}

/// Impedance spectrum of an outlet from its pressure and flow history.
///
/// Series sampled at non-uniform steps are first resampled linearly onto a
/// uniform grid with the same number of points.
///
/// # Errors
///
/// - `LengthMismatch` if the three series differ in length
/// - `InvalidArg` for fewer than four samples or times that do not increase
/// - `NonPhysical` for non-finite samples
pub fn impedance_from_series(
    times: &[f64],
    pressures: &[f64],
    flows: &[f64],
    window: Window,
) -> ModelResult<Vec<ImpedanceSample>> {
    let n = times.len();
    for (what, series) in [("pressures", pressures), ("flows", flows)] {
        if series.len() != n {
            return Err(ModelError::LengthMismatch {
                what,
                expected: n,
                found: series.len(),
            });
        }
    }
    if n < 4 {
        return Err(ModelError::InvalidArg {
            what: "an impedance spectrum needs at least four samples",
        });
    }
    if [times, pressures, flows]
        .iter()
        .any(|s| s.iter().any(|v| !v.is_finite()))
    {
        return Err(ModelError::NonPhysical {
            what: "time series must be finite",
        });
    }
    if times.windows(2).any(|w| w[1] <= w[0]) {
        return Err(ModelError::InvalidArg {
            what: "sample times must be strictly increasing",
        });
    }

    let steps: Vec<f64> = times.windows(2).map(|w| w[1] - w[0]).collect();
    let mean = steps.iter().sum::<f64>() / steps.len() as f64;
    let var = steps.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / steps.len() as f64;

    let (p, q, dt) = if var.sqrt() / mean > NON_UNIFORM_TOL {
        tracing::warn!(
            samples = n,
            "non-uniform sampling, resampling onto a uniform grid"
        );
        let (t0, t1) = (times[0], times[n - 1]);
        let grid: Vec<f64> = (0..n)
            .map(|i| t0 + (t1 - t0) * i as f64 / (n - 1) as f64)
            .collect();
        (
            grid.iter().map(|&t| interpolate(times, pressures, t)).collect(),
            grid.iter().map(|&t| interpolate(times, flows, t)).collect(),
            (t1 - t0) / (n - 1) as f64,
        )
    } else {
        (pressures.to_vec(), flows.to_vec(), mean)
    };

    let taper = window.coefficients(n);
    let tapered = |s: Vec<f64>| -> Vec<f64> {
        s.iter().zip(&taper).map(|(v, w)| v * w).collect()
    };
    let p_hat = dft(&tapered(p));
    let q_hat = dft(&tapered(q));

    let spectrum = (1..=(n - 1) / 2)
        .map(|k| {
            let value = if q_hat[k].norm() > FLOW_FLOOR {
                p_hat[k] / q_hat[k]
            } else {
                Complex::new(0.0, 0.0)
            };
            ImpedanceSample {
                freq_hz: k as f64 / (n as f64 * dt),
                value,
            }
        })
        .collect();
    Ok(spectrum)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulsatile(n: usize, dt: f64) -> (Vec<f64>, Vec<f64>) {
        let times: Vec<f64> = (0..n).map(|i| i as f64 * dt).collect();
        let flows = times
            .iter()
            .map(|t| 1e-5 + 4e-6 * (2.0 * PI * t).sin() + 1e-6 * (6.0 * PI * t).cos())
            .collect();
        (times, flows)
    }

    #[test]
    fn resistor_has_flat_real_spectrum() {
        let r = 1.2e8;
        let (times, flows) = pulsatile(64, 0.025);
        let pressures: Vec<f64> = flows.iter().map(|q| r * q).collect();

        let z = impedance_from_series(&times, &pressures, &flows, Window::Hann).unwrap();
        assert_eq!(z.len(), 31);
        for s in &z {
            assert!((s.value.re - r).abs() / r < 1e-9, "{s:?}");
            assert!(s.value.im.abs() / r < 1e-9);
        }
    }

    #[test]
    fn frequencies_follow_the_record_length() {
        let (times, flows) = pulsatile(10, 0.1);
        let z = impedance_from_series(&times, &flows, &flows, Window::None).unwrap();
        // fundamental is 1/(n·dt), Nyquist bin excluded
        assert_eq!(z.len(), 4);
        assert!((z[0].freq_hz - 1.0).abs() < 1e-12);
        assert!((z[3].freq_hz - 4.0).abs() < 1e-12);
    }

    #[test]
    fn constant_flow_gives_zero_impedance() {
        let times: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let flows = vec![1e-3; 8];
        let pressures = vec![13.0; 8];
        let z = impedance_from_series(&times, &pressures, &flows, Window::None).unwrap();
        assert!(z.iter().all(|s| s.value == Complex::new(0.0, 0.0)));
    }

    #[test]
    fn jittered_sampling_is_resampled() {
        let r = 3.0;
        let times: Vec<f64> = (0..40)
            .map(|i| i as f64 * 0.05 + if i % 2 == 1 { 0.01 } else { 0.0 })
            .collect();
        let flows: Vec<f64> = times.iter().map(|t| (2.0 * PI * t).sin()).collect();
        let pressures: Vec<f64> = flows.iter().map(|q| r * q).collect();

        let z = impedance_from_series(&times, &pressures, &flows, Window::Hann).unwrap();
        let dt = (times[39] - times[0]) / 39.0;
        assert!((z[0].freq_hz - 1.0 / (40.0 * dt)).abs() < 1e-12);
        // interpolation is linear, so p = r·q survives resampling
        assert!(z.iter().all(|s| (s.value.re - r).abs() < 1e-9));
    }

    #[test]
    fn bad_series_are_rejected() {
        let t = [0.0, 1.0, 2.0, 3.0];
        let v = [1.0; 4];
        assert!(matches!(
            impedance_from_series(&t, &v[..3], &v, Window::Hann),
            Err(ModelError::LengthMismatch { .. })
        ));
        assert!(matches!(
            impedance_from_series(&t[..3], &v[..3], &v[..3], Window::Hann),
            Err(ModelError::InvalidArg { .. })
        ));
        assert!(matches!(
            impedance_from_series(&[0.0, 1.0, 1.0, 2.0], &v, &v, Window::Hann),
            Err(ModelError::InvalidArg { .. })
        ));
        assert!(matches!(
            impedance_from_series(&t, &[1.0, f64::NAN, 1.0, 1.0], &v, Window::Hann),
            Err(ModelError::NonPhysical { .. })
        ));
    }

    #[test]
    fn window_names() {
        assert_eq!(Window::parse("hann").unwrap(), Window::Hann);
        assert_eq!(Window::parse("none").unwrap(), Window::None);
        assert!(Window::parse("kaiser").is_err());
        let hann = Window::Hann.coefficients(5);
        assert!(hann[0].abs() < 1e-15 && (hann[2] - 1.0).abs() < 1e-15);
    }
}
