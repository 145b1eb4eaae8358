//! Frequency response of a fitted pole-residue impedance.

use crate::pole_residue::PoleResidueParams;
use nalgebra::Complex;
use std::f64::consts::PI;

/// Impedance evaluated at one frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpedanceSample {
    pub freq_hz: f64,
    pub value: Complex<f64>,
}

impl ImpedanceSample {
    pub fn magnitude(&self) -> f64 {
        self.value.norm()
    }

    pub fn phase_rad(&self) -> f64 {
        self.value.arg()
    }
}

/// `Z(jω) = d + Σ r_i/(jω - p_i)` at `freq_hz`.
pub fn impedance_at(params: &PoleResidueParams, freq_hz: f64) -> Complex<f64> {
    let s = Complex::new(0.0, 2.0 * PI * freq_hz);
    params
        .poles
        .iter()
        .zip(&params.residues)
        .fold(Complex::new(params.direct_term, 0.0), |acc, (&p, &r)| {
            acc + Complex::new(r, 0.0) / (s - Complex::new(p, 0.0))
        })
}

/// Evaluate `points` frequencies spaced linearly in `[f_min, f_max]`.
pub fn frequency_response(
    params: &PoleResidueParams,
    f_min: f64,
    f_max: f64,
    points: usize,
) -> Vec<ImpedanceSample> {
    match points {
        0 => Vec::new(),
        1 => vec![ImpedanceSample {
            freq_hz: f_min,
            value: impedance_at(params, f_min),
        }],
        n => {
            let df = (f_max - f_min) / (n - 1) as f64;
            (0..n)
                .map(|i| {
                    let freq_hz = f_min + df * i as f64;
                    ImpedanceSample {
                        freq_hz,
                        value: impedance_at(params, freq_hz),
                    }
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_impedance_is_direct_minus_residue_over_pole() {
        let params = PoleResidueParams::new(2, vec![-2.0, -5.0], vec![4.0, 10.0], 1.0).unwrap();
        let z0 = impedance_at(&params, 0.0);
        // 1 + 4/2 + 10/5
        assert!((z0.re - 5.0).abs() < 1e-12);
        assert!(z0.im.abs() < 1e-12);
    }

    #[test]
    fn high_frequency_tends_to_direct_term() {
        let params = PoleResidueParams::new(1, vec![-1.0], vec![3.0], 0.7).unwrap();
        let z = impedance_at(&params, 1e9);
        assert!((z.re - 0.7).abs() < 1e-6);
    }

    #[test]
    fn sweep_is_linear() {
        let params = PoleResidueParams::new(1, vec![-1.0], vec![1.0], 0.0).unwrap();
        let sweep = frequency_response(&params, 0.0, 10.0, 11);
        assert_eq!(sweep.len(), 11);
        assert!((sweep[3].freq_hz - 3.0).abs() < 1e-12);
        assert!(sweep[0].magnitude() > sweep[10].magnitude());
        assert!(frequency_response(&params, 0.0, 10.0, 0).is_empty());
    }
}
