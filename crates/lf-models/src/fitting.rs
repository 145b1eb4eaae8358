//! Vector fitting of an impedance spectrum to a pole-residue model.
//!
//! Fits `Z(s) = d + Σ r_i/(s - p_i)` with real, stable poles by iterated
//! pole relocation (Gustavsen & Semlyen, 1999). Each pass solves a linear
//! least-squares problem for a scaling function `σ(s) = 1 + Σ r̃_i/(s - a_i)`
//! whose zeros become the next poles; residues and the direct term are then
//! fitted against the settled poles.

use crate::error::{ModelError, ModelResult};
use crate::frequency::{ImpedanceSample, impedance_at};
use crate::pole_residue::PoleResidueParams;
use nalgebra::{Complex, DMatrix, DVector, SVD, Schur};
use std::f64::consts::PI;

/// Singular values below this (after column scaling) are treated as zero.
const RANK_EPS: f64 = 1e-12;

/// Iteration cap for the SVD and Schur decompositions.
const MAX_NITER: usize = 10_000;

/// Vector fitting settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    /// Order of the fit.
    pub n_poles: usize,
    pub max_iterations: usize,
    /// Largest relative pole movement accepted as converged.
    pub tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            n_poles: 4,
            max_iterations: 20,
            tolerance: 1e-4,
        }
    }
}

/// Outcome of [`vector_fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub params: PoleResidueParams,
    /// Relocation passes run.
    pub iterations: usize,
    pub converged: bool,
    /// `sqrt(mean |Z - Z_fit|²)` over the input samples.
    pub rms_error: f64,
}

impl FitResult {
    /// RMS error relative to the mean sample magnitude.
    pub fn relative_error(&self, samples: &[ImpedanceSample]) -> f64 {
        let mean = samples.iter().map(|s| s.magnitude()).sum::<f64>() / samples.len() as f64;
        self.rms_error / mean
    }
}

/// `1/(s - a)` for a real pole `a`.
fn basis(s: Complex<f64>, pole: f64) -> Complex<f64> {
    (s - pole).inv()
}

/// Stack complex rows as `[re; im]` so the solve stays real.
fn stack_rows(
    points: &[(Complex<f64>, Complex<f64>)],
    cols: usize,
    entry: impl Fn(Complex<f64>, Complex<f64>, usize) -> Complex<f64>,
) -> (DMatrix<f64>, DVector<f64>) {
    let k = points.len();
    let mut a = DMatrix::zeros(2 * k, cols);
    let mut b = DVector::zeros(2 * k);
    for (row, &(s, z)) in points.iter().enumerate() {
        for col in 0..cols {
            let v = entry(s, z, col);
            a[(row, col)] = v.re;
            a[(k + row, col)] = v.im;
        }
        b[row] = z.re;
        b[k + row] = z.im;
    }
    (a, b)
}

/// Least squares with unit-norm columns, since residue and `σ` columns
/// can differ by many orders of magnitude.
fn least_squares(mut a: DMatrix<f64>, b: &DVector<f64>) -> ModelResult<DVector<f64>> {
    let scale: Vec<f64> = a
        .column_iter()
        .map(|c| match c.norm() {
            n if n > 0.0 => n.recip(),
            _ => 1.0,
        })
        .collect();
    for (j, &s) in scale.iter().enumerate() {
        a.column_mut(j).scale_mut(s);
    }
    let svd = SVD::try_new(a, true, true, f64::EPSILON, MAX_NITER).ok_or(
        ModelError::FitFailed {
            what: "singular value decomposition did not converge",
        },
    )?;
    let x = svd
        .solve(b, RANK_EPS)
        .map_err(|_| ModelError::FitFailed {
            what: "least-squares solve failed",
        })?;
    Ok(x.component_mul(&DVector::from_vec(scale)))
}

/// One relocation pass: the zeros of the fitted `σ(s)`.
fn relocate(points: &[(Complex<f64>, Complex<f64>)], poles: &[f64]) -> ModelResult<Vec<f64>> {
    let n = poles.len();
    let (a, b) = stack_rows(points, 2 * n + 1, |s, z, col| match col {
        c if c < n => basis(s, poles[c]),
        c if c == n => Complex::new(1.0, 0.0),
        c => -z * basis(s, poles[c - n - 1]),
    });
    let x = least_squares(a, &b)?;
    let sigma = x.rows(n + 1, n);

    // zeros of σ are the eigenvalues of diag(a) - 1·r̃ᵀ
    let m = DMatrix::from_fn(n, n, |i, j| {
        let diag = if i == j { poles[i] } else { 0.0 };
        diag - sigma[j]
    });
    let eig = Schur::try_new(m, f64::EPSILON, MAX_NITER)
        .ok_or(ModelError::FitFailed {
            what: "pole relocation did not converge",
        })?
        .complex_eigenvalues();

    let mut relocated: Vec<f64> = eig
        .iter()
        .zip(poles)
        .map(|(e, &old)| match e.re.abs() {
            // a zero on the imaginary axis carries no decay; keep the old pole
            r if r > 0.0 && r.is_finite() => -r,
            _ => old,
        })
        .collect();
    relocated.sort_by(|a, b| b.total_cmp(a));
    Ok(relocated)
}

/// Direct term and residues for fixed poles.
fn fit_residues(
    points: &[(Complex<f64>, Complex<f64>)],
    poles: &[f64],
) -> ModelResult<(f64, Vec<f64>)> {
    let (a, b) = stack_rows(points, poles.len() + 1, |s, _, col| match col {
        0 => Complex::new(1.0, 0.0),
        c => basis(s, poles[c - 1]),
    });
    let x = least_squares(a, &b)?;
    Ok((x[0], x.iter().skip(1).copied().collect()))
}

/// Initial poles: `-ω` spaced logarithmically over the sampled band.
fn starting_poles(samples: &[ImpedanceSample], n: usize) -> ModelResult<Vec<f64>> {
    let omega_min = samples
        .iter()
        .map(|s| 2.0 * PI * s.freq_hz)
        .find(|&w| w > 0.0)
        .ok_or(ModelError::InvalidArg {
            what: "vector fitting needs at least one positive frequency",
        })?;
    let omega_max = samples
        .iter()
        .map(|s| 2.0 * PI * s.freq_hz)
        .fold(omega_min, f64::max);

    let (lo, hi) = (omega_min.log10(), omega_max.log10());
    Ok((0..n)
        .map(|i| {
            let t = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
            -10f64.powf(lo + t * (hi - lo))
        })
        .collect())
}

/// Fit a pole-residue impedance to `samples`.
///
/// # Errors
///
/// - `InvalidArg` for a zero order, too few samples for the order, negative
///   frequencies or no positive frequency at all
/// - `NonPhysical` for non-finite samples
/// - `FitFailed` if a decomposition does not converge
pub fn vector_fit(samples: &[ImpedanceSample], opts: &FitOptions) -> ModelResult<FitResult> {
    let n = opts.n_poles;
    if n == 0 {
        return Err(ModelError::InvalidArg {
            what: "fit order must be at least one",
        });
    }
    // 2K real equations for 2N+1 relocation unknowns
    if 2 * samples.len() < 2 * n + 1 {
        return Err(ModelError::InvalidArg {
            what: "too few frequency samples for the fit order",
        });
    }
    if samples
        .iter()
        .any(|s| !s.freq_hz.is_finite() || !s.value.re.is_finite() || !s.value.im.is_finite())
    {
        return Err(ModelError::NonPhysical {
            what: "impedance samples must be finite",
        });
    }
    if samples.iter().any(|s| s.freq_hz < 0.0) {
        return Err(ModelError::InvalidArg {
            what: "frequencies must not be negative",
        });
    }

    let points: Vec<_> = samples
        .iter()
        .map(|s| (Complex::new(0.0, 2.0 * PI * s.freq_hz), s.value))
        .collect();

    let mut poles = starting_poles(samples, n)?;
    tracing::debug!(order = n, samples = samples.len(), ?poles, "vector fitting");

    let mut iterations = 0;
    let mut converged = false;
    while iterations < opts.max_iterations {
        iterations += 1;
        let next = relocate(&points, &poles)?;
        let change = next
            .iter()
            .zip(&poles)
            .map(|(new, old)| ((new - old) / old).abs())
            .fold(0.0, f64::max);
        poles = next;
        tracing::trace!(iteration = iterations, change, "poles relocated");
        if change < opts.tolerance {
            converged = true;
            break;
        }
    }
    if !converged {
        tracing::warn!(
            iterations,
            "vector fitting reached the iteration limit before poles settled"
        );
    }

    let (direct_term, residues) = fit_residues(&points, &poles)?;
    let params = PoleResidueParams::new(n, poles, residues, direct_term)?;
    let rms_error = (samples
        .iter()
        .map(|s| (s.value - impedance_at(&params, s.freq_hz)).norm_sqr())
        .sum::<f64>()
        / samples.len() as f64)
        .sqrt();

    tracing::info!(
        order = n,
        iterations,
        converged,
        rms_error,
        "vector fit finished"
    );
    Ok(FitResult {
        params,
        iterations,
        converged,
        rms_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::frequency_response;

    fn assert_rel(a: f64, b: f64, tol: f64) {
        assert!(((a - b) / b).abs() < tol, "{a} vs {b}");
    }

    #[test]
    fn recovers_a_known_two_pole_model() {
        let truth = PoleResidueParams::new(2, vec![-5.0, -40.0], vec![2.0, 30.0], 0.5).unwrap();
        let samples = frequency_response(&truth, 0.0, 25.0, 51);
        let opts = FitOptions {
            n_poles: 2,
            ..FitOptions::default()
        };

        let fit = vector_fit(&samples, &opts).unwrap();
        assert!(fit.converged);
        assert_rel(fit.params.poles[0], -5.0, 1e-6);
        assert_rel(fit.params.poles[1], -40.0, 1e-6);
        assert_rel(fit.params.residues[0], 2.0, 1e-6);
        assert_rel(fit.params.residues[1], 30.0, 1e-6);
        assert_rel(fit.params.direct_term, 0.5, 1e-6);
        assert!(fit.relative_error(&samples) < 1e-8);
    }

    #[test]
    fn recovers_outlet_scale_impedance() {
        let truth =
            PoleResidueParams::new(2, vec![-5.0, -40.0], vec![4.0e8, 1.5e9], 1.0e7).unwrap();
        let samples = frequency_response(&truth, 0.1, 20.0, 60);
        let opts = FitOptions {
            n_poles: 2,
            ..FitOptions::default()
        };

        let fit = vector_fit(&samples, &opts).unwrap();
        assert_rel(fit.params.poles[0], -5.0, 1e-5);
        assert_rel(fit.params.poles[1], -40.0, 1e-5);
        assert_rel(fit.params.direct_term, 1.0e7, 1e-5);
        assert!(fit.relative_error(&samples) < 1e-6);
    }

    #[test]
    fn fitted_poles_are_stable() {
        // a single-pole fit of a two-pole response cannot be exact
        let truth = PoleResidueParams::new(2, vec![-3.0, -90.0], vec![1.0, 40.0], 0.1).unwrap();
        let samples = frequency_response(&truth, 0.2, 30.0, 40);
        let opts = FitOptions {
            n_poles: 1,
            ..FitOptions::default()
        };

        let fit = vector_fit(&samples, &opts).unwrap();
        assert!(fit.params.poles.iter().all(|&p| p < 0.0));
        assert!(fit.rms_error > 0.0);
    }

    #[test]
    fn starting_poles_span_the_band() {
        let samples: Vec<_> = [0.0, 1.0, 10.0, 100.0]
            .iter()
            .map(|&f| ImpedanceSample {
                freq_hz: f,
                value: Complex::new(1.0, 0.0),
            })
            .collect();
        let poles = starting_poles(&samples, 3).unwrap();
        assert_rel(poles[0], -2.0 * PI, 1e-12);
        assert_rel(poles[1], -20.0 * PI, 1e-12);
        assert_rel(poles[2], -200.0 * PI, 1e-12);
    }

    #[test]
    fn rejects_unusable_input() {
        let one = [ImpedanceSample {
            freq_hz: 1.0,
            value: Complex::new(1.0, 0.0),
        }];
        assert!(matches!(
            vector_fit(&one, &FitOptions::default()),
            Err(ModelError::InvalidArg { .. })
        ));
        assert!(matches!(
            vector_fit(
                &one,
                &FitOptions {
                    n_poles: 0,
                    ..FitOptions::default()
                }
            ),
            Err(ModelError::InvalidArg { .. })
        ));

        let dc_only = vec![
            ImpedanceSample {
                freq_hz: 0.0,
                value: Complex::new(1.0, 0.0),
            };
            4
        ];
        let opts = FitOptions {
            n_poles: 1,
            ..FitOptions::default()
        };
        assert!(matches!(
            vector_fit(&dc_only, &opts),
            Err(ModelError::InvalidArg { .. })
        ));

        let mut bad = dc_only;
        bad[1].freq_hz = 1.0;
        bad[2].value = Complex::new(f64::NAN, 0.0);
        assert!(matches!(
            vector_fit(&bad, &opts),
            Err(ModelError::NonPhysical { .. })
        ));
    }
}
