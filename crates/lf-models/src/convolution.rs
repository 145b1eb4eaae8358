//! Exact one-step integration of a single real pole.
//!
//! Each pole-residue pair is the linear system `dz/dt = p·z + r·Q`. With `Q`
//! held constant over a step of length `dt` the solution is
//!
//! ```text
//! z(t+dt) = exp(p·dt)·z(t) + r·Q·(exp(p·dt) - 1)/p
//! ```
//!
//! Both the state update and the implicit-coupling sensitivity use
//! [`PoleStep`], so they always agree on the convolution weight.

/// Below this `|p·dt|` the closed-form weight loses digits to cancellation.
pub const TAYLOR_THRESHOLD: f64 = 1e-6;

/// Decay factor and convolution weight of one pole over one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoleStep {
    /// `exp(p·dt)`, in (0, 1) for a stable pole.
    pub decay: f64,
    /// `(exp(p·dt) - 1)/p`, or its second-order Taylor expansion.
    pub weight: f64,
}

impl PoleStep {
    pub fn new(pole: f64, dt: f64) -> Self {
        let pdt = pole * dt;
        let decay = pdt.exp();
        let weight = if pdt.abs() < TAYLOR_THRESHOLD {
            // (e^x - 1)/x ≈ 1 + x/2 + x²/6
            dt * (1.0 + 0.5 * pdt + pdt * pdt / 6.0)
        } else {
            (decay - 1.0) / pole
        };
        Self { decay, weight }
    }

    /// Advance accumulator `z` under constant flow `q` with residue `r`.
    #[inline]
    pub fn advance(&self, z: f64, residue: f64, q: f64) -> f64 {
        self.decay * z + residue * q * self.weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analytic(pole: f64, residue: f64, q: f64, t: f64) -> f64 {
        // z(0) = 0, constant q
        residue * q * ((pole * t).exp() - 1.0) / pole
    }

    #[test]
    fn matches_analytic_solution_standard_branch() {
        let (pole, residue, q, dt) = (-50.0, 3.0, 2.0, 1e-3);
        let step = PoleStep::new(pole, dt);
        assert!((pole * dt).abs() >= TAYLOR_THRESHOLD);

        let mut z = 0.0;
        for k in 1..=200 {
            z = step.advance(z, residue, q);
            let exact = analytic(pole, residue, q, k as f64 * dt);
            assert!((z - exact).abs() <= 1e-12 * exact.abs().max(1.0), "k={k}");
        }
    }

    #[test]
    fn matches_analytic_solution_taylor_branch() {
        let (pole, residue, q, dt) = (-1e-4, 5.0, 1.5, 1e-3);
        let step = PoleStep::new(pole, dt);
        assert!((pole * dt).abs() < TAYLOR_THRESHOLD);

        let mut z = 0.0;
        for k in 1..=1000 {
            z = step.advance(z, residue, q);
            let t = k as f64 * dt;
            // expm1 keeps the reference accurate at tiny arguments
            let exact = residue * q * (pole * t).exp_m1() / pole;
            assert!((z - exact).abs() <= 1e-12 * exact.abs(), "k={k}");
        }
    }

    #[test]
    fn weight_is_continuous_across_branch() {
        let dt = 1.0;
        let below = PoleStep::new(-(TAYLOR_THRESHOLD * (1.0 - 1e-9)), dt);
        let above = PoleStep::new(-(TAYLOR_THRESHOLD * (1.0 + 1e-9)), dt);
        assert!((below.weight - above.weight).abs() < 1e-9);
    }

    #[test]
    fn decay_is_bounded_for_stable_pole() {
        let step = PoleStep::new(-10.0, 0.01);
        assert!(step.decay > 0.0 && step.decay < 1.0);
        assert!(step.weight > 0.0 && step.weight < 0.01);
    }
}
