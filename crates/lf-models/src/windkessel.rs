//! Three-element Windkessel outlet (R, C, Z).
//!
//! The lumped circuit obeys
//!
//! ```text
//! C·dp/dt + p/R = Q·(1 + Z/R) + Z·C·dQ/dt
//! ```
//!
//! and is advanced once per timestep with a backward-difference stencil of
//! order 1, 2 or 3 applied to both `dp/dt` and `dQ/dt`.

use crate::history::ShiftRegister;
use serde::{Deserialize, Serialize};

/// Backward-difference order of the time discretization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FdOrder {
    #[default]
    First,
    Second,
    Third,
}

impl FdOrder {
    /// Map a configured order label onto a stencil.
    ///
    /// Unsupported labels fall back to first order with a warning.
    pub fn from_label(order: u32) -> Self {
        match order {
            1 => FdOrder::First,
            2 => FdOrder::Second,
            3 => FdOrder::Third,
            other => {
                tracing::warn!(
                    order = other,
                    "unsupported Windkessel order, falling back to first order"
                );
                FdOrder::First
            }
        }
    }

    pub fn label(self) -> u32 {
        match self {
            FdOrder::First => 1,
            FdOrder::Second => 2,
            FdOrder::Third => 3,
        }
    }

    /// Backward-difference weights for (current, -1, -2, -3), to be divided by dt.
    pub fn weights(self) -> [f64; 4] {
        match self {
            FdOrder::First => [1.0, -1.0, 0.0, 0.0],
            FdOrder::Second => [1.5, -2.0, 0.5, 0.0],
            FdOrder::Third => [11.0 / 6.0, -3.0, 1.5, -1.0 / 3.0],
        }
    }
}

/// Circuit parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindkesselParams {
    /// Distal resistance.
    pub r: f64,
    /// Compliance.
    pub c: f64,
    /// Characteristic (proximal) impedance.
    pub z: f64,
}

/// Committed history of a Windkessel outlet.
///
/// `pressure.lag(0)` is the last applied boundary pressure (`p0`), followed by
/// `p_1` and `p_2`. `flow.lag(0)` is the flow of the last committed step (`q_1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindkesselHistory {
    pub pressure: ShiftRegister<3>,
    pub flow: ShiftRegister<3>,
}

impl WindkesselHistory {
    /// History from explicit initial values, newest first.
    pub fn new(pressure: [f64; 3], flow: [f64; 3]) -> Self {
        Self {
            pressure: ShiftRegister::new(pressure),
            flow: ShiftRegister::new(flow),
        }
    }

    pub fn p0(&self) -> f64 {
        self.pressure.lag(0)
    }
}

/// Windkessel pressure outlet.
#[derive(Debug, Clone, PartialEq)]
pub struct Windkessel {
    pub params: WindkesselParams,
    pub order: FdOrder,
    history: WindkesselHistory,
}

impl Windkessel {
    pub fn new(params: WindkesselParams, order: FdOrder, history: WindkesselHistory) -> Self {
        Self {
            params,
            order,
            history,
        }
    }

    pub fn history(&self) -> &WindkesselHistory {
        &self.history
    }

    /// Pressure currently imposed on the patch.
    pub fn pressure(&self) -> f64 {
        self.history.p0()
    }

    /// Solve for the pressure that would follow a step with flow `q`, without committing.
    pub fn predict(&self, q: f64, dt: f64) -> f64 {
        let WindkesselParams { r, c, z } = self.params;
        let w = self.order.weights();
        let p = &self.history.pressure;
        let qh = &self.history.flow;

        let dq_dt = (w[0] * q + w[1] * qh.lag(0) + w[2] * qh.lag(1) + w[3] * qh.lag(2)) / dt;
        let q_source = (q / c) * (1.0 + z / r) + z * dq_dt;
        let p_grad_part = (w[1] * p.lag(0) + w[2] * p.lag(1) + w[3] * p.lag(2)) / dt;
        let p_denom = w[0] / dt + 1.0 / (r * c);

        (q_source - p_grad_part) / p_denom
    }

    /// Advance one timestep with measured flow `q` and return the new pressure.
    ///
    /// History is shifted only after the pressure has been computed.
    pub fn advance(&mut self, q: f64, dt: f64) -> f64 {
        let p_new = self.predict(q, dt);
        self.history.flow.push(q);
        self.history.pressure.push(p_new);
        p_new
    }

    /// Steady-state pressure for constant flow `q`.
    pub fn steady_pressure(&self, q: f64) -> f64 {
        q * (self.params.r + self.params.z)
    }
}
