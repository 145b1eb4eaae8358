use crate::LfError;

/// Floating point type used throughout the system.
pub type Real = f64;

/// Time-marker tolerance; two solver times closer than this are the same step.
pub const SMALL: Real = 1e-15;

/// Sentinel magnitude for "never happened" markers.
pub const GREAT: Real = 1e15;

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, LfError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(LfError::NonFinite { what, value: v })
    }
}

/// Same-step test used by every update guard.
#[inline]
pub fn same_time(a: Real, b: Real) -> bool {
    (a - b).abs() < SMALL
}
