//! lf-core: stable foundation for lumpflow.
//!
//! Contains:
//! - units (uom SI types + constructors, kinematic pressure conversion)
//! - numeric (Real + float helpers + solver epsilons)
//! - ids (compact patch IDs)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

pub use error::{LfError, LfResult};
pub use ids::*;
pub use numeric::*;
pub use units::*;
