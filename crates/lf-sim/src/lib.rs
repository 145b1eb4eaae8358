//! Outlet adapter layer for lumpflow.
//!
//! Provides:
//! - Field registry with partitioned face fields and global flux reduction
//! - Patch geometry and solver clock
//! - Compilation of case records into live outlets, and checkpoint back
//! - Driver loop with outer iterations standing in for the host solver

pub mod clock;
pub mod compile;
pub mod coupling;
pub mod driver;
pub mod error;
pub mod patch;
pub mod registry;

pub use clock::SolverClock;
pub use compile::{build_updater, checkpoint_case, compile_case};
pub use coupling::PatchBoundary;
pub use driver::{DriverOptions, FlowWaveform, OutletRecord, run_outlets};
pub use error::{SimError, SimResult};
pub use patch::Patch;
pub use registry::FieldRegistry;

use lf_case::Case;

/// Compile `case` and drive it, returning the record and the final outlets.
///
/// The published `rho` property is taken from the case's fluid.
pub fn run_case(
    case: &Case,
    waveform: &FlowWaveform,
    opts: &DriverOptions,
) -> SimResult<(OutletRecord, Vec<PatchBoundary>)> {
    let opts = DriverOptions {
        rho: case.fluid.rho,
        ..opts.clone()
    };
    let mut boundaries = compile_case(case)?;
    let record = run_outlets(&mut boundaries, waveform, &opts)?;
    Ok((record, boundaries))
}
