//! Outlet driver: a stand-in for the host solver's time loop.
//!
//! Each timestep the driver writes a prescribed inflow into the field
//! registry, then runs several outer iterations in which every outlet is
//! evaluated and its face coefficients assembled, as a segregated
//! pressure-velocity loop would. Later outer iterations see a drifting flux;
//! the outlets must ignore it.

use crate::clock::SolverClock;
use crate::coupling::PatchBoundary;
use crate::error::{SimError, SimResult};
use crate::registry::{FieldRegistry, partition_ranges};
use lf_models::FaceCoeffs;
use nalgebra::Vector3;
use std::f64::consts::PI;

/// Relative flux drift applied per outer iteration after the first.
const OUTER_DRIFT: f64 = 0.01;

/// Tangential speed as a fraction of the normal speed on velocity outlets.
const SWIRL: f64 = 0.1;

/// Total flow entering the outlets over time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlowWaveform {
    Constant { flow: f64 },
    Sine { mean: f64, amplitude: f64, period: f64 },
}

impl FlowWaveform {
    pub fn at(&self, t: f64) -> f64 {
        match *self {
            FlowWaveform::Constant { flow } => flow,
            FlowWaveform::Sine {
                mean,
                amplitude,
                period,
            } => mean + amplitude * (2.0 * PI * t / period).sin(),
        }
    }
}

/// Options for driver runs.
#[derive(Clone, Debug)]
pub struct DriverOptions {
    /// Fixed time step (seconds)
    pub dt: f64,
    /// Time the run starts from (seconds)
    pub start_time: f64,
    /// Final simulation time (seconds)
    pub t_end: f64,
    /// Outer iterations per timestep
    pub outer_iterations: usize,
    /// Maximum number of steps (safety limit)
    pub max_steps: usize,
    /// Record every N-th step (decimation)
    pub record_every: usize,
    /// Parallel partitions each patch's faces are split into
    pub partitions: usize,
    /// Fluid density published as the `rho` property
    pub rho: f64,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            dt: 1e-3,
            start_time: 0.0,
            t_end: 1.0,
            outer_iterations: 3,
            max_steps: 100_000,
            record_every: 1,
            partitions: 2,
            rho: lf_core::units::constants::BLOOD_RHO_KGPM3,
        }
    }
}

/// Recorded outlet history.
#[derive(Clone, Debug, Default)]
pub struct OutletRecord {
    pub patches: Vec<String>,
    /// Time points (seconds)
    pub t: Vec<f64>,
    /// One summary value per patch at each time point
    pub values: Vec<Vec<f64>>,
    /// Flow each patch was updated with at each time point [m³/s]
    pub flows: Vec<Vec<f64>>,
    /// Coefficients assembled in the final outer iteration
    pub coeffs: Vec<Option<FaceCoeffs>>,
}

impl OutletRecord {
    /// Name of the flow column of `patch` in [`Self::to_csv`].
    pub fn flow_column(patch: &str) -> String {
        format!("{patch}_flow")
    }

    /// `time_s`, one value column per patch, then one flow column per patch.
    pub fn to_csv(&self) -> String {
        let mut csv = String::from("time_s");
        for name in &self.patches {
            csv.push(',');
            csv.push_str(name);
        }
        for name in &self.patches {
            csv.push(',');
            csv.push_str(&Self::flow_column(name));
        }
        csv.push('\n');
        for ((t, row), flows) in self.t.iter().zip(&self.values).zip(&self.flows) {
            csv.push_str(&t.to_string());
            for v in row.iter().chain(flows) {
                csv.push_str(&format!(",{v}"));
            }
            csv.push('\n');
        }
        csv
    }
}

fn tangent(n: &Vector3<f64>) -> Vector3<f64> {
    let e = if n.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    (e - n * n.dot(&e)).normalize()
}

/// Share of the total flow each patch receives, in proportion to its area.
fn flow_shares(boundaries: &[PatchBoundary]) -> Vec<f64> {
    let total_area: f64 = boundaries.iter().map(|b| b.patch.area()).sum();
    boundaries
        .iter()
        .map(|b| b.patch.area() / total_area)
        .collect()
}

/// Publish the flow of one outer iteration into `registry`.
///
/// The total flow is shared between patches in proportion to their area and
/// spread over faces the same way.
fn publish_fields(
    registry: &mut FieldRegistry,
    boundaries: &[PatchBoundary],
    flow: f64,
    partitions: usize,
) {
    let total_area: f64 = boundaries.iter().map(|b| b.patch.area()).sum();
    for b in boundaries {
        let patch = &b.patch;
        let speed = flow / total_area;

        if let Some(field) = b.flux_field() {
            let face_flux: Vec<f64> = patch.face_areas().iter().map(|a| speed * a).collect();
            let parts = partition_ranges(patch.n_faces(), partitions)
                .into_iter()
                .map(|r| face_flux[r].to_vec())
                .collect();
            registry.set_face_scalar(field, &patch.name, parts);
        }
        if let Some(field) = b.velocity_field() {
            let velocity = patch
                .normals()
                .iter()
                .map(|n| n * speed + tangent(n) * (SWIRL * speed.abs()))
                .collect();
            registry.set_patch_internal(field, &patch.name, velocity);
        }
    }
}

/// Drive `boundaries` from `opts.start_time` to `opts.t_end`.
pub fn run_outlets(
    boundaries: &mut [PatchBoundary],
    waveform: &FlowWaveform,
    opts: &DriverOptions,
) -> SimResult<OutletRecord> {
    if opts.t_end < opts.start_time {
        return Err(SimError::InvalidArg {
            what: "t_end must not precede the start time",
        });
    }
    if opts.outer_iterations == 0 {
        return Err(SimError::InvalidArg {
            what: "outer_iterations must be positive",
        });
    }
    if opts.max_steps == 0 || opts.record_every == 0 {
        return Err(SimError::InvalidArg {
            what: "max_steps and record_every must be positive",
        });
    }

    let mut clock = SolverClock::new(opts.start_time, opts.dt)?;
    let mut registry = FieldRegistry::new();
    registry.set_property("rho", opts.rho);

    let mut record = OutletRecord {
        patches: boundaries.iter().map(|b| b.name().to_string()).collect(),
        ..OutletRecord::default()
    };
    let shares = flow_shares(boundaries);

    while clock.time() + 0.5 * clock.dt() < opts.t_end && clock.step() < opts.max_steps {
        clock.advance();
        let ctx = clock.context();
        let flow = waveform.at(ctx.time);

        let mut coeffs = Vec::with_capacity(boundaries.len());
        for k in 0..opts.outer_iterations {
            let drift = 1.0 + OUTER_DRIFT * k as f64;
            publish_fields(&mut registry, boundaries, flow * drift, opts.partitions);

            coeffs.clear();
            for b in boundaries.iter_mut() {
                b.evaluate(ctx, &registry)?;
                coeffs.push(b.face_coeffs());
            }
        }

        if clock.step() % opts.record_every == 0 {
            record.t.push(ctx.time);
            record.values.push(
                boundaries
                    .iter()
                    .map(|b| b.summary_value().unwrap_or(f64::NAN))
                    .collect(),
            );
            // only the first outer iteration's flow reaches the outlets
            record.flows.push(shares.iter().map(|s| flow * s).collect());
        }
        record.coeffs = coeffs;
    }

    tracing::info!(
        steps = clock.step(),
        time = clock.time(),
        patches = boundaries.len(),
        "outlet run finished"
    );

    Ok(record)
}
