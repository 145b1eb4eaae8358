use clap::{Parser, Subcommand};
use lf_case::{BoundaryDef, Case, ImpedanceDef, StreamFormat, Table};
use lf_core::units::{
    dynamic_from_kinematic, kgpm3, kinematic, kinematic_value, mmhg_value, pa, pa_value,
};
use lf_models::frequency::frequency_response;
use lf_models::{FitOptions, PoleResidueParams, Window, impedance_from_series, vector_fit};
use lf_sim::{
    DriverOptions, FlowWaveform, OutletRecord, SimError, SimResult, checkpoint_case, run_case,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "lf-cli")]
#[command(about = "LumpFlow CLI - Lumped-parameter outlet boundary conditions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate case file syntax and outlet parameters
    Validate {
        /// Path to the case YAML/JSON file
        case_path: PathBuf,
    },
    /// List boundary patches in a case
    Patches {
        /// Path to the case YAML/JSON file
        case_path: PathBuf,
    },
    /// Drive all outlets with a prescribed inflow
    Run {
        /// Path to the case YAML/JSON file or a checkpoint
        case_path: PathBuf,
        /// Time step in seconds
        #[arg(long)]
        dt: f64,
        /// End time in seconds
        #[arg(long)]
        t_end: f64,
        /// Outer iterations per time step
        #[arg(long, default_value_t = 3)]
        outer_iterations: usize,
        /// Mean total outlet flow [m³/s]
        #[arg(long, default_value_t = 1.0e-5)]
        flow_mean: f64,
        /// Amplitude of the sinusoidal flow component [m³/s]
        #[arg(long, default_value_t = 0.0)]
        flow_amplitude: f64,
        /// Period of the flow waveform in seconds
        #[arg(long, default_value_t = 1.0)]
        period: f64,
        /// Write a restart checkpoint to this path
        #[arg(long)]
        checkpoint: Option<PathBuf>,
        /// Store checkpoint scalars as raw bit patterns
        #[arg(long)]
        binary: bool,
        /// Output CSV file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the frequency response of a vector-fitting outlet
    Impedance {
        /// Path to the case YAML/JSON file
        case_path: PathBuf,
        /// Patch name
        patch: String,
        /// Lowest frequency in Hz
        #[arg(long, default_value_t = 0.0)]
        f_min: f64,
        /// Highest frequency in Hz
        #[arg(long, default_value_t = 25.0)]
        f_max: f64,
        /// Number of frequencies
        #[arg(long, default_value_t = 26)]
        points: usize,
    },
    /// Compute an outlet's impedance spectrum from a run CSV
    Extract {
        /// CSV written by `run`
        record_path: PathBuf,
        /// Patch name
        #[arg(long)]
        patch: String,
        /// Ignore samples before this time, to skip start-up transients
        #[arg(long, default_value_t = 0.0)]
        start_time: f64,
        /// Density converting recorded kinematic pressure to Pa [kg/m³]
        #[arg(long, default_value_t = lf_core::units::constants::BLOOD_RHO_KGPM3)]
        rho: f64,
        /// Window: none, hann, hamming or blackman
        #[arg(long, default_value = "hann")]
        window: String,
        /// Output CSV file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fit poles and residues to an impedance spectrum CSV
    Fit {
        /// Spectrum CSV (frequency plus real/imag, magnitude/phase or impedance)
        spectrum_path: PathBuf,
        /// Number of poles
        #[arg(long, default_value_t = 4)]
        n_poles: usize,
        /// Maximum pole relocation passes
        #[arg(long, default_value_t = 20)]
        max_iterations: usize,
        /// Relative pole movement accepted as converged
        #[arg(long, default_value_t = 1e-4)]
        tolerance: f64,
        /// Fluid density [kg/m³]
        #[arg(long, default_value_t = lf_core::units::constants::BLOOD_RHO_KGPM3)]
        rho: f64,
        /// Initial outlet pressure [Pa]
        #[arg(long, default_value_t = 13332.0)]
        p0: f64,
        /// Outlet the fitted boundary is meant for
        #[arg(long, default_value = "outlet")]
        outlet_name: String,
        /// Output YAML file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> SimResult<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { case_path } => cmd_validate(&case_path),
        Commands::Patches { case_path } => cmd_patches(&case_path),
        Commands::Run {
            case_path,
            dt,
            t_end,
            outer_iterations,
            flow_mean,
            flow_amplitude,
            period,
            checkpoint,
            binary,
            output,
        } => {
            let waveform = if flow_amplitude == 0.0 {
                FlowWaveform::Constant { flow: flow_mean }
            } else {
                FlowWaveform::Sine {
                    mean: flow_mean,
                    amplitude: flow_amplitude,
                    period,
                }
            };
            let opts = DriverOptions {
                dt,
                t_end,
                outer_iterations,
                ..DriverOptions::default()
            };
            let format = if binary {
                StreamFormat::Binary
            } else {
                StreamFormat::Ascii
            };
            cmd_run(
                &case_path,
                &waveform,
                opts,
                checkpoint.as_deref().map(|p| (p, format)),
                output.as_deref(),
            )
        }
        Commands::Impedance {
            case_path,
            patch,
            f_min,
            f_max,
            points,
        } => cmd_impedance(&case_path, &patch, f_min, f_max, points),
        Commands::Extract {
            record_path,
            patch,
            start_time,
            rho,
            window,
            output,
        } => cmd_extract(
            &record_path,
            &patch,
            start_time,
            rho,
            &window,
            output.as_deref(),
        ),
        Commands::Fit {
            spectrum_path,
            n_poles,
            max_iterations,
            tolerance,
            rho,
            p0,
            outlet_name,
            output,
        } => {
            let opts = FitOptions {
                n_poles,
                max_iterations,
                tolerance,
            };
            cmd_fit(
                &spectrum_path,
                &opts,
                rho,
                p0,
                &outlet_name,
                output.as_deref(),
            )
        }
    }
}

fn load_case(case_path: &Path) -> SimResult<Case> {
    tracing::debug!(path = %case_path.display(), "loading case");
    Ok(lf_case::load(case_path)?)
}

/// Write `text` to `output`, or to stdout.
fn emit(text: &str, output: Option<&Path>) -> SimResult<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text)?;
            println!("✓ Written to {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn cmd_validate(case_path: &Path) -> SimResult<()> {
    println!("Validating case: {}", case_path.display());
    let case = load_case(case_path)?;
    lf_sim::compile_case(&case)?;
    println!("✓ Case is valid ({} patches)", case.patches.len());
    Ok(())
}

fn cmd_patches(case_path: &Path) -> SimResult<()> {
    let case = load_case(case_path)?;

    if case.patches.is_empty() {
        println!("No patches in case: {}", case.name);
        return Ok(());
    }

    println!("Patches in case '{}':", case.name);
    for patch in &case.patches {
        let area: f64 = patch.faces.areas.iter().sum();
        print!(
            "  {} [{}] faces={} area={:.4e} m²",
            patch.name,
            patch.boundary.kind(),
            patch.faces.areas.len(),
            area
        );
        if let Some(t) = patch.last_update_time {
            print!(" (restart t={t})");
        }
        println!();
    }
    Ok(())
}

/// Latest stored update time, so a checkpoint resumes where it stopped.
fn resume_time(case: &Case) -> f64 {
    case.patches
        .iter()
        .filter_map(|p| p.last_update_time)
        .fold(0.0, f64::max)
}

fn cmd_run(
    case_path: &Path,
    waveform: &FlowWaveform,
    opts: DriverOptions,
    checkpoint: Option<(&Path, StreamFormat)>,
    output: Option<&Path>,
) -> SimResult<()> {
    let case = load_case(case_path)?;
    let opts = DriverOptions {
        start_time: resume_time(&case),
        ..opts
    };

    tracing::info!(
        case = %case.name,
        patches = case.patches.len(),
        "starting outlet run"
    );
    println!(
        "Running '{}' from t={} to t={} s (dt={} s, {} outer iterations)",
        case.name, opts.start_time, opts.t_end, opts.dt, opts.outer_iterations
    );
    let start = Instant::now();
    let (record, boundaries) = run_case(&case, waveform, &opts)?;
    let elapsed = start.elapsed();

    println!("✓ {} steps in {:.2?}", record.t.len(), elapsed);
    let rho = kgpm3(case.fluid.rho);
    for b in &boundaries {
        match b.summary_value() {
            Some(p) if b.updater().updater().needs_flux() => println!(
                "  {} [{}]: p={:.6e} m²/s² ({:.2} mmHg)",
                b.name(),
                b.kind(),
                p,
                mmhg_value(dynamic_from_kinematic(p, rho))
            ),
            Some(u) => println!("  {} [{}]: u_n={:.6e} m/s", b.name(), b.kind(), u),
            None => println!("  {} [{}]: -", b.name(), b.kind()),
        }
    }

    if let Some((path, format)) = checkpoint {
        lf_case::write_checkpoint(path, &checkpoint_case(&case, &boundaries), format)?;
        println!("✓ Checkpoint written to {}", path.display());
    }

    let csv = record.to_csv();
    if let Some(path) = output {
        std::fs::write(path, csv)?;
        println!(
            "✓ Exported {} data points to {}",
            record.t.len(),
            path.display()
        );
    } else {
        print!("{}", csv);
    }

    Ok(())
}

fn cmd_impedance(
    case_path: &Path,
    patch_name: &str,
    f_min: f64,
    f_max: f64,
    points: usize,
) -> SimResult<()> {
    let case = load_case(case_path)?;
    let patch = case
        .patch(patch_name)
        .ok_or_else(|| SimError::UnknownPatch {
            name: patch_name.to_string(),
        })?;
    let BoundaryDef::VectorFittingImpedance(imp) = &patch.boundary else {
        return Err(SimError::InvalidArg {
            what: "impedance requires a vector_fitting_impedance patch",
        });
    };
    let params = PoleResidueParams::new(
        imp.n_poles,
        imp.poles.clone(),
        imp.residues.clone(),
        imp.direct_term,
    )
    .map_err(|source| SimError::Model {
        patch: patch_name.to_string(),
        source,
    })?;

    println!("freq_hz,magnitude,phase_deg,real,imag");
    for sample in frequency_response(&params, f_min, f_max, points) {
        println!(
            "{},{},{},{},{}",
            sample.freq_hz,
            sample.magnitude(),
            sample.phase_rad().to_degrees(),
            sample.value.re,
            sample.value.im
        );
    }
    Ok(())
}

fn cmd_extract(
    record_path: &Path,
    patch: &str,
    start_time: f64,
    rho: f64,
    window: &str,
    output: Option<&Path>,
) -> SimResult<()> {
    let model_err = |source| SimError::Model {
        patch: patch.to_string(),
        source,
    };
    let window = Window::parse(window).map_err(model_err)?;
    let table = lf_case::read_table(record_path)?;

    let times = table.require("time_s")?;
    let pressures = table.require(patch)?;
    let flows = table.require(&OutletRecord::flow_column(patch))?;
    let keep: Vec<usize> = (0..times.len())
        .filter(|&i| times[i] >= start_time)
        .collect();
    tracing::info!(
        patch,
        samples = keep.len(),
        skipped = times.len() - keep.len(),
        "extracting impedance"
    );

    let pick = |v: &[f64]| -> Vec<f64> { keep.iter().map(|&i| v[i]).collect() };
    // recorded pressure is kinematic
    let pressures: Vec<f64> = pick(&pressures)
        .into_iter()
        .map(|p| pa_value(dynamic_from_kinematic(p, kgpm3(rho))))
        .collect();
    let spectrum = impedance_from_series(&pick(&times), &pressures, &pick(&flows), window)
        .map_err(model_err)?;

    if let (Some(first), Some(last)) = (spectrum.first(), spectrum.last()) {
        eprintln!(
            "{} frequencies from {:.4} to {:.4} Hz",
            spectrum.len(),
            first.freq_hz,
            last.freq_hz
        );
    }
    emit(&lf_case::impedance_table(&spectrum).to_csv(), output)
}

fn cmd_fit(
    spectrum_path: &Path,
    opts: &FitOptions,
    rho: f64,
    p0: f64,
    outlet_name: &str,
    output: Option<&Path>,
) -> SimResult<()> {
    let table: Table = lf_case::read_table(spectrum_path)?;
    let samples = lf_case::impedance_samples(&table)?;
    let fit = vector_fit(&samples, opts).map_err(|source| SimError::Model {
        patch: outlet_name.to_string(),
        source,
    })?;

    eprintln!(
        "{} poles, {} iterations{}, RMS error {:.4e} ({:.2}%)",
        fit.params.n_poles(),
        fit.iterations,
        if fit.converged { "" } else { " (not converged)" },
        fit.rms_error,
        100.0 * fit.relative_error(&samples)
    );

    let boundary = BoundaryDef::VectorFittingImpedance(ImpedanceDef {
        phi: "phi".to_string(),
        u: "U".to_string(),
        coupling_mode: "implicit".to_string(),
        n_poles: fit.params.n_poles(),
        poles: fit.params.poles,
        residues: fit.params.residues,
        direct_term: fit.params.direct_term,
        rho,
        impedance_units: "dynamic".to_string(),
        q_1: 0.0,
        state_variables: None,
        value: Some(kinematic_value(kinematic(pa(p0), kgpm3(rho)))),
    });
    let block = BTreeMap::from([("boundary", boundary)]);
    let yaml = serde_yaml::to_string(&block).map_err(lf_case::CaseError::from)?;
    emit(&format!("# {outlet_name}\n{yaml}"), output)
}
