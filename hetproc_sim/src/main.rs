//! Heterogeneous processor simulator CLI
//!
//! Boots a preset board on host-accelerated cores and switches to the
//! atomic model on guest exit events.

use clap::Parser;
use hetproc_sim::{Experiment, RunReport, SimConfig, SystemConfig, Workload};
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Switchable heterogeneous processor simulator
#[derive(Parser, Debug)]
#[command(name = "hetproc-sim")]
#[command(about = "Run a workload on a switchable heterogeneous board", long_about = None)]
struct Args {
    /// System preset: 0-4, -1, -2 or a preset name
    #[arg(short = 'S', long, env = "SYSTEM_CONFIG", default_value = "0", allow_hyphen_values = true)]
    system: String,

    /// Workload name
    #[arg(short, long, env = "SYS_WORKLOAD", default_value = "trace")]
    workload: String,

    /// Instructions retired by the workload
    #[arg(short, long, default_value = "10000000")]
    instructions: u64,

    /// Fraction of floating-point instructions
    #[arg(long, default_value = "0.2")]
    fp_fraction: f64,

    /// Instruction counts at which the guest raises an exit event
    #[arg(long, value_delimiter = ',', default_value = "1000000")]
    exit_at: Vec<u64>,

    /// Instruction count at which the guest enters its region of interest
    #[arg(long)]
    work_begin: Option<u64>,

    /// Instruction count at which the guest leaves its region of interest
    #[arg(long)]
    work_end: Option<u64>,

    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of random seeds to run
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Exit events that switch the processor before one ends the run
    #[arg(long, default_value = "0")]
    switches: usize,

    /// Ticks per quantum
    #[arg(short, long, default_value = "10000")]
    quantum: u64,

    /// Global tick at which the run is cut off
    #[arg(long, default_value = "1000000000")]
    max_ticks: u64,

    /// Use the classic cache hierarchy instead of Ruby
    #[arg(long)]
    no_ruby: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export the full run report to a JSON file
    #[arg(long)]
    export: Option<String>,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let system: SystemConfig = args.system.parse().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("Available systems: 0-4, -1, -2, homogeneous, big_little, int_and_accel, high_het, only_float, super_slow, speed_demon");
        std::process::exit(1);
    });

    if args.export.is_some() && args.seeds > 1 {
        eprintln!("Error: --export only supports a single seed");
        std::process::exit(1);
    }

    if !args.json {
        info!("hetproc-sim v{}", env!("CARGO_PKG_VERSION"));
        info!("System: {} ({})", system, system.description());
    }

    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let mut workload = Workload::new(&args.workload, args.instructions).with_fp_fraction(args.fp_fraction);
    for point in args.exit_at.iter().filter(|&&point| point < args.instructions) {
        workload = workload.with_exit_point(*point);
    }
    if let Some(at) = args.work_begin {
        workload = workload.with_work_begin(at);
    }
    if let Some(at) = args.work_end {
        workload = workload.with_work_end(at);
    }

    let mut reports: Vec<RunReport> = Vec::new();
    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let config = SimConfig::default()
            .with_seed(seed)
            .with_quantum(args.quantum)
            .with_max_ticks(args.max_ticks)
            .with_ruby(!args.no_ruby)
            .with_switches(args.switches);

        let result = Experiment::build(system, workload.clone(), config).and_then(|mut e| e.run());
        match result {
            Ok(report) => {
                if !args.json {
                    info!(
                        "✓ {} seed={} ended at tick {} ({:?}), {} instructions, {} switches",
                        system.name(),
                        seed,
                        report.final_tick,
                        report.exit_reason,
                        report.instructions,
                        report.switches()
                    );
                }
                reports.push(report);
            }
            Err(e) => {
                error!("✗ {} seed={} failed: {}", system.name(), seed, e);
                std::process::exit(1);
            }
        }
    }

    if let Some(path) = &args.export {
        if let Some(report) = reports.first() {
            if let Err(e) = report.write_to_file(path) {
                error!("Failed to write export: {}", e);
                std::process::exit(1);
            }
            info!("Exported run report to {}", path);
        }
    }

    if args.json {
        let summary = serde_json::json!({
            "system": system.name(),
            "workload": args.workload,
            "runs": reports.iter().map(|r| {
                serde_json::json!({
                    "seed": r.seed,
                    "exit_reason": r.exit_reason,
                    "final_tick": r.final_tick,
                    "instructions": r.instructions,
                    "switches": r.switches(),
                    "mem_mode": r.mem_mode,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize summary: {}", e);
                std::process::exit(1);
            }
        }
    }
}
