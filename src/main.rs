use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trap_kernel::config::{KernelConfig, SchedulerMode};
use trap_kernel::io::{load_program_file, ProgramStore, TERMINAL_COUNT};
use trap_kernel::machine::{load_script, Machine};

/// Replays a trap script against the simulated kernel
#[derive(Parser)]
#[command(name = "trap-kernel")]
#[command(version)]
#[command(about = "Single-processor kernel simulator", long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file path (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Program file holding the trap handler, init and any other images
    #[arg(short, long)]
    programs: PathBuf,

    /// Trap script to replay
    #[arg(short, long)]
    script: PathBuf,

    /// Scheduler (simple, round-robin, priority); overrides the config file
    #[arg(long)]
    scheduler: Option<SchedulerMode>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();

    let mut config = match &cli.config {
        Some(path) => KernelConfig::load(path)?,
        None => KernelConfig::default(),
    };
    if let Some(scheduler) = cli.scheduler {
        config = config.with_scheduler(scheduler);
    }

    let mut programs = ProgramStore::new();
    let names = load_program_file(&cli.programs, &mut programs)?;
    log::info!("Loaded programs {:?}", names);

    let events = load_script(&cli.script)?;
    let mut machine = Machine::new(config, programs);
    machine.run(&events)?;

    for terminal in 0..TERMINAL_COUNT {
        let output = machine.output(terminal);
        if !output.is_empty() {
            println!("Terminal {}: {:?}", terminal, output);
        }
    }

    if let Some(err) = machine.driver().internal_error() {
        println!("Kernel halted: {}", err);
    }

    match machine.driver().report() {
        Some(report) => print!("{}", report),
        None => println!("Process 0 still running; no report"),
    }

    Ok(())
}
