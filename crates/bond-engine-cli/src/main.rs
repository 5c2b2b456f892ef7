mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use bond_engine_core::EngineConfig;
use commands::bond::{BondArgs, EvaluateArgs};
use commands::rates::ConvertRateArgs;

/// Bond amortization, effective rates and regulatory compliance
#[derive(Parser)]
#[command(
    name = "bondeng",
    version,
    about = "Bond amortization, effective rates and regulatory compliance",
    long_about = "A CLI for valuing fixed-rate bonds with decimal precision. Builds French \
                  amortization schedules with grace periods and periodic charges, solves the \
                  effective cost and yield rates, and checks terms against regulatory bounds."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Engine configuration file (YAML or JSON): costs, regulatory bounds, solver
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log pipeline stages to stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Full valuation: schedule, effective cost/yield rates, duration and convexity
    Evaluate(EvaluateArgs),
    /// Payment schedule only, one row per period
    Schedule(BondArgs),
    /// Check bond terms against regulatory bounds
    Compliance(BondArgs),
    /// Convert a quoted annual rate to effective annual and periodic rates
    ConvertRate(ConvertRateArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match cli.config.as_deref() {
        Some(path) => match input::file::read_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}: {}", "error".red().bold(), e);
                process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Evaluate(args) => commands::bond::run_evaluate(args, &config),
        Commands::Schedule(args) => commands::bond::run_schedule(args, &config),
        Commands::Compliance(args) => commands::bond::run_compliance(args, &config),
        Commands::ConvertRate(args) => commands::rates::run_convert_rate(args),
        Commands::Version => {
            println!("bondeng {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable. `RUST_LOG` wins over `-v`.
fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
