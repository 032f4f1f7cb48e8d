mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing::debug;
use tracing_subscriber::FmtSubscriber;

use commands::metrics::{IrrArgs, NpvArgs};
use commands::projection::ProjectArgs;
use commands::scenarios::ScenariosArgs;
use commands::solver::{IrrForPriceArgs, SolvePriceArgs};

/// Solar cash-flow projections with tax-equity partnership flips
#[derive(Parser)]
#[command(
    name = "solarfin",
    version,
    about = "Solar cash-flow projections with tax-equity partnership flips",
    long_about = "A CLI for projecting annual cash flows of a solar generation asset \
                  with decimal precision. Supports full projections with IRR, NPV and \
                  LCOE, contract price solving for a target IRR, and scenario batches."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Diagnostic log level (written to stderr)
    #[arg(long, default_value = "warn", global = true)]
    log_level: tracing::Level,
}

#[derive(Subcommand)]
enum Commands {
    /// Project annual cash flows, tax-equity effects and summary metrics
    Project(ProjectArgs),
    /// Solve the year 1 contract price that achieves a target IRR
    SolvePrice(SolvePriceArgs),
    /// Project IRR at a given year 1 contract price
    IrrForPrice(IrrForPriceArgs),
    /// Run a batch of named parameter overrides against a base case
    Scenarios(ScenariosArgs),
    /// Net present value of a cash-flow series
    Npv(NpvArgs),
    /// Internal rate of return of a cash-flow series
    Irr(IrrArgs),
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

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("{}: failed to install logger: {}", "warning".yellow().bold(), e);
    }

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Project(args) => commands::projection::run_project(args),
        Commands::SolvePrice(args) => commands::solver::run_solve_price(args),
        Commands::IrrForPrice(args) => commands::solver::run_irr_for_price(args),
        Commands::Scenarios(args) => commands::scenarios::run_scenarios(args),
        Commands::Npv(args) => commands::metrics::run_npv(args),
        Commands::Irr(args) => commands::metrics::run_irr(args),
        Commands::Version => {
            println!("solarfin {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            debug!(format = ?cli.output, "writing output");
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
