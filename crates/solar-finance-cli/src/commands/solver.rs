use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use solar_finance_core::solver::{
    self, IrrForPriceInput, PriceSearch, PriceSolverInput,
};

use super::projection::{read_request, ParameterArgs};

/// Arguments for the price-for-target-IRR solver
#[derive(Args)]
pub struct SolvePriceArgs {
    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Target project IRR (decimal, e.g. 0.10)
    #[arg(long)]
    pub target_irr: Option<Decimal>,

    /// Lower bound of the price bracket in $/kWh
    #[arg(long)]
    pub low: Option<Decimal>,

    /// Upper bound of the price bracket in $/kWh
    #[arg(long)]
    pub high: Option<Decimal>,

    /// Stop once the bracket is this narrow, $/kWh
    #[arg(long)]
    pub tolerance: Option<Decimal>,

    /// Bisection iteration cap
    #[arg(long)]
    pub max_iterations: Option<u32>,

    #[command(flatten)]
    pub parameters: ParameterArgs,
}

pub fn run_solve_price(args: SolvePriceArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let solver_input: PriceSolverInput = match read_request(args.input.as_deref())? {
        Some(request) => request,
        None => {
            let target_irr = args
                .target_irr
                .ok_or("--target-irr is required (or provide --input)")?;
            let defaults = PriceSearch::default();
            PriceSolverInput {
                parameters: args.parameters.to_parameters()?,
                merchant_curves: args.parameters.merchant_curves()?,
                target_irr,
                search: PriceSearch {
                    low: args.low.unwrap_or(defaults.low),
                    high: args.high.unwrap_or(defaults.high),
                    tolerance: args.tolerance.unwrap_or(defaults.tolerance),
                    max_iterations: args.max_iterations.unwrap_or(defaults.max_iterations),
                },
            }
        }
    };

    let result = solver::run_price_solver(&solver_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for the IRR at a given contract price
#[derive(Args)]
pub struct IrrForPriceArgs {
    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Year 1 contract price in $/kWh
    #[arg(long)]
    pub price_per_kwh: Option<Decimal>,

    #[command(flatten)]
    pub parameters: ParameterArgs,
}

pub fn run_irr_for_price(args: IrrForPriceArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let irr_input: IrrForPriceInput = match read_request(args.input.as_deref())? {
        Some(request) => request,
        None => {
            let price_per_kwh = args
                .price_per_kwh
                .ok_or("--price-per-kwh is required (or provide --input)")?;
            IrrForPriceInput {
                parameters: args.parameters.to_parameters()?,
                merchant_curves: args.parameters.merchant_curves()?,
                price_per_kwh,
            }
        }
    };

    let result = solver::run_irr_for_price(&irr_input)?;
    Ok(serde_json::to_value(result)?)
}
