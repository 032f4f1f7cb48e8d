use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::time::Instant;

use solar_finance_core::time_value;
use solar_finance_core::types::with_metadata;

/// Arguments for NPV of an arbitrary series
#[derive(Args)]
pub struct NpvArgs {
    /// Discount rate (decimal)
    #[arg(long)]
    pub rate: Decimal,

    /// Cash flows, year 0 first (comma-separated, e.g. "-1000,300,400,500")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub cash_flows: Vec<Decimal>,
}

pub fn run_npv(args: NpvArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let npv = time_value::npv(args.rate, &args.cash_flows)?;
    let output = with_metadata(
        "Net present value, year 0 undiscounted",
        &json!({ "rate": args.rate.to_string(), "periods": args.cash_flows.len() }),
        Vec::new(),
        start.elapsed().as_micros() as u64,
        json!({ "npv": npv }),
    );
    Ok(serde_json::to_value(output)?)
}

/// Arguments for IRR of an arbitrary series
#[derive(Args)]
pub struct IrrArgs {
    /// Cash flows, year 0 first (comma-separated, e.g. "-1000,300,400,500")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub cash_flows: Vec<Decimal>,

    /// Starting guess for Newton-Raphson
    #[arg(long)]
    pub guess: Option<Decimal>,
}

pub fn run_irr(args: IrrArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let guess = args.guess.unwrap_or(dec!(0.10));
    let irr = time_value::irr(&args.cash_flows, guess)?;
    let output = with_metadata(
        "Internal rate of return (Newton-Raphson with bisection fallback)",
        &json!({ "guess": guess.to_string(), "periods": args.cash_flows.len() }),
        Vec::new(),
        start.elapsed().as_micros() as u64,
        json!({ "irr": irr }),
    );
    Ok(serde_json::to_value(output)?)
}
