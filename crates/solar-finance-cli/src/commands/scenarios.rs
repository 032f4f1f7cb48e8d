use clap::Args;
use serde_json::Value;

use solar_finance_core::scenarios::{self, ScenarioBatchInput};

use super::projection::read_request;

/// Arguments for a scenario batch
#[derive(Args)]
pub struct ScenariosArgs {
    /// Path to JSON/YAML file with `base`, `scenarios` and optional `merchant_curves`
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_scenarios(args: ScenariosArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let batch: ScenarioBatchInput = read_request(args.input.as_deref())?
        .ok_or("--input <file> or stdin required for a scenario batch")?;
    let result = scenarios::run_scenarios(&batch)?;
    Ok(serde_json::to_value(result)?)
}
