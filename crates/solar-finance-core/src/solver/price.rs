use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, trace};

use crate::error::SolarFinanceError;
use crate::project::cash_flow::project;
use crate::project::params::ProjectParameters;
use crate::project::pricing::MerchantPriceCurves;
use crate::project::summary::{IrrOutcome, IRR_GUESS};
use crate::time_value;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::SolarFinanceResult;

const KWH_PER_MWH: Decimal = dec!(1000);

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Bisection bracket for the year 1 contract price, in $/kWh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSearch {
    pub low: Money,
    pub high: Money,
    /// Stop once the bracket is no wider than this
    pub tolerance: Money,
    pub max_iterations: u32,
}

impl Default for PriceSearch {
    fn default() -> Self {
        Self {
            low: Decimal::ZERO,
            high: Decimal::ONE,
            tolerance: dec!(0.0001),
            max_iterations: 100,
        }
    }
}

/// Price-for-target-IRR request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSolverInput {
    pub parameters: ProjectParameters,
    #[serde(default)]
    pub merchant_curves: MerchantPriceCurves,
    pub target_irr: Rate,
    #[serde(default)]
    pub search: PriceSearch,
}

/// IRR-for-price request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrrForPriceInput {
    pub parameters: ProjectParameters,
    #[serde(default)]
    pub merchant_curves: MerchantPriceCurves,
    /// Year 1 contract price in $/kWh
    pub price_per_kwh: Money,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSolution {
    /// Year 1 contract price achieving the target, $/kWh
    pub price_per_kwh: Money,
    /// Same price in $/MWh
    pub price_per_mwh: Money,
    pub target_irr: Rate,
    /// IRR of the cash flows at the solved price
    pub achieved_irr: IrrOutcome,
    /// NPV at the target IRR for the solved price
    pub npv_at_solution: Money,
    pub iterations: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrrForPriceOutput {
    pub price_per_kwh: Money,
    pub irr: IrrOutcome,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// NPV at `rate` of the projection run with the contract price set to
/// `price_per_kwh`. This is the solver's black-box objective.
pub fn npv_at_price(
    params: &ProjectParameters,
    curves: &MerchantPriceCurves,
    rate: Rate,
    price_per_kwh: Money,
) -> SolarFinanceResult<Money> {
    let projection = project(&priced(params, price_per_kwh)?, curves)?;
    time_value::npv(rate, &projection.cash_flows())
}

/// IRR of the projection run at contract price `price_per_kwh`.
pub fn irr_for_price(
    params: &ProjectParameters,
    curves: &MerchantPriceCurves,
    price_per_kwh: Money,
) -> SolarFinanceResult<Rate> {
    let projection = project(&priced(params, price_per_kwh)?, curves)?;
    time_value::irr(&projection.cash_flows(), IRR_GUESS)
}

/// Bisect the year 1 contract price until NPV at `target_irr` crosses zero.
///
/// Revenue is linear in the contract price and nothing else depends on it,
/// so NPV is non-decreasing in price. Both ends of the bracket are evaluated
/// first: a decreasing pair is rejected as a broken assumption, and a bracket
/// whose NPVs share a sign is reported as out of range rather than clamped.
pub fn solve_price_for_target_irr(
    params: &ProjectParameters,
    curves: &MerchantPriceCurves,
    target_irr: Rate,
    search: &PriceSearch,
) -> SolarFinanceResult<PriceSolution> {
    validate_search(target_irr, search)?;

    let mut low = search.low;
    let mut high = search.high;
    let npv_at_low = npv_at_price(params, curves, target_irr, low)?;
    let npv_at_high = npv_at_price(params, curves, target_irr, high)?;

    if npv_at_high < npv_at_low {
        return Err(SolarFinanceError::FinancialImpossibility(format!(
            "NPV decreases from {npv_at_low} to {npv_at_high} as price rises from {low} to {high}"
        )));
    }
    if npv_at_high < Decimal::ZERO || npv_at_low > Decimal::ZERO {
        return Err(SolarFinanceError::PriceOutOfRange {
            low,
            high,
            npv_at_low,
            npv_at_high,
        });
    }

    let mut iterations = 0u32;
    while high - low > search.tolerance {
        if iterations >= search.max_iterations {
            return Err(SolarFinanceError::ConvergenceFailure {
                function: "price solver".into(),
                iterations,
                last_delta: high - low,
            });
        }

        let mid = midpoint(low, high);
        let npv_mid = npv_at_price(params, curves, target_irr, mid)?;
        trace!(iteration = iterations, price = %mid, npv = %npv_mid, "price bisection");

        if npv_mid < Decimal::ZERO {
            low = mid;
        } else {
            high = mid;
        }
        iterations += 1;
    }

    let price_per_kwh = midpoint(low, high);
    let projection = project(&priced(params, price_per_kwh)?, curves)?;
    let cash_flows = projection.cash_flows();

    debug!(price_per_kwh = %price_per_kwh, iterations, "price solver converged");

    Ok(PriceSolution {
        price_per_kwh,
        price_per_mwh: to_per_mwh(price_per_kwh)?,
        target_irr,
        achieved_irr: IrrOutcome::evaluate(&cash_flows)?,
        npv_at_solution: time_value::npv(target_irr, &cash_flows)?,
        iterations,
    })
}

/// Solve for the target price, wrapped in the standard envelope.
pub fn run_price_solver(
    input: &PriceSolverInput,
) -> SolarFinanceResult<ComputationOutput<PriceSolution>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let solution = solve_price_for_target_irr(
        &input.parameters,
        &input.merchant_curves,
        input.target_irr,
        &input.search,
    )?;

    if let Some(achieved) = solution.achieved_irr.rate() {
        if (achieved - input.target_irr).abs() > dec!(0.001) {
            warnings.push(format!(
                "Achieved IRR {achieved} differs from target {} by more than 0.1%; tighten the tolerance",
                input.target_irr
            ));
        }
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Bisection on year 1 contract price for target IRR",
        &serde_json::json!({
            "target_irr": input.target_irr.to_string(),
            "low": input.search.low.to_string(),
            "high": input.search.high.to_string(),
            "tolerance": input.search.tolerance.to_string(),
            "price_unit": "$/kWh",
        }),
        warnings,
        elapsed,
        solution,
    ))
}

/// IRR at a given contract price, wrapped in the standard envelope.
pub fn run_irr_for_price(
    input: &IrrForPriceInput,
) -> SolarFinanceResult<ComputationOutput<IrrForPriceOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let projection = project(
        &priced(&input.parameters, input.price_per_kwh)?,
        &input.merchant_curves,
    )?;
    let irr = IrrOutcome::evaluate(&projection.cash_flows())?;
    if irr.rate().is_none() {
        warnings.push(format!("No IRR at price {} $/kWh", input.price_per_kwh));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Project IRR at fixed year 1 contract price",
        &serde_json::json!({
            "price_per_kwh": input.price_per_kwh.to_string(),
        }),
        warnings,
        elapsed,
        IrrForPriceOutput {
            price_per_kwh: input.price_per_kwh,
            irr,
        },
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn priced(params: &ProjectParameters, price_per_kwh: Money) -> SolarFinanceResult<ProjectParameters> {
    Ok(params.with_contract_price(to_per_mwh(price_per_kwh)?))
}

fn to_per_mwh(price_per_kwh: Money) -> SolarFinanceResult<Money> {
    price_per_kwh
        .checked_mul(KWH_PER_MWH)
        .ok_or_else(|| SolarFinanceError::overflow(format!("contract price {price_per_kwh} $/kWh")))
}

/// Bracket midpoint that cannot overflow for `low <= high`.
fn midpoint(low: Money, high: Money) -> Money {
    low + (high - low) / dec!(2)
}

fn validate_search(target_irr: Rate, search: &PriceSearch) -> SolarFinanceResult<()> {
    if target_irr <= dec!(-1) {
        return Err(SolarFinanceError::invalid(
            "target_irr",
            "Target IRR must be greater than -100%",
        ));
    }
    if search.low < Decimal::ZERO {
        return Err(SolarFinanceError::invalid(
            "search.low",
            "Price bracket cannot start below zero",
        ));
    }
    if search.low >= search.high {
        return Err(SolarFinanceError::invalid(
            "search.high",
            format!("Bracket [{}, {}] is empty", search.low, search.high),
        ));
    }
    if search.tolerance <= Decimal::ZERO {
        return Err(SolarFinanceError::invalid(
            "search.tolerance",
            "Tolerance must be positive",
        ));
    }
    Ok(())
}
