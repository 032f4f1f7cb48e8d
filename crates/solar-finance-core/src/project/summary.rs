use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::SolarFinanceError;
use crate::project::cash_flow::{project, AnnualRecord, Projection};
use crate::project::params::ProjectParameters;
use crate::project::pricing::MerchantPriceCurves;
use crate::project::tax_equity::{CapexBreakdown, TaxEquityStructure};
use crate::time_value;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::SolarFinanceResult;

/// Starting guess for every project IRR.
pub const IRR_GUESS: Rate = dec!(0.10);

// ---------------------------------------------------------------------------
// Input / output types
// ---------------------------------------------------------------------------

/// Everything a collaborator supplies for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionInput {
    pub parameters: ProjectParameters,
    /// Region -> merchant curve; only needed for curve-priced merchant years
    #[serde(default)]
    pub merchant_curves: MerchantPriceCurves,
}

/// Explicit IRR result state. Never a NaN or a silent zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IrrOutcome {
    Converged { rate: Rate },
    /// The series has no sign change (or too few flows)
    Undefined { reason: String },
    /// Iteration cap reached
    NotConverged { iterations: u32, last_delta: Decimal },
}

impl IrrOutcome {
    /// Compute the IRR of `cash_flows`, mapping the expected failure modes to
    /// result states. Anything else is still an error.
    pub fn evaluate(cash_flows: &[Money]) -> SolarFinanceResult<Self> {
        match time_value::irr(cash_flows, IRR_GUESS) {
            Ok(rate) => Ok(IrrOutcome::Converged { rate }),
            Err(SolarFinanceError::UndefinedIrr(reason))
            | Err(SolarFinanceError::InsufficientData(reason)) => {
                Ok(IrrOutcome::Undefined { reason })
            }
            Err(SolarFinanceError::ConvergenceFailure {
                iterations,
                last_delta,
                ..
            }) => Ok(IrrOutcome::NotConverged {
                iterations,
                last_delta,
            }),
            Err(e) => Err(e),
        }
    }

    pub fn rate(&self) -> Option<Rate> {
        match self {
            IrrOutcome::Converged { rate } => Some(*rate),
            _ => None,
        }
    }
}

/// Summary scalars over a projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetrics {
    pub irr: IrrOutcome,
    /// NPV of the net cash flows at the parameter discount rate
    pub npv: Money,
    /// $/MWh at the parameter discount rate
    pub lcoe_per_mwh: Money,
    /// First year with positive cumulative cash flow
    pub payback_year: Option<u32>,
    pub total_capex: Money,
    /// Operating years only
    pub total_revenue: Money,
    /// Operating years only; construction rent is in the year 0 record
    pub total_operating_expenses: Money,
    /// total revenue - total operating expenses
    pub total_ebitda: Money,
    /// All years including construction
    pub total_cash_flow: Money,
    pub accumulated_preferred_returns: Money,
    pub remaining_credit_cash_flow: Money,
}

/// Output surface consumed by presentation and export collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionOutput {
    pub project_name: String,
    pub records: Vec<AnnualRecord>,
    pub capex: CapexBreakdown,
    pub tax_equity: TaxEquityStructure,
    pub metrics: ProjectMetrics,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Summary metrics for an already computed projection.
pub fn compute_metrics(
    projection: &Projection,
    discount_rate: Rate,
) -> SolarFinanceResult<ProjectMetrics> {
    let cash_flows = projection.cash_flows();

    let irr = IrrOutcome::evaluate(&cash_flows)?;
    let npv = time_value::npv(discount_rate, &cash_flows)?;
    let lcoe_per_mwh = time_value::lcoe(
        discount_rate,
        &projection.cost_series()?,
        &projection.energy_series_mwh(),
    )?;

    let operating = || projection.records.iter().filter(|r| r.year > 0);
    let total_revenue = checked_total("total revenue", operating().map(|r| r.revenue))?;
    let total_operating_expenses = checked_total(
        "total operating expenses",
        operating().map(|r| r.operating_expenses),
    )?;

    Ok(ProjectMetrics {
        irr,
        npv,
        lcoe_per_mwh,
        payback_year: time_value::payback_year(&cash_flows)?,
        total_capex: projection.capex.total,
        total_revenue,
        total_operating_expenses,
        total_ebitda: total_revenue
            .checked_sub(total_operating_expenses)
            .ok_or_else(|| SolarFinanceError::overflow("total EBITDA"))?,
        total_cash_flow: checked_total("total cash flow", cash_flows.iter().copied())?,
        accumulated_preferred_returns: projection.accumulated_preferred_returns,
        remaining_credit_cash_flow: projection.remaining_credit_cash_flow,
    })
}

/// Run a projection and its metrics, wrapped in the standard envelope.
pub fn run_projection(
    input: &ProjectionInput,
) -> SolarFinanceResult<ComputationOutput<ProjectionOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let params = &input.parameters;

    let projection = project(params, &input.merchant_curves)?;
    let te = &projection.tax_equity;
    debug!(
        credit_eligible_basis = %te.credit_eligible_basis,
        credit_amount = %te.credit_amount,
        fair_value = %te.fair_value,
        nominal_investment = %te.nominal_investment,
        accumulated_preferred_returns = %projection.accumulated_preferred_returns,
        remaining_credit_cash_flow = %projection.remaining_credit_cash_flow,
        "tax equity structure"
    );

    let metrics = compute_metrics(&projection, params.discount_rate)?;

    // ── Warnings ─────────────────────────────────────────────────────
    if projection.remaining_credit_cash_flow < Decimal::ZERO {
        warnings.push(format!(
            "Remaining credit cash flow is negative ({}); preferred returns and buyout exceed fair value",
            projection.remaining_credit_cash_flow
        ));
    }
    match &metrics.irr {
        IrrOutcome::Converged { .. } => {}
        IrrOutcome::Undefined { reason } => {
            warnings.push(format!("Project IRR undefined: {reason}"));
        }
        IrrOutcome::NotConverged { iterations, .. } => {
            warnings.push(format!(
                "Project IRR did not converge after {iterations} iterations"
            ));
        }
    }
    if metrics.payback_year.is_none() {
        warnings.push("Cumulative cash flow never turns positive".into());
    }
    if let (Some(first), Some(last)) = (
        projection.clamped_years.first(),
        projection.clamped_years.last(),
    ) {
        warnings.push(format!(
            "Merchant curve ends before operating year {first}; years {first}-{last} use the last listed price"
        ));
    }

    let output = ProjectionOutput {
        project_name: params.project_name.clone(),
        capex: projection.capex.clone(),
        tax_equity: projection.tax_equity.clone(),
        records: projection.records,
        metrics,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Solar Cash Flow Projection with Tax Equity Partnership Flip",
        &serde_json::json!({
            "project_name": params.project_name,
            "nameplate_dc_mw": params.nameplate_dc_mw.to_string(),
            "contract_price": params.contract.price.to_string(),
            "contract_tenor_years": params.contract.tenor_years,
            "post_contract_tenor_years": params.post_contract.tenor_years,
            "buyout_year": params.tax_equity.buyout_year,
            "discount_rate": params.discount_rate.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn checked_total(what: &str, mut amounts: impl Iterator<Item = Money>) -> SolarFinanceResult<Money> {
    amounts
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
        .ok_or_else(|| SolarFinanceError::overflow(what.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::params::{PostContractPricing, TaxEquityTerms};
    use crate::project::pricing::MerchantPriceCurve;
    use rust_decimal_macros::dec;

    fn reference_input() -> ProjectionInput {
        ProjectionInput {
            parameters: ProjectParameters::builder().build().unwrap(),
            merchant_curves: MerchantPriceCurves::new(),
        }
    }

    #[test]
    fn test_reference_project_metrics() {
        let result = run_projection(&reference_input()).unwrap();
        let metrics = &result.result.metrics;

        let irr = metrics.irr.rate().expect("reference project IRR converges");
        assert!(
            irr > dec!(0.05) && irr < dec!(0.15),
            "Expected IRR between 5% and 15%, got {irr}"
        );
        assert_eq!(metrics.total_capex, dec!(15_525_000));
        assert!(metrics.lcoe_per_mwh > Decimal::ZERO);
        assert!(metrics.payback_year.is_some());
        assert_eq!(
            metrics.total_ebitda,
            metrics.total_revenue - metrics.total_operating_expenses
        );
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn test_npv_at_irr_is_zero() {
        let input = reference_input();
        let projection = project(&input.parameters, &input.merchant_curves).unwrap();
        let metrics = compute_metrics(&projection, dec!(0.08)).unwrap();
        let irr = metrics.irr.rate().unwrap();
        let npv = time_value::npv(irr, &projection.cash_flows()).unwrap();
        assert!(npv.abs() < dec!(0.01), "NPV at IRR was {npv}");
    }

    #[test]
    fn test_irr_outcome_undefined_for_one_signed_series() {
        let outcome = IrrOutcome::evaluate(&[dec!(10), dec!(20), dec!(30)]).unwrap();
        assert!(matches!(outcome, IrrOutcome::Undefined { .. }));
        assert_eq!(outcome.rate(), None);
    }

    #[test]
    fn test_irr_outcome_not_converged_without_root() {
        let outcome = IrrOutcome::evaluate(&[dec!(-1), dec!(2), dec!(-2)]).unwrap();
        assert!(
            matches!(outcome, IrrOutcome::NotConverged { .. }),
            "expected NotConverged, got {outcome:?}"
        );
        assert_eq!(outcome.rate(), None);
    }

    #[test]
    fn test_negative_remaining_credit_warns() {
        let mut input = reference_input();
        input.parameters.tax_equity = TaxEquityTerms {
            preferred_return_rate: dec!(0.20),
            buyout_year: 10,
            ..TaxEquityTerms::default()
        };
        let result = run_projection(&input).unwrap();
        assert!(result.result.metrics.remaining_credit_cash_flow < Decimal::ZERO);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("Remaining credit cash flow is negative")));
    }

    #[test]
    fn test_clamped_curve_warns() {
        let mut input = reference_input();
        input.parameters.post_contract.pricing = PostContractPricing::Curve {
            region: "CAISO".into(),
        };
        input.merchant_curves = MerchantPriceCurves::new().with_region(
            "CAISO",
            MerchantPriceCurve::new([(2045, dec!(40))]).unwrap(),
        );
        let result = run_projection(&input).unwrap();
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("use the last listed price")));
    }

    #[test]
    fn test_input_deserializes_without_curves() {
        let input = reference_input();
        let mut value = serde_json::to_value(&input).unwrap();
        value.as_object_mut().unwrap().remove("merchant_curves");
        let back: ProjectionInput = serde_json::from_value(value).unwrap();
        assert!(back.merchant_curves.regions().next().is_none());
    }
}
