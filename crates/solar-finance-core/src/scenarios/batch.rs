use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::project::cash_flow::project;
use crate::project::params::ProjectParameters;
use crate::project::pricing::MerchantPriceCurves;
use crate::project::summary::{compute_metrics, IrrOutcome};
use crate::solver::price::{solve_price_for_target_irr, PriceSearch, PriceSolution};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::SolarFinanceResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// One named variation of the base case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,
    /// Partial `ProjectParameters` document merged over the base case
    #[serde(default)]
    pub overrides: serde_json::Value,
    /// Also solve the contract price for this IRR when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_irr: Option<Rate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioBatchInput {
    pub base: ProjectParameters,
    #[serde(default)]
    pub merchant_curves: MerchantPriceCurves,
    pub scenarios: Vec<ScenarioSpec>,
    /// Bracket used for every scenario with a target IRR
    #[serde(default)]
    pub search: PriceSearch,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub status: ScenarioStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub irr: Option<IrrOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub npv: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lcoe_per_mwh: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payback_year: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_for_target: Option<PriceSolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioBatchOutput {
    pub results: Vec<ScenarioResult>,
    pub succeeded: usize,
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Merge a partial parameter document over `base` and validate the result.
pub fn apply_overrides(
    base: &ProjectParameters,
    overrides: &serde_json::Value,
) -> SolarFinanceResult<ProjectParameters> {
    let mut merged = serde_json::to_value(base)?;
    merge_json(&mut merged, overrides);
    let params: ProjectParameters = serde_json::from_value(merged)?;
    params.validate()?;
    Ok(params)
}

/// Evaluate every scenario against the shared curves.
///
/// Scenarios share nothing mutable, so with the `parallel` feature they fan
/// out across the rayon pool; results keep input order either way. A failing
/// scenario is recorded and does not abort the batch.
pub fn run_scenarios(
    input: &ScenarioBatchInput,
) -> SolarFinanceResult<ComputationOutput<ScenarioBatchOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    input.base.validate()?;

    #[cfg(feature = "parallel")]
    let results: Vec<ScenarioResult> = input
        .scenarios
        .par_iter()
        .map(|spec| evaluate_scenario(spec, input))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let results: Vec<ScenarioResult> = input
        .scenarios
        .iter()
        .map(|spec| evaluate_scenario(spec, input))
        .collect();

    let succeeded = results
        .iter()
        .filter(|r| r.status == ScenarioStatus::Ok)
        .count();
    let failed = results.len() - succeeded;
    if failed > 0 {
        warnings.push(format!("{failed} of {} scenarios failed", results.len()));
    }
    debug!(succeeded, failed, "scenario batch complete");

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Scenario batch over base-case overrides",
        &serde_json::json!({
            "base_project": input.base.project_name,
            "scenario_count": input.scenarios.len(),
            "parallel": cfg!(feature = "parallel"),
        }),
        warnings,
        elapsed,
        ScenarioBatchOutput {
            results,
            succeeded,
            failed,
        },
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn evaluate_scenario(spec: &ScenarioSpec, input: &ScenarioBatchInput) -> ScenarioResult {
    let evaluate = || -> SolarFinanceResult<ScenarioResult> {
        let params = apply_overrides(&input.base, &spec.overrides)?;
        let projection = project(&params, &input.merchant_curves)?;
        let metrics = compute_metrics(&projection, params.discount_rate)?;
        let price_for_target = spec
            .target_irr
            .map(|target| {
                solve_price_for_target_irr(&params, &input.merchant_curves, target, &input.search)
            })
            .transpose()?;

        Ok(ScenarioResult {
            name: spec.name.clone(),
            status: ScenarioStatus::Ok,
            irr: Some(metrics.irr),
            npv: Some(metrics.npv),
            lcoe_per_mwh: Some(metrics.lcoe_per_mwh),
            payback_year: metrics.payback_year,
            price_for_target,
            error: None,
        })
    };

    evaluate().unwrap_or_else(|e| {
        warn!(scenario = %spec.name, error = %e, "scenario failed");
        ScenarioResult {
            name: spec.name.clone(),
            status: ScenarioStatus::Error,
            irr: None,
            npv: None,
            lcoe_per_mwh: None,
            payback_year: None,
            price_for_target: None,
            error: Some(e.to_string()),
        }
    })
}

/// Recursive object merge; non-object patches replace, `null` is ignored.
fn merge_json(target: &mut serde_json::Value, patch: &serde_json::Value) {
    match (target, patch) {
        (_, serde_json::Value::Null) => {}
        (serde_json::Value::Object(target_map), serde_json::Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match target_map.get_mut(key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        target_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

/// Convenience for callers ranking scenarios.
impl ScenarioResult {
    pub fn irr_rate(&self) -> Option<Rate> {
        self.irr.as_ref().and_then(IrrOutcome::rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn batch(scenarios: Vec<ScenarioSpec>) -> ScenarioBatchInput {
        ScenarioBatchInput {
            base: ProjectParameters::builder().build().unwrap(),
            merchant_curves: MerchantPriceCurves::new(),
            scenarios,
            search: PriceSearch::default(),
        }
    }

    fn spec(name: &str, overrides: serde_json::Value) -> ScenarioSpec {
        ScenarioSpec {
            name: name.into(),
            overrides,
            target_irr: None,
        }
    }

    #[test]
    fn test_nested_override_keeps_siblings() {
        let base = ProjectParameters::builder().build().unwrap();
        let params = apply_overrides(&base, &json!({"contract": {"price": "130"}})).unwrap();
        assert_eq!(params.contract.price, dec!(130));
        assert_eq!(params.contract.tenor_years, base.contract.tenor_years);
        assert_eq!(params.contract.escalation_rate, base.contract.escalation_rate);
    }

    #[test]
    fn test_null_override_is_base_case() {
        let base = ProjectParameters::builder().build().unwrap();
        let params = apply_overrides(&base, &serde_json::Value::Null).unwrap();
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            serde_json::to_value(&base).unwrap()
        );
    }

    #[test]
    fn test_higher_price_scenario_has_higher_irr() {
        let input = batch(vec![
            spec("base", serde_json::Value::Null),
            spec("high price", json!({"contract": {"price": "140"}})),
        ]);
        let output = run_scenarios(&input).unwrap().result;

        assert_eq!(output.succeeded, 2);
        assert_eq!(output.results[0].name, "base");
        let base_irr = output.results[0].irr_rate().unwrap();
        let high_irr = output.results[1].irr_rate().unwrap();
        assert!(high_irr > base_irr);
        let base_npv = output.results[0].npv.unwrap();
        let high_npv = output.results[1].npv.unwrap();
        assert!(high_npv > base_npv, "{high_npv} <= {base_npv}");
    }

    #[test]
    fn test_invalid_scenario_recorded_not_fatal() {
        let input = batch(vec![
            spec("bad capacity", json!({"nameplate_dc_mw": "-1"})),
            spec("base", serde_json::Value::Null),
        ]);
        let result = run_scenarios(&input).unwrap();
        let output = &result.result;

        assert_eq!(output.failed, 1);
        assert_eq!(output.results[0].status, ScenarioStatus::Error);
        assert!(output.results[0].error.is_some());
        assert_eq!(output.results[1].status, ScenarioStatus::Ok);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_out_of_range_escalation_recorded_not_fatal() {
        let input = batch(vec![
            spec(
                "runaway escalation",
                json!({
                    "contract": {"escalation_rate": "1", "tenor_years": 100},
                    "post_contract": {"tenor_years": 0}
                }),
            ),
            spec("base", serde_json::Value::Null),
        ]);
        let output = run_scenarios(&input).unwrap().result;

        assert_eq!(output.failed, 1);
        assert_eq!(output.results[0].status, ScenarioStatus::Error);
        assert!(output.results[0].npv.is_none());
        let message = output.results[0].error.as_deref().unwrap();
        assert!(message.contains("decimal range"), "{message}");
        assert_eq!(output.results[1].status, ScenarioStatus::Ok);
    }

    #[test]
    fn test_scenario_with_target_irr_solves_price() {
        let mut target = spec("target", serde_json::Value::Null);
        target.target_irr = Some(dec!(0.09));
        let output = run_scenarios(&batch(vec![target])).unwrap().result;
        let solution = output.results[0].price_for_target.as_ref().unwrap();
        assert!(solution.price_per_kwh > Decimal::ZERO);
        assert!(solution.price_per_kwh < Decimal::ONE);
    }
}
