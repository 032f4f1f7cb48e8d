use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use solar_finance_core::project::{
    project, run_projection, BonusSchedule, BonusTier, ContractTerms, MerchantPriceCurve,
    MerchantPriceCurves, OperatingCosts, PostContractPricing, ProductionTerms, ProjectParameters,
    ProjectionInput, RevenueSource, TaxEquityTerms, YearPhase, YearWindow,
};
use solar_finance_core::time_value;
use solar_finance_core::SolarFinanceError;

fn reference() -> ProjectParameters {
    ProjectParameters::builder().build().unwrap()
}

// ===========================================================================
// Projection: reference 7.5 MW-dc project
// ===========================================================================

#[test]
fn test_reference_revenue_years_one_and_two() {
    let projection = project(&reference(), &MerchantPriceCurves::new()).unwrap();
    let year1 = &projection.records[1];
    let year2 = &projection.records[2];

    // 7.5 MW * 1350 kWh/kWp * 1000 kW/MW * $114.05/MWh / 1000
    let expected = dec!(1_154_756.25);
    assert!(
        (year1.revenue - expected).abs() < dec!(0.01),
        "Year 1 revenue should be {expected}, got {}",
        year1.revenue
    );
    let ratio = year2.revenue / year1.revenue;
    assert!(
        (ratio - dec!(0.995) * dec!(1.02)).abs() < dec!(0.0000001),
        "Year 2 / year 1 revenue ratio should be 1.0149, got {ratio}"
    );
}

#[test]
fn test_reference_series_length_and_phases() {
    let projection = project(&reference(), &MerchantPriceCurves::new()).unwrap();
    assert_eq!(projection.records.len(), 37);
    assert_eq!(projection.records[0].phase, YearPhase::Construction);
    assert_eq!(projection.records[36].phase, YearPhase::Terminal);
    assert_eq!(projection.records[20].revenue_source, RevenueSource::Contract);
    assert_eq!(projection.records[21].revenue_source, RevenueSource::Merchant);
}

#[test]
fn test_calendar_years_follow_commercial_operation() {
    let params = ProjectParameters::builder()
        .commercial_operation_date(NaiveDate::from_ymd_opt(2027, 6, 30).unwrap())
        .build()
        .unwrap();
    let projection = project(&params, &MerchantPriceCurves::new()).unwrap();
    assert_eq!(projection.records[0].calendar_year, 2026);
    assert_eq!(projection.records[1].calendar_year, 2027);
    assert_eq!(projection.records[36].calendar_year, 2062);
}

#[test]
fn test_reference_run_has_converged_irr_and_zero_npv_at_irr() {
    let input = ProjectionInput {
        parameters: reference(),
        merchant_curves: MerchantPriceCurves::new(),
    };
    let output = run_projection(&input).unwrap();
    let irr = output.result.metrics.irr.rate().expect("IRR converges");

    let cash_flows: Vec<Decimal> = output
        .result
        .records
        .iter()
        .map(|r| r.total_cash_flow)
        .collect();
    let npv = time_value::npv(irr, &cash_flows).unwrap();
    assert!(npv.abs() < dec!(0.01), "NPV at IRR should be ~0, got {npv}");
    assert_eq!(output.methodology, "Solar Cash Flow Projection with Tax Equity Partnership Flip");
}

// ===========================================================================
// Tax equity edge cases
// ===========================================================================

#[test]
fn test_buyout_in_first_operating_year() {
    let params = ProjectParameters::builder()
        .tax_equity(TaxEquityTerms {
            buyout_year: 1,
            ..TaxEquityTerms::default()
        })
        .build()
        .unwrap();
    let projection = project(&params, &MerchantPriceCurves::new()).unwrap();

    let year1 = &projection.records[1];
    assert!(year1.preferred_return < Decimal::ZERO);
    assert!(year1.buyout < Decimal::ZERO);
    assert!(projection.records[2..]
        .iter()
        .all(|r| r.tax_equity_cash_flow == Decimal::ZERO));
    assert_eq!(projection.accumulated_preferred_returns, -year1.preferred_return);
}

#[test]
fn test_buyout_after_operating_life_is_rejected() {
    let err = ProjectParameters::builder()
        .tax_equity(TaxEquityTerms {
            buyout_year: 40,
            ..TaxEquityTerms::default()
        })
        .build()
        .unwrap_err();
    assert!(matches!(err, SolarFinanceError::InvalidParameter { .. }));
}

// ===========================================================================
// Pricing: merchant curves and bonus tiers
// ===========================================================================

#[test]
fn test_merchant_curve_clamps_past_last_year() {
    let params = ProjectParameters::builder()
        .post_contract(
            16,
            PostContractPricing::Curve {
                region: "PJM".into(),
            },
        )
        .build()
        .unwrap();
    let curves = MerchantPriceCurves::new().with_region(
        "PJM",
        MerchantPriceCurve::new([(2040, dec!(48)), (2048, dec!(52))]).unwrap(),
    );
    let projection = project(&params, &curves).unwrap();

    let last = projection.records.last().unwrap();
    assert_eq!(last.energy_price, dec!(52));
    assert_eq!(projection.records[21].energy_price, dec!(48));
    assert!(!projection.clamped_years.is_empty());
}

#[test]
fn test_missing_merchant_region_is_an_error() {
    let params = ProjectParameters::builder()
        .post_contract(
            16,
            PostContractPricing::Curve {
                region: "ERCOT".into(),
            },
        )
        .build()
        .unwrap();
    assert!(project(&params, &MerchantPriceCurves::new()).is_err());
}

#[test]
fn test_bonus_tier_adds_to_revenue() {
    let bonus = BonusSchedule {
        tiers: vec![BonusTier {
            first_year: 1,
            last_year: Some(10),
            price: dec!(20),
        }],
    };
    let with_bonus = ProjectParameters::builder()
        .bonus_schedule(bonus)
        .build()
        .unwrap();
    let plain = project(&reference(), &MerchantPriceCurves::new()).unwrap();
    let boosted = project(&with_bonus, &MerchantPriceCurves::new()).unwrap();

    let year1 = &boosted.records[1];
    assert_eq!(year1.bonus_price, dec!(20));
    assert_eq!(
        year1.revenue - plain.records[1].revenue,
        year1.production_kwh * dec!(20) / dec!(1000)
    );
    assert_eq!(boosted.records[11].bonus_price, Decimal::ZERO);
}

// ===========================================================================
// Operating costs
// ===========================================================================

#[test]
fn test_inverter_replacement_only_inside_window() {
    let costs = |window: Option<YearWindow>| OperatingCosts {
        inverter_replacement_cost: dec!(5),
        inverter_window: window,
        ..OperatingCosts::default()
    };
    let without = ProjectParameters::builder()
        .operating_costs(costs(None))
        .build()
        .unwrap();
    let with = ProjectParameters::builder()
        .operating_costs(costs(Some(YearWindow {
            first_year: 12,
            last_year: 13,
        })))
        .build()
        .unwrap();
    let plain = project(&without, &MerchantPriceCurves::new()).unwrap();
    let with_inverter = project(&with, &MerchantPriceCurves::new()).unwrap();

    for year in [11usize, 14] {
        assert_eq!(
            with_inverter.records[year].operating_expenses,
            plain.records[year].operating_expenses
        );
    }
    // $5/kW-dc * 7,500 kW
    for year in [12usize, 13] {
        let delta =
            with_inverter.records[year].operating_expenses - plain.records[year].operating_expenses;
        assert!(
            (delta - dec!(37_500)).abs() < dec!(0.0001),
            "Year {year} should carry the inverter cost, delta was {delta}"
        );
    }
}

#[test]
fn test_zero_yield_is_rejected() {
    let err = ProjectParameters::builder()
        .production(ProductionTerms {
            yield_kwh_per_kwp: Decimal::ZERO,
            ..ProductionTerms::default()
        })
        .build()
        .unwrap_err();
    assert!(matches!(err, SolarFinanceError::InvalidParameter { .. }));
}

#[test]
fn test_zero_price_project_has_undefined_or_negative_irr() {
    let params = ProjectParameters::builder()
        .contract(ContractTerms {
            price: Decimal::ZERO,
            ..ContractTerms::default()
        })
        .post_contract(
            16,
            PostContractPricing::Escalating {
                start_price: Decimal::ZERO,
                escalation_rate: Decimal::ZERO,
            },
        )
        .build()
        .unwrap();
    let output = run_projection(&ProjectionInput {
        parameters: params,
        merchant_curves: MerchantPriceCurves::new(),
    })
    .unwrap();
    assert!(output.result.metrics.irr.rate().is_none());
    assert!(output.result.metrics.npv < Decimal::ZERO);
    assert!(!output.warnings.is_empty());
}

// ===========================================================================
// Numeric range
// ===========================================================================

#[test]
fn test_long_doubling_contract_leaves_decimal_range() {
    // Every field passes validation; the price doubles for 100 years
    let params = ProjectParameters::builder()
        .contract(ContractTerms {
            escalation_rate: Decimal::ONE,
            tenor_years: 100,
            ..ContractTerms::default()
        })
        .post_contract(
            0,
            PostContractPricing::Curve {
                region: "unused".into(),
            },
        )
        .build()
        .unwrap();

    let err = run_projection(&ProjectionInput {
        parameters: params,
        merchant_curves: MerchantPriceCurves::new(),
    })
    .unwrap_err();
    assert!(
        matches!(err, SolarFinanceError::FinancialImpossibility(_)),
        "expected FinancialImpossibility, got {err:?}"
    );
}
