use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SolarFinanceError;
use crate::project::opex::operating_expenses;
use crate::project::params::ProjectParameters;
use crate::project::pricing::{MerchantPriceCurves, PriceModel, RevenueSource};
use crate::project::production::{annual_production, KW_PER_MW};
use crate::project::tax_equity::{CapexBreakdown, TaxEquityStructure, TaxEquityWaterfall};
use crate::types::{Energy, Money};
use crate::SolarFinanceResult;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Position of a year in the project life. Purely a function of the index.
///
/// `Terminal` wins over `OperatingPreBuyout`: when the buyout falls in the
/// final year that record is labelled `Terminal` and still carries the
/// preferred return and buyout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YearPhase {
    /// Year 0: capital outlay and tax-equity funding
    Construction,
    /// 1 <= year <= buyout year
    OperatingPreBuyout,
    /// buyout year < year < final year
    OperatingPostBuyout,
    /// Final projection year
    Terminal,
}

impl YearPhase {
    pub fn for_year(year: u32, buyout_year: u32, total_years: u32) -> Self {
        if year == 0 {
            YearPhase::Construction
        } else if year + 1 == total_years {
            YearPhase::Terminal
        } else if year <= buyout_year {
            YearPhase::OperatingPreBuyout
        } else {
            YearPhase::OperatingPostBuyout
        }
    }
}

/// One projection year. Index 0 is the construction year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualRecord {
    pub year: u32,
    pub calendar_year: i32,
    pub phase: YearPhase,
    pub revenue_source: RevenueSource,
    /// Net production in kWh
    pub production_kwh: Energy,
    /// Contract or merchant price, $/MWh
    pub energy_price: Money,
    /// Bonus tier price, $/MWh
    pub bonus_price: Money,
    pub revenue: Money,
    pub operating_expenses: Money,
    /// revenue - operating expenses
    pub ebitda: Money,
    /// Year 0 only
    pub capital_expenditure: Money,
    /// Fair value funded by the tax-equity partner, year 0 only
    pub tax_equity_contribution: Money,
    /// Preferred return paid (negative)
    pub preferred_return: Money,
    /// Buyout paid (negative)
    pub buyout: Money,
    /// preferred return + buyout
    pub tax_equity_cash_flow: Money,
    pub total_cash_flow: Money,
}

/// Full result of a single projection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub records: Vec<AnnualRecord>,
    pub capex: CapexBreakdown,
    pub tax_equity: TaxEquityStructure,
    /// Sum of preferred returns paid, as a positive amount
    pub accumulated_preferred_returns: Money,
    /// fair value - preferred returns - buyout (informational)
    pub remaining_credit_cash_flow: Money,
    /// Operating years whose merchant price clamped to the curve's last year
    pub clamped_years: Vec<u32>,
}

impl Projection {
    /// Net cash flow per year, length `1 + contract + post-contract` tenor.
    pub fn cash_flows(&self) -> Vec<Money> {
        self.records.iter().map(|r| r.total_cash_flow).collect()
    }

    /// Capex plus operating expense per year, for LCOE.
    pub fn cost_series(&self) -> SolarFinanceResult<Vec<Money>> {
        self.records
            .iter()
            .map(|r| {
                r.capital_expenditure
                    .checked_add(r.operating_expenses)
                    .ok_or_else(|| SolarFinanceError::overflow(format!("cost in year {}", r.year)))
            })
            .collect()
    }

    /// Production per year in MWh, for LCOE.
    pub fn energy_series_mwh(&self) -> Vec<Energy> {
        self.records
            .iter()
            .map(|r| r.production_kwh / KW_PER_MW)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Project every year of the asset's life.
///
/// Pure function of its inputs: validates the parameters, then walks the
/// years in order. The only value carried between years is the preferred
/// return accumulator, kept local to this call.
pub fn project(
    params: &ProjectParameters,
    curves: &MerchantPriceCurves,
) -> SolarFinanceResult<Projection> {
    params.validate()?;

    let price_model = PriceModel::new(params, curves)?;
    let capex = CapexBreakdown::from_params(params)?;
    let waterfall = TaxEquityWaterfall::new(params, &capex)?;
    let fair_value = waterfall.structure.fair_value;

    let total_years = params.total_years();
    let buyout_year = params.tax_equity.buyout_year;

    let mut records: Vec<AnnualRecord> = Vec::with_capacity(total_years as usize);
    let mut clamped_years: Vec<u32> = Vec::new();
    let mut accumulated_preferred_returns = Decimal::ZERO;

    for year in 0..total_years {
        let phase = YearPhase::for_year(year, buyout_year, total_years);
        let opex = operating_expenses(params, year)?.total;
        let overflow = |line: &str| SolarFinanceError::overflow(format!("{line} in year {year}"));

        if year == 0 {
            let ebitda = -opex;
            let total_cash_flow = ebitda
                .checked_sub(capex.total)
                .and_then(|net| net.checked_add(fair_value))
                .ok_or_else(|| overflow("construction cash flow"))?;
            records.push(AnnualRecord {
                year,
                calendar_year: params.calendar_year(year),
                phase,
                revenue_source: RevenueSource::Construction,
                production_kwh: Decimal::ZERO,
                energy_price: Decimal::ZERO,
                bonus_price: Decimal::ZERO,
                revenue: Decimal::ZERO,
                operating_expenses: opex,
                ebitda,
                capital_expenditure: capex.total,
                tax_equity_contribution: fair_value,
                preferred_return: Decimal::ZERO,
                buyout: Decimal::ZERO,
                tax_equity_cash_flow: Decimal::ZERO,
                total_cash_flow,
            });
            continue;
        }

        let production = annual_production(params, year)?;
        let price = price_model.price_for_year(year)?;
        if price.clamped {
            clamped_years.push(year);
        }
        let revenue = price.revenue(production)?;
        let ebitda = revenue.checked_sub(opex).ok_or_else(|| overflow("EBITDA"))?;

        let te = waterfall.year_effect(year);
        accumulated_preferred_returns = accumulated_preferred_returns
            .checked_sub(te.preferred_return)
            .ok_or_else(|| overflow("accumulated preferred return"))?;
        let te_cash_flow = te.total()?;
        let total_cash_flow = ebitda
            .checked_add(te_cash_flow)
            .ok_or_else(|| overflow("cash flow"))?;

        records.push(AnnualRecord {
            year,
            calendar_year: params.calendar_year(year),
            phase,
            revenue_source: price.source,
            production_kwh: production,
            energy_price: price.energy_price,
            bonus_price: price.bonus_price,
            revenue,
            operating_expenses: opex,
            ebitda,
            capital_expenditure: Decimal::ZERO,
            tax_equity_contribution: Decimal::ZERO,
            preferred_return: te.preferred_return,
            buyout: te.buyout,
            tax_equity_cash_flow: te_cash_flow,
            total_cash_flow,
        });
    }

    Ok(Projection {
        records,
        capex,
        remaining_credit_cash_flow: waterfall
            .remaining_credit_cash_flow(accumulated_preferred_returns)?,
        tax_equity: waterfall.structure,
        accumulated_preferred_returns,
        clamped_years,
    })
}
