use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SolarFinanceError;
use crate::project::escalation::escalate;
use crate::project::params::{ProjectParameters, RentBasis};
use crate::project::production::KW_PER_MW;
use crate::types::Money;
use crate::SolarFinanceResult;

/// Year-1 escalation base shared by most operating lines.
const FROM_YEAR_ONE: u32 = 1;
/// O&M is flat through year 2 and compounds afterwards.
const OM_FROM_YEAR: u32 = 2;

/// Cost lines for one projection year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpexBreakdown {
    /// Construction-phase holding cost (year 0 only)
    pub construction_rent: Money,
    pub asset_management: Money,
    pub insurance: Money,
    pub property_tax: Money,
    pub operations_and_maintenance: Money,
    pub other_asset_management: Money,
    pub rent: Money,
    pub inverter_replacement: Money,
    /// Sum of every line above
    pub total: Money,
}

impl OpexBreakdown {
    fn with_total(mut self, year: u32) -> SolarFinanceResult<Self> {
        self.total = [
            self.construction_rent,
            self.asset_management,
            self.insurance,
            self.property_tax,
            self.operations_and_maintenance,
            self.other_asset_management,
            self.rent,
            self.inverter_replacement,
        ]
        .iter()
        .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(*line))
        .ok_or_else(|| SolarFinanceError::overflow(format!("operating expenses in year {year}")))?;
        Ok(self)
    }
}

/// Operating expense lines for `year`; year 0 carries only construction rent.
pub fn operating_expenses(params: &ProjectParameters, year: u32) -> SolarFinanceResult<OpexBreakdown> {
    let costs = &params.operating_costs;

    if year == 0 {
        return OpexBreakdown {
            construction_rent: rent_amount(params, costs.construction_rent)?,
            ..OpexBreakdown::default()
        }
        .with_total(year);
    }

    let capacity_kw = params.nameplate_dc_mw * KW_PER_MW;
    let per_kw = |rate: Money, line: &str| {
        rate.checked_mul(capacity_kw)
            .ok_or_else(|| SolarFinanceError::overflow(line.to_string()))
    };

    let inverter_replacement = match costs.inverter_window {
        Some(window) if window.contains(year) => {
            per_kw(costs.inverter_replacement_cost, "inverter replacement")?
        }
        _ => Decimal::ZERO,
    };

    OpexBreakdown {
        construction_rent: Decimal::ZERO,
        asset_management: escalate(
            per_kw(costs.asset_management_cost, "asset management")?,
            costs.asset_management_escalation,
            year,
            FROM_YEAR_ONE,
        )?,
        insurance: per_kw(costs.insurance_cost, "insurance")?,
        property_tax: escalate(
            costs
                .property_tax
                .checked_mul(params.site_acres)
                .ok_or_else(|| SolarFinanceError::overflow("property tax"))?,
            costs.property_tax_escalation,
            year,
            FROM_YEAR_ONE,
        )?,
        operations_and_maintenance: escalate(
            per_kw(costs.om_cost, "O&M")?,
            costs.om_escalation,
            year,
            OM_FROM_YEAR,
        )?,
        other_asset_management: escalate(
            costs.other_asset_management_cost,
            costs.other_asset_management_escalation,
            year,
            FROM_YEAR_ONE,
        )?,
        rent: escalate(
            rent_amount(params, costs.operating_rent)?,
            costs.rent_escalation,
            year,
            FROM_YEAR_ONE,
        )?,
        inverter_replacement,
        total: Decimal::ZERO,
    }
    .with_total(year)
}

/// Annual rent in dollars for a rent figure read through the rent basis.
pub fn rent_amount(params: &ProjectParameters, amount: Money) -> SolarFinanceResult<Money> {
    let rent = match params.operating_costs.rent_basis {
        RentBasis::FlatAnnual => Some(amount),
        RentBasis::PerAcre => amount.checked_mul(params.site_acres),
        RentBasis::PerKwAc => amount
            .checked_mul(params.nameplate_ac_mw)
            .and_then(|r| r.checked_mul(KW_PER_MW)),
    };
    rent.ok_or_else(|| SolarFinanceError::overflow("site rent"))
}
