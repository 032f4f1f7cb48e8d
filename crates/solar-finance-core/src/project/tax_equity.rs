use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::SolarFinanceError;
use crate::project::params::{ProjectParameters, TaxEquityTerms};
use crate::types::Money;
use crate::SolarFinanceResult;

/// $/W-dc x MW-dc -> $
const WATTS_PER_MW: Decimal = dec!(1_000_000);

fn product(what: &str, a: Decimal, b: Decimal) -> SolarFinanceResult<Money> {
    a.checked_mul(b)
        .ok_or_else(|| SolarFinanceError::overflow(what.to_string()))
}

fn sum(what: &str, amounts: &[Money]) -> SolarFinanceResult<Money> {
    amounts
        .iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(*amount))
        .ok_or_else(|| SolarFinanceError::overflow(what.to_string()))
}

/// Capital expenditure by component, in dollars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapexBreakdown {
    pub epc: Money,
    pub interconnection: Money,
    pub developer_fee: Money,
    pub transaction_costs: Money,
    /// Capital eligible for the investment tax credit. Transaction costs are
    /// never eligible.
    pub credit_eligible_basis: Money,
    pub total: Money,
}

impl CapexBreakdown {
    pub fn from_params(params: &ProjectParameters) -> SolarFinanceResult<Self> {
        let scale = product("capacity in watts", params.nameplate_dc_mw, WATTS_PER_MW)?;
        let costs = &params.capital_costs;
        let epc = product("EPC cost", costs.epc_cost, scale)?;
        let interconnection = product("interconnection cost", costs.interconnection_cost, scale)?;
        let developer_fee = product("developer fee", costs.developer_fee, scale)?;
        let transaction_costs = product("transaction costs", costs.transaction_costs, scale)?;
        let credit_eligible_basis =
            sum("credit-eligible basis", &[epc, interconnection, developer_fee])?;
        Ok(Self {
            epc,
            interconnection,
            developer_fee,
            transaction_costs,
            credit_eligible_basis,
            total: sum("capital expenditure", &[credit_eligible_basis, transaction_costs])?,
        })
    }
}

/// One-time capital structure of the tax-equity partnership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxEquityStructure {
    pub credit_eligible_basis: Money,
    /// basis x credit rate x eligible fraction
    pub credit_amount: Money,
    /// credit x (1 + step-up); the partner's capital contribution
    pub fair_value: Money,
    /// credit x investment multiple; reported only, never a cash flow
    pub nominal_investment: Money,
}

impl TaxEquityStructure {
    pub fn new(capex: &CapexBreakdown, terms: &TaxEquityTerms) -> SolarFinanceResult<Self> {
        let credit_eligible_basis = capex.credit_eligible_basis;
        let credit_amount = product(
            "credit amount",
            product("credit amount", credit_eligible_basis, terms.credit_rate)?,
            terms.credit_eligible_fraction,
        )?;
        Ok(Self {
            credit_eligible_basis,
            credit_amount,
            fair_value: product(
                "fair value",
                credit_amount,
                Decimal::ONE + terms.fair_value_step_up,
            )?,
            nominal_investment: product(
                "nominal investment",
                credit_amount,
                terms.investment_multiple,
            )?,
        })
    }
}

/// Tax-equity cash effect for one operating year. Outflows are negative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxEquityYear {
    pub preferred_return: Money,
    pub buyout: Money,
}

impl TaxEquityYear {
    pub fn total(&self) -> SolarFinanceResult<Money> {
        sum("tax-equity cash flow", &[self.preferred_return, self.buyout])
    }
}

/// Preferred-return and buyout schedule derived from the structure.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxEquityWaterfall {
    pub structure: TaxEquityStructure,
    annual_preferred_return: Money,
    buyout_payment: Money,
    buyout_year: u32,
}

impl TaxEquityWaterfall {
    pub fn new(params: &ProjectParameters, capex: &CapexBreakdown) -> SolarFinanceResult<Self> {
        let terms = &params.tax_equity;
        let structure = TaxEquityStructure::new(capex, terms)?;
        Ok(Self {
            annual_preferred_return: product(
                "preferred return",
                structure.fair_value,
                terms.preferred_return_rate,
            )?,
            buyout_payment: product("buyout", structure.fair_value, terms.buyout_percentage)?,
            buyout_year: terms.buyout_year,
            structure,
        })
    }

    /// Cash effect in operating year `year` (>= 1). Zero after the buyout.
    pub fn year_effect(&self, year: u32) -> TaxEquityYear {
        if year == 0 || year > self.buyout_year {
            return TaxEquityYear::default();
        }

        let buyout = if year == self.buyout_year {
            -self.buyout_payment
        } else {
            Decimal::ZERO
        };

        TaxEquityYear {
            preferred_return: -self.annual_preferred_return,
            buyout,
        }
    }

    /// Buyout payment as a positive amount.
    pub fn buyout_payment(&self) -> Money {
        self.buyout_payment
    }

    /// Fair value left after preferred returns and the buyout.
    ///
    /// Not clamped: a negative result means the partner was paid more than
    /// its fair value.
    pub fn remaining_credit_cash_flow(
        &self,
        accumulated_preferred_returns: Money,
    ) -> SolarFinanceResult<Money> {
        self.structure
            .fair_value
            .checked_sub(accumulated_preferred_returns)
            .and_then(|left| left.checked_sub(self.buyout_payment))
            .ok_or_else(|| SolarFinanceError::overflow("remaining credit cash flow"))
    }
}
