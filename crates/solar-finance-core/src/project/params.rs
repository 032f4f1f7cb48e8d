use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::SolarFinanceError;
use crate::types::{Money, Rate};
use crate::SolarFinanceResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// How site rent (construction and operating) is sized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentBasis {
    /// Rent figures are a flat annual amount
    FlatAnnual,
    /// Rent figures are $/acre/year, multiplied by site acreage
    #[default]
    PerAcre,
    /// Rent figures are $/kW-ac/year, multiplied by AC capacity
    PerKwAc,
}

/// Energy production assumptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionTerms {
    /// Specific yield in kWh per kWp-dc per year
    pub yield_kwh_per_kwp: Decimal,
    /// Annual degradation (decimal, e.g. 0.005 = 0.5%)
    pub degradation_rate: Rate,
    /// First operating year in which degradation exponent is zero
    pub degradation_start_year: u32,
}

impl Default for ProductionTerms {
    fn default() -> Self {
        Self {
            yield_kwh_per_kwp: dec!(1350),
            degradation_rate: dec!(0.005),
            degradation_start_year: 1,
        }
    }
}

/// Power purchase agreement terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractTerms {
    /// Year 1 contract price in $/MWh
    pub price: Money,
    /// Annual escalation of the contract price, applied from year 1
    pub escalation_rate: Rate,
    /// Contract length in operating years
    pub tenor_years: u32,
}

impl Default for ContractTerms {
    fn default() -> Self {
        Self {
            price: dec!(114.05),
            escalation_rate: dec!(0.02),
            tenor_years: 20,
        }
    }
}

/// Where the price comes from once the contract has expired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PostContractPricing {
    /// Look up the region's merchant curve by calendar year
    Curve { region: String },
    /// Start price in $/MWh escalated from year 1
    Escalating {
        start_price: Money,
        escalation_rate: Rate,
    },
}

/// Post-contract (merchant) operating period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostContractTerms {
    /// Operating years after the contract ends
    pub tenor_years: u32,
    pub pricing: PostContractPricing,
}

impl Default for PostContractTerms {
    fn default() -> Self {
        Self {
            tenor_years: 16,
            pricing: PostContractPricing::Escalating {
                start_price: dec!(55),
                escalation_rate: dec!(0.015),
            },
        }
    }
}

/// Flat bonus price (e.g. environmental credits) for a band of years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusTier {
    /// First operating year of the band (inclusive)
    pub first_year: u32,
    /// Last operating year of the band (inclusive); open-ended when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_year: Option<u32>,
    /// Bonus price in $/MWh added on top of the energy price
    pub price: Money,
}

impl BonusTier {
    pub fn contains(&self, year: u32) -> bool {
        year >= self.first_year && self.last_year.map_or(true, |last| year <= last)
    }
}

/// Tiered bonus pricing, e.g. years 1-5 / 6-10 / 11-15 / beyond.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BonusSchedule {
    pub tiers: Vec<BonusTier>,
}

/// Inclusive range of operating years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearWindow {
    pub first_year: u32,
    pub last_year: u32,
}

impl YearWindow {
    pub fn contains(&self, year: u32) -> bool {
        year >= self.first_year && year <= self.last_year
    }
}

/// Operating and holding cost assumptions. Capacity rates are $/kW/year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatingCosts {
    /// Basis applied to both construction and operating rent
    pub rent_basis: RentBasis,
    /// Year 0 holding cost, interpreted through `rent_basis`
    pub construction_rent: Money,
    /// Operating rent, interpreted through `rent_basis`
    pub operating_rent: Money,
    pub rent_escalation: Rate,
    /// O&M in $/kW-dc/year, escalated from year 2
    pub om_cost: Money,
    pub om_escalation: Rate,
    /// Asset management in $/kW-dc/year
    pub asset_management_cost: Money,
    pub asset_management_escalation: Rate,
    /// Secondary asset management line, flat $/year
    pub other_asset_management_cost: Money,
    pub other_asset_management_escalation: Rate,
    /// Insurance in $/kW-dc/year, never escalated
    pub insurance_cost: Money,
    /// Property tax in $/acre/year
    pub property_tax: Money,
    pub property_tax_escalation: Rate,
    /// Inverter replacement reserve in $/kW-dc/year, charged inside the window
    pub inverter_replacement_cost: Money,
    /// Years in which the inverter reserve is charged; `None` disables it
    #[serde(default)]
    pub inverter_window: Option<YearWindow>,
}

impl Default for OperatingCosts {
    fn default() -> Self {
        Self {
            rent_basis: RentBasis::PerAcre,
            construction_rent: dec!(600),
            operating_rent: dec!(1200),
            rent_escalation: dec!(0.02),
            om_cost: dec!(6.00),
            om_escalation: dec!(0.02),
            asset_management_cost: dec!(2.00),
            asset_management_escalation: dec!(0.02),
            other_asset_management_cost: Decimal::ZERO,
            other_asset_management_escalation: dec!(0.02),
            insurance_cost: dec!(4.50),
            property_tax: dec!(1200),
            property_tax_escalation: dec!(0.02),
            inverter_replacement_cost: dec!(4.00),
            inverter_window: Some(YearWindow {
                first_year: 6,
                last_year: 15,
            }),
        }
    }
}

/// Capital cost components, all in $/W-dc.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalCosts {
    pub epc_cost: Money,
    pub interconnection_cost: Money,
    pub developer_fee: Money,
    /// Excluded from the credit-eligible basis
    pub transaction_costs: Money,
}

impl Default for CapitalCosts {
    fn default() -> Self {
        Self {
            epc_cost: dec!(1.65),
            interconnection_cost: dec!(0.10),
            developer_fee: dec!(0.25),
            transaction_costs: dec!(0.07),
        }
    }
}

/// Single-tranche tax-equity partnership terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxEquityTerms {
    /// Investment tax credit rate (decimal)
    pub credit_rate: Rate,
    /// Share of the eligible basis that qualifies for the credit
    pub credit_eligible_fraction: Rate,
    /// Fair value step-up applied to the credit amount
    pub fair_value_step_up: Rate,
    /// Nominal investment as a multiple of the credit (informational)
    pub investment_multiple: Decimal,
    /// Annual preferred return paid on fair value until buyout
    pub preferred_return_rate: Rate,
    /// Operating year of the buyout (inclusive end of preferred return)
    pub buyout_year: u32,
    /// Buyout payment as a fraction of fair value
    pub buyout_percentage: Rate,
}

impl Default for TaxEquityTerms {
    fn default() -> Self {
        Self {
            credit_rate: dec!(0.30),
            credit_eligible_fraction: dec!(0.95),
            fair_value_step_up: dec!(0.30),
            investment_multiple: dec!(1.15),
            preferred_return_rate: dec!(0.025),
            buyout_year: 7,
            buyout_percentage: dec!(0.0725),
        }
    }
}

/// Complete, immutable description of one projection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectParameters {
    /// Project name / identifier
    #[serde(default)]
    pub project_name: String,
    /// Nameplate DC capacity in MW
    pub nameplate_dc_mw: Decimal,
    /// Nameplate AC capacity in MW
    pub nameplate_ac_mw: Decimal,
    /// Site area in acres
    pub site_acres: Decimal,
    /// Commercial operation date; its calendar year is operating year 1
    pub commercial_operation_date: NaiveDate,
    pub production: ProductionTerms,
    pub contract: ContractTerms,
    pub post_contract: PostContractTerms,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bonus_schedule: Option<BonusSchedule>,
    pub operating_costs: OperatingCosts,
    pub capital_costs: CapitalCosts,
    pub tax_equity: TaxEquityTerms,
    /// Discount rate for NPV and LCOE
    pub discount_rate: Rate,
}

impl ProjectParameters {
    /// Builder seeded with the reference 7.5 MW-dc community solar project.
    pub fn builder() -> ProjectParametersBuilder {
        ProjectParametersBuilder::default()
    }

    /// Contract plus post-contract years.
    pub fn operating_years(&self) -> u32 {
        self.contract.tenor_years + self.post_contract.tenor_years
    }

    /// Construction year plus operating years.
    pub fn total_years(&self) -> u32 {
        1 + self.operating_years()
    }

    /// Calendar year of a projection year (year 1 = COD year).
    pub fn calendar_year(&self, year: u32) -> i32 {
        self.commercial_operation_date.year() + year as i32 - 1
    }

    /// Copy with a different year 1 contract price ($/MWh).
    pub fn with_contract_price(&self, price: Money) -> Self {
        let mut params = self.clone();
        params.contract.price = price;
        params
    }

    /// Reject out-of-range or inconsistent inputs before any projection runs.
    pub fn validate(&self) -> SolarFinanceResult<()> {
        require_positive("nameplate_dc_mw", self.nameplate_dc_mw)?;
        require_positive("nameplate_ac_mw", self.nameplate_ac_mw)?;
        require_non_negative("site_acres", self.site_acres)?;
        require_positive("production.yield_kwh_per_kwp", self.production.yield_kwh_per_kwp)?;

        let costs = &self.operating_costs;
        let capital = &self.capital_costs;
        let te = &self.tax_equity;

        for (field, value) in [
            ("production.degradation_rate", self.production.degradation_rate),
            ("contract.escalation_rate", self.contract.escalation_rate),
            ("operating_costs.rent_escalation", costs.rent_escalation),
            ("operating_costs.om_escalation", costs.om_escalation),
            (
                "operating_costs.asset_management_escalation",
                costs.asset_management_escalation,
            ),
            (
                "operating_costs.other_asset_management_escalation",
                costs.other_asset_management_escalation,
            ),
            (
                "operating_costs.property_tax_escalation",
                costs.property_tax_escalation,
            ),
            ("tax_equity.credit_rate", te.credit_rate),
            ("tax_equity.credit_eligible_fraction", te.credit_eligible_fraction),
            ("tax_equity.fair_value_step_up", te.fair_value_step_up),
            ("tax_equity.preferred_return_rate", te.preferred_return_rate),
            ("tax_equity.buyout_percentage", te.buyout_percentage),
            ("discount_rate", self.discount_rate),
        ] {
            require_fraction(field, value)?;
        }

        for (field, value) in [
            ("contract.price", self.contract.price),
            ("operating_costs.construction_rent", costs.construction_rent),
            ("operating_costs.operating_rent", costs.operating_rent),
            ("operating_costs.om_cost", costs.om_cost),
            ("operating_costs.asset_management_cost", costs.asset_management_cost),
            (
                "operating_costs.other_asset_management_cost",
                costs.other_asset_management_cost,
            ),
            ("operating_costs.insurance_cost", costs.insurance_cost),
            ("operating_costs.property_tax", costs.property_tax),
            (
                "operating_costs.inverter_replacement_cost",
                costs.inverter_replacement_cost,
            ),
            ("capital_costs.epc_cost", capital.epc_cost),
            ("capital_costs.interconnection_cost", capital.interconnection_cost),
            ("capital_costs.developer_fee", capital.developer_fee),
            ("capital_costs.transaction_costs", capital.transaction_costs),
            ("tax_equity.investment_multiple", te.investment_multiple),
        ] {
            require_non_negative(field, value)?;
        }

        if self.operating_years() == 0 {
            return Err(SolarFinanceError::invalid(
                "contract.tenor_years",
                "Contract and post-contract tenors must cover at least 1 operating year",
            ));
        }

        if te.buyout_year < 1 || te.buyout_year > self.operating_years() {
            return Err(SolarFinanceError::invalid(
                "tax_equity.buyout_year",
                format!(
                    "Buyout year {} must fall within operating years 1..={}",
                    te.buyout_year,
                    self.operating_years()
                ),
            ));
        }

        if let Some(window) = costs.inverter_window {
            if window.first_year < 1 || window.first_year > window.last_year {
                return Err(SolarFinanceError::invalid(
                    "operating_costs.inverter_window",
                    format!(
                        "Window {}..={} must start at year 1 or later and not be reversed",
                        window.first_year, window.last_year
                    ),
                ));
            }
        }

        match &self.post_contract.pricing {
            PostContractPricing::Curve { region } => {
                if region.trim().is_empty() {
                    return Err(SolarFinanceError::invalid(
                        "post_contract.pricing.region",
                        "Region identifier must not be empty",
                    ));
                }
            }
            PostContractPricing::Escalating {
                start_price,
                escalation_rate,
            } => {
                require_non_negative("post_contract.pricing.start_price", *start_price)?;
                require_fraction("post_contract.pricing.escalation_rate", *escalation_rate)?;
            }
        }

        if let Some(schedule) = &self.bonus_schedule {
            validate_bonus_schedule(schedule)?;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configuration builder; `build()` is the validated way to obtain parameters.
#[derive(Debug, Clone)]
pub struct ProjectParametersBuilder {
    params: ProjectParameters,
}

impl Default for ProjectParametersBuilder {
    fn default() -> Self {
        Self {
            params: ProjectParameters {
                project_name: "Reference Community Solar".into(),
                nameplate_dc_mw: dec!(7.5),
                nameplate_ac_mw: dec!(5.0),
                site_acres: dec!(30),
                commercial_operation_date: NaiveDate::from_ymd_opt(2025, 12, 31)
                    .unwrap_or_default(),
                production: ProductionTerms::default(),
                contract: ContractTerms::default(),
                post_contract: PostContractTerms::default(),
                bonus_schedule: None,
                operating_costs: OperatingCosts::default(),
                capital_costs: CapitalCosts::default(),
                tax_equity: TaxEquityTerms::default(),
                discount_rate: dec!(0.08),
            },
        }
    }
}

impl ProjectParametersBuilder {
    pub fn project_name(mut self, name: impl Into<String>) -> Self {
        self.params.project_name = name.into();
        self
    }

    pub fn capacity(mut self, dc_mw: Decimal, ac_mw: Decimal) -> Self {
        self.params.nameplate_dc_mw = dc_mw;
        self.params.nameplate_ac_mw = ac_mw;
        self
    }

    pub fn site_acres(mut self, acres: Decimal) -> Self {
        self.params.site_acres = acres;
        self
    }

    pub fn commercial_operation_date(mut self, date: NaiveDate) -> Self {
        self.params.commercial_operation_date = date;
        self
    }

    pub fn production(mut self, production: ProductionTerms) -> Self {
        self.params.production = production;
        self
    }

    pub fn contract(mut self, contract: ContractTerms) -> Self {
        self.params.contract = contract;
        self
    }

    pub fn post_contract(mut self, tenor_years: u32, pricing: PostContractPricing) -> Self {
        self.params.post_contract = PostContractTerms {
            tenor_years,
            pricing,
        };
        self
    }

    pub fn bonus_schedule(mut self, schedule: BonusSchedule) -> Self {
        self.params.bonus_schedule = Some(schedule);
        self
    }

    pub fn operating_costs(mut self, costs: OperatingCosts) -> Self {
        self.params.operating_costs = costs;
        self
    }

    pub fn capital_costs(mut self, costs: CapitalCosts) -> Self {
        self.params.capital_costs = costs;
        self
    }

    pub fn tax_equity(mut self, terms: TaxEquityTerms) -> Self {
        self.params.tax_equity = terms;
        self
    }

    pub fn discount_rate(mut self, rate: Rate) -> Self {
        self.params.discount_rate = rate;
        self
    }

    pub fn build(self) -> SolarFinanceResult<ProjectParameters> {
        self.params.validate()?;
        Ok(self.params)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require_positive(field: &str, value: Decimal) -> SolarFinanceResult<()> {
    if value <= Decimal::ZERO {
        return Err(SolarFinanceError::invalid(field, format!("{value} must be positive")));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: Decimal) -> SolarFinanceResult<()> {
    if value < Decimal::ZERO {
        return Err(SolarFinanceError::invalid(field, format!("{value} cannot be negative")));
    }
    Ok(())
}

fn require_fraction(field: &str, value: Rate) -> SolarFinanceResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(SolarFinanceError::invalid(
            field,
            format!("{value} must be a decimal fraction between 0 and 1"),
        ));
    }
    Ok(())
}

fn validate_bonus_schedule(schedule: &BonusSchedule) -> SolarFinanceResult<()> {
    let mut tiers: Vec<&BonusTier> = schedule.tiers.iter().collect();
    tiers.sort_by_key(|t| t.first_year);

    for tier in &tiers {
        require_non_negative("bonus_schedule.price", tier.price)?;
        if tier.first_year < 1 || tier.last_year.is_some_and(|last| last < tier.first_year) {
            return Err(SolarFinanceError::invalid(
                "bonus_schedule.tiers",
                format!("Tier starting in year {} has an invalid range", tier.first_year),
            ));
        }
    }

    for pair in tiers.windows(2) {
        let overlaps = match pair[0].last_year {
            Some(last) => pair[1].first_year <= last,
            None => true,
        };
        if overlaps {
            return Err(SolarFinanceError::invalid(
                "bonus_schedule.tiers",
                format!(
                    "Tiers starting in years {} and {} overlap",
                    pair[0].first_year, pair[1].first_year
                ),
            ));
        }
    }

    Ok(())
}
