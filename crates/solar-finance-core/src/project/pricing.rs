use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SolarFinanceError;
use crate::project::escalation::escalate;
use crate::project::params::{BonusSchedule, PostContractPricing, ProjectParameters};
use crate::project::production::KW_PER_MW;
use crate::types::{Energy, Money};
use crate::SolarFinanceResult;

// ---------------------------------------------------------------------------
// Merchant curves
// ---------------------------------------------------------------------------

/// Calendar year -> $/MWh merchant price table for one region.
///
/// Lookups past the last listed year return the last listed price, lookups
/// before the first year return the first price, and gaps resolve to the most
/// recent earlier entry. A curve always has at least one point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<i32, Money>", into = "BTreeMap<i32, Money>")]
pub struct MerchantPriceCurve {
    points: BTreeMap<i32, Money>,
}

impl MerchantPriceCurve {
    pub fn new(points: impl IntoIterator<Item = (i32, Money)>) -> SolarFinanceResult<Self> {
        Self::try_from(points.into_iter().collect::<BTreeMap<_, _>>())
    }

    pub fn price_for_year(&self, calendar_year: i32) -> Money {
        self.points
            .range(..=calendar_year)
            .next_back()
            .or_else(|| self.points.iter().next())
            .map(|(_, price)| *price)
            .unwrap_or(Decimal::ZERO)
    }

    /// Whether a lookup for `calendar_year` falls past the table and clamps.
    pub fn is_clamped(&self, calendar_year: i32) -> bool {
        self.last_year().is_some_and(|last| calendar_year > last)
    }

    pub fn last_year(&self) -> Option<i32> {
        self.points.keys().next_back().copied()
    }
}

impl TryFrom<BTreeMap<i32, Money>> for MerchantPriceCurve {
    type Error = SolarFinanceError;

    fn try_from(points: BTreeMap<i32, Money>) -> Result<Self, Self::Error> {
        if points.is_empty() {
            return Err(SolarFinanceError::invalid(
                "merchant_curve",
                "A merchant price curve needs at least one year",
            ));
        }
        Ok(Self { points })
    }
}

impl From<MerchantPriceCurve> for BTreeMap<i32, Money> {
    fn from(curve: MerchantPriceCurve) -> Self {
        curve.points
    }
}

/// Region identifier -> merchant price curve, injected into each projection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MerchantPriceCurves {
    regions: BTreeMap<String, MerchantPriceCurve>,
}

impl MerchantPriceCurves {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: impl Into<String>, curve: MerchantPriceCurve) -> Self {
        self.regions.insert(region.into(), curve);
        self
    }

    pub fn get(&self, region: &str) -> Option<&MerchantPriceCurve> {
        self.regions.get(region)
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Price resolution
// ---------------------------------------------------------------------------

/// Which branch produced a year's energy price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevenueSource {
    Construction,
    Contract,
    Merchant,
}

/// Resolved prices for one year, all in $/MWh.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub energy_price: Money,
    pub bonus_price: Money,
    pub source: RevenueSource,
    /// Merchant curve lookup fell past the last listed year
    pub clamped: bool,
}

impl PricePoint {
    pub fn total(&self) -> SolarFinanceResult<Money> {
        self.energy_price
            .checked_add(self.bonus_price)
            .ok_or_else(|| SolarFinanceError::overflow("energy plus bonus price"))
    }

    /// Revenue for `production` kWh at this price.
    pub fn revenue(&self, production: Energy) -> SolarFinanceResult<Money> {
        production
            .checked_mul(self.total()?)
            .map(|scaled| scaled / KW_PER_MW)
            .ok_or_else(|| SolarFinanceError::overflow(format!("revenue on {production} kWh")))
    }
}

/// Resolves contract, merchant and bonus prices for a parameter set.
#[derive(Debug, Clone)]
pub struct PriceModel<'a> {
    params: &'a ProjectParameters,
    curve: Option<&'a MerchantPriceCurve>,
}

impl<'a> PriceModel<'a> {
    /// Binds the region curve up front so a missing region fails before the
    /// year loop instead of inside it.
    pub fn new(
        params: &'a ProjectParameters,
        curves: &'a MerchantPriceCurves,
    ) -> SolarFinanceResult<Self> {
        let curve = match &params.post_contract.pricing {
            PostContractPricing::Curve { region } if params.post_contract.tenor_years > 0 => {
                Some(curves.get(region).ok_or_else(|| {
                    SolarFinanceError::invalid(
                        "post_contract.pricing.region",
                        format!("No merchant price curve supplied for region '{region}'"),
                    )
                })?)
            }
            _ => None,
        };
        Ok(Self { params, curve })
    }

    /// Price for an operating year (`year >= 1`).
    pub fn price_for_year(&self, year: u32) -> SolarFinanceResult<PricePoint> {
        let contract = &self.params.contract;
        let bonus_price = self
            .params
            .bonus_schedule
            .as_ref()
            .map_or(Decimal::ZERO, |schedule| bonus_price(schedule, year));

        if year <= contract.tenor_years {
            return Ok(PricePoint {
                energy_price: escalate(contract.price, contract.escalation_rate, year, 1)?,
                bonus_price,
                source: RevenueSource::Contract,
                clamped: false,
            });
        }

        let (energy_price, clamped) = match (&self.params.post_contract.pricing, self.curve) {
            (
                PostContractPricing::Escalating {
                    start_price,
                    escalation_rate,
                },
                _,
            ) => (escalate(*start_price, *escalation_rate, year, 1)?, false),
            (PostContractPricing::Curve { .. }, Some(curve)) => {
                let calendar_year = self.params.calendar_year(year);
                (
                    curve.price_for_year(calendar_year),
                    curve.is_clamped(calendar_year),
                )
            }
            // Only reachable with a zero post-contract tenor
            (PostContractPricing::Curve { .. }, None) => (Decimal::ZERO, false),
        };

        Ok(PricePoint {
            energy_price,
            bonus_price,
            source: RevenueSource::Merchant,
            clamped,
        })
    }
}

/// Bonus price of the tier covering `year`, zero when no tier applies.
pub fn bonus_price(schedule: &BonusSchedule, year: u32) -> Money {
    schedule
        .tiers
        .iter()
        .find(|tier| tier.contains(year))
        .map_or(Decimal::ZERO, |tier| tier.price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::params::{BonusTier, ContractTerms};
    use rust_decimal_macros::dec;

    fn curve() -> MerchantPriceCurve {
        MerchantPriceCurve::new([(2045, dec!(50)), (2046, dec!(52)), (2048, dec!(56))]).unwrap()
    }

    #[test]
    fn test_curve_exact_and_gap_lookup() {
        let c = curve();
        assert_eq!(c.price_for_year(2045), dec!(50));
        assert_eq!(c.price_for_year(2046), dec!(52));
        // 2047 is missing: most recent earlier entry
        assert_eq!(c.price_for_year(2047), dec!(52));
        assert_eq!(c.price_for_year(2048), dec!(56));
    }

    #[test]
    fn test_curve_clamps_past_last_year() {
        let c = curve();
        for year in 2048..2100 {
            assert_eq!(c.price_for_year(year), c.price_for_year(2048));
            assert_eq!(c.price_for_year(year), c.price_for_year(year));
        }
        assert!(c.is_clamped(2049));
        assert!(!c.is_clamped(2048));
    }

    #[test]
    fn test_curve_before_first_year_uses_first_price() {
        assert_eq!(curve().price_for_year(2000), dec!(50));
    }

    #[test]
    fn test_empty_curve_rejected() {
        assert!(MerchantPriceCurve::new(Vec::new()).is_err());
        let parsed: Result<MerchantPriceCurve, _> = serde_json::from_str("{}");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_curves_deserialize_from_region_map() {
        let json = r#"{"PJM": {"2045": "50", "2046": "52"}}"#;
        let curves: MerchantPriceCurves = serde_json::from_str(json).unwrap();
        let pjm = curves.get("PJM").unwrap();
        assert_eq!(pjm.price_for_year(2060), dec!(52));
        assert_eq!(curves.regions().collect::<Vec<_>>(), vec!["PJM"]);
    }

    #[test]
    fn test_contract_then_curve() {
        let params = ProjectParameters::builder()
            .contract(ContractTerms {
                price: dec!(100),
                escalation_rate: dec!(0.02),
                tenor_years: 20,
            })
            .post_contract(
                16,
                PostContractPricing::Curve {
                    region: "PJM".into(),
                },
            )
            .build()
            .unwrap();
        let curves = MerchantPriceCurves::new().with_region("PJM", curve());
        let model = PriceModel::new(&params, &curves).unwrap();

        let year1 = model.price_for_year(1).unwrap();
        assert_eq!(year1.energy_price, dec!(100));
        assert_eq!(year1.source, RevenueSource::Contract);

        let year20 = model.price_for_year(20).unwrap();
        assert_eq!(year20.source, RevenueSource::Contract);

        // Year 21 is calendar 2045 with a 2025 COD
        let year21 = model.price_for_year(21).unwrap();
        assert_eq!(year21.source, RevenueSource::Merchant);
        assert_eq!(year21.energy_price, dec!(50));
        assert!(!year21.clamped);

        let year30 = model.price_for_year(30).unwrap();
        assert_eq!(year30.energy_price, dec!(56));
        assert!(year30.clamped);
    }

    #[test]
    fn test_missing_region_rejected() {
        let params = ProjectParameters::builder()
            .post_contract(
                5,
                PostContractPricing::Curve {
                    region: "ERCOT".into(),
                },
            )
            .build()
            .unwrap();
        let err = PriceModel::new(&params, &MerchantPriceCurves::new()).unwrap_err();
        assert!(matches!(err, SolarFinanceError::InvalidParameter { .. }));
    }

    #[test]
    fn test_bonus_tiers_add_on_both_branches() {
        let schedule = BonusSchedule {
            tiers: vec![
                BonusTier {
                    first_year: 1,
                    last_year: Some(5),
                    price: dec!(30),
                },
                BonusTier {
                    first_year: 6,
                    last_year: Some(10),
                    price: dec!(20),
                },
                BonusTier {
                    first_year: 11,
                    last_year: Some(15),
                    price: dec!(10),
                },
                BonusTier {
                    first_year: 16,
                    last_year: None,
                    price: dec!(2),
                },
            ],
        };
        let params = ProjectParameters::builder()
            .bonus_schedule(schedule)
            .build()
            .unwrap();
        let curves = MerchantPriceCurves::new();
        let model = PriceModel::new(&params, &curves).unwrap();

        assert_eq!(model.price_for_year(1).unwrap().bonus_price, dec!(30));
        assert_eq!(model.price_for_year(5).unwrap().bonus_price, dec!(30));
        assert_eq!(model.price_for_year(6).unwrap().bonus_price, dec!(20));
        assert_eq!(model.price_for_year(15).unwrap().bonus_price, dec!(10));
        let merchant = model.price_for_year(25).unwrap();
        assert_eq!(merchant.source, RevenueSource::Merchant);
        assert_eq!(merchant.bonus_price, dec!(2));
        assert_eq!(merchant.total().unwrap(), merchant.energy_price + dec!(2));
    }

    #[test]
    fn test_revenue_unit_conversion() {
        let point = PricePoint {
            energy_price: dec!(114.05),
            bonus_price: Decimal::ZERO,
            source: RevenueSource::Contract,
            clamped: false,
        };
        // 10,125,000 kWh at $114.05/MWh
        assert_eq!(point.revenue(dec!(10_125_000)).unwrap(), dec!(1_154_756.25));
    }
}
