use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::SolarFinanceError;
use crate::project::params::ProjectParameters;
use crate::types::Energy;
use crate::SolarFinanceResult;

/// kW per MW
pub const KW_PER_MW: Decimal = dec!(1000);

/// Undegraded annual output in kWh: MW-dc x kWh/kWp x 1000.
pub fn base_production(params: &ProjectParameters) -> SolarFinanceResult<Energy> {
    params
        .nameplate_dc_mw
        .checked_mul(params.production.yield_kwh_per_kwp)
        .and_then(|kwh| kwh.checked_mul(KW_PER_MW))
        .ok_or_else(|| SolarFinanceError::overflow("annual production"))
}

/// Annual output in kWh for an operating year.
///
/// The construction year is not special-cased here; the projector assigns
/// it zero production.
pub fn annual_production(params: &ProjectParameters, year: u32) -> SolarFinanceResult<Energy> {
    let terms = &params.production;
    let factor = if year >= terms.degradation_start_year {
        (Decimal::ONE - terms.degradation_rate)
            .checked_powi(i64::from(year - terms.degradation_start_year))
            .ok_or_else(|| SolarFinanceError::overflow("degradation factor"))?
    } else {
        Decimal::ONE
    };
    base_production(params)?
        .checked_mul(factor)
        .ok_or_else(|| SolarFinanceError::overflow(format!("production in year {year}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::params::ProductionTerms;
    use rust_decimal_macros::dec;

    fn params(start_year: u32) -> ProjectParameters {
        ProjectParameters::builder()
            .production(ProductionTerms {
                yield_kwh_per_kwp: dec!(1350),
                degradation_rate: dec!(0.005),
                degradation_start_year: start_year,
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_base_production() {
        // 7.5 MW * 1350 kWh/kWp * 1000 = 10,125,000 kWh
        assert_eq!(base_production(&params(1)).unwrap(), dec!(10_125_000));
    }

    #[test]
    fn test_first_degradation_year_is_undegraded() {
        let p = params(1);
        assert_eq!(annual_production(&p, 1).unwrap(), dec!(10_125_000));
        assert_eq!(annual_production(&p, 2).unwrap(), dec!(10_125_000) * dec!(0.995));
    }

    #[test]
    fn test_degradation_compounds_from_start_year() {
        let p = params(3);
        let base = base_production(&p).unwrap();
        assert_eq!(annual_production(&p, 1).unwrap(), base);
        assert_eq!(annual_production(&p, 2).unwrap(), base);
        assert_eq!(annual_production(&p, 3).unwrap(), base);
        for year in 3..=36u32 {
            let expected = base * dec!(0.995).powi(i64::from(year - 3));
            assert_eq!(annual_production(&p, year).unwrap(), expected, "year {year}");
        }
    }

    #[test]
    fn test_capacity_past_decimal_range_is_an_error() {
        let mut p = params(1);
        p.nameplate_dc_mw = Decimal::MAX;
        assert!(annual_production(&p, 1).is_err());
    }
}
