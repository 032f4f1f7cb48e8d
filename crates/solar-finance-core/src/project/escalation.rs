use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;

use crate::error::SolarFinanceError;
use crate::types::{Money, Rate};
use crate::SolarFinanceResult;

/// Escalate `base` at `rate` per year, counting from `start_year`.
///
/// Years before `start_year` return `base` untouched; otherwise the exponent
/// is `year - start_year`, so the start year itself is also unescalated.
/// Each cost line picks its own start year (O&M uses 2, most lines use 1).
/// Long tenors at high rates can leave the decimal range; that is an error,
/// not a panic.
pub fn escalate(
    base: Money,
    rate: Rate,
    year: u32,
    start_year: u32,
) -> SolarFinanceResult<Money> {
    if year < start_year {
        return Ok(base);
    }
    (Decimal::ONE + rate)
        .checked_powi(i64::from(year - start_year))
        .and_then(|factor| base.checked_mul(factor))
        .ok_or_else(|| {
            SolarFinanceError::overflow(format!("escalating {base} at {rate} to year {year}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_before_start_year_is_flat() {
        assert_eq!(escalate(dec!(100), dec!(0.02), 1, 2).unwrap(), dec!(100));
        assert_eq!(escalate(dec!(100), dec!(0.02), 0, 1).unwrap(), dec!(100));
    }

    #[test]
    fn test_start_year_is_unescalated() {
        assert_eq!(escalate(dec!(100), dec!(0.02), 2, 2).unwrap(), dec!(100));
    }

    #[test]
    fn test_compounds_after_start() {
        let value = escalate(dec!(100), dec!(0.02), 4, 1).unwrap();
        // 100 * 1.02^3 = 106.1208
        assert_eq!(value, dec!(106.120800));
    }

    #[test]
    fn test_zero_rate() {
        assert_eq!(escalate(dec!(42), Decimal::ZERO, 30, 1).unwrap(), dec!(42));
    }

    #[test]
    fn test_doubling_for_two_hundred_years_is_an_error() {
        // 2^199 is far past the decimal range
        let err = escalate(dec!(114.05), Decimal::ONE, 200, 1).unwrap_err();
        assert!(
            matches!(err, SolarFinanceError::FinancialImpossibility(_)),
            "Expected FinancialImpossibility, got {err:?}"
        );
    }
}
