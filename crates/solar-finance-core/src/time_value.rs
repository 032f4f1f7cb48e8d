use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::SolarFinanceError;
use crate::types::{Energy, Money, Rate};
use crate::SolarFinanceResult;

const NPV_TOLERANCE: Decimal = dec!(0.000001);
const RATE_TOLERANCE: Decimal = dec!(0.0000000001);
const MAX_IRR_ITERATIONS: u32 = 100;
const MAX_BISECTION_ITERATIONS: u32 = 200;
const RATE_FLOOR: Decimal = dec!(-0.99);
const RATE_CEILING: Decimal = dec!(100);

/// Candidate rates scanned for a bisection bracket when Newton-Raphson fails.
/// Non-negative rates come first so the lowest non-negative root wins.
const BRACKET_GRID: [Decimal; 19] = [
    dec!(0),
    dec!(0.05),
    dec!(0.10),
    dec!(0.20),
    dec!(0.35),
    dec!(0.50),
    dec!(0.75),
    dec!(1),
    dec!(2),
    dec!(5),
    dec!(10),
    dec!(50),
    dec!(99),
    dec!(-0.10),
    dec!(-0.25),
    dec!(-0.50),
    dec!(-0.75),
    dec!(-0.90),
    dec!(-0.98),
];

/// Net Present Value of a series of cash flows, index 0 undiscounted.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> SolarFinanceResult<Money> {
    if rate <= dec!(-1) {
        return Err(SolarFinanceError::invalid(
            "rate",
            "Discount rate must be greater than -100%",
        ));
    }

    discounted_sum(rate, cash_flows).ok_or_else(|| SolarFinanceError::DegenerateMetric {
        context: format!("NPV discount factors at rate {rate}"),
    })
}

/// Internal Rate of Return.
///
/// Newton-Raphson from `guess`; when the derivative vanishes, the iterate
/// leaves `(-99%, 10_000%)` or the iteration cap is hit, falls back to
/// bisection over a bracket found by scanning [`BRACKET_GRID`]. A series
/// without a sign change has no IRR and is rejected up front.
pub fn irr(cash_flows: &[Money], guess: Rate) -> SolarFinanceResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(SolarFinanceError::InsufficientData(
            "IRR requires at least 2 cash flows".into(),
        ));
    }

    if !has_sign_change(cash_flows) {
        return Err(SolarFinanceError::UndefinedIrr(
            "cash flows do not change sign".into(),
        ));
    }

    match newton_irr(cash_flows, guess) {
        Some(rate) => Ok(rate),
        None => bisect_irr(cash_flows),
    }
}

/// Levelized cost of energy: discounted cost over discounted energy.
///
/// Returns cost per unit of whatever unit `energy` is expressed in.
pub fn lcoe(rate: Rate, costs: &[Money], energy: &[Energy]) -> SolarFinanceResult<Money> {
    if costs.len() != energy.len() {
        return Err(SolarFinanceError::invalid(
            "energy",
            format!(
                "cost series has {} entries but energy series has {}",
                costs.len(),
                energy.len()
            ),
        ));
    }

    let discounted_cost = npv(rate, costs)?;
    let discounted_energy = npv(rate, energy)?;

    if discounted_energy.is_zero() {
        return Err(SolarFinanceError::DegenerateMetric {
            context: "LCOE discounted energy sums to zero".into(),
        });
    }

    discounted_cost
        .checked_div(discounted_energy)
        .ok_or_else(|| SolarFinanceError::DegenerateMetric {
            context: format!("LCOE of {discounted_cost} over {discounted_energy} units"),
        })
}

/// First period at which cumulative cash flow turns strictly positive.
pub fn payback_year(cash_flows: &[Money]) -> SolarFinanceResult<Option<u32>> {
    let mut cumulative = Decimal::ZERO;
    for (t, cf) in cash_flows.iter().enumerate() {
        cumulative = cumulative
            .checked_add(*cf)
            .ok_or_else(|| SolarFinanceError::overflow(format!("cumulative cash flow at {t}")))?;
        if cumulative > Decimal::ZERO {
            return Ok(Some(t as u32));
        }
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn has_sign_change(cash_flows: &[Money]) -> bool {
    let has_positive = cash_flows.iter().any(|cf| cf.is_sign_positive() && !cf.is_zero());
    let has_negative = cash_flows.iter().any(|cf| cf.is_sign_negative() && !cf.is_zero());
    has_positive && has_negative
}

/// NPV with checked arithmetic; `None` when a discount factor overflows or
/// underflows to zero.
fn discounted_sum(rate: Rate, cash_flows: &[Money]) -> Option<Money> {
    npv_and_derivative(rate, cash_flows).map(|(value, _)| value)
}

fn npv_and_derivative(rate: Rate, cash_flows: &[Money]) -> Option<(Decimal, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return None;
    }

    let mut value = Decimal::ZERO;
    let mut derivative = Decimal::ZERO;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount.checked_mul(one_plus_r)?;
        }
        if discount.is_zero() {
            return None;
        }
        value = value.checked_add(cf.checked_div(discount)?)?;
        if t > 0 {
            let t_dec = Decimal::from(t as u64);
            let term = t_dec
                .checked_mul(*cf)?
                .checked_div(discount.checked_mul(one_plus_r)?)?;
            derivative = derivative.checked_sub(term)?;
        }
    }

    Some((value, derivative))
}

fn newton_irr(cash_flows: &[Money], guess: Rate) -> Option<Rate> {
    let mut rate = guess;

    for _ in 0..MAX_IRR_ITERATIONS {
        let (value, derivative) = npv_and_derivative(rate, cash_flows)?;

        if value.abs() < NPV_TOLERANCE {
            return Some(rate);
        }
        if derivative.is_zero() {
            return None;
        }

        let step = value.checked_div(derivative)?;
        let next = rate.checked_sub(step)?;
        if next <= RATE_FLOOR || next >= RATE_CEILING {
            return None;
        }
        if step.abs() < RATE_TOLERANCE {
            return Some(next);
        }
        rate = next;
    }

    None
}

fn bisect_irr(cash_flows: &[Money]) -> SolarFinanceResult<Rate> {
    let (mut low, mut high, mut value_low) = find_bracket(cash_flows)?;
    let mut last_delta = value_low;

    for _ in 0..MAX_BISECTION_ITERATIONS {
        let mid = (low + high) / dec!(2);
        let value_mid = discounted_sum(mid, cash_flows).ok_or_else(|| {
            SolarFinanceError::DegenerateMetric {
                context: format!("IRR bisection at rate {mid}"),
            }
        })?;
        last_delta = value_mid;

        if value_mid.abs() < NPV_TOLERANCE || (high - low) / dec!(2) < RATE_TOLERANCE {
            return Ok(mid);
        }

        if value_mid.is_sign_negative() == value_low.is_sign_negative() {
            low = mid;
            value_low = value_mid;
        } else {
            high = mid;
        }
    }

    Err(SolarFinanceError::ConvergenceFailure {
        function: "IRR".into(),
        iterations: MAX_BISECTION_ITERATIONS,
        last_delta,
    })
}

/// Scan the grid for two adjacent evaluable rates whose NPVs straddle zero.
/// Returns `(low, high, npv(low))` ordered so `low < high`.
fn find_bracket(cash_flows: &[Money]) -> SolarFinanceResult<(Rate, Rate, Money)> {
    let (positive_side, negative_side) = BRACKET_GRID.split_at(13);

    for side in [positive_side, negative_side] {
        let mut previous: Option<(Rate, Money)> = None;
        for &rate in side {
            let Some(value) = discounted_sum(rate, cash_flows) else {
                continue;
            };
            if value.is_zero() {
                return Ok((rate, rate, value));
            }
            if let Some((prev_rate, prev_value)) = previous {
                if prev_value.is_sign_negative() != value.is_sign_negative() {
                    return Ok(if prev_rate < rate {
                        (prev_rate, rate, prev_value)
                    } else {
                        (rate, prev_rate, value)
                    });
                }
            }
            previous = Some((rate, value));
        }
    }

    Err(SolarFinanceError::ConvergenceFailure {
        function: "IRR".into(),
        iterations: 0,
        last_delta: discounted_sum(Decimal::ZERO, cash_flows).unwrap_or(Decimal::MAX),
    })
}
