use rust_decimal::RoundingStrategy;

use crate::core::GenericResult;
use crate::types::Decimal;

pub fn validate_non_negative(name: &str, value: Decimal) -> GenericResult<Decimal> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err!("Invalid {name}: {value}");
    }
    Ok(value)
}

// Half away from zero, the same as round(x * 100) / 100 for floats
pub fn round_to(value: Decimal, points: u32) -> Decimal {
    value.round_dp_with_strategy(points, RoundingStrategy::MidpointAwayFromZero)
}

pub fn round(value: Decimal) -> Decimal {
    round_to(value, 2)
}
