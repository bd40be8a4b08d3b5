use crate::errors::ServiceError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Converts a decimal amount into integer cents, rounding half to even.
pub fn to_cents(amount: Decimal) -> Result<i64, ServiceError> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| ServiceError::ValidationError(format!("Amount {amount} is out of range")))
}

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Validator hook rejecting negative amounts.
pub fn validate_non_negative(amount: &Decimal) -> Result<(), validator::ValidationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(validator::ValidationError::new("negative_amount"));
    }
    Ok(())
}
