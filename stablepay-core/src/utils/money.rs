use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Errors produced while converting USD amounts to integer cents.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount {0} is negative")]
    Negative(Decimal),
    #[error("amount {0} does not fit in integer cents")]
    OutOfRange(Decimal),
}

/// Convert a USD amount to integer cents.
///
/// Rounds half away from zero, so `1.005` becomes `101` cents.  Negative
/// amounts are rejected before any rounding happens.
pub fn usd_cents(amount: Decimal) -> Result<u64, AmountError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(AmountError::Negative(amount));
    }
    let cents = amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or(AmountError::OutOfRange(amount))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    cents.to_u64().ok_or(AmountError::OutOfRange(amount))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn converts_exact_cent_amounts() {
        assert_eq!(usd_cents(Decimal::new(1250, 2)).unwrap(), 1250);
        assert_eq!(usd_cents(Decimal::ZERO).unwrap(), 0);
        assert_eq!(usd_cents(Decimal::new(3548, 2)).unwrap(), 3548);
    }

    #[test]
    fn rounds_half_cents_away_from_zero() {
        assert_eq!(usd_cents(Decimal::new(1005, 3)).unwrap(), 101);
        assert_eq!(usd_cents(Decimal::new(1004, 3)).unwrap(), 100);
    }

    #[test]
    fn rejects_negative_amounts() {
        assert_eq!(
            usd_cents(Decimal::new(-100, 2)),
            Err(AmountError::Negative(Decimal::new(-100, 2)))
        );
    }

    #[test]
    fn rejects_amounts_beyond_integer_cents() {
        assert!(matches!(
            usd_cents(Decimal::MAX),
            Err(AmountError::OutOfRange(_))
        ));
        assert!(matches!(
            usd_cents(Decimal::from(u64::MAX)),
            Err(AmountError::OutOfRange(_))
        ));
    }
}
