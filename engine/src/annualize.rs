use arr_shared::Recurrence;
use rust_decimal::Decimal;

/// Annualized revenue of one billing line: `price * quantity * periods per year`.
///
/// `None` when the product does not fit in a `Decimal`.
pub fn annualize(price: Decimal, quantity: i64, recurrence: Recurrence) -> Option<Decimal> {
    price
        .checked_mul(Decimal::from(quantity))?
        .checked_mul(Decimal::from(recurrence.periods_per_year()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn monthly_is_twelve_periods() {
        assert_eq!(annualize(dec!(5), 1, Recurrence::Monthly), Some(dec!(60)));
    }

    #[test]
    fn quarterly_is_four_periods() {
        assert_eq!(annualize(dec!(4), 2, Recurrence::Quarterly), Some(dec!(32)));
    }

    #[test]
    fn annual_keeps_the_price() {
        assert_eq!(annualize(dec!(12), 2, Recurrence::Annually), Some(dec!(24)));
    }

    #[test]
    fn fractional_prices_stay_exact() {
        assert_eq!(annualize(dec!(9.99), 3, Recurrence::Monthly), Some(dec!(359.64)));
    }

    #[test]
    fn overflow_is_none() {
        assert_eq!(annualize(Decimal::MAX, 2, Recurrence::Monthly), None);
        assert_eq!(annualize(Decimal::MAX, 1, Recurrence::Annually), Some(Decimal::MAX));
    }
}
