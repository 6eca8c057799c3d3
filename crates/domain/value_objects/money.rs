use rust_decimal::Decimal;

use crate::domain::value_objects::installments::InstallmentError;

// https://docs.stripe.com/currencies#zero-decimal
const ZERO_DECIMAL_CURRENCIES: [&str; 16] = [
    "bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga", "pyg", "rwf", "ugx", "vnd", "vuv",
    "xaf", "xof", "xpf",
];

pub fn is_zero_decimal_currency(currency: &str) -> bool {
    let currency = currency.trim().to_ascii_lowercase();
    ZERO_DECIMAL_CURRENCIES.contains(&currency.as_str())
}

fn minor_unit_scale(currency: &str) -> u32 {
    if is_zero_decimal_currency(currency) { 0 } else { 2 }
}

/// Converts a major-unit amount into the minor units Stripe bills in.
pub fn to_minor_units(amount: Decimal, currency: &str) -> Result<Decimal, InstallmentError> {
    if amount <= Decimal::ZERO {
        return Err(InstallmentError::InvalidAmount(amount.to_string()));
    }

    let factor = Decimal::from(10_i64.pow(minor_unit_scale(currency)));
    let minor = (amount * factor).normalize();

    if !minor.fract().is_zero() {
        return Err(InstallmentError::InvalidAmount(format!(
            "{amount} has more precision than {currency} allows"
        )));
    }

    Ok(minor)
}

/// Renders minor units back as a major-unit string, e.g. `3333` usd -> `33.33`.
pub fn format_minor_units(amount_minor: i64, currency: &str) -> String {
    let scale = minor_unit_scale(currency);
    Decimal::new(amount_minor, scale).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn two_decimal_currencies_scale_by_hundred() {
        let minor = to_minor_units(Decimal::from_str("33.33").unwrap(), "usd").unwrap();
        assert_eq!(minor.to_string(), "3333");
    }

    #[test]
    fn zero_decimal_currencies_keep_the_amount() {
        let minor = to_minor_units(Decimal::from_str("1500").unwrap(), "JPY").unwrap();
        assert_eq!(minor.to_string(), "1500");
        assert!(to_minor_units(Decimal::from_str("1500.50").unwrap(), "jpy").is_err());
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        assert!(to_minor_units(Decimal::ZERO, "usd").is_err());
        assert!(to_minor_units(Decimal::from_str("-1").unwrap(), "usd").is_err());
    }

    #[test]
    fn formats_minor_units() {
        assert_eq!(format_minor_units(3333, "usd"), "33.33");
        assert_eq!(format_minor_units(500, "eur"), "5.00");
        assert_eq!(format_minor_units(1500, "jpy"), "1500");
    }
}
