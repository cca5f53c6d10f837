//! Display formatting for amounts, percentages and dates.

use numfmt::{Formatter, Precision};
use time::Date;

use crate::settings::find_currency;

/// Format `amount` in the currency with `currency_code`, e.g. "$1,234.50".
///
/// Unknown currency codes fall back to the plain number.
pub fn format_currency(amount: f64, currency_code: &str) -> String {
    let Some(currency) = find_currency(currency_code) else {
        return amount.to_string();
    };

    let sign = if amount < 0.0 { "-" } else { "" };
    let decimals = usize::from(currency.decimals);

    if amount == 0.0 {
        // numfmt renders zero as a bare "0".
        return format!("{}{:.*}", currency.symbol, decimals, 0.0);
    }

    let formatter = match Formatter::currency(&format!("{sign}{}", currency.symbol)) {
        Ok(formatter) => formatter.precision(Precision::Decimals(currency.decimals)),
        Err(error) => {
            tracing::warn!("could not build formatter for {}: {error:?}", currency.code);
            return amount.to_string();
        }
    };

    let mut formatted = formatter.fmt_string(amount.abs());

    // numfmt drops a trailing zero, e.g. "12.30" is rendered as "12.3".
    if decimals > 0 {
        let fraction_digits = formatted
            .rsplit_once('.')
            .map_or(0, |(_, fraction)| fraction.len());
        if fraction_digits == 0 {
            formatted.push('.');
        }
        formatted.extend(std::iter::repeat_n('0', decimals.saturating_sub(fraction_digits)));
    }

    formatted
}

/// Format a percentage with one decimal place and an explicit sign for positive values.
pub fn format_percentage(value: f64) -> String {
    let sign = if value > 0.0 { "+" } else { "" };

    format!("{sign}{value:.1}%")
}

/// Format `date` with one of the supported date format codes.
///
/// Unknown codes use "YYYY-MM-DD".
pub fn format_date(date: Date, format_code: &str) -> String {
    let year = date.year();
    let month = u8::from(date.month());
    let day = date.day();

    match format_code {
        "MM/DD/YYYY" => format!("{month:02}/{day:02}/{year}"),
        "DD/MM/YYYY" => format!("{day:02}/{month:02}/{year}"),
        _ => format!("{year}-{month:02}-{day:02}"),
    }
}


#[cfg(test)]
mod format_percentage_tests {
    use super::format_percentage;

    #[test]
    fn positive_values_get_plus_sign() {
        assert_eq!(format_percentage(66.666), "+66.7%");
    }

    #[test]
    fn negative_values_keep_minus_sign() {
        assert_eq!(format_percentage(-75.0), "-75.0%");
    }

    #[test]
    fn zero_has_no_sign() {
        assert_eq!(format_percentage(0.0), "0.0%");
    }
}
