//! Monetary text parsing and formatting.
//!
//! The portal renders amounts in Brazilian Portuguese conventions
//! (`R$ 1.234,56`). Both directions work off a [`CurrencyStyle`] so the
//! separator convention is configuration, not a hard-coded locale.

use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Separator convention and symbol for monetary text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyStyle {
    /// Symbol prefix (e.g. "R$", "$").
    pub symbol: String,

    /// Grouping separator between thousands.
    pub thousands_separator: char,

    /// Separator between the integer and fractional parts.
    pub decimal_separator: char,
}

impl Default for CurrencyStyle {
    fn default() -> Self {
        Self {
            symbol: "R$".to_string(),
            thousands_separator: '.',
            decimal_separator: ',',
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CurrencyParseError {
    #[error("no numeric value in {0:?}")]
    NoNumericRun(String),

    #[error("malformed numeric value {0:?}")]
    Malformed(String),
}

/// Extract the first monetary amount from arbitrary surrounding text.
///
/// Accepts values like `"R$ 1.234,56"` or `"1.234,56"`: the first run of
/// digits and separators is located, grouping separators are stripped, and
/// the decimal separator is normalized before parsing.
pub fn parse_amount(text: &str, style: &CurrencyStyle) -> Result<Decimal, CurrencyParseError> {
    let pattern = format!(
        r"\d[\d{}{}]*",
        regex::escape(&style.thousands_separator.to_string()),
        regex::escape(&style.decimal_separator.to_string()),
    );
    let re = Regex::new(&pattern).expect("numeric-run pattern is valid");

    let run = re
        .find(text)
        .ok_or_else(|| CurrencyParseError::NoNumericRun(text.to_string()))?;

    let cleaned: String = run
        .as_str()
        .chars()
        .filter(|c| *c != style.thousands_separator)
        .map(|c| if c == style.decimal_separator { '.' } else { c })
        .collect();

    Decimal::from_str(&cleaned).map_err(|_| CurrencyParseError::Malformed(text.to_string()))
}

/// Render an amount with exactly two decimal places, thousands grouping,
/// and an optional symbol prefix: `1234.56` becomes `"R$ 1.234,56"`.
pub fn format_amount(value: Decimal, style: &CurrencyStyle, include_symbol: bool) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let abs = rounded.abs().normalize().to_string();

    let (int_part, frac_part) = match abs.split_once('.') {
        Some((i, f)) => (i, f),
        None => (abs.as_str(), ""),
    };

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if include_symbol {
        out.push_str(&style.symbol);
        out.push(' ');
    }
    out.push_str(&group_int_digits(int_part, style.thousands_separator));
    out.push(style.decimal_separator);
    out.push_str(frac_part);
    for _ in frac_part.len()..2 {
        out.push('0');
    }
    out
}

fn group_int_digits(int_part: &str, separator: char) -> String {
    // Insert the separator every 3 digits, preserving any leading zeros.
    let len = int_part.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in int_part.chars().enumerate() {
        out.push(ch);
        let remaining = len.saturating_sub(i + 1);
        if remaining > 0 && remaining % 3 == 0 {
            out.push(separator);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn parse_symbol_prefixed_amount() {
        let style = CurrencyStyle::default();
        assert_eq!(parse_amount("R$ 1.234,56", &style).unwrap(), dec("1234.56"));
    }

    #[test]
    fn parse_zero() {
        let style = CurrencyStyle::default();
        assert_eq!(parse_amount("0,00", &style).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn parse_surrounding_text() {
        let style = CurrencyStyle::default();
        assert_eq!(
            parse_amount("Saldo disponível: R$ 10.000,00 nesta conta", &style).unwrap(),
            dec("10000")
        );
    }

    #[test]
    fn parse_without_digits_fails() {
        let style = CurrencyStyle::default();
        assert_eq!(
            parse_amount("abc", &style),
            Err(CurrencyParseError::NoNumericRun("abc".to_string()))
        );
    }

    #[test]
    fn format_grouped_with_symbol() {
        let style = CurrencyStyle::default();
        assert_eq!(format_amount(dec("1234.56"), &style, true), "R$ 1.234,56");
        assert_eq!(
            format_amount(dec("1234567.5"), &style, true),
            "R$ 1.234.567,50"
        );
    }

    #[test]
    fn format_zero_without_symbol() {
        let style = CurrencyStyle::default();
        assert_eq!(format_amount(Decimal::ZERO, &style, false), "0,00");
    }

    #[test]
    fn format_negative_sign_precedes_symbol() {
        let style = CurrencyStyle::default();
        assert_eq!(format_amount(dec("-1234.5"), &style, true), "-R$ 1.234,50");
    }

    #[test]
    fn format_rounds_half_away_from_zero() {
        let style = CurrencyStyle::default();
        assert_eq!(format_amount(dec("0.005"), &style, false), "0,01");
        assert_eq!(format_amount(dec("2.675"), &style, false), "2,68");
    }

    #[test]
    fn roundtrip_two_decimal_amounts() {
        let style = CurrencyStyle::default();
        let values = [
            "0", "0.01", "1", "999.99", "1000", "1234.56", "10000", "987654321.09",
        ];
        for v in values {
            let value = dec(v);
            let formatted = format_amount(value, &style, true);
            assert_eq!(
                parse_amount(&formatted, &style).unwrap(),
                value,
                "Roundtrip failed for {formatted}"
            );
        }
    }

    #[test]
    fn alternate_separator_convention() {
        let style = CurrencyStyle {
            symbol: "$".to_string(),
            thousands_separator: ',',
            decimal_separator: '.',
        };
        assert_eq!(parse_amount("$1,234.56", &style).unwrap(), dec("1234.56"));
        assert_eq!(format_amount(dec("1234.56"), &style, true), "$ 1,234.56");
    }
}
