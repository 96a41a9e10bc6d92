use bigdecimal::{BigDecimal, Zero};
use std::str::FromStr;

pub const CURRENCY_SYMBOL: &str = "R$";

/// Formats an amount in pt-BR notation with exactly two fraction digits.
///
/// `1234.5` renders as `"1.234,50"`. Values are rounded half-up to cents.
pub fn format_decimal_br(value: &BigDecimal) -> String {
    let cents = to_cents(value);
    let (sign, digits) = match cents.strip_prefix('-') {
        Some(digits) => ("-", digits),
        None => ("", cents.as_str()),
    };
    let padded = format!("{:0>3}", digits);
    let (int_part, frac_part) = padded.split_at(padded.len() - 2);

    format!("{}{},{}", sign, group_thousands(int_part), frac_part)
}

/// Same as [`format_decimal_br`] with the `R$` prefix.
pub fn format_brl(value: &BigDecimal) -> String {
    format!("{} {}", CURRENCY_SYMBOL, format_decimal_br(value))
}

/// Running currency mask: digits count as cents, `"1234"` becomes `"12,34"`.
/// No digits at all gives an empty string.
pub fn mask_cents_input(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return String::new();
    }

    let trimmed = digits.trim_start_matches('0');
    let padded = format!("{:0>3}", trimmed);
    let (int_part, frac_part) = padded.split_at(padded.len() - 2);

    format!("{},{}", group_thousands(int_part), frac_part)
}

/// Lenient parse of masked input (`"R$ 1.234,56"`); unparsable text is zero.
pub fn parse_localized(text: &str) -> BigDecimal {
    let cleaned: String = text
        .trim()
        .trim_start_matches(CURRENCY_SYMBOL)
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    if cleaned.is_empty() {
        return BigDecimal::zero();
    }
    BigDecimal::from_str(&cleaned).unwrap_or_else(|_| BigDecimal::zero())
}

/// Strict parse of `"1234.56"` or `"R$ 1.234,56"`. Anything else is `None`.
pub fn parse_amount(text: &str) -> Option<BigDecimal> {
    let text = text.trim();
    let body = text.strip_prefix(CURRENCY_SYMBOL).unwrap_or(text).trim();
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return None;
    }

    let amount = if body.contains(',') {
        let (int_part, frac_part) = body.split_once(',')?;
        if frac_part.contains(['.', ',']) || frac_part.is_empty() {
            return None;
        }
        BigDecimal::from_str(&format!("{}.{}", int_part.replace('.', ""), frac_part)).ok()?
    } else {
        BigDecimal::from_str(body).ok()?
    };
    Some(amount)
}

/// Converts a JSON number to an exact decimal through its shortest text form,
/// so `0.1` stays `0.1` instead of the nearest binary fraction.
pub fn decimal_from_json(number: &serde_json::Number) -> Option<BigDecimal> {
    BigDecimal::from_str(&number.to_string()).ok()
}

// Integer cents as decimal text, with a leading '-' when negative.
fn to_cents(value: &BigDecimal) -> String {
    let (cents, _) = (value.clone() * BigDecimal::from(100))
        .round(0)
        .with_scale(0)
        .as_bigint_and_exponent();
    cents.to_string()
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (len - idx) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn formats_with_grouping_and_two_digits() {
        assert_eq!(format_decimal_br(&dec("1234.5")), "1.234,50");
        assert_eq!(format_decimal_br(&dec("0")), "0,00");
        assert_eq!(format_decimal_br(&dec("1234567.891")), "1.234.567,89");
        assert_eq!(format_decimal_br(&dec("999.999")), "1.000,00");
        assert_eq!(format_brl(&dec("-12.3")), "R$ -12,30");
    }

    #[test]
    fn formats_amounts_beyond_64_bits() {
        let huge = dec("999999999999999999.99");
        assert_eq!(format_decimal_br(&huge), "999.999.999.999.999.999,99");
        assert_eq!(
            format_decimal_br(&parse_localized(&mask_cents_input("99999999999999999999"))),
            "999.999.999.999.999.999,99"
        );
        assert_eq!(format_decimal_br(&dec("-0.004")), "0,00");
        assert_eq!(format_decimal_br(&dec("0.05")), "0,05");
    }

    #[test]
    fn mask_treats_digits_as_cents() {
        assert_eq!(mask_cents_input("1234"), "12,34");
        assert_eq!(mask_cents_input("12345"), "123,45");
        assert_eq!(mask_cents_input("123456"), "1.234,56");
        assert_eq!(mask_cents_input("5"), "0,05");
        assert_eq!(mask_cents_input("00012"), "0,12");
        assert_eq!(mask_cents_input("R$ 1.2a3,4"), "12,34");
        assert_eq!(mask_cents_input("abc"), "");
    }

    #[test]
    fn masked_text_parses_back() {
        assert_eq!(parse_localized(&mask_cents_input("12345")), dec("123.45"));
        assert_eq!(parse_localized("1.234,56"), dec("1234.56"));
        assert_eq!(parse_localized("R$ 80,00"), dec("80"));
    }

    #[test]
    fn empty_or_garbage_parses_to_zero() {
        assert!(parse_localized("").is_zero());
        assert!(parse_localized("   ").is_zero());
        assert!(parse_localized("abc").is_zero());
    }

    #[test]
    fn strict_amounts_reject_text() {
        assert_eq!(parse_amount("1234.56"), Some(dec("1234.56")));
        assert_eq!(parse_amount(" R$ 1.234,56 "), Some(dec("1234.56")));
        assert_eq!(parse_amount("50,00"), Some(dec("50")));
        assert_eq!(parse_amount("0"), Some(dec("0")));
        assert_eq!(parse_amount("N/A"), None);
        assert_eq!(parse_amount("ilegível"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("-10"), None);
        assert_eq!(parse_amount("1,2,3"), None);
        assert_eq!(parse_amount("12,"), None);
    }

    #[test]
    fn json_numbers_keep_their_decimal_text() {
        let serde_json::Value::Number(number) = serde_json::json!(0.1) else {
            panic!("expected a number");
        };
        assert_eq!(decimal_from_json(&number), Some(dec("0.1")));
    }
}
