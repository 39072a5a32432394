//! Price String Parsing
//!
//! Orders store their price as free text as entered in the configurator
//! ("25€", "25,50€", "1 234,50 €"). The charged amount is derived from that
//! field alone at session-creation time, never from client input.

/// Parse a free-text price into integer minor units (cents).
///
/// Strips every character that is not an ASCII digit, comma or period,
/// treats the first remaining comma as the decimal separator, then rounds
/// to the nearest cent. Unparseable or empty input yields 0, which callers
/// reject as an invalid amount.
pub fn parse_price_minor_units(price: &str) -> i64 {
    let kept: String = price
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.'))
        .collect();
    let normalized = kept.replacen(',', ".", 1);
    let value: f64 = normalized.parse().unwrap_or(0.0);
    (value * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_euro_price() {
        assert_eq!(parse_price_minor_units("25€"), 2500);
    }

    #[test]
    fn comma_decimal() {
        assert_eq!(parse_price_minor_units("25,50€"), 2550);
    }

    #[test]
    fn period_decimal() {
        assert_eq!(parse_price_minor_units("25.50"), 2550);
    }

    #[test]
    fn spaced_thousands() {
        assert_eq!(parse_price_minor_units("1 234,50 €"), 123_450);
    }

    #[test]
    fn zero_price() {
        assert_eq!(parse_price_minor_units("0€"), 0);
    }

    #[test]
    fn empty_and_garbage_yield_zero() {
        assert_eq!(parse_price_minor_units(""), 0);
        assert_eq!(parse_price_minor_units("gratis"), 0);
    }

    #[test]
    fn ambiguous_thousands_separator_rejected() {
        // "1.234,50" normalizes to "1.234.50", which is not a decimal; the
        // caller refuses the charge instead of guessing the grouping.
        assert_eq!(parse_price_minor_units("1.234,50€"), 0);
        assert_eq!(parse_price_minor_units("1,234.50€"), 0);
    }

    #[test]
    fn rounds_to_nearest_cent() {
        assert_eq!(parse_price_minor_units("19.999"), 2000);
    }
}
