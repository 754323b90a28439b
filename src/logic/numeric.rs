use std::cmp::Ordering;

use crate::model::{FeatureError, FeatureResult, Locale};

/// Round to the given number of decimal digits, half away from zero.
/// The pre-round epsilon nudge keeps binary representation error just
/// below the precision (2.675 * 100 == 267.4999...) from flipping the
/// rounding direction.
pub fn float_round(value: f64, digits: u32) -> f64 {
    if value == 0.0 {
        return 0.0;
    }
    let factor = 10f64.powi(digits as i32);
    let mut normalized = value * factor;
    let epsilon = 2f64.powf(normalized.abs().log2().floor() - 52.0);
    normalized += normalized.signum() * epsilon;
    normalized.round() / factor
}

/// Precision-tolerant comparison: both sides are rounded to the declared
/// digits first, and values closer than half a unit of that precision
/// compare equal. A value is only "out of bounds" when it exceeds the
/// bound by more than this tolerance, never by raw float inequality.
pub fn float_compare(a: f64, b: f64, digits: u32) -> Ordering {
    let ra = float_round(a, digits);
    let rb = float_round(b, digits);
    let tolerance = 10f64.powi(-(digits as i32)) / 2.0;
    if (ra - rb).abs() < tolerance {
        Ordering::Equal
    } else if ra < rb {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// Render a number at the given precision with the locale's separators,
/// grouping the integer part in threes.
pub fn format_number(value: f64, digits: u32, locale: &Locale) -> String {
    let rounded = float_round(value, digits);
    let raw = format!("{:.*}", digits as usize, rounded.abs());
    let (int_part, frac_part) = match raw.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (raw.as_str(), None),
    };

    let mut grouped = String::new();
    let len = int_part.len();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(locale.thousands_sep);
        }
        grouped.push(ch);
    }

    let mut out = String::new();
    if rounded < 0.0 {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push(locale.decimal_point);
        out.push_str(frac);
    }
    out
}

/// Parse user input with the locale's separators. Thousands separators
/// are stripped, the decimal point normalized, then parsed as f64.
pub fn parse_number(input: &str, locale: &Locale) -> FeatureResult<f64> {
    let normalized: String = input
        .trim()
        .chars()
        .filter(|c| *c != locale.thousands_sep)
        .map(|c| if c == locale.decimal_point { '.' } else { c })
        .collect();
    normalized
        .parse::<f64>()
        .map_err(|_| FeatureError::validation(format!("not a valid number: {}", input)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_respects_precision_tolerance() {
        // Differences below the declared precision compare equal.
        assert_eq!(float_compare(12.504, 12.5, 2), Ordering::Equal);
        assert_eq!(float_compare(12.51, 12.5, 2), Ordering::Greater);
        assert_eq!(float_compare(12.49, 12.5, 2), Ordering::Less);
        // Exact bound values compare equal at any precision.
        assert_eq!(float_compare(100.0, 100.0, 4), Ordering::Equal);
    }

    #[test]
    fn round_half_away_from_zero() {
        assert_eq!(float_round(2.675, 2), 2.68);
        assert_eq!(float_round(-2.675, 2), -2.68);
        assert_eq!(float_round(1.0, 0), 1.0);
    }

    #[test]
    fn format_uses_locale_separators() {
        let en = Locale::default();
        let es = Locale::named("es_ES");
        assert_eq!(format_number(1234.5, 2, &en), "1,234.50");
        assert_eq!(format_number(1234.5, 2, &es), "1.234,50");
        assert_eq!(format_number(-1234567.0, 0, &en), "-1,234,567");
    }

    #[test]
    fn parse_accepts_locale_separators() {
        let en = Locale::default();
        let es = Locale::named("es_ES");
        assert_eq!(parse_number("1,234.50", &en).unwrap(), 1234.5);
        assert_eq!(parse_number("1.234,50", &es).unwrap(), 1234.5);
        assert_eq!(parse_number("  42 ", &en).unwrap(), 42.0);
        assert!(matches!(
            parse_number("red", &en),
            Err(FeatureError::Validation(_))
        ));
    }

    #[test]
    fn format_parse_round_trip_at_precision() {
        let en = Locale::default();
        let rendered = format_number(12.5, 2, &en);
        assert_eq!(rendered, "12.50");
        assert_eq!(parse_number(&rendered, &en).unwrap(), 12.5);
    }
}
