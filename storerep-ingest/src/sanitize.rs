//! Value sanitizers
//!
//! Coerce untrusted raw values (form input, spreadsheet cells, model output)
//! into values that satisfy a field's invariant:
//! - numbers are always finite
//! - text never contains `<`, `>`, `&` or control characters

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// First signed decimal embedded in a string ("Revenue:1200USD" → "1200")
static EMBEDDED_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?|-?\.\d+").expect("static regex is valid"));

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₹', '₩', '₽', '¢'];

/// Characters removed from text values in addition to control characters
const MARKUP_CHARS: &[char] = &['<', '>', '&'];

/// Coerce a raw value into a finite number
///
/// # Arguments
/// * `raw` - Raw value (JSON number, string, or anything else)
/// * `fallback` - Returned when nothing numeric can be recovered; callers pass
///   context-specific values such as the field's previous value
///
/// # Returns
/// * The recovered number, or `fallback` (or `0` if `fallback` itself is not finite)
pub fn to_safe_number(raw: &Value, fallback: f64) -> f64 {
    let fallback = if fallback.is_finite() { fallback } else { 0.0 };

    match raw {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(fallback),
        Value::String(s) => parse_number_text(s).unwrap_or(fallback),
        _ => fallback,
    }
}

/// Parse free-form numeric text: "$1,234.50", "(500)", "12 %", "Revenue: 1,200 USD"
fn parse_number_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut cleaned: String = trimmed
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && *c != ',' && *c != '%' && !c.is_whitespace())
        .collect();

    // Accounting notation: "(500)" is -500
    let negative = cleaned.len() >= 2 && cleaned.starts_with('(') && cleaned.ends_with(')');
    if negative {
        cleaned = cleaned[1..cleaned.len() - 1].to_string();
    }

    let value = match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => EMBEDDED_NUMBER
            .find(&cleaned)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .filter(|v| v.is_finite())?,
    };

    Some(if negative { -value } else { value })
}

/// Bound `value` to `[lo, hi]`
pub fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}

/// Strip markup and control characters, trim, and substitute `fallback` when empty
///
/// `null` is treated as the empty string; numbers and booleans are
/// stringified. Arrays and objects are not text and resolve to `fallback`.
pub fn sanitize_text(raw: &Value, fallback: &str) -> String {
    let text = match raw {
        Value::String(s) => s.clone(),
        Value::Number(n) => number_text(n),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    };

    let stripped: String = text
        .chars()
        .filter(|c| !c.is_control() && !MARKUP_CHARS.contains(c))
        .collect();
    let trimmed = stripped.trim();

    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Render a JSON number as a person would type it: `35.0` → "35", `1.5` → "1.5"
fn number_text(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_currency_and_separators() {
        assert_eq!(to_safe_number(&json!("$1,234.50"), 0.0), 1234.5);
        assert_eq!(to_safe_number(&json!("€ 2 500"), 0.0), 2500.0);
        assert_eq!(to_safe_number(&json!("£99"), 0.0), 99.0);
    }

    #[test]
    fn test_percent() {
        assert_eq!(to_safe_number(&json!("12%"), 0.0), 12.0);
        assert_eq!(to_safe_number(&json!(" 45.5 % "), 0.0), 45.5);
    }

    #[test]
    fn test_parenthesized_negative() {
        assert_eq!(to_safe_number(&json!("(500)"), 0.0), -500.0);
        assert_eq!(to_safe_number(&json!("($1,000.25)"), 0.0), -1000.25);
    }

    #[test]
    fn test_embedded_number() {
        assert_eq!(to_safe_number(&json!("Revenue: 1,200 USD"), 0.0), 1200.0);
        assert_eq!(to_safe_number(&json!("approx -3.5k"), 0.0), -3.5);
    }

    #[test]
    fn test_fallback_when_unparsable() {
        assert_eq!(to_safe_number(&json!(""), 7.0), 7.0);
        assert_eq!(to_safe_number(&json!("   "), 7.0), 7.0);
        assert_eq!(to_safe_number(&json!("n/a"), 42.0), 42.0);
        assert_eq!(to_safe_number(&json!(null), 3.0), 3.0);
        assert_eq!(to_safe_number(&json!(true), 3.0), 3.0);
        assert_eq!(to_safe_number(&json!([1, 2]), 3.0), 3.0);
    }

    #[test]
    fn test_non_finite_never_escapes() {
        assert_eq!(to_safe_number(&json!("Infinity"), 5.0), 5.0);
        assert_eq!(to_safe_number(&json!("NaN"), 5.0), 5.0);
        assert_eq!(to_safe_number(&json!("x"), f64::NAN), 0.0);
    }

    #[test]
    fn test_plain_numbers_pass_through() {
        assert_eq!(to_safe_number(&json!(10), 0.0), 10.0);
        assert_eq!(to_safe_number(&json!(-2.25), 0.0), -2.25);
        assert_eq!(to_safe_number(&json!("1e3"), 0.0), 1000.0);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(150.0, 0.0, 100.0), 100.0);
        assert_eq!(clamp(-10.0, 0.0, 100.0), 0.0);
        assert_eq!(clamp(55.5, 0.0, 100.0), 55.5);
    }

    #[test]
    fn test_text_strips_markup_and_controls() {
        let cleaned = sanitize_text(&json!("  <b>Acme & Co</b>\u{0007}\n"), "Unknown");
        assert_eq!(cleaned, "bAcme  Co/b");
        assert!(!cleaned.contains(['<', '>', '&']));
        assert!(!cleaned.chars().any(|c| c.is_control()));
    }

    #[test]
    fn test_text_fallback() {
        assert_eq!(sanitize_text(&json!("   "), "Unknown"), "Unknown");
        assert_eq!(sanitize_text(&json!(null), "Unknown"), "Unknown");
        assert_eq!(sanitize_text(&json!("<>&"), ""), "");
        assert_eq!(sanitize_text(&json!({"a": 1}), "x"), "x");
    }

    #[test]
    fn test_text_from_scalars() {
        assert_eq!(sanitize_text(&json!(15), ""), "15");
        assert_eq!(sanitize_text(&json!(true), ""), "true");
    }

    #[test]
    fn test_whole_floats_render_without_fraction() {
        assert_eq!(sanitize_text(&json!(35.0), ""), "35");
        assert_eq!(sanitize_text(&json!(2024.0), ""), "2024");
        assert_eq!(sanitize_text(&json!(12.5), ""), "12.5");
    }
}
