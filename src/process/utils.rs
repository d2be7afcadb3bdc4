/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parse a cleaned cell as f64. NaN counts as unparsable.
pub fn parse_number(raw: &str) -> Option<f64> {
    clean_str(raw).parse::<f64>().ok().filter(|n| !n.is_nan())
}

/// True when the cell spells positive or negative infinity.
pub fn is_infinite_text(raw: &str) -> bool {
    parse_number(raw).is_some_and(f64::is_infinite)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_quotes_and_whitespace() {
        assert_eq!(clean_str("  \"12.5\" "), "12.5");
        assert_eq!(clean_str("\""), "\"");
    }

    #[test]
    fn parses_numbers() {
        assert_eq!(parse_number(" 42 "), Some(42.0));
        assert_eq!(parse_number("-0.5"), Some(-0.5));
        assert_eq!(parse_number("N/A"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("1,234"), None);
    }

    #[test]
    fn spots_infinity_spellings() {
        for s in ["inf", "-inf", "Infinity", "-infinity", "+inf"] {
            assert!(is_infinite_text(s), "{}", s);
        }
        assert!(!is_infinite_text("info"));
        assert!(!is_infinite_text("1e3"));
    }
}
