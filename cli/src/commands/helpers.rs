use anyhow::{Context, Result, bail};
use serde::Serialize;

use larder_core::models::Unit;

/// Parse a quantity string with optional unit into `(quantity, unit)`.
/// Accepts: "200g", "500 ml", "2 tbsp", "1.5l", or a bare count like "3"
/// (treated as pieces).
pub(crate) fn parse_quantity(s: &str) -> Result<(f64, Unit)> {
    let s = s.trim();

    // Bare count: "3" means 3 pieces
    if let Ok(count) = s.parse::<f64>() {
        if count <= 0.0 {
            bail!("Quantity must be greater than 0");
        }
        return Ok((count, Unit::Piece));
    }

    // "N<unit>" with no space (e.g. "500ml", "2tbsp")
    if let Some((qty, unit)) = split_number_unit(s) {
        if qty <= 0.0 {
            bail!("Quantity must be greater than 0");
        }
        return Ok((qty, unit.parse()?));
    }

    // "<number> <unit>" format
    let parts: Vec<&str> = s.splitn(2, char::is_whitespace).collect();
    if parts.len() == 2 {
        let qty: f64 = parts[0]
            .parse()
            .with_context(|| format!("Invalid quantity: '{s}'"))?;
        if qty <= 0.0 {
            bail!("Quantity must be greater than 0");
        }
        return Ok((qty, parts[1].trim().parse()?));
    }

    bail!("Invalid quantity format: '{s}'. Use '200g', '500 ml', '2 tbsp', or a bare count")
}

/// Split "500ml" or "2.5tbsp" into (500.0, "ml") or (2.5, "tbsp").
fn split_number_unit(s: &str) -> Option<(f64, &str)> {
    let idx = s.find(|c: char| c.is_alphabetic())?;
    if idx == 0 {
        return None;
    }
    let (num_part, unit_part) = s.split_at(idx);
    let qty: f64 = num_part.parse().ok()?;
    if unit_part.is_empty() {
        return None;
    }
    Some((qty, unit_part))
}

/// Parse an ingredient spec of the form "Name=quantity", e.g.
/// "Plain flour=200g" or "Egg=2". A spec without '=' means one piece.
pub(crate) fn parse_ingredient_spec(s: &str) -> Result<(String, f64, Unit)> {
    match s.split_once('=') {
        Some((name, quantity)) => {
            let name = name.trim();
            if name.is_empty() {
                bail!("Invalid ingredient spec '{s}': name must not be empty");
            }
            let (qty, unit) = parse_quantity(quantity)?;
            Ok((name.to_string(), qty, unit))
        }
        None => {
            let name = s.trim();
            if name.is_empty() {
                bail!("Ingredient name must not be empty");
            }
            Ok((name.to_string(), 1.0, Unit::Piece))
        }
    }
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

/// Render a quantity without a trailing ".0" for whole numbers.
pub(crate) fn format_quantity(quantity: f64, unit: Unit) -> String {
    if (quantity.fract()).abs() < f64::EPSILON {
        format!("{quantity:.0} {unit}")
    } else {
        format!("{quantity} {unit}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity_bare_count() {
        let (qty, unit) = parse_quantity("3").unwrap();
        assert!((qty - 3.0).abs() < f64::EPSILON);
        assert_eq!(unit, Unit::Piece);
    }

    #[test]
    fn test_parse_quantity_no_space() {
        let (qty, unit) = parse_quantity("500ml").unwrap();
        assert!((qty - 500.0).abs() < f64::EPSILON);
        assert_eq!(unit, Unit::Ml);

        let (qty, unit) = parse_quantity("2.5tbsp").unwrap();
        assert!((qty - 2.5).abs() < f64::EPSILON);
        assert_eq!(unit, Unit::Tbsp);
    }

    #[test]
    fn test_parse_quantity_with_space() {
        let (qty, unit) = parse_quantity("1.5 l").unwrap();
        assert!((qty - 1.5).abs() < f64::EPSILON);
        assert_eq!(unit, Unit::L);
    }

    #[test]
    fn test_parse_quantity_invalid() {
        assert!(parse_quantity("abc").is_err());
        assert!(parse_quantity("200 cups").is_err());
        assert!(parse_quantity("").is_err());
    }

    #[test]
    fn test_parse_quantity_rejects_non_positive() {
        assert!(parse_quantity("0").is_err());
        assert!(parse_quantity("-3").is_err());
        assert!(parse_quantity("0g").is_err());
        assert!(parse_quantity("-50 ml").is_err());
    }

    #[test]
    fn test_parse_ingredient_spec() {
        let (name, qty, unit) = parse_ingredient_spec("Plain flour=200g").unwrap();
        assert_eq!(name, "Plain flour");
        assert!((qty - 200.0).abs() < f64::EPSILON);
        assert_eq!(unit, Unit::G);
    }

    #[test]
    fn test_parse_ingredient_spec_defaults_to_one_piece() {
        let (name, qty, unit) = parse_ingredient_spec("Lemon").unwrap();
        assert_eq!(name, "Lemon");
        assert!((qty - 1.0).abs() < f64::EPSILON);
        assert_eq!(unit, Unit::Piece);
    }

    #[test]
    fn test_parse_ingredient_spec_invalid() {
        assert!(parse_ingredient_spec("=200g").is_err());
        assert!(parse_ingredient_spec("  ").is_err());
        assert!(parse_ingredient_spec("Flour=abc").is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
    }

    #[test]
    fn test_truncate_utf8() {
        // Should not panic on multi-byte characters
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
        assert_eq!(truncate("Müsli", 10), "Müsli");
    }

    #[test]
    fn test_format_quantity() {
        assert_eq!(format_quantity(200.0, Unit::G), "200 g");
        assert_eq!(format_quantity(1.5, Unit::L), "1.5 l");
    }
}
