//! Currency and number coercion.
//!
//! Spreadsheet figures arrive as native numbers, blanks, or French-formatted
//! text such as `"1 200,50 €"` (space or non-breaking space thousands
//! separator, decimal comma, currency symbol). Everything becomes a finite
//! `f64`; anything unreadable becomes zero so one bad cell never aborts a
//! load.

use serde::Serialize;

use crate::models::table::Cell;

/// Outcome of coercing one cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Coerced {
    /// The cell held a readable number.
    Value(f64),
    /// Blank or unreadable; displayed as zero.
    Defaulted,
}

impl Coerced {
    pub fn value(self) -> f64 {
        match self {
            Coerced::Value(v) => v,
            Coerced::Defaulted => 0.0,
        }
    }

    pub fn is_defaulted(self) -> bool {
        matches!(self, Coerced::Defaulted)
    }
}

/// Coerce any cell to a number.
pub fn coerce_number(cell: &Cell) -> Coerced {
    match cell {
        Cell::Number(n) if n.is_finite() => Coerced::Value(*n),
        Cell::Text(s) => parse_amount(s),
        _ => Coerced::Defaulted,
    }
}

/// Shorthand for `coerce_number(cell).value()`.
pub fn to_number(cell: &Cell) -> f64 {
    coerce_number(cell).value()
}

/// Parse a locale-formatted amount.
///
/// Keeps digits, commas and minus signs, then reads the comma as the decimal
/// point. Dots are kept only when no comma is present, so text that is
/// already normalized (`"1200.5"`) reads back unchanged while `"1.200,50"`
/// treats the dot as a thousands separator.
pub fn parse_amount(raw: &str) -> Coerced {
    let has_comma = raw.contains(',');
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '-' || (*c == '.' && !has_comma))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    if cleaned.is_empty() {
        return Coerced::Defaulted;
    }

    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Coerced::Value(v),
        _ => Coerced::Defaulted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euro_amount() {
        assert_eq!(parse_amount("2 000,00 €"), Coerced::Value(2000.0));
        assert_eq!(parse_amount("1 200,50€"), Coerced::Value(1200.5));
        assert_eq!(parse_amount("500€"), Coerced::Value(500.0));
    }

    #[test]
    fn test_negative_amount() {
        assert_eq!(parse_amount("-150,5"), Coerced::Value(-150.5));
        assert_eq!(parse_amount("- 1 000 €"), Coerced::Value(-1000.0));
    }

    #[test]
    fn test_non_breaking_separators() {
        assert_eq!(parse_amount("1\u{a0}234\u{a0}567,89\u{a0}€"), Coerced::Value(1234567.89));
        assert_eq!(parse_amount("12\u{202f}000"), Coerced::Value(12000.0));
    }

    #[test]
    fn test_dot_thousands_with_decimal_comma() {
        assert_eq!(parse_amount("1.200,50"), Coerced::Value(1200.5));
    }

    #[test]
    fn test_already_normalized_text() {
        assert_eq!(parse_amount("1200.5"), Coerced::Value(1200.5));
        assert_eq!(parse_amount("42"), Coerced::Value(42.0));
    }

    #[test]
    fn test_garbage_defaults_to_zero() {
        for raw in ["", "   ", "n/a", "€", "1,2,3", "--5", "12-3", "inf", "NaN"] {
            let c = parse_amount(raw);
            assert!(c.is_defaulted(), "{raw:?} should default, got {c:?}");
            assert_eq!(c.value(), 0.0);
        }
    }

    #[test]
    fn test_cells() {
        assert_eq!(coerce_number(&Cell::Number(3.5)), Coerced::Value(3.5));
        assert_eq!(coerce_number(&Cell::Empty), Coerced::Defaulted);
        assert_eq!(coerce_number(&Cell::Bool(true)), Coerced::Defaulted);
        assert_eq!(coerce_number(&Cell::Number(f64::NAN)), Coerced::Defaulted);
        assert_eq!(to_number(&Cell::text("3 000 €")), 3000.0);
    }

    #[test]
    fn test_idempotent_on_numbers() {
        for raw in ["2 000,00 €", "-150,5", "oops", "0,01"] {
            let once = to_number(&Cell::text(raw));
            let twice = to_number(&Cell::Number(once));
            assert_eq!(once, twice);

            let via_text = to_number(&Cell::Text(once.to_string()));
            assert_eq!(once, via_text);
        }
    }
}
