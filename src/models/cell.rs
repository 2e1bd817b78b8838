// src/models/cell.rs
//! Loosely typed cell values coming from a workbook or CSV file.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell as read from a sheet. Typed access goes through
/// [`CellValue::to_text`], [`CellValue::to_number`] and [`CellValue::to_flag`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// Builds a cell from raw text; blank strings become `Empty`.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(trimmed.to_string())
        }
    }

    pub fn from_opt_number(value: Option<f64>) -> Self {
        match value {
            Some(n) if n.is_finite() => CellValue::Number(n),
            _ => CellValue::Empty,
        }
    }

    pub fn from_opt_text(value: Option<&str>) -> Self {
        match value {
            Some(s) => CellValue::from_raw(s),
            None => CellValue::Empty,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Text form used for key attributes. Numbers print without a trailing
    /// `.0` so product codes stored as numbers compare equal to their text.
    pub fn to_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            CellValue::Number(n) => Some(n.to_string()),
            CellValue::Bool(b) => Some(b.to_string()),
        }
    }

    /// Numeric form used for quantity attributes. Unparseable text is `None`.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            CellValue::Empty => None,
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Number(_) => None,
            CellValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite()),
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        }
    }

    /// Boolean-like form used for the out-of-stock flag: 0/1, true/false,
    /// yes/no and si/no.
    pub fn to_flag(&self) -> Option<bool> {
        match self {
            CellValue::Empty => None,
            CellValue::Bool(b) => Some(*b),
            CellValue::Number(n) => Some(*n != 0.0),
            CellValue::Text(s) => match s.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "y" | "si" | "sí" | "s" => Some(true),
                "0" | "false" | "no" | "n" | "" => Some(false),
                other => other.parse::<f64>().ok().map(|n| n != 0.0),
            },
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Bool(b) => write!(f, "{}", if *b { 1 } else { 0 }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_render_without_trailing_zero() {
        assert_eq!(CellValue::Number(1001.0).to_text().as_deref(), Some("1001"));
        assert_eq!(CellValue::Number(2.5).to_string(), "2.5");
    }

    #[test]
    fn test_text_parses_as_number() {
        assert_eq!(CellValue::from_raw(" 12.5 ").to_number(), Some(12.5));
        assert_eq!(CellValue::from_raw("abc").to_number(), None);
        assert_eq!(CellValue::from_raw("   "), CellValue::Empty);
    }

    #[test]
    fn test_flag_variants() {
        assert_eq!(CellValue::Number(1.0).to_flag(), Some(true));
        assert_eq!(CellValue::Number(0.0).to_flag(), Some(false));
        assert_eq!(CellValue::from_raw("Si").to_flag(), Some(true));
        assert_eq!(CellValue::from_raw("no").to_flag(), Some(false));
        assert_eq!(CellValue::Empty.to_flag(), None);
    }

    #[test]
    fn test_non_finite_numbers_are_dropped() {
        assert_eq!(CellValue::from_opt_number(Some(f64::NAN)), CellValue::Empty);
        assert_eq!(CellValue::Number(f64::INFINITY).to_number(), None);
    }
}
