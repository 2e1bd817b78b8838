// src/planning/key_match.rs
//! Propagation of an edited target back onto the full dataset.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::models::{CellValue, Dataset, InventoryRow, RowKey};

/// Reads a key cell the way sheet cells are read: numbers and text both
/// become text, blanks become `None`.
fn cell_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<CellValue>::deserialize(deserializer)?.and_then(|cell| cell.to_text()))
}

/// A row as it comes back from the editable grid. Field names are the sheet
/// headers; the location may arrive under either location header. Any other
/// grid column is ignored.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EditedRow {
    #[serde(rename = "DEPARTMENT", default, deserialize_with = "cell_text")]
    pub department: Option<String>,
    #[serde(rename = "CATEGORY", default, deserialize_with = "cell_text")]
    pub category: Option<String>,
    #[serde(rename = "SUPPLIER", default, deserialize_with = "cell_text")]
    pub supplier: Option<String>,
    #[serde(rename = "PRODUCT", default, deserialize_with = "cell_text")]
    pub product: Option<String>,
    #[serde(
        rename = "LOCATION",
        alias = "TIENDA",
        alias = "CEDIS Entrega",
        default,
        deserialize_with = "cell_text"
    )]
    pub location: Option<String>,
    /// Raw grid value; read through [`EditedRow::target`].
    #[serde(rename = "DOH_TARGET", default)]
    pub doh_target: Option<CellValue>,
}

/// Why an edited target was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditRejection {
    NotNumeric,
    Negative,
}

impl fmt::Display for EditRejection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EditRejection::NotNumeric => write!(f, "DOH_TARGET is not a number"),
            EditRejection::Negative => write!(f, "DOH_TARGET cannot be negative"),
        }
    }
}

fn clean(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

impl EditedRow {
    pub fn key(&self) -> RowKey {
        RowKey {
            department: clean(&self.department),
            category: clean(&self.category),
            supplier: clean(&self.supplier),
            product: clean(&self.product),
            location: self
                .location
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }

    /// The edited target. `Ok(None)` when the cell was left blank.
    pub fn target(&self) -> Result<Option<f64>, EditRejection> {
        let Some(cell) = self.doh_target.as_ref().filter(|cell| cell.to_text().is_some()) else {
            return Ok(None);
        };
        match cell.to_number() {
            Some(days) if days < 0.0 => Err(EditRejection::Negative),
            Some(days) => Ok(Some(days)),
            None => Err(EditRejection::NotNumeric),
        }
    }
}

/// Matcher for one edited key. On a sheet with a location column the location
/// is part of the key, so an edit without one matches nothing there.
#[derive(Debug, Clone)]
pub struct RowKeyMatcher {
    key: RowKey,
    match_location: bool,
}

impl RowKeyMatcher {
    pub fn new(key: RowKey, sheet_has_location: bool) -> Self {
        Self {
            key,
            match_location: sheet_has_location,
        }
    }

    pub fn matches(&self, row: &InventoryRow) -> bool {
        if !self.key.is_complete() {
            return false;
        }
        if self.match_location && self.key.location.is_none() {
            return false;
        }
        row.department == self.key.department
            && row.category == self.key.category
            && row.supplier == self.key.supplier
            && row.product == self.key.product
            && (!self.match_location || row.location == self.key.location)
    }
}

/// Sets `DOH_TARGET` on every row of `dataset` sharing the edited key and
/// returns how many rows were updated. An edit without a usable target, or
/// whose key matches nothing, updates nothing.
pub fn apply_edit(dataset: &mut Dataset, edit: &EditedRow) -> usize {
    let Ok(Some(target)) = edit.target() else {
        return 0;
    };
    let matcher = RowKeyMatcher::new(edit.key(), dataset.location_column().is_some());
    let mut updated = 0;
    for row in dataset.rows.iter_mut().filter(|row| matcher.matches(row)) {
        row.set_doh_target(target);
        updated += 1;
    }
    updated
}
