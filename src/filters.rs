// src/filters.rs
//! Five-way equality filter over a dataset, and the option lists the
//! selectors are built from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use validator::Validate;

use crate::models::{Dataset, InventoryRow};

/// Selector value meaning "no filter".
pub const DEFAULT_WILDCARD: &str = "Todos";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, Validate)]
pub struct RowFilter {
    #[validate(length(max = 255))]
    pub department: Option<String>,
    #[validate(length(max = 255))]
    pub category: Option<String>,
    #[validate(length(max = 255))]
    pub supplier: Option<String>,
    #[validate(length(max = 255))]
    pub product: Option<String>,
    #[validate(length(max = 255))]
    pub location: Option<String>,
}

fn active(value: &Option<String>, wildcard: &str) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case(wildcard))
        .map(str::to_string)
}

fn accepts(wanted: &Option<String>, actual: &str) -> bool {
    wanted.as_deref().map_or(true, |w| w == actual)
}

impl RowFilter {
    /// Trims every value and drops empty and wildcard ones.
    pub fn normalized(&self, wildcard: &str) -> Self {
        Self {
            department: active(&self.department, wildcard),
            category: active(&self.category, wildcard),
            supplier: active(&self.supplier, wildcard),
            product: active(&self.product, wildcard),
            location: active(&self.location, wildcard),
        }
    }

    /// True when `row` passes every set field. The location filter only
    /// counts on sheets with a location column.
    pub fn matches(&self, row: &InventoryRow, has_location: bool) -> bool {
        accepts(&self.department, &row.department)
            && accepts(&self.category, &row.category)
            && accepts(&self.supplier, &row.supplier)
            && accepts(&self.product, &row.product)
            && (!has_location || accepts(&self.location, row.location.as_deref().unwrap_or_default()))
    }

    /// Rows of `dataset` passing the filter, in dataset order. Values are
    /// normalized against the default wildcard first.
    pub fn apply<'a>(&self, dataset: &'a Dataset) -> Vec<&'a InventoryRow> {
        self.apply_with(dataset, DEFAULT_WILDCARD)
    }

    pub fn apply_with<'a>(&self, dataset: &'a Dataset, wildcard: &str) -> Vec<&'a InventoryRow> {
        let filter = self.normalized(wildcard);
        let has_location = dataset.location_column().is_some();
        dataset
            .rows
            .iter()
            .filter(|row| filter.matches(row, has_location))
            .collect()
    }
}

/// Distinct non-empty values per filter field, sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub department: Vec<String>,
    pub category: Vec<String>,
    pub supplier: Vec<String>,
    pub product: Vec<String>,
    /// Empty on sheets without a location column.
    pub location: Vec<String>,
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn filter_options(dataset: &Dataset) -> FilterOptions {
    let rows = &dataset.rows;
    FilterOptions {
        department: distinct(rows.iter().map(|r| r.department.as_str())),
        category: distinct(rows.iter().map(|r| r.category.as_str())),
        supplier: distinct(rows.iter().map(|r| r.supplier.as_str())),
        product: distinct(rows.iter().map(|r| r.product.as_str())),
        location: if dataset.location_column().is_some() {
            distinct(rows.iter().filter_map(|r| r.location.as_deref()))
        } else {
            Vec::new()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dataset::fixtures::directo;

    fn sample() -> Dataset {
        directo(&[
            ("T02", "LALA", "LECHE", 10.0, 5.0, 2.0, "PZA", 1.0, 0.0),
            ("T01", "ACME", "ARROZ", 10.0, 5.0, 2.0, "PZA", 1.0, 0.0),
            ("T01", "ACME", "FRIJOL", 10.0, 5.0, 2.0, "PZA", 1.0, 0.0),
        ])
    }

    #[test]
    fn test_wildcard_and_blank_mean_no_filter() {
        let ds = sample();
        let filter = RowFilter {
            department: Some("Todos".into()),
            supplier: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(filter.normalized(DEFAULT_WILDCARD), RowFilter::default());
        assert_eq!(filter.apply(&ds).len(), 3);
    }

    #[test]
    fn test_filters_combine() {
        let ds = sample();
        let filter = RowFilter {
            supplier: Some("ACME".into()),
            location: Some(" T01 ".into()),
            ..Default::default()
        };
        let rows = filter.apply(&ds);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.supplier == "ACME"));

        let none = RowFilter {
            product: Some("AZUCAR".into()),
            ..Default::default()
        };
        assert!(none.apply(&ds).is_empty());
    }

    #[test]
    fn test_configured_wildcard() {
        let ds = sample();
        let filter = RowFilter {
            supplier: Some("*".into()),
            ..Default::default()
        };
        assert_eq!(filter.apply_with(&ds, "*").len(), 3);
        assert!(filter.apply(&ds).is_empty());
    }

    #[test]
    fn test_location_ignored_without_location_column() {
        let mut ds = sample();
        ds.kind = crate::models::SheetKind::Other;
        let filter = RowFilter {
            location: Some("T09".into()),
            ..Default::default()
        };
        assert_eq!(filter.apply(&ds).len(), 3);
    }

    #[test]
    fn test_sheet_without_store_column_ignores_location() {
        let mut ds = sample();
        ds.has_location = false;
        let filter = RowFilter {
            location: Some("T09".into()),
            ..Default::default()
        };
        assert_eq!(filter.apply(&ds).len(), 3);
        assert!(filter_options(&ds).location.is_empty());
    }

    #[test]
    fn test_filter_options_sorted_and_distinct() {
        let options = filter_options(&sample());
        assert_eq!(options.supplier, vec!["ACME", "LALA"]);
        assert_eq!(options.location, vec!["T01", "T02"]);
        assert_eq!(options.product, vec!["ARROZ", "FRIJOL", "LECHE"]);
        assert_eq!(options.department, vec!["ABARROTES"]);
    }
}
