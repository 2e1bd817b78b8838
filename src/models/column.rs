// src/models/column.rs
//! Known S&OP sheet columns and header normalization.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Every column the editor understands. The strum string is the header used in
/// the workbook, on export and as the JSON key of projected rows.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString, Display, AsRefStr, IntoStaticStr, EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Column {
    // Location (one of these, depending on the sheet type)
    #[strum(serialize = "TIENDA")]
    Store,
    #[strum(serialize = "CEDIS Entrega")]
    DeliveryCenter,

    // Key
    #[strum(serialize = "DEPARTMENT")]
    Department,
    #[strum(serialize = "CATEGORY")]
    Category,
    #[strum(serialize = "SUPPLIER")]
    Supplier,
    #[strum(serialize = "PRODUCT")]
    Product,

    // Inventory components
    #[strum(serialize = "INV TIENDA")]
    StoreInventory,
    #[strum(serialize = "TRANSITO")]
    Transit,
    #[strum(serialize = "INV + TRANSIT")]
    InventoryPlusTransit,
    #[strum(serialize = "CEDIS_ORDERED_UNITS")]
    OrderedUnits,
    #[strum(serialize = "INV ALMACEN")]
    WarehouseInventory,
    #[strum(serialize = "TTL INV")]
    TotalInventory,

    // Planning inputs
    #[strum(serialize = "DOH_TARGET")]
    DohTarget,
    #[strum(serialize = "VENTA REAL PROM")]
    SalesVelocity,
    #[strum(serialize = "UMI")]
    UnitOfMeasure,
    #[strum(serialize = "QUANTITY_PER_UMI")]
    QuantityPerUnit,
    #[strum(serialize = "OOS")]
    OutOfStock,

    // Derived
    #[strum(serialize = "INV TARGET")]
    InventoryTarget,
    #[strum(serialize = "COMPRA")]
    Purchase,
    #[strum(serialize = "COMPRA UMI")]
    PurchaseUnits,
    #[strum(serialize = "DOH COMPRA")]
    DohFromPurchase,
    #[strum(serialize = "DOH ACTUAL")]
    DohFromOnHand,
    #[strum(serialize = "DOH FINALES")]
    DohTotal,
}

/// Columns computed by the recalculation, in export order.
pub const DERIVED_COLUMNS: &[Column] = &[
    Column::InventoryTarget,
    Column::Purchase,
    Column::PurchaseUnits,
    Column::DohFromPurchase,
    Column::DohFromOnHand,
    Column::DohTotal,
];

impl Column {
    /// Resolves a raw header cell, tolerating surrounding and repeated
    /// whitespace and ASCII case differences.
    pub fn from_header(raw: &str) -> Option<Self> {
        Column::from_str(&normalize_header(raw)).ok()
    }

    pub fn header(&self) -> &'static str {
        (*self).into()
    }

    #[inline]
    pub fn is_derived(&self) -> bool {
        DERIVED_COLUMNS.contains(self)
    }

    #[inline]
    pub fn is_location(&self) -> bool {
        matches!(self, Column::Store | Column::DeliveryCenter)
    }
}

impl Serialize for Column {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.header())
    }
}

/// Trims and collapses internal whitespace runs to a single space.
pub fn normalize_header(raw: &str) -> String {
    WHITESPACE_RUN.replace_all(raw.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_header_lookup_is_lenient() {
        assert_eq!(Column::from_header("  TTL   INV "), Some(Column::TotalInventory));
        assert_eq!(Column::from_header("cedis entrega"), Some(Column::DeliveryCenter));
        assert_eq!(Column::from_header("Venta Real Prom"), Some(Column::SalesVelocity));
        assert_eq!(Column::from_header("NOTES"), None);
    }

    #[test]
    fn test_headers_match_strum_strings() {
        for column in Column::iter() {
            assert_eq!(column.header(), column.as_ref());
            assert_eq!(column.to_string(), column.header());
            assert_eq!(Column::from_header(column.header()), Some(column));
        }
    }

    #[test]
    fn test_derived_columns() {
        assert!(Column::DohTotal.is_derived());
        assert!(!Column::DohTarget.is_derived());
        assert!(Column::Store.is_location());
        assert!(!Column::Product.is_location());
    }
}
