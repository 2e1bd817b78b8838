// src/models/sheet.rs
//! Sheet layouts. The sheet name decides which location and inventory
//! columns a sheet carries; the header row is checked against that layout
//! before any row is parsed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use strum::{AsRefStr, Display, EnumString};

use super::column::{Column, DERIVED_COLUMNS};

// ==================== SHEET KIND ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum SheetKind {
    /// Store-delivered assortment, located by `TIENDA`.
    Directo,
    /// Distribution-center assortment, located by `CEDIS Entrega`.
    Centralizado,
    /// Any other sheet: no location, no inventory breakdown.
    Other,
}

const KEY_COLUMNS: &[Column] = &[
    Column::Department,
    Column::Category,
    Column::Supplier,
    Column::Product,
];

const PLANNING_COLUMNS: &[Column] = &[
    Column::DohTarget,
    Column::SalesVelocity,
    Column::UnitOfMeasure,
    Column::QuantityPerUnit,
];

impl SheetKind {
    pub fn from_sheet_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "directo" => SheetKind::Directo,
            "centralizado" => SheetKind::Centralizado,
            _ => SheetKind::Other,
        }
    }

    pub fn location_column(&self) -> Option<Column> {
        match self {
            SheetKind::Directo => Some(Column::Store),
            SheetKind::Centralizado => Some(Column::DeliveryCenter),
            SheetKind::Other => None,
        }
    }

    /// Inventory columns in the order the planner sees them. `TTL INV` closes
    /// the list on every layout.
    pub fn inventory_columns(&self) -> &'static [Column] {
        match self {
            SheetKind::Directo => &[
                Column::StoreInventory,
                Column::Transit,
                Column::InventoryPlusTransit,
                Column::TotalInventory,
            ],
            SheetKind::Centralizado => &[
                Column::InventoryPlusTransit,
                Column::OrderedUnits,
                Column::WarehouseInventory,
                Column::TotalInventory,
            ],
            SheetKind::Other => &[Column::TotalInventory],
        }
    }

    /// Inventory columns shown in the editable grid. Only the
    /// distribution-center layout exposes `TTL INV` there.
    pub fn grid_inventory_columns(&self) -> &'static [Column] {
        match self {
            SheetKind::Directo => &[
                Column::StoreInventory,
                Column::Transit,
                Column::InventoryPlusTransit,
            ],
            SheetKind::Centralizado => self.inventory_columns(),
            SheetKind::Other => &[],
        }
    }

    fn leading_columns(&self, with_location: bool) -> Vec<Column> {
        let mut columns = Vec::new();
        if with_location {
            columns.extend(self.location_column());
        }
        columns.extend_from_slice(KEY_COLUMNS);
        columns
    }

    /// Columns a sheet of this kind must carry. The location column is
    /// optional: without it the sheet is handled as having no location.
    pub fn required_columns(&self) -> Vec<Column> {
        let mut columns = self.leading_columns(false);
        columns.extend_from_slice(self.inventory_columns());
        columns.extend_from_slice(PLANNING_COLUMNS);
        columns
    }

    /// Columns of the editable grid.
    pub fn editable_columns(&self, with_location: bool) -> Vec<Column> {
        let mut columns = self.leading_columns(with_location);
        columns.extend_from_slice(self.grid_inventory_columns());
        columns.extend([Column::DohTarget, Column::SalesVelocity]);
        columns
    }

    /// Columns of the recalculated result table.
    pub fn display_columns(&self, with_location: bool) -> Vec<Column> {
        let mut columns = self.editable_columns(with_location);
        columns.extend([
            Column::Purchase,
            Column::PurchaseUnits,
            Column::DohFromOnHand,
            Column::DohFromPurchase,
            Column::DohTotal,
        ]);
        columns
    }

    /// Known columns written on export, before extra columns and derived ones.
    pub fn input_columns(&self, with_location: bool, with_out_of_stock: bool) -> Vec<Column> {
        let mut columns = self.leading_columns(with_location);
        columns.extend_from_slice(self.inventory_columns());
        columns.extend_from_slice(PLANNING_COLUMNS);
        if with_out_of_stock {
            columns.push(Column::OutOfStock);
        }
        columns
    }

    /// Checks a header row against this layout and maps every known column to
    /// its position. Headers that are not known columns are returned as extras,
    /// in sheet order. Derived headers are dropped: they are recomputed.
    pub fn check_headers(&self, sheet: &str, headers: &[String]) -> Result<HeaderMap, SchemaError> {
        let mut positions = HashMap::new();
        let mut extras = Vec::new();

        for (idx, raw) in headers.iter().enumerate() {
            match Column::from_header(raw) {
                Some(column) if DERIVED_COLUMNS.contains(&column) => {}
                Some(column) if self.accepts(column) => {
                    positions.entry(column).or_insert(idx);
                }
                _ => {
                    if !raw.trim().is_empty() {
                        extras.push((raw.trim().to_string(), idx));
                    }
                }
            }
        }

        let missing: Vec<String> = self
            .required_columns()
            .into_iter()
            .filter(|column| !positions.contains_key(column))
            .map(|column| column.header().to_string())
            .collect();

        if !missing.is_empty() {
            return Err(SchemaError::MissingRequiredColumn {
                sheet: sheet.to_string(),
                columns: missing,
            });
        }

        Ok(HeaderMap { positions, extras })
    }

    fn accepts(&self, column: Column) -> bool {
        column == Column::OutOfStock
            || self.location_column() == Some(column)
            || self.required_columns().contains(&column)
    }
}

// ==================== HEADER MAP ====================

/// Result of a successful header check.
#[derive(Debug, Clone)]
pub struct HeaderMap {
    positions: HashMap<Column, usize>,
    extras: Vec<(String, usize)>,
}

impl HeaderMap {
    pub fn position(&self, column: Column) -> Option<usize> {
        self.positions.get(&column).copied()
    }

    pub fn has(&self, column: Column) -> bool {
        self.positions.contains_key(&column)
    }

    pub fn extras(&self) -> &[(String, usize)] {
        &self.extras
    }
}

// ==================== SCHEMA ERROR ====================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaError {
    MissingRequiredColumn { sheet: String, columns: Vec<String> },
    EmptySheet { sheet: String },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SchemaError::MissingRequiredColumn { sheet, columns } => write!(
                f,
                "Sheet '{}' is missing required columns: {}",
                sheet,
                columns.join(", ")
            ),
            SchemaError::EmptySheet { sheet } => write!(f, "Sheet '{}' has no header row", sheet),
        }
    }
}

impl std::error::Error for SchemaError {}
