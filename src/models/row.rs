// src/models/row.rs
use serde::Serialize;

use super::cell::CellValue;
use super::column::Column;

/// Composite business key of a row. The location part is only set on sheets
/// that carry a location column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RowKey {
    pub department: String,
    pub category: String,
    pub supplier: String,
    pub product: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl RowKey {
    /// A key with an empty part never matches anything.
    pub fn is_complete(&self) -> bool {
        !self.department.is_empty()
            && !self.category.is_empty()
            && !self.supplier.is_empty()
            && !self.product.is_empty()
    }
}

/// Metrics recomputed on every recalculation. `None` marks a value that is
/// undefined for the row (see `planning::metrics::MetricIssue`).
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct DerivedMetrics {
    pub inventory_target: f64,
    pub purchase_qty: f64,
    pub purchase_units: Option<f64>,
    pub days_from_purchase: Option<f64>,
    pub days_from_onhand: Option<f64>,
    pub days_total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InventoryRow {
    pub location: Option<String>,
    pub department: String,
    pub category: String,
    pub supplier: String,
    pub product: String,

    pub store_inventory: Option<f64>,
    pub transit: Option<f64>,
    pub inventory_plus_transit: Option<f64>,
    pub ordered_units: Option<f64>,
    pub warehouse_inventory: Option<f64>,
    pub total_inventory: Option<f64>,

    pub doh_target: Option<f64>,
    pub sales_velocity: Option<f64>,
    pub unit_of_measure: Option<String>,
    pub quantity_per_unit: Option<f64>,
    pub out_of_stock: Option<bool>,

    /// Values of the sheet's unknown columns, aligned with `Dataset::extra_columns`.
    pub extra: Vec<CellValue>,

    /// Cleared whenever an input changes; filled by the recalculation.
    pub derived: Option<DerivedMetrics>,
}

impl InventoryRow {
    pub fn key(&self) -> RowKey {
        RowKey {
            department: self.department.clone(),
            category: self.category.clone(),
            supplier: self.supplier.clone(),
            product: self.product.clone(),
            location: self.location.clone(),
        }
    }

    pub fn set_doh_target(&mut self, value: f64) {
        self.doh_target = Some(value);
        self.derived = None;
    }

    #[inline]
    pub fn is_recalculated(&self) -> bool {
        self.derived.is_some()
    }

    /// Reads a known column as a cell.
    pub fn cell(&self, column: Column) -> CellValue {
        let derived = self.derived.as_ref();
        match column {
            Column::Store | Column::DeliveryCenter => CellValue::from_opt_text(self.location.as_deref()),
            Column::Department => CellValue::from_raw(&self.department),
            Column::Category => CellValue::from_raw(&self.category),
            Column::Supplier => CellValue::from_raw(&self.supplier),
            Column::Product => CellValue::from_raw(&self.product),
            Column::StoreInventory => CellValue::from_opt_number(self.store_inventory),
            Column::Transit => CellValue::from_opt_number(self.transit),
            Column::InventoryPlusTransit => CellValue::from_opt_number(self.inventory_plus_transit),
            Column::OrderedUnits => CellValue::from_opt_number(self.ordered_units),
            Column::WarehouseInventory => CellValue::from_opt_number(self.warehouse_inventory),
            Column::TotalInventory => CellValue::from_opt_number(self.total_inventory),
            Column::DohTarget => CellValue::from_opt_number(self.doh_target),
            Column::SalesVelocity => CellValue::from_opt_number(self.sales_velocity),
            Column::UnitOfMeasure => CellValue::from_opt_text(self.unit_of_measure.as_deref()),
            Column::QuantityPerUnit => CellValue::from_opt_number(self.quantity_per_unit),
            Column::OutOfStock => match self.out_of_stock {
                Some(flag) => CellValue::Bool(flag),
                None => CellValue::Empty,
            },
            Column::InventoryTarget => CellValue::from_opt_number(derived.map(|d| d.inventory_target)),
            Column::Purchase => CellValue::from_opt_number(derived.map(|d| d.purchase_qty)),
            Column::PurchaseUnits => CellValue::from_opt_number(derived.and_then(|d| d.purchase_units)),
            Column::DohFromPurchase => CellValue::from_opt_number(derived.and_then(|d| d.days_from_purchase)),
            Column::DohFromOnHand => CellValue::from_opt_number(derived.and_then(|d| d.days_from_onhand)),
            Column::DohTotal => CellValue::from_opt_number(derived.and_then(|d| d.days_total)),
        }
    }

    /// Writes a known input column from a cell. Derived columns are ignored:
    /// they only ever come from the recalculation.
    pub fn set_cell(&mut self, column: Column, value: &CellValue) {
        let text = || value.to_text().unwrap_or_default();
        match column {
            Column::Store | Column::DeliveryCenter => self.location = value.to_text(),
            Column::Department => self.department = text(),
            Column::Category => self.category = text(),
            Column::Supplier => self.supplier = text(),
            Column::Product => self.product = text(),
            Column::StoreInventory => self.store_inventory = value.to_number(),
            Column::Transit => self.transit = value.to_number(),
            Column::InventoryPlusTransit => self.inventory_plus_transit = value.to_number(),
            Column::OrderedUnits => self.ordered_units = value.to_number(),
            Column::WarehouseInventory => self.warehouse_inventory = value.to_number(),
            Column::TotalInventory => self.total_inventory = value.to_number(),
            Column::DohTarget => self.doh_target = value.to_number(),
            Column::SalesVelocity => self.sales_velocity = value.to_number(),
            Column::UnitOfMeasure => self.unit_of_measure = value.to_text(),
            Column::QuantityPerUnit => self.quantity_per_unit = value.to_number(),
            Column::OutOfStock => self.out_of_stock = value.to_flag(),
            Column::InventoryTarget
            | Column::Purchase
            | Column::PurchaseUnits
            | Column::DohFromPurchase
            | Column::DohFromOnHand
            | Column::DohTotal => return,
        }
        self.derived = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_cell_parses_by_column_type() {
        let mut row = InventoryRow::default();
        row.set_cell(Column::Product, &CellValue::Number(1001.0));
        row.set_cell(Column::TotalInventory, &CellValue::from_raw("12.5"));
        row.set_cell(Column::UnitOfMeasure, &CellValue::from_raw(" KG "));
        row.set_cell(Column::OutOfStock, &CellValue::Number(1.0));
        assert_eq!(row.product, "1001");
        assert_eq!(row.total_inventory, Some(12.5));
        assert_eq!(row.unit_of_measure.as_deref(), Some("KG"));
        assert_eq!(row.out_of_stock, Some(true));
    }

    #[test]
    fn test_editing_an_input_clears_derived_metrics() {
        let mut row = InventoryRow {
            derived: Some(DerivedMetrics::default()),
            ..Default::default()
        };
        row.set_doh_target(12.0);
        assert!(!row.is_recalculated());
        assert_eq!(row.cell(Column::DohTarget), CellValue::Number(12.0));
        assert_eq!(row.cell(Column::Purchase), CellValue::Empty);
    }

    #[test]
    fn test_incomplete_key() {
        let row = InventoryRow {
            department: "ABARROTES".into(),
            category: "".into(),
            supplier: "ACME".into(),
            product: "ARROZ".into(),
            ..Default::default()
        };
        assert!(!row.key().is_complete());
    }
}
