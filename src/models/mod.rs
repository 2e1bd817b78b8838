// src/models/mod.rs

pub mod cell;
pub mod column;
pub mod dataset;
pub mod row;
pub mod sheet;
pub mod summary;

pub use cell::CellValue;
pub use column::{Column, DERIVED_COLUMNS};
pub use dataset::{project_row, Dataset};
pub use row::{DerivedMetrics, InventoryRow, RowKey};
pub use sheet::{SchemaError, SheetKind};
pub use summary::SupplierSummary;
