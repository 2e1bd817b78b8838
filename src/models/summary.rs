// src/models/summary.rs
use serde::Serialize;

/// Coverage summary of one supplier over a (filtered) set of rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplierSummary {
    pub supplier: String,
    pub rows: usize,
    pub out_of_stock_count: usize,
    pub mean_days_from_onhand: Option<f64>,
    pub mean_days_from_purchase: Option<f64>,
    /// `mean_days_from_onhand + mean_days_from_purchase`.
    pub days_total: Option<f64>,
}
