// src/planning/suppliers.rs
use std::collections::BTreeMap;

use crate::models::{InventoryRow, SupplierSummary};

#[derive(Default)]
struct Accumulator {
    rows: usize,
    out_of_stock: usize,
    onhand_sum: f64,
    onhand_count: usize,
    purchase_sum: f64,
    purchase_count: usize,
}

fn mean(sum: f64, count: usize) -> Option<f64> {
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Groups rows by supplier, ordered by supplier name. Undefined coverage values
/// are left out of the means.
///
/// Returns `None` when the summary does not apply: the sheet carries no
/// out-of-stock column, or some row has not been recalculated yet.
pub fn summarize_suppliers(rows: &[&InventoryRow], has_out_of_stock: bool) -> Option<Vec<SupplierSummary>> {
    if !has_out_of_stock || rows.iter().any(|row| !row.is_recalculated()) {
        return None;
    }

    let mut groups: BTreeMap<&str, Accumulator> = BTreeMap::new();
    for row in rows {
        let acc = groups.entry(row.supplier.as_str()).or_default();
        acc.rows += 1;
        if row.out_of_stock == Some(true) {
            acc.out_of_stock += 1;
        }
        if let Some(derived) = &row.derived {
            if let Some(days) = derived.days_from_onhand {
                acc.onhand_sum += days;
                acc.onhand_count += 1;
            }
            if let Some(days) = derived.days_from_purchase {
                acc.purchase_sum += days;
                acc.purchase_count += 1;
            }
        }
    }

    let summaries = groups
        .into_iter()
        .map(|(supplier, acc)| {
            let mean_days_from_onhand = mean(acc.onhand_sum, acc.onhand_count);
            let mean_days_from_purchase = mean(acc.purchase_sum, acc.purchase_count);
            let days_total = match (mean_days_from_onhand, mean_days_from_purchase) {
                (Some(onhand), Some(purchase)) => Some(onhand + purchase),
                _ => None,
            };
            SupplierSummary {
                supplier: supplier.to_string(),
                rows: acc.rows,
                out_of_stock_count: acc.out_of_stock,
                mean_days_from_onhand,
                mean_days_from_purchase,
                days_total,
            }
        })
        .collect();

    Some(summaries)
}
