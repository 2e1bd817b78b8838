// src/planning/metrics.rs
//! Purchase quantity and days-of-coverage derivation for a single row.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{AsRefStr, Display, EnumString};

use crate::models::{DerivedMetrics, InventoryRow};

/// Unit-of-measure code whose purchase quantity is kept in the stock unit
/// instead of being rounded to whole purchase units.
pub const WEIGHT_UNIT: &str = "KG";

/// Which inventory `DOH ACTUAL` covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum CoverageBasis {
    /// `TTL INV / velocity`
    OnHand,
    /// `(TTL INV + COMPRA) / velocity`
    #[default]
    OnHandPlusPurchase,
}

/// A per-row condition that leaves some derived values undefined. The rest of
/// the row, and every other row, is still computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricIssue {
    /// Velocity is zero or negative: the three days-of-coverage values are undefined.
    NonPositiveVelocity { velocity: f64 },
    /// Quantity per purchase unit is missing, zero or negative: `COMPRA UMI` is undefined.
    InvalidPackSize { quantity_per_unit: Option<f64> },
}

impl fmt::Display for MetricIssue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MetricIssue::NonPositiveVelocity { velocity } => write!(
                f,
                "Sales velocity is {}; days of coverage are undefined",
                velocity
            ),
            MetricIssue::InvalidPackSize { quantity_per_unit: Some(qpu) } => write!(
                f,
                "Quantity per purchase unit is {}; purchase units are undefined",
                qpu
            ),
            MetricIssue::InvalidPackSize { quantity_per_unit: None } => write!(
                f,
                "Quantity per purchase unit is missing; purchase units are undefined"
            ),
        }
    }
}

impl std::error::Error for MetricIssue {}

/// Result of deriving one row.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivation {
    pub metrics: DerivedMetrics,
    pub issues: Vec<MetricIssue>,
}

/// The numeric inputs of a derivation. Empty cells count as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricInputs<'a> {
    pub target_days: f64,
    pub sales_velocity: f64,
    pub total_on_hand: f64,
    pub unit_of_measure: Option<&'a str>,
    pub quantity_per_unit: Option<f64>,
}

impl<'a> From<&'a InventoryRow> for MetricInputs<'a> {
    fn from(row: &'a InventoryRow) -> Self {
        Self {
            target_days: row.doh_target.unwrap_or(0.0),
            sales_velocity: row.sales_velocity.unwrap_or(0.0),
            total_on_hand: row.total_inventory.unwrap_or(0.0),
            unit_of_measure: row.unit_of_measure.as_deref(),
            quantity_per_unit: row.quantity_per_unit,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricDeriver {
    basis: CoverageBasis,
}

impl MetricDeriver {
    pub fn new(basis: CoverageBasis) -> Self {
        Self { basis }
    }

    pub fn basis(&self) -> CoverageBasis {
        self.basis
    }

    pub fn derive(&self, inputs: &MetricInputs) -> Derivation {
        let mut issues = Vec::new();

        let inventory_target = inputs.target_days * inputs.sales_velocity;
        let purchase_qty = (inventory_target - inputs.total_on_hand).max(0.0);

        let purchase_units = match inputs.quantity_per_unit {
            Some(qpu) if qpu > 0.0 => Some(purchase_units(inputs.unit_of_measure, purchase_qty, qpu)),
            other => {
                issues.push(MetricIssue::InvalidPackSize { quantity_per_unit: other });
                None
            }
        };

        let velocity = inputs.sales_velocity;
        let (days_from_purchase, days_from_onhand, days_total) = if velocity > 0.0 {
            let from_purchase = purchase_qty / velocity;
            let from_onhand = match self.basis {
                CoverageBasis::OnHand => inputs.total_on_hand / velocity,
                CoverageBasis::OnHandPlusPurchase => (inputs.total_on_hand + purchase_qty) / velocity,
            };
            (Some(from_purchase), Some(from_onhand), Some(from_purchase + from_onhand))
        } else {
            issues.push(MetricIssue::NonPositiveVelocity { velocity });
            (None, None, None)
        };

        Derivation {
            metrics: DerivedMetrics {
                inventory_target,
                purchase_qty,
                purchase_units,
                days_from_purchase,
                days_from_onhand,
                days_total,
            },
            issues,
        }
    }

    pub fn derive_row(&self, row: &InventoryRow) -> Derivation {
        self.derive(&MetricInputs::from(row))
    }
}

/// `KG` rows keep `(qty / qpu) * qpu`, i.e. the quantity in the stock unit
/// including any float drift of the division; every other unit rounds to the
/// nearest whole purchase unit with `f64::round` (half away from zero).
pub fn purchase_units(unit_of_measure: Option<&str>, purchase_qty: f64, quantity_per_unit: f64) -> f64 {
    let packs = purchase_qty / quantity_per_unit;
    match unit_of_measure.map(str::trim) {
        Some(WEIGHT_UNIT) => packs * quantity_per_unit,
        _ => packs.round(),
    }
}
