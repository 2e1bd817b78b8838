// src/planning/recalc.rs
use serde::Serialize;
use tracing::{debug, info, warn};

use super::key_match::{apply_edit, EditRejection, EditedRow};
use super::metrics::{CoverageBasis, MetricDeriver, MetricIssue};
use crate::models::{Dataset, RowKey};

/// A row whose derived values are partly undefined.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowWarning {
    /// Position of the row in the full dataset.
    pub row: usize,
    pub key: RowKey,
    pub issue: MetricIssue,
    pub message: String,
}

/// An edited row whose target could not be applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedEdit {
    /// Position of the edit in the request.
    pub edit: usize,
    pub key: RowKey,
    pub reason: EditRejection,
    pub message: String,
}

/// What a recalculation pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecalcReport {
    pub edits_received: usize,
    pub edits_applied: usize,
    pub rows_updated: usize,
    /// Keys of edits that matched no row. These are ignored, not errors.
    pub unmatched_edits: Vec<RowKey>,
    /// Edits whose target was unusable. The rest of the batch still applies.
    pub rejected_edits: Vec<RejectedEdit>,
    pub rows_recalculated: usize,
    pub warnings: Vec<RowWarning>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecalculationEngine {
    deriver: MetricDeriver,
}

impl RecalculationEngine {
    pub fn new(basis: CoverageBasis) -> Self {
        Self {
            deriver: MetricDeriver::new(basis),
        }
    }

    pub fn deriver(&self) -> &MetricDeriver {
        &self.deriver
    }

    /// Applies every edit to the full dataset, then refreshes the derived
    /// values of every row, edited or not. The dataset is updated in place;
    /// filtering for display is up to the caller.
    pub fn recalculate(&self, dataset: &mut Dataset, edits: &[EditedRow]) -> RecalcReport {
        let mut report = RecalcReport {
            edits_received: edits.len(),
            ..Default::default()
        };

        for (idx, edit) in edits.iter().enumerate() {
            match edit.target() {
                Ok(None) => {
                    debug!(sheet = %dataset.sheet_name, "skipping edited row without DOH_TARGET");
                    continue;
                }
                Err(reason) => {
                    warn!(sheet = %dataset.sheet_name, edit = idx, %reason, "rejected edited row");
                    report.rejected_edits.push(RejectedEdit {
                        edit: idx,
                        key: edit.key(),
                        message: reason.to_string(),
                        reason,
                    });
                    continue;
                }
                Ok(Some(_)) => {}
            }
            let updated = apply_edit(dataset, edit);
            if updated == 0 {
                debug!(sheet = %dataset.sheet_name, key = ?edit.key(), "edited row matched no row");
                report.unmatched_edits.push(edit.key());
            } else {
                report.edits_applied += 1;
                report.rows_updated += updated;
            }
        }

        for (idx, row) in dataset.rows.iter_mut().enumerate() {
            let derivation = self.deriver.derive_row(row);
            for issue in derivation.issues {
                report.warnings.push(RowWarning {
                    row: idx,
                    key: row.key(),
                    message: issue.to_string(),
                    issue,
                });
            }
            row.derived = Some(derivation.metrics);
        }
        report.rows_recalculated = dataset.rows.len();

        if !report.warnings.is_empty() {
            warn!(
                sheet = %dataset.sheet_name,
                warnings = report.warnings.len(),
                "recalculation left some derived values undefined"
            );
        }
        info!(
            sheet = %dataset.sheet_name,
            edits = report.edits_applied,
            rows_updated = report.rows_updated,
            unmatched = report.unmatched_edits.len(),
            rejected = report.rejected_edits.len(),
            rows = report.rows_recalculated,
            "recalculated sheet"
        );

        report
    }
}
