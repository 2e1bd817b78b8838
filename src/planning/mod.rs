// src/planning/mod.rs

pub mod key_match;
pub mod metrics;
pub mod recalc;
pub mod suppliers;

pub use key_match::{apply_edit, EditRejection, EditedRow, RowKeyMatcher};
pub use metrics::{CoverageBasis, Derivation, MetricDeriver, MetricInputs, MetricIssue};
pub use recalc::{RecalcReport, RecalculationEngine, RejectedEdit, RowWarning};
pub use suppliers::summarize_suppliers;
