// src/session.rs
//! The single editing session: one uploaded workbook at a time.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::import_export::Workbook;
use crate::models::{Column, Dataset, SchemaError, SheetKind};

#[derive(Debug, Default)]
pub struct SessionStore {
    workbook: Option<Workbook>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a new workbook and returns the one it replaces.
    pub fn replace(&mut self, workbook: Workbook) -> Option<Workbook> {
        self.workbook.replace(workbook)
    }

    pub fn clear(&mut self) -> Option<Workbook> {
        self.workbook.take()
    }

    pub fn workbook(&self) -> ApiResult<&Workbook> {
        self.workbook.as_ref().ok_or_else(ApiError::no_workbook)
    }

    pub fn dataset(&self, sheet: &str) -> ApiResult<&Dataset> {
        let slot = self
            .workbook()?
            .sheet(sheet)
            .ok_or_else(|| ApiError::sheet_not_found(sheet))?;
        slot.dataset.as_ref().map_err(|e| ApiError::Schema(e.clone()))
    }

    pub fn dataset_mut(&mut self, sheet: &str) -> ApiResult<&mut Dataset> {
        let slot = self
            .workbook
            .as_mut()
            .ok_or_else(ApiError::no_workbook)?
            .sheet_mut(sheet)
            .ok_or_else(|| ApiError::sheet_not_found(sheet))?;
        slot.dataset.as_mut().map_err(|e| ApiError::Schema(e.clone()))
    }
}

// ==================== WORKBOOK INFO ====================

#[derive(Debug, Serialize)]
pub struct SheetInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<SheetKind>,
    pub rows: usize,
    /// Header used as location, or `None` when the sheet has none.
    pub location_column: Option<Column>,
    pub recalculated: bool,
    pub has_out_of_stock: bool,
    pub extra_columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SchemaError>,
}

#[derive(Debug, Serialize)]
pub struct WorkbookInfo {
    pub id: Uuid,
    pub file_name: String,
    pub loaded_at: DateTime<Utc>,
    pub sheets: Vec<SheetInfo>,
}

impl From<&Workbook> for WorkbookInfo {
    fn from(wb: &Workbook) -> Self {
        let sheets = wb
            .sheets
            .iter()
            .map(|slot| match &slot.dataset {
                Ok(ds) => SheetInfo {
                    name: slot.name.clone(),
                    kind: Some(ds.kind),
                    rows: ds.len(),
                    location_column: ds.location_column(),
                    recalculated: !ds.is_empty() && ds.rows.iter().all(|r| r.is_recalculated()),
                    has_out_of_stock: ds.has_out_of_stock,
                    extra_columns: ds.extra_columns.clone(),
                    error: None,
                },
                Err(e) => SheetInfo {
                    name: slot.name.clone(),
                    kind: None,
                    rows: 0,
                    location_column: None,
                    recalculated: false,
                    has_out_of_stock: false,
                    extra_columns: Vec::new(),
                    error: Some(e.clone()),
                },
            })
            .collect();

        WorkbookInfo {
            id: wb.id,
            file_name: wb.file_name.clone(),
            loaded_at: wb.loaded_at,
            sheets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import_export::SheetSlot;
    use crate::models::dataset::fixtures::directo;

    fn workbook() -> Workbook {
        Workbook::new(
            "plan.xlsx",
            vec![
                SheetSlot {
                    name: "Directo".into(),
                    dataset: Ok(directo(&[("T01", "ACME", "ARROZ", 10.0, 5.0, 2.0, "PZA", 1.0, 0.0)])),
                },
                SheetSlot {
                    name: "Centralizado".into(),
                    dataset: Err(SchemaError::MissingRequiredColumn {
                        sheet: "Centralizado".into(),
                        columns: vec!["INV ALMACEN".into()],
                    }),
                },
            ],
        )
    }

    #[test]
    fn test_empty_session() {
        let store = SessionStore::new();
        assert!(matches!(store.workbook(), Err(ApiError::NotFound(_))));
        assert!(matches!(store.dataset("Directo"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_sheet_lookup() {
        let mut store = SessionStore::new();
        assert!(store.replace(workbook()).is_none());

        assert_eq!(store.dataset("directo").unwrap().len(), 1);
        assert!(matches!(store.dataset("Resumen"), Err(ApiError::NotFound(_))));
        assert!(matches!(store.dataset_mut("Centralizado"), Err(ApiError::Schema(_))));

        store.dataset_mut("Directo").unwrap().rows[0].set_doh_target(9.0);
        assert_eq!(store.dataset("Directo").unwrap().rows[0].doh_target, Some(9.0));
    }

    #[test]
    fn test_replace_returns_previous() {
        let mut store = SessionStore::new();
        let first = workbook();
        let first_id = first.id;
        store.replace(first);
        let previous = store.replace(workbook()).unwrap();
        assert_eq!(previous.id, first_id);
        assert_ne!(store.workbook().unwrap().id, first_id);
    }

    #[test]
    fn test_workbook_info_reports_rejected_sheets() {
        let info = WorkbookInfo::from(&workbook());
        assert_eq!(info.sheets.len(), 2);
        assert_eq!(info.sheets[0].kind, Some(SheetKind::Directo));
        assert!(!info.sheets[0].recalculated);
        assert!(info.sheets[1].error.is_some());

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["sheets"][1]["error"]["kind"], "missing_required_column");
        assert!(json["sheets"][0].get("error").is_none());
    }
}
