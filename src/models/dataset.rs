// src/models/dataset.rs
use serde_json::{Map, Value};

use super::cell::CellValue;
use super::column::{Column, DERIVED_COLUMNS};
use super::row::InventoryRow;
use super::sheet::{SchemaError, SheetKind};

/// All rows of one loaded sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub sheet_name: String,
    pub kind: SheetKind,
    /// Headers of columns the editor does not know, in sheet order.
    pub extra_columns: Vec<String>,
    /// Whether the sheet carries its layout's location column.
    pub has_location: bool,
    pub has_out_of_stock: bool,
    pub rows: Vec<InventoryRow>,
}

impl Dataset {
    /// Builds a dataset from a header row and data rows. The sheet kind comes
    /// from the sheet name and the header row must satisfy its layout.
    /// Fully blank rows are skipped.
    pub fn from_grid(
        sheet_name: &str,
        headers: &[String],
        grid: Vec<Vec<CellValue>>,
    ) -> Result<Self, SchemaError> {
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(SchemaError::EmptySheet {
                sheet: sheet_name.to_string(),
            });
        }

        let kind = SheetKind::from_sheet_name(sheet_name);
        let map = kind.check_headers(sheet_name, headers)?;
        let has_location = kind.location_column().map_or(false, |column| map.has(column));
        let has_out_of_stock = map.has(Column::OutOfStock);
        let known = kind.input_columns(has_location, has_out_of_stock);

        let mut rows = Vec::with_capacity(grid.len());
        for cells in grid {
            if cells.iter().all(CellValue::is_empty) {
                continue;
            }
            let mut row = InventoryRow::default();
            for &column in &known {
                if let Some(idx) = map.position(column) {
                    let value = cells.get(idx).cloned().unwrap_or_default();
                    row.set_cell(column, &value);
                }
            }
            row.extra = map
                .extras()
                .iter()
                .map(|(_, idx)| cells.get(*idx).cloned().unwrap_or_default())
                .collect();
            rows.push(row);
        }

        Ok(Self {
            sheet_name: sheet_name.to_string(),
            kind,
            extra_columns: map.extras().iter().map(|(name, _)| name.clone()).collect(),
            has_location,
            has_out_of_stock,
            rows,
        })
    }

    /// The location column, when the sheet has one. Rows of a sheet without
    /// it are matched and filtered on the four key attributes only.
    pub fn location_column(&self) -> Option<Column> {
        self.kind.location_column().filter(|_| self.has_location)
    }

    pub fn editable_columns(&self) -> Vec<Column> {
        self.kind.editable_columns(self.has_location)
    }

    pub fn display_columns(&self) -> Vec<Column> {
        self.kind.display_columns(self.has_location)
    }

    fn input_columns(&self) -> Vec<Column> {
        self.kind.input_columns(self.has_location, self.has_out_of_stock)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Export header order: known input columns, extras, derived columns.
    pub fn export_headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = self
            .input_columns()
            .into_iter()
            .map(|c| c.header().to_string())
            .collect();
        headers.extend(self.extra_columns.iter().cloned());
        headers.extend(DERIVED_COLUMNS.iter().map(|c| c.header().to_string()));
        headers
    }

    /// One row in `export_headers` order.
    pub fn export_cells(&self, row: &InventoryRow) -> Vec<CellValue> {
        let mut cells: Vec<CellValue> = self
            .input_columns()
            .into_iter()
            .map(|c| row.cell(c))
            .collect();
        cells.extend(
            self.extra_columns
                .iter()
                .enumerate()
                .map(|(idx, _)| row.extra.get(idx).cloned().unwrap_or_default()),
        );
        cells.extend(DERIVED_COLUMNS.iter().map(|c| row.cell(*c)));
        cells
    }
}

/// Projects a row onto `columns` as a JSON object keyed by header.
pub fn project_row(row: &InventoryRow, columns: &[Column]) -> Map<String, Value> {
    columns
        .iter()
        .map(|column| {
            let value = serde_json::to_value(row.cell(*column)).unwrap_or(Value::Null);
            (column.header().to_string(), value)
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_from_grid_reads_known_and_extra_columns() {
        let ds = directo(&[("T01", "ACME", "ARROZ", 10.0, 5.0, 2.0, "PZA", 6.0, 0.0)]);
        assert_eq!(ds.kind, SheetKind::Directo);
        assert!(ds.has_out_of_stock);
        assert_eq!(ds.extra_columns, vec!["COMENTARIO".to_string()]);
        let row = &ds.rows[0];
        assert_eq!(row.location.as_deref(), Some("T01"));
        assert_eq!(row.total_inventory, Some(10.0));
        assert_eq!(row.out_of_stock, Some(false));
        assert_eq!(row.extra, vec![text("sin nota")]);
        assert!(!row.is_recalculated());
    }

    #[test]
    fn test_from_grid_skips_blank_rows_and_pads_short_rows() {
        let headers: Vec<String> = [
            "DEPARTMENT", "CATEGORY", "SUPPLIER", "PRODUCT", "TTL INV", "DOH_TARGET",
            "VENTA REAL PROM", "UMI", "QUANTITY_PER_UMI",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let grid = vec![
            vec![CellValue::Empty; 9],
            vec![text("D"), text("C"), text("S"), text("P")],
        ];
        let ds = Dataset::from_grid("Resumen", &headers, grid).unwrap();
        assert_eq!(ds.kind, SheetKind::Other);
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.rows[0].total_inventory, None);
        assert_eq!(ds.location_column(), None);
    }

    #[test]
    fn test_directo_without_store_column_has_no_location() {
        let headers: Vec<String> = DIRECTO_HEADERS
            .iter()
            .filter(|h| **h != "TIENDA")
            .map(|s| s.to_string())
            .collect();
        let grid = vec![vec![
            text("ABARROTES"), text("GRANOS"), text("ACME"), text("ARROZ"), num(4.0), num(0.0),
            num(4.0), num(4.0), num(5.0), num(2.0), text("PZA"), num(1.0), num(0.0), text("nota"),
        ]];
        let ds = Dataset::from_grid("Directo", &headers, grid).unwrap();
        assert_eq!(ds.kind, SheetKind::Directo);
        assert!(!ds.has_location);
        assert_eq!(ds.location_column(), None);
        assert_eq!(ds.rows[0].location, None);
        assert_eq!(ds.rows[0].total_inventory, Some(4.0));
        assert_eq!(ds.editable_columns()[0], Column::Department);
        assert!(!ds.export_headers().contains(&"TIENDA".to_string()));
    }

    #[test]
    fn test_from_grid_rejects_empty_header_row() {
        let err = Dataset::from_grid("Directo", &[], vec![]).unwrap_err();
        assert_eq!(err, SchemaError::EmptySheet { sheet: "Directo".into() });
    }

    #[test]
    fn test_export_headers_order() {
        let ds = directo(&[]);
        let headers = ds.export_headers();
        assert_eq!(headers.first().map(String::as_str), Some("TIENDA"));
        let oos = headers.iter().position(|h| h == "OOS").unwrap();
        let extra = headers.iter().position(|h| h == "COMENTARIO").unwrap();
        let compra = headers.iter().position(|h| h == "COMPRA").unwrap();
        assert!(oos < extra && extra < compra);
        assert_eq!(headers.last().map(String::as_str), Some("DOH FINALES"));
    }

    #[test]
    fn test_project_row_uses_headers_as_keys() {
        let ds = directo(&[("T01", "ACME", "ARROZ", 10.0, 5.0, 2.0, "PZA", 6.0, 0.0)]);
        let projected = project_row(&ds.rows[0], &ds.editable_columns());
        assert_eq!(projected["TIENDA"], Value::from("T01"));
        assert_eq!(projected["DOH_TARGET"], Value::from(5.0));
        assert!(!projected.contains_key("COMPRA"));
    }
}
