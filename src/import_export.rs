// src/import_export.rs
//! Workbook and CSV loading, and CSV export of a recalculated sheet.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{DateTime, Utc};
use log::{info, warn};
use rust_xlsxwriter::{Workbook as XlsxWorkbook, XlsxError};
use serde::Deserialize;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{CellValue, Dataset, SchemaError};

// ==================== WORKBOOK ====================

/// One sheet of an uploaded file. A sheet that fails the layout check stays in
/// the workbook with its error so the caller can report it.
#[derive(Debug, Clone)]
pub struct SheetSlot {
    pub name: String,
    pub dataset: Result<Dataset, SchemaError>,
}

#[derive(Debug, Clone)]
pub struct Workbook {
    pub id: Uuid,
    pub file_name: String,
    pub loaded_at: DateTime<Utc>,
    pub sheets: Vec<SheetSlot>,
}

impl Workbook {
    pub fn new(file_name: &str, sheets: Vec<SheetSlot>) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.to_string(),
            loaded_at: Utc::now(),
            sheets,
        }
    }

    fn slot_index(&self, name: &str) -> Option<usize> {
        let wanted = name.trim();
        self.sheets
            .iter()
            .position(|s| s.name == wanted)
            .or_else(|| self.sheets.iter().position(|s| s.name.eq_ignore_ascii_case(wanted)))
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetSlot> {
        self.slot_index(name).map(|idx| &self.sheets[idx])
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut SheetSlot> {
        match self.slot_index(name) {
            Some(idx) => self.sheets.get_mut(idx),
            None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Spreadsheet,
    Csv,
}

fn file_format(file_name: &str) -> Option<FileFormat> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(FileFormat::Spreadsheet),
        "csv" => Some(FileFormat::Csv),
        _ => None,
    }
}

/// Loads an uploaded file. Spreadsheets yield one slot per sheet; a CSV file
/// yields a single sheet named after the file stem.
pub fn load_workbook(bytes: &[u8], file_name: &str) -> ApiResult<Workbook> {
    let sheets = match file_format(file_name) {
        Some(FileFormat::Spreadsheet) => read_spreadsheet(bytes)?,
        Some(FileFormat::Csv) => {
            let stem = Path::new(file_name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(file_name);
            vec![SheetSlot {
                name: stem.to_string(),
                dataset: read_csv(stem, bytes)?,
            }]
        }
        None => return Err(ApiError::unsupported_file(file_name)),
    };

    if sheets.is_empty() {
        return Err(ApiError::BadRequest(format!("'{}' contains no sheets", file_name)));
    }

    for slot in &sheets {
        match &slot.dataset {
            Ok(ds) => info!("Loaded sheet '{}' ({}, {} rows)", slot.name, ds.kind, ds.len()),
            Err(e) => warn!("Sheet '{}' rejected: {}", slot.name, e),
        }
    }

    Ok(Workbook::new(file_name, sheets))
}

fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::from_opt_number(Some(*f)),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::String(s) => CellValue::from_raw(s),
        other => CellValue::from_raw(&other.to_string()),
    }
}

fn read_spreadsheet(bytes: &[u8]) -> ApiResult<Vec<SheetSlot>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let mut slots = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .map(|header| header.iter().map(|c| c.to_string()).collect())
            .unwrap_or_default();
        let grid: Vec<Vec<CellValue>> = rows.map(|row| row.iter().map(cell_from_data).collect()).collect();
        slots.push(SheetSlot {
            dataset: Dataset::from_grid(&name, &headers, grid),
            name,
        });
    }
    Ok(slots)
}

// ==================== CSV ====================

/// Reads one CSV file as a sheet. Parse failures are errors; a bad header
/// row is reported in the inner result like any other sheet.
pub fn read_csv<R: Read>(sheet_name: &str, reader: R) -> ApiResult<Result<Dataset, SchemaError>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut grid: Vec<Vec<CellValue>> = Vec::new();
    for record in rdr.records() {
        let record = record?;
        grid.push(record.iter().map(CellValue::from_raw).collect());
    }

    Ok(Dataset::from_grid(sheet_name, &headers, grid))
}

/// Writes every row of `dataset` with all original and derived columns.
pub fn write_csv<W: Write>(dataset: &Dataset, writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(dataset.export_headers())?;
    for row in &dataset.rows {
        wtr.write_record(dataset.export_cells(row).iter().map(|cell| cell.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}

// ==================== XLSX ====================

const XLSX_FALLBACK_SHEET: &str = "Actualizado";

/// Worksheet name accepted by Excel: no `[]:*?/\`, at most 31 characters.
fn xlsx_sheet_name(sheet_name: &str) -> String {
    let name: String = sheet_name
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .take(31)
        .collect();
    let name = name.trim().trim_matches('\'');
    if name.is_empty() {
        XLSX_FALLBACK_SHEET.to_string()
    } else {
        name.to_string()
    }
}

/// Writes `dataset` as a one-sheet workbook, with the same columns and order
/// as the CSV export. The worksheet keeps the sheet name so the file can be
/// uploaded again.
pub fn write_xlsx(dataset: &Dataset) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = XlsxWorkbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(xlsx_sheet_name(&dataset.sheet_name))?;

    for (col, header) in dataset.export_headers().iter().enumerate() {
        let col = u16::try_from(col).map_err(|_| XlsxError::RowColumnLimitError)?;
        worksheet.write_string(0, col, header)?;
    }

    for (idx, row) in dataset.rows.iter().enumerate() {
        let line = u32::try_from(idx + 1).map_err(|_| XlsxError::RowColumnLimitError)?;
        for (col, cell) in dataset.export_cells(row).iter().enumerate() {
            let col = u16::try_from(col).map_err(|_| XlsxError::RowColumnLimitError)?;
            match cell {
                CellValue::Empty => {}
                CellValue::Text(text) => {
                    worksheet.write_string(line, col, text)?;
                }
                CellValue::Number(n) => {
                    worksheet.write_number(line, col, *n)?;
                }
                CellValue::Bool(flag) => {
                    worksheet.write_boolean(line, col, *flag)?;
                }
            }
        }
    }

    workbook.save_to_buffer()
}

// ==================== EXPORT ====================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }
}

/// Serializes a dataset in the requested format.
pub fn export_dataset(dataset: &Dataset, format: ExportFormat) -> ApiResult<Vec<u8>> {
    match format {
        ExportFormat::Xlsx => {
            write_xlsx(dataset).map_err(|e| ApiError::InternalServerError(format!("Excel export failed: {}", e)))
        }
        ExportFormat::Csv => {
            let mut data = Vec::new();
            write_csv(dataset, &mut data)
                .map_err(|e| ApiError::InternalServerError(format!("CSV export failed: {}", e)))?;
            Ok(data)
        }
    }
}

/// Export file name for a sheet, e.g. `Directo_recalculado.xlsx`.
pub fn export_file_name(sheet_name: &str, format: ExportFormat) -> String {
    let safe: String = sheet_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}_recalculado.{}", safe, format.extension())
}
