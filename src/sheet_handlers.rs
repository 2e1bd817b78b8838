// src/sheet_handlers.rs
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::stream::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::filters::{filter_options, RowFilter};
use crate::handlers::ApiResponse;
use crate::import_export::{export_dataset, export_file_name, load_workbook, ExportFormat};
use crate::models::{project_row, Column, Dataset, InventoryRow, SheetKind, SupplierSummary};
use crate::planning::{summarize_suppliers, EditedRow, RecalcReport};
use crate::session::WorkbookInfo;
use crate::AppState;

// ==================== VIEW MODELS ====================

/// A filtered slice of a sheet, as the grid shows it.
#[derive(Debug, Serialize)]
pub struct SheetView {
    pub sheet: String,
    pub kind: SheetKind,
    pub columns: Vec<Column>,
    pub total_rows: usize,
    pub matched_rows: usize,
    pub rows: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// Key, inventory and target columns only.
    #[default]
    Editable,
    /// Editable columns plus the derived purchase and coverage columns.
    Result,
}

fn sheet_view(dataset: &Dataset, rows: &[&InventoryRow], mode: ViewMode) -> SheetView {
    let columns = match mode {
        ViewMode::Editable => dataset.editable_columns(),
        ViewMode::Result => dataset.display_columns(),
    };
    SheetView {
        sheet: dataset.sheet_name.clone(),
        kind: dataset.kind,
        total_rows: dataset.len(),
        matched_rows: rows.len(),
        rows: rows.iter().map(|row| project_row(row, &columns)).collect(),
        columns,
    }
}

const SUMMARY_UNAVAILABLE: &str =
    "Supplier summary needs an OOS column and a recalculated sheet";

// ==================== REQUESTS ====================

#[derive(Debug, Deserialize, Validate)]
pub struct RowsQuery {
    #[validate(length(max = 255))]
    pub department: Option<String>,
    #[validate(length(max = 255))]
    pub category: Option<String>,
    #[validate(length(max = 255))]
    pub supplier: Option<String>,
    #[validate(length(max = 255))]
    pub product: Option<String>,
    #[validate(length(max = 255))]
    pub location: Option<String>,
    pub view: Option<ViewMode>,
}

impl RowsQuery {
    fn filter(&self) -> RowFilter {
        RowFilter {
            department: self.department.clone(),
            category: self.category.clone(),
            supplier: self.supplier.clone(),
            product: self.product.clone(),
            location: self.location.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecalculateRequest {
    /// Selection the result view is restricted to. Edits always reach the
    /// whole sheet.
    #[serde(default)]
    #[validate(nested)]
    pub filter: RowFilter,
    #[serde(default)]
    pub edits: Vec<EditedRow>,
}

#[derive(Debug, Serialize)]
pub struct RecalculateResponse {
    pub report: RecalcReport,
    pub view: SheetView,
    pub suppliers: Option<Vec<SupplierSummary>>,
}

// ==================== WORKBOOK ====================

pub async fn upload_workbook(
    app_state: web::Data<Arc<AppState>>,
    mut payload: Multipart,
) -> ApiResult<HttpResponse> {
    let limit = app_state.config.security.max_upload_bytes;
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = payload.next().await {
        let mut field = field.map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let filename = field.content_disposition().get_filename().map(str::to_string);
        let filename = match filename {
            Some(name) if upload.is_none() => name,
            _ => {
                // Drain fields that are not the first file.
                while let Some(chunk) = field.next().await {
                    chunk.map_err(|e| ApiError::BadRequest(e.to_string()))?;
                }
                continue;
            }
        };

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::BadRequest(e.to_string()))?;
            if data.len() + chunk.len() > limit {
                return Err(ApiError::upload_too_large(limit));
            }
            data.extend_from_slice(&chunk);
        }
        upload = Some((filename, data));
    }

    let (file_name, data) = upload.ok_or_else(|| ApiError::BadRequest("Filename not found".to_string()))?;
    let workbook = load_workbook(&data, &file_name)?;
    let info = WorkbookInfo::from(&workbook);

    let replaced = app_state.session_mut()?.replace(workbook);
    if let Some(old) = replaced {
        log::info!("Workbook '{}' replaced by '{}'", old.file_name, file_name);
    }

    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        info,
        format!("Workbook '{}' loaded", file_name),
    )))
}

pub async fn get_workbook(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let session = app_state.session()?;
    let info = WorkbookInfo::from(session.workbook()?);
    Ok(HttpResponse::Ok().json(ApiResponse::success(info)))
}

pub async fn close_workbook(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let closed = app_state.session_mut()?.clear().ok_or_else(ApiError::no_workbook)?;
    log::info!("Workbook '{}' closed", closed.file_name);
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        (),
        format!("Workbook '{}' closed", closed.file_name),
    )))
}

// ==================== SHEETS ====================

pub async fn get_filter_options(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let sheet = path.into_inner();
    let session = app_state.session()?;
    let dataset = session.dataset(&sheet)?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(filter_options(dataset))))
}

pub async fn get_rows(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    query: web::Query<RowsQuery>,
) -> ApiResult<HttpResponse> {
    query.validate()?;
    let sheet = path.into_inner();
    let session = app_state.session()?;
    let dataset = session.dataset(&sheet)?;

    let rows = query.filter().apply_with(dataset, app_state.wildcard());
    let view = sheet_view(dataset, &rows, query.view.unwrap_or_default());
    Ok(HttpResponse::Ok().json(ApiResponse::success(view)))
}

pub async fn recalculate_sheet(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<RecalculateRequest>,
) -> ApiResult<HttpResponse> {
    let request = body.into_inner();
    request.validate()?;

    let sheet = path.into_inner();
    let mut session = app_state.session_mut()?;
    let dataset = session.dataset_mut(&sheet)?;

    let report = app_state.engine.recalculate(dataset, &request.edits);

    let rows = request.filter.apply_with(dataset, app_state.wildcard());
    let suppliers = summarize_suppliers(&rows, dataset.has_out_of_stock);
    let mut message = format!(
        "{} rows recalculated, {} updated by {} edits",
        report.rows_recalculated, report.rows_updated, report.edits_applied
    );
    if !report.rejected_edits.is_empty() {
        message.push_str(&format!(", {} edits rejected", report.rejected_edits.len()));
    }
    let response = RecalculateResponse {
        view: sheet_view(dataset, &rows, ViewMode::Result),
        report,
        suppliers,
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(response, message)))
}

pub async fn get_supplier_summary(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    query: web::Query<RowsQuery>,
) -> ApiResult<HttpResponse> {
    query.validate()?;
    let sheet = path.into_inner();
    let session = app_state.session()?;
    let dataset = session.dataset(&sheet)?;

    let rows = query.filter().apply_with(dataset, app_state.wildcard());
    let response = match summarize_suppliers(&rows, dataset.has_out_of_stock) {
        Some(summary) => ApiResponse::success(Some(summary)),
        None => ApiResponse::success_with_message(None, SUMMARY_UNAVAILABLE.to_string()),
    };
    Ok(HttpResponse::Ok().json(response))
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
}

pub async fn export_sheet(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    query: web::Query<ExportQuery>,
) -> ApiResult<HttpResponse> {
    let sheet = path.into_inner();
    let session = app_state.session()?;
    let dataset = session.dataset(&sheet)?;

    let format = query.format;
    let data = export_dataset(dataset, format)?;
    log::info!("Exported sheet '{}' as {} ({} bytes)", dataset.sheet_name, format.extension(), data.len());

    Ok(HttpResponse::Ok()
        .content_type(format.content_type())
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", export_file_name(&dataset.sheet_name, format)),
        ))
        .body(data))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::resource("/workbook")
                    .route(web::post().to(upload_workbook))
                    .route(web::get().to(get_workbook))
                    .route(web::delete().to(close_workbook)),
            )
            .service(
                web::scope("/sheets/{sheet}")
                    .route("/filters", web::get().to(get_filter_options))
                    .route("/rows", web::get().to(get_rows))
                    .route("/recalculate", web::post().to(recalculate_sheet))
                    .route("/suppliers", web::get().to(get_supplier_summary))
                    .route("/export", web::get().to(export_sheet)),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::import_export::{SheetSlot, Workbook};
    use crate::models::dataset::fixtures::directo;
    use crate::models::SchemaError;
    use actix_web::{http::header, http::StatusCode, test, App};

    fn state_with_directo() -> Arc<AppState> {
        let state = Arc::new(AppState::new(Config::default()));
        let workbook = Workbook::new(
            "plan.xlsx",
            vec![
                SheetSlot {
                    name: "Directo".into(),
                    dataset: Ok(directo(&[
                        ("T01", "ACME", "ARROZ", 10.0, 5.0, 4.0, "PZA", 3.0, 1.0),
                        ("T02", "ACME", "ARROZ", 10.0, 5.0, 4.0, "PZA", 3.0, 0.0),
                        ("T01", "LALA", "LECHE", 50.0, 10.0, 4.0, "PZA", 1.0, 0.0),
                    ])),
                },
                SheetSlot {
                    name: "Centralizado".into(),
                    dataset: Err(SchemaError::MissingRequiredColumn {
                        sheet: "Centralizado".into(),
                        columns: vec!["INV ALMACEN".into()],
                    }),
                },
            ],
        );
        state.session_mut().unwrap().replace(workbook);
        state
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state.clone()))
                    .configure(configure),
            )
            .await
        };
    }

    #[actix_rt::test]
    async fn test_rows_are_filtered() {
        let state = state_with_directo();
        let app = app!(state);

        let req = test::TestRequest::get()
            .uri("/api/v1/sheets/Directo/rows?supplier=ACME&location=Todos")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["matched_rows"], 2);
        assert_eq!(body["data"]["total_rows"], 3);
        assert_eq!(body["data"]["columns"][0], "TIENDA");
        assert_eq!(body["data"]["rows"][1]["TIENDA"], "T02");
        assert!(body["data"]["rows"][0].get("COMPRA").is_none());
    }

    #[actix_rt::test]
    async fn test_recalculate_applies_edits_and_summarizes() {
        let state = state_with_directo();
        let app = app!(state);

        let payload = serde_json::json!({
            "filter": { "supplier": "ACME", "location": "T01" },
            "edits": [{
                "TIENDA": "T01",
                "DEPARTMENT": "ABARROTES",
                "CATEGORY": "GRANOS",
                "SUPPLIER": "ACME",
                "PRODUCT": "ARROZ",
                "DOH_TARGET": 10
            }]
        });
        let req = test::TestRequest::post()
            .uri("/api/v1/sheets/Directo/recalculate")
            .set_json(&payload)
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["report"]["rows_updated"], 1);
        assert_eq!(body["data"]["report"]["rows_recalculated"], 3);
        let row = &body["data"]["view"]["rows"][0];
        assert_eq!(row["DOH_TARGET"], 10.0);
        assert_eq!(row["COMPRA"], 30.0);
        assert_eq!(row["COMPRA UMI"], 10.0);
        assert_eq!(row["DOH FINALES"], 17.5);

        let suppliers = &body["data"]["suppliers"];
        assert_eq!(suppliers[0]["supplier"], "ACME");
        assert_eq!(suppliers[0]["out_of_stock_count"], 1);

        let session = state.session().unwrap();
        let ds = session.dataset("Directo").unwrap();
        assert_eq!(ds.rows[1].doh_target, Some(5.0));
        assert!(ds.rows.iter().all(|r| r.is_recalculated()));
    }

    #[actix_rt::test]
    async fn test_bad_edit_is_reported_and_batch_still_applies() {
        let state = state_with_directo();
        let app = app!(state);

        let payload = serde_json::json!({ "edits": [
            { "TIENDA": "T01", "DEPARTMENT": "ABARROTES", "CATEGORY": "GRANOS", "SUPPLIER": "ACME",
              "PRODUCT": "ARROZ", "DOH_TARGET": -3 },
            { "TIENDA": "T02", "DEPARTMENT": "ABARROTES", "CATEGORY": "GRANOS", "SUPPLIER": "ACME",
              "PRODUCT": "ARROZ", "DOH_TARGET": 4000 }
        ]});
        let req = test::TestRequest::post()
            .uri("/api/v1/sheets/Directo/recalculate")
            .set_json(&payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["report"]["edits_applied"], 1);
        assert_eq!(body["data"]["report"]["rejected_edits"][0]["edit"], 0);
        assert_eq!(body["data"]["report"]["rejected_edits"][0]["reason"], "negative");

        let session = state.session().unwrap();
        let ds = session.dataset("Directo").unwrap();
        assert_eq!(ds.rows[0].doh_target, Some(5.0));
        assert_eq!(ds.rows[1].doh_target, Some(4000.0));
        assert!(ds.rows.iter().all(|r| r.is_recalculated()));
    }

    #[actix_rt::test]
    async fn test_supplier_summary_requires_recalculation() {
        let state = state_with_directo();
        let app = app!(state);

        let req = test::TestRequest::get().uri("/api/v1/sheets/Directo/suppliers").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["data"].is_null());
        assert_eq!(body["message"], SUMMARY_UNAVAILABLE);
    }

    #[actix_rt::test]
    async fn test_sheet_errors_map_to_status_codes() {
        let state = state_with_directo();
        let app = app!(state);

        let req = test::TestRequest::get().uri("/api/v1/sheets/Resumen/rows").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/api/v1/sheets/Centralizado/filters").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["details"]["columns"][0], "INV ALMACEN");
    }

    #[actix_rt::test]
    async fn test_export_is_csv_attachment() {
        let state = state_with_directo();
        let app = app!(state);

        let req = test::TestRequest::get().uri("/api/v1/sheets/Directo/export?format=csv").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let disposition = resp.headers().get("Content-Disposition").unwrap().to_str().unwrap().to_string();
        assert_eq!(disposition, "attachment; filename=\"Directo_recalculado.csv\"");

        let body = test::read_body(resp).await;
        let text = std::str::from_utf8(&body).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.starts_with("TIENDA,DEPARTMENT"));
    }

    #[actix_rt::test]
    async fn test_export_defaults_to_xlsx() {
        let state = state_with_directo();
        let app = app!(state);

        let req = test::TestRequest::get().uri("/api/v1/sheets/Directo/export").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap(),
            ExportFormat::Xlsx.content_type()
        );
        let disposition = resp.headers().get("Content-Disposition").unwrap().to_str().unwrap().to_string();
        assert_eq!(disposition, "attachment; filename=\"Directo_recalculado.xlsx\"");

        let body = test::read_body(resp).await;
        let wb = load_workbook(&body, "Directo_recalculado.xlsx").unwrap();
        assert_eq!(wb.sheet("Directo").unwrap().dataset.as_ref().unwrap().len(), 3);

        let req = test::TestRequest::get().uri("/api/v1/sheets/Directo/export?format=pdf").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn test_upload_replaces_workbook() {
        let state = state_with_directo();
        let app = app!(state);

        let csv = "SUPPLIER,PRODUCT,DEPARTMENT,CATEGORY,TTL INV,DOH_TARGET,VENTA REAL PROM,UMI,QUANTITY_PER_UMI\n\
                   ACME,ARROZ,ABARROTES,GRANOS,5,2,1,PZA,1\n";
        let boundary = "sopboundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"Resumen.csv\"\r\n\
             Content-Type: text/csv\r\n\r\n{csv}\r\n--{b}--\r\n",
            b = boundary,
            csv = csv
        );
        let req = test::TestRequest::post()
            .uri("/api/v1/workbook")
            .insert_header((header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary)))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::get().uri("/api/v1/workbook").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["file_name"], "Resumen.csv");
        assert_eq!(body["data"]["sheets"][0]["kind"], "other");
        assert_eq!(body["data"]["sheets"][0]["rows"], 1);
    }

    #[actix_rt::test]
    async fn test_close_workbook() {
        let state = state_with_directo();
        let app = app!(state);

        let req = test::TestRequest::delete().uri("/api/v1/workbook").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/api/v1/workbook").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
