// src/handlers.rs
use actix_web::{web, HttpResponse};
use serde::Serialize;
use std::sync::Arc;

use crate::error::ApiResult;
use crate::planning::CoverageBasis;
use crate::AppState;

// ==================== COMMON STRUCTURES ====================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
        }
    }
}

// ==================== HEALTH ====================

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    version: &'static str,
    workbook_loaded: bool,
    coverage_basis: CoverageBasis,
}

pub async fn health_check(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let workbook_loaded = app_state.session()?.workbook().is_ok();

    Ok(HttpResponse::Ok().json(ApiResponse::success(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        workbook_loaded,
        coverage_basis: app_state.engine.deriver().basis(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use actix_web::{test, App};

    #[actix_rt::test]
    async fn test_health_check() {
        let state = Arc::new(AppState::new(Config::default()));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/health", web::get().to(health_check)),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "ok");
        assert_eq!(body["data"]["workbook_loaded"], false);
        assert_eq!(body["data"]["coverage_basis"], "on_hand_plus_purchase");
    }
}
