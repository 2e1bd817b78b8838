// src/error.rs
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

use crate::models::SchemaError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    PayloadTooLarge(String),
    InternalServerError(String),
    ValidationError(String),
    Schema(SchemaError),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorResponse<'a> {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a SchemaError>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::PayloadTooLarge(msg) => write!(f, "Payload Too Large: {}", msg),
            ApiError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
            ApiError::Schema(err) => write!(f, "Schema Error: {}", err),
        }
    }
}

impl std::error::Error for ApiError {}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ValidationError(_) | ApiError::Schema(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse {
            success: false,
            message: self.to_string(),
            details: match self {
                ApiError::Schema(err) => Some(err),
                _ => None,
            },
        };
        HttpResponse::build(self.status_code()).json(error_response)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<SchemaError> for ApiError {
    fn from(err: SchemaError) -> Self {
        ApiError::Schema(err)
    }
}

impl From<csv::Error> for ApiError {
    fn from(err: csv::Error) -> Self {
        ApiError::BadRequest(format!("Unreadable CSV: {}", err))
    }
}

impl From<calamine::Error> for ApiError {
    fn from(err: calamine::Error) -> Self {
        ApiError::BadRequest(format!("Unreadable workbook: {}", err))
    }
}

impl ApiError {
    pub fn no_workbook() -> Self {
        ApiError::NotFound("No workbook has been uploaded".to_string())
    }

    pub fn sheet_not_found(name: &str) -> Self {
        ApiError::NotFound(format!("Sheet '{}' not found in the workbook", name))
    }

    pub fn unsupported_file(name: &str) -> Self {
        ApiError::BadRequest(format!(
            "Unsupported file '{}'. Expected .xlsx, .xlsm, .xls, .ods or .csv",
            name
        ))
    }

    pub fn upload_too_large(limit: usize) -> Self {
        ApiError::PayloadTooLarge(format!("Upload exceeds the {} byte limit", limit))
    }
}
