// src/web/types.rs
//! Response envelopes, the PDF responder and request bodies of the API routes

use rocket::http::{ContentType, Status};
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket::{Request, Response};
use std::path::PathBuf;

use crate::app_log;

pub struct PdfResponse {
    pub data: Vec<u8>,
    pub filename: Option<String>,
}

impl PdfResponse {
    pub fn with_filename(data: Vec<u8>, filename: String) -> Self {
        Self {
            data,
            filename: Some(filename),
        }
    }
}

impl<'r> Responder<'r, 'static> for PdfResponse {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let mut binding = Response::build();
        let mut response = binding
            .header(ContentType::PDF)
            .sized_body(self.data.len(), std::io::Cursor::new(self.data));

        if let Some(filename) = self.filename {
            response = response.raw_header(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", filename),
            );
        }

        response.ok()
    }
}

pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub environment: String,
}

#[derive(Debug, Serialize)]
#[serde(crate = "rocket::serde", rename_all = "lowercase")]
pub enum ResponseType {
    Text,
    Data,
    Error,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct TextResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
}

impl TextResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::Text,
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct DataResponse<T> {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            response_type: ResponseType::Data,
            success: true,
            message: message.into(),
            data,
        }
    }
}

/// `GET /jds?get_stage_options=true` answer.
#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct StageOptionsBody {
    pub success: bool,
    pub stage_options: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct StandardErrorResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub error: String,
    pub error_code: String,
    pub suggestions: Vec<String>,
}

impl StandardErrorResponse {
    pub fn new(error: String, error_code: String, suggestions: Vec<String>) -> Self {
        Self {
            response_type: ResponseType::Error,
            success: false,
            error,
            error_code,
            suggestions,
        }
    }
}

/// Error answer with its HTTP status.
pub type ApiError = (Status, Json<StandardErrorResponse>);

pub type ApiResult<T> = Result<Json<DataResponse<T>>, ApiError>;

pub fn api_error(status: Status, error: impl Into<String>, code: &str, suggestions: &[&str]) -> ApiError {
    (
        status,
        Json(StandardErrorResponse::new(
            error.into(),
            code.to_string(),
            suggestions.iter().map(|s| s.to_string()).collect(),
        )),
    )
}

pub fn bad_request(error: impl Into<String>) -> ApiError {
    api_error(
        Status::BadRequest,
        error,
        "VALIDATION_ERROR",
        &["Check the required fields of the request"],
    )
}

pub fn not_found(error: impl Into<String>) -> ApiError {
    api_error(Status::NotFound, error, "NOT_FOUND", &[])
}

pub fn database_error(e: anyhow::Error) -> ApiError {
    app_log!(error, "Database operation failed: {:#}", e);
    api_error(
        Status::InternalServerError,
        "Database operation failed",
        "DATABASE_ERROR",
        &["Try again in a few moments"],
    )
}

pub fn ai_error(e: anyhow::Error) -> ApiError {
    app_log!(error, "AI service call failed: {:#}", e);
    api_error(
        Status::BadGateway,
        format!("AI service failed: {}", e),
        "AI_SERVICE_ERROR",
        &["Check the AI service configuration", "Try again in a few moments"],
    )
}

// ===== Request bodies =====

#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct UpdateFieldRequest {
    pub user_id: String,
    pub field: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct AnalyzeJdRequest {
    pub jd_id: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct OptimizeCvRequest {
    pub experience_id: String,
    pub jd_keywords: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct CreateArticleRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub language_pair: String,
}

#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct SentenceMarkRequest {
    pub article_id: i64,
    pub sentence_text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct UpdateNotesRequest {
    pub id: String,
    #[serde(default)]
    pub user_notes: Option<String>,
    #[serde(default)]
    pub ai_notes: Option<String>,
}
