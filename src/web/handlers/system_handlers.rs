// src/web/handlers/system_handlers.rs
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;

use crate::app_log;
use crate::core::{AiClient, Database};
use crate::web::types::*;

#[derive(rocket::serde::Serialize)]
#[serde(crate = "rocket::serde")]
pub struct HealthStatus {
    pub status: &'static str,
    pub environment: String,
    pub data_dir: String,
    pub database: &'static str,
    pub ai_model: String,
}

pub async fn health_handler(
    config: &State<ServerConfig>,
    db: &State<Database>,
    ai: &State<AiClient>,
) -> Result<Json<DataResponse<HealthStatus>>, ApiError> {
    if let Err(e) = db.health_check().await {
        app_log!(error, "Health check failed: {:#}", e);
        return Err(api_error(
            Status::ServiceUnavailable,
            "Database unavailable",
            "SERVICE_UNAVAILABLE",
            &["Check the database path and permissions"],
        ));
    }

    app_log!(debug, "Health check OK");
    Ok(Json(DataResponse::success(
        "Service healthy",
        HealthStatus {
            status: "ok",
            environment: config.environment.clone(),
            data_dir: config.data_dir.display().to_string(),
            database: "ok",
            ai_model: ai.model().to_string(),
        },
    )))
}
