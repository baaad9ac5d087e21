// src/web/handlers/jd_handlers.rs
use rocket::serde::json::Json;
use rocket::{Responder, State};

use crate::app_log;
use crate::core::{Database, JdRepository};
use crate::types::{CreateJdRequest, JdField, JdRecord};
use crate::web::types::*;

#[derive(Responder)]
pub enum JdListResponse {
    Records(Json<DataResponse<Vec<JdRecord>>>),
    StageOptions(Json<StageOptionsBody>),
}

fn require_user(user_id: &str) -> Result<(), ApiError> {
    if user_id.trim().is_empty() {
        return Err(bad_request("User ID is required"));
    }
    Ok(())
}

pub async fn list_jds_handler(
    db: &State<Database>,
    user_id: String,
    get_stage_options: bool,
) -> Result<JdListResponse, ApiError> {
    require_user(&user_id)?;
    let repo = JdRepository::new(db.pool());

    if get_stage_options {
        let stage_options = repo.stage_options(&user_id).await.map_err(database_error)?;
        return Ok(JdListResponse::StageOptions(Json(StageOptionsBody {
            success: true,
            stage_options,
        })));
    }

    let records = repo.list_for_user(&user_id).await.map_err(database_error)?;
    app_log!(debug, "Listing {} JD records for {}", records.len(), user_id);
    Ok(JdListResponse::Records(Json(DataResponse::success(
        format!("{} records", records.len()),
        records,
    ))))
}

pub async fn create_jd_handler(
    db: &State<Database>,
    request: Json<CreateJdRequest>,
) -> ApiResult<JdRecord> {
    request.validate().map_err(|e| bad_request(e.to_string()))?;

    let record = JdRepository::new(db.pool())
        .create(&request)
        .await
        .map_err(database_error)?;

    Ok(Json(DataResponse::success("JD record created", record)))
}

pub async fn update_jd_handler(
    db: &State<Database>,
    id: &str,
    request: Json<UpdateFieldRequest>,
) -> ApiResult<JdRecord> {
    require_user(&request.user_id)?;
    let field: JdField = request
        .field
        .parse()
        .map_err(|e: anyhow::Error| bad_request(e.to_string()))?;
    let value = field
        .parse_value(&request.value)
        .map_err(|e| bad_request(e.to_string()))?;

    let updated = JdRepository::new(db.pool())
        .update_field(id, &request.user_id, field, &value)
        .await
        .map_err(database_error)?
        .ok_or_else(|| not_found(format!("JD record not found: {}", id)))?;

    app_log!(info, "Updated {} of JD {}", field, id);
    Ok(Json(DataResponse::success("JD record updated", updated)))
}

pub async fn delete_jd_handler(
    db: &State<Database>,
    id: &str,
    user_id: String,
) -> Result<Json<TextResponse>, ApiError> {
    require_user(&user_id)?;

    let deleted = JdRepository::new(db.pool())
        .delete(id, &user_id)
        .await
        .map_err(database_error)?;
    if !deleted {
        return Err(not_found(format!("JD record not found: {}", id)));
    }

    Ok(Json(TextResponse::success(format!("Deleted JD record {}", id))))
}
