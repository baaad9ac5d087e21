// src/web/handlers/experience_handlers.rs
use rocket::serde::json::Json;
use rocket::State;

use crate::core::{Database, ExperienceRepository};
use crate::types::{CreateExperienceRequest, ExperienceRecord};
use crate::web::types::*;

pub async fn list_experiences_handler(
    db: &State<Database>,
    user_id: String,
) -> ApiResult<Vec<ExperienceRecord>> {
    if user_id.trim().is_empty() {
        return Err(bad_request("User ID is required"));
    }

    let records = ExperienceRepository::new(db.pool())
        .list_for_user(&user_id)
        .await
        .map_err(database_error)?;

    Ok(Json(DataResponse::success(
        format!("{} experiences", records.len()),
        records,
    )))
}

pub async fn create_experience_handler(
    db: &State<Database>,
    request: Json<CreateExperienceRequest>,
) -> ApiResult<ExperienceRecord> {
    let missing: Vec<&str> = [
        ("user_id", &request.user_id),
        ("company", &request.company),
        ("title", &request.title),
        ("experience", &request.experience),
    ]
    .iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| *name)
    .collect();

    if !missing.is_empty() {
        return Err(bad_request(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    let record = ExperienceRepository::new(db.pool())
        .create(&request)
        .await
        .map_err(database_error)?;

    Ok(Json(DataResponse::success("Experience created", record)))
}
