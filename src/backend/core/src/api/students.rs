//! Student profile routes.
//!
//! `list_students` and the identity/house-guardian updates sit behind a
//! `RequireAccessLayer`; the owner-dependent checks are made here.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{ApiResponse, AppState, JsonBody};
use crate::error::{HousingError, Result};
use crate::middleware::auth::Caller;
use crate::models::{
    from_document, to_document, StudentEditableProfile, StudentIdentityProfile, StudentProfile,
};
use crate::rbac::models::HOUSE_GUARDIAN_FIELD;
use crate::rbac::AccessRequirement;
use crate::store::{Collection, Document};
use crate::validation::Validate;

const DEFAULT_LIST_SIZE: usize = 30;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_num")]
    pub num: usize,
}

fn default_num() -> usize {
    DEFAULT_LIST_SIZE
}

async fn apply_update(state: &AppState, student_id: &str, fields: Document) -> Result<StudentProfile> {
    let updated = state
        .store
        .update_identity_fields(Collection::Students, student_id, fields)
        .await?
        .ok_or_else(|| HousingError::target_not_found("student", student_id))?;
    Ok(from_document(Collection::Students, updated)?)
}

/// At most `num` student profiles.
pub async fn list_students(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse> {
    let profiles = state
        .store
        .list_identities(Collection::Students, params.num)
        .await?
        .into_iter()
        .map(|d| from_document::<StudentProfile>(Collection::Students, d))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    debug!(count = profiles.len(), "Listed students");
    Ok(Json(ApiResponse::success(profiles)))
}

pub async fn get_student(
    State(state): State<AppState>,
    caller: Caller,
    Path(student_id): Path<String>,
) -> Result<impl IntoResponse> {
    state
        .gate
        .enforce(&caller, &AccessRequirement::self_or_admin_read(&student_id))
        .await?;

    let document = state
        .store
        .find_identity_by_username(Collection::Students, &student_id)
        .await?
        .ok_or_else(|| HousingError::not_found("student", &student_id))?;

    let profile: StudentProfile = from_document(Collection::Students, document)?;
    Ok(Json(ApiResponse::success(profile)))
}

/// Partial update of the fields a student may edit.
pub async fn update_student(
    State(state): State<AppState>,
    caller: Caller,
    Path(student_id): Path<String>,
    JsonBody(update): JsonBody<StudentEditableProfile>,
) -> Result<impl IntoResponse> {
    state
        .gate
        .enforce(&caller, &AccessRequirement::self_or_admin_write(&student_id))
        .await?;
    update.validate()?;

    let profile = apply_update(&state, &student_id, to_document(&update)?).await?;
    info!(username = %caller.username, student_id = %student_id, "Student profile updated");
    Ok(Json(ApiResponse::success(profile)))
}

pub async fn update_student_identity(
    State(state): State<AppState>,
    caller: Caller,
    Path(student_id): Path<String>,
    JsonBody(update): JsonBody<StudentIdentityProfile>,
) -> Result<impl IntoResponse> {
    update.validate()?;

    let profile = apply_update(&state, &student_id, to_document(&update)?).await?;
    info!(username = %caller.username, student_id = %student_id, "Student identity updated");
    Ok(Json(ApiResponse::success(profile)))
}

async fn set_house_guardian_flag(
    state: &AppState,
    caller: &Caller,
    student_id: &str,
    value: bool,
) -> Result<StudentProfile> {
    let mut fields = Document::new();
    fields.insert(HOUSE_GUARDIAN_FIELD.to_string(), Value::Bool(value));

    let profile = apply_update(state, student_id, fields).await?;
    info!(
        username = %caller.username,
        student_id = %student_id,
        is_house_guardian = value,
        "House guardian flag changed"
    );
    Ok(profile)
}

pub async fn set_house_guardian(
    State(state): State<AppState>,
    caller: Caller,
    Path(student_id): Path<String>,
) -> Result<impl IntoResponse> {
    let profile = set_house_guardian_flag(&state, &caller, &student_id, true).await?;
    Ok(Json(ApiResponse::success(profile)))
}

pub async fn revoke_house_guardian(
    State(state): State<AppState>,
    caller: Caller,
    Path(student_id): Path<String>,
) -> Result<impl IntoResponse> {
    let profile = set_house_guardian_flag(&state, &caller, &student_id, false).await?;
    Ok(Json(ApiResponse::success(profile)))
}
