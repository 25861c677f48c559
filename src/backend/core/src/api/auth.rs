//! Registration, login, role lookup and password rotation.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{ApiResponse, AppState, JsonBody};
use crate::auth::{AuthError, CredentialHasher};
use crate::error::{HousingError, Result};
use crate::middleware::auth::Caller;
use crate::models::{
    from_document, to_document, AdminProfile, AdminRegistration, Credentials, LoginResponse,
    PasswordChange, StudentRegistration, UserProfile, UserRecord,
};
use crate::observability::metrics;
use crate::store::{Collection, Document};
use crate::validation::Validate;

// ═══════════════════════════════════════════════════════════════════════════════
// Password work on the blocking pool
// ═══════════════════════════════════════════════════════════════════════════════

async fn hash_password(hasher: Arc<CredentialHasher>, password: String) -> Result<String> {
    let started = Instant::now();
    let hash = tokio::task::spawn_blocking(move || hasher.hash(&password)).await??;
    metrics::record_password_work("hash", started.elapsed().as_secs_f64());
    Ok(hash)
}

/// Verify against the stored hash, or against the decoy when there is none.
async fn verify_password(
    hasher: Arc<CredentialHasher>,
    password: String,
    stored_hash: Option<String>,
) -> Result<bool> {
    let started = Instant::now();
    let verified = tokio::task::spawn_blocking(move || match stored_hash {
        Some(hash) => hasher.verify(&password, &hash),
        None => hasher.verify_decoy(&password),
    })
    .await?;
    metrics::record_password_work("verify", started.elapsed().as_secs_f64());
    Ok(verified)
}

async fn load_user(state: &AppState, username: &str) -> Result<Option<UserRecord>> {
    let document = state
        .store
        .find_identity_by_username(Collection::Users, username)
        .await?;
    Ok(document
        .map(|d| from_document::<UserRecord>(Collection::Users, d))
        .transpose()?)
}

async fn exists(state: &AppState, collection: Collection, username: &str) -> Result<bool> {
    Ok(state
        .store
        .find_identity_by_username(collection, username)
        .await?
        .is_some())
}

/// Hash the password and insert the `users` record.
async fn create_user(state: &AppState, credentials: Credentials) -> Result<()> {
    let password_hash = hash_password(state.hasher.clone(), credentials.password).await?;
    let record = UserRecord {
        username: credentials.username,
        password_hash,
    };

    state
        .store
        .insert_identity(Collection::Users, to_document(&record)?)
        .await?;
    Ok(())
}

/// Insert a role record. Duplicates map to the collection's registration error.
async fn create_role_record(
    state: &AppState,
    collection: Collection,
    record: Document,
) -> Result<()> {
    state.store.insert_identity(collection, record).await?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Registration
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn register_user(
    State(state): State<AppState>,
    JsonBody(credentials): JsonBody<Credentials>,
) -> Result<impl IntoResponse> {
    credentials.validate()?;
    let username = credentials.username.clone();

    if exists(&state, Collection::Users, &username).await? {
        return Err(HousingError::username_taken(&username));
    }
    create_user(&state, credentials).await?;

    info!(username = %username, "User registered");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(UserProfile { username })),
    ))
}

pub async fn register_admin(
    State(state): State<AppState>,
    JsonBody(registration): JsonBody<AdminRegistration>,
) -> Result<impl IntoResponse> {
    registration.validate()?;
    let username = registration.username.clone();

    if exists(&state, Collection::Users, &username).await? {
        return Err(HousingError::username_taken(&username));
    }
    create_user(&state, registration.credentials()).await?;

    let record = registration.record();
    if let Err(e) = create_role_record(&state, Collection::Admins, to_document(&record)?).await {
        warn!(
            username = %username,
            error = %e,
            "Admin record insert failed after user record was created"
        );
        return Err(e);
    }

    info!(
        username = %username,
        read_only = record.read_only,
        "Admin registered"
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(AdminProfile::from(record))),
    ))
}

pub async fn register_student(
    State(state): State<AppState>,
    JsonBody(registration): JsonBody<StudentRegistration>,
) -> Result<impl IntoResponse> {
    registration.validate()?;
    let username = registration.username.clone();

    if exists(&state, Collection::Students, &username).await? {
        return Err(HousingError::student_already_exists(&username));
    }
    if exists(&state, Collection::Users, &username).await? {
        return Err(HousingError::username_taken(&username));
    }

    // The student record goes in first: its insert decides which of two
    // concurrent registrations for the same student wins.
    let (credentials, profile) = registration.into_parts();
    create_role_record(&state, Collection::Students, to_document(&profile)?).await?;
    if let Err(e) = create_user(&state, credentials).await {
        warn!(
            username = %username,
            error = %e,
            "User record insert failed after student record was created"
        );
        return Err(e);
    }

    info!(username = %username, "Student registered");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(profile))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Login and access
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn login(
    State(state): State<AppState>,
    JsonBody(credentials): JsonBody<Credentials>,
) -> Result<impl IntoResponse> {
    credentials.validate()?;
    let Credentials { username, password } = credentials;

    let stored_hash = load_user(&state, &username)
        .await?
        .map(|user| user.password_hash);
    let verified = verify_password(state.hasher.clone(), password, stored_hash).await?;

    if !verified {
        debug!(username = %username, "Login rejected");
        metrics::record_login("failure");
        metrics::record_auth_failure(AuthError::InvalidCredentials.reason());
        return Err(AuthError::InvalidCredentials.into());
    }

    let token = state.tokens.issue(&username)?;
    let roles = state.evaluator().role_flags(&username).await?;

    metrics::record_login("success");
    info!(username = %username, "User logged in");
    Ok(Json(ApiResponse::success(LoginResponse { token, roles })))
}

pub async fn access(State(state): State<AppState>, caller: Caller) -> Result<impl IntoResponse> {
    let roles = state.evaluator().role_flags(&caller.username).await?;
    Ok(Json(ApiResponse::success(roles)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Password rotation
// ═══════════════════════════════════════════════════════════════════════════════

/// Replace the caller's password hash. Tokens already issued stay valid.
pub async fn change_password(
    State(state): State<AppState>,
    caller: Caller,
    JsonBody(change): JsonBody<PasswordChange>,
) -> Result<impl IntoResponse> {
    change.validate()?;
    let username = caller.username;

    let stored_hash = load_user(&state, &username)
        .await?
        .map(|user| user.password_hash);
    if !verify_password(state.hasher.clone(), change.old_password, stored_hash).await? {
        metrics::record_auth_failure(AuthError::InvalidCredentials.reason());
        return Err(AuthError::InvalidCredentials.into());
    }

    let new_hash = hash_password(state.hasher.clone(), change.new_password).await?;
    let mut fields = Document::new();
    fields.insert(
        UserRecord::PASSWORD_HASH_FIELD.to_string(),
        Value::String(new_hash),
    );

    state
        .store
        .update_identity_fields(Collection::Users, &username, fields)
        .await?
        .ok_or_else(|| HousingError::target_not_found("user", &username))?;

    info!(username = %username, "Password changed");
    Ok(Json(ApiResponse::success(UserProfile { username })))
}
