use axum::extract::{Json, Path, State};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use super::files::contains_forbidden_chars;
use super::to_iso;
use crate::auth::password;
use crate::error::{AppError, AppResult};
use crate::models::{Application, NewApplication, NewUser};
use crate::schema::{applications, files, users};
use crate::state::AppState;

#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub role: String,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: String,
}

#[derive(Serialize)]
pub struct CreateUserResponse {
    pub id: String,
    pub username: String,
    pub role: String,
}

#[derive(Deserialize)]
pub struct CreateApplicationRequest {
    pub name: String,
}

#[derive(Serialize)]
pub struct CreateApplicationResponse {
    pub id: String,
    pub name: String,
    pub api_key: String,
    pub folder_path: String,
}

#[derive(Serialize)]
pub struct RegenerateKeyResponse {
    pub api_key: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

fn generate_api_key() -> String {
    format!("app_{}", Uuid::new_v4().simple())
}

pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<UserListResponse>> {
    let mut conn = state.db()?;

    let rows: Vec<(String, String, String, chrono::NaiveDateTime)> = users::table
        .select((
            users::id,
            users::username,
            users::role,
            users::created_at,
        ))
        .load(&mut conn)?;

    let users = rows
        .into_iter()
        .map(|(id, username, role, created_at)| UserResponse {
            id,
            username,
            role,
            created_at: to_iso(created_at),
        })
        .collect();

    Ok(Json(UserListResponse { users }))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<Json<CreateUserResponse>> {
    if payload.username.trim().is_empty() {
        return Err(AppError::bad_request("Username cannot be empty"));
    }
    if payload.username.len() < 3 {
        return Err(AppError::bad_request(
            "Username must be at least 3 characters long",
        ));
    }
    if payload.username.len() > 30 {
        return Err(AppError::bad_request(
            "Username must be less than 30 characters",
        ));
    }
    if payload.password.len() < 8 {
        return Err(AppError::bad_request(
            "Password must be at least 8 characters long",
        ));
    }
    if payload.password.len() > 100 {
        return Err(AppError::bad_request(
            "Password must be less than 100 characters",
        ));
    }
    if payload.role != "admin" && payload.role != "user" {
        return Err(AppError::bad_request("Role must be either admin or user"));
    }

    let new_user = NewUser {
        id: Uuid::new_v4().to_string(),
        username: payload.username.clone(),
        password_hash: password::hash_password(&payload.password)?,
        role: payload.role.clone(),
    };

    let mut conn = state.db()?;
    match diesel::insert_into(users::table)
        .values(&new_user)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::bad_request("Username already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    info!(user_id = %new_user.id, username = %new_user.username, role = %new_user.role, "created user");

    Ok(Json(CreateUserResponse {
        id: new_user.id,
        username: new_user.username,
        role: new_user.role,
    }))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<SuccessResponse>> {
    let mut conn = state.db()?;
    diesel::delete(users::table.find(&user_id)).execute(&mut conn)?;
    Ok(Json(SuccessResponse { success: true }))
}

pub async fn create_application(
    State(state): State<AppState>,
    Json(payload): Json<CreateApplicationRequest>,
) -> AppResult<Json<CreateApplicationResponse>> {
    let name = payload.name;
    if name.trim().is_empty() {
        return Err(AppError::bad_request("Application name is required"));
    }
    if name.len() < 3 {
        return Err(AppError::bad_request(
            "Application name must be at least 3 characters long",
        ));
    }
    if name.len() > 50 {
        return Err(AppError::bad_request(
            "Application name must be less than 50 characters",
        ));
    }
    if contains_forbidden_chars(&name) {
        return Err(AppError::bad_request(
            "Application name contains invalid characters",
        ));
    }

    // Idempotent; a pre-existing tenant directory is fine.
    state.storage.create_dir(&name).await.map_err(|err| {
        error!(error = %err, application = %name, "failed to create tenant folder");
        AppError::internal("Failed to create application folder")
    })?;

    let new_application = NewApplication {
        id: Uuid::new_v4().to_string(),
        name: name.clone(),
        api_key: generate_api_key(),
        folder_path: name.clone(),
    };

    let mut conn = state.db()?;
    match diesel::insert_into(applications::table)
        .values(&new_application)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::bad_request("Application name already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    info!(application_id = %new_application.id, name = %new_application.name, "created application");

    Ok(Json(CreateApplicationResponse {
        id: new_application.id,
        name: new_application.name,
        api_key: new_application.api_key,
        folder_path: new_application.folder_path,
    }))
}

pub async fn delete_application(
    State(state): State<AppState>,
    Path(application_id): Path<String>,
) -> AppResult<Json<SuccessResponse>> {
    let mut conn = state.db()?;

    let application: Option<Application> = applications::table
        .find(&application_id)
        .first(&mut conn)
        .optional()?;

    let Some(application) = application else {
        return Ok(Json(SuccessResponse { success: true }));
    };

    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        diesel::delete(files::table.filter(files::application_id.eq(&application.id)))
            .execute(conn)?;
        diesel::delete(applications::table.find(&application.id)).execute(conn)?;
        Ok(())
    })?;

    // Best-effort; a failure leaves orphaned files on disk.
    if let Err(err) = state.storage.remove_dir(&application.folder_path).await {
        error!(
            error = %err,
            application = %application.name,
            folder = %application.folder_path,
            "failed to remove tenant folder from disk"
        );
    }

    info!(application_id = %application.id, name = %application.name, "deleted application");

    Ok(Json(SuccessResponse { success: true }))
}

pub async fn regenerate_api_key(
    State(state): State<AppState>,
    Path(application_id): Path<String>,
) -> AppResult<Json<RegenerateKeyResponse>> {
    let api_key = generate_api_key();

    let mut conn = state.db()?;
    diesel::update(applications::table.find(&application_id))
        .set(applications::api_key.eq(&api_key))
        .execute(&mut conn)?;

    info!(application_id = %application_id, "regenerated api key");

    Ok(Json(RegenerateKeyResponse { api_key }))
}
