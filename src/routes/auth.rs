use axum::{extract::State, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    auth::password,
    error::{AppError, AppResult},
    models::User,
    schema::users,
    state::AppState,
};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: LoginUser,
}

#[derive(Serialize)]
pub struct LoginUser {
    pub id: String,
    pub username: String,
    pub role: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    if payload.username.is_empty() || payload.password.is_empty() {
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    let mut conn = state.db()?;

    let user: Option<User> = users::table
        .filter(users::username.eq(&payload.username))
        .first(&mut conn)
        .optional()?;

    let user = match user {
        Some(user) => user,
        None => return Err(AppError::unauthorized("Invalid credentials")),
    };

    let valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized("Invalid credentials"))?;
    if !valid {
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    let token = state
        .jwt
        .generate_token(&user.id, &user.username, &user.role)?;

    Ok(Json(LoginResponse {
        token,
        user: LoginUser {
            id: user.id,
            username: user.username,
            role: user.role,
        },
    }))
}
