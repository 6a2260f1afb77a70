use axum::extract::{Json, State};
use diesel::prelude::*;
use serde::Serialize;

use super::to_iso;
use crate::error::AppResult;
use crate::models::Application;
use crate::schema::applications;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ApplicationResponse {
    pub id: String,
    pub name: String,
    pub api_key: String,
    pub folder_path: String,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct ApplicationListResponse {
    pub applications: Vec<ApplicationResponse>,
}

pub async fn list_applications(
    State(state): State<AppState>,
) -> AppResult<Json<ApplicationListResponse>> {
    let mut conn = state.db()?;

    let rows: Vec<Application> = applications::table
        .order(applications::created_at.asc())
        .load(&mut conn)?;

    let applications = rows
        .into_iter()
        .map(|app| ApplicationResponse {
            id: app.id,
            name: app.name,
            api_key: app.api_key,
            folder_path: app.folder_path,
            created_at: to_iso(app.created_at),
        })
        .collect();

    Ok(Json(ApplicationListResponse { applications }))
}
