use axum::extract::{Json, Path, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::IntoResponse;
use diesel::prelude::*;
use serde::Serialize;

use super::files::read_file_bytes;
use super::to_iso;
use crate::error::{AppError, AppResult};
use crate::models::FileRecord;
use crate::schema::files;
use crate::state::AppState;

const PUBLIC_CACHE_CONTROL: &str = "public, max-age=31536000";

#[derive(Serialize)]
pub struct PublicFileInfo {
    pub id: String,
    pub original_name: String,
    pub current_name: String,
    pub file_type: String,
    pub size: i64,
    pub created_at: String,
    pub is_public: bool,
}

fn find_public_file(state: &AppState, file_id: &str) -> AppResult<FileRecord> {
    let mut conn = state.db()?;
    files::table
        .filter(files::id.eq(file_id))
        .filter(files::is_public.eq(true))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("Public file not found"))
}

pub async fn get_public_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let file = find_public_file(&state, &file_id)?;
    let bytes = read_file_bytes(&state, &file).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&file.file_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(PUBLIC_CACHE_CONTROL),
    );

    Ok((headers, bytes))
}

pub async fn get_public_file_info(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> AppResult<Json<PublicFileInfo>> {
    let file = find_public_file(&state, &file_id)?;

    Ok(Json(PublicFileInfo {
        id: file.id,
        original_name: file.original_name,
        current_name: file.current_name,
        file_type: file.file_type,
        size: file.size,
        created_at: to_iso(file.created_at),
        is_public: true,
    }))
}
