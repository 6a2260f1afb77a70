use std::io;
use std::path::Path as FsPath;

use axum::extract::{Json, Multipart, Path, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::IntoResponse;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use super::{to_iso, MAX_UPLOAD_BYTES};
use crate::auth::Tenant;
use crate::error::{AppError, AppResult};
use crate::imaging;
use crate::models::{FileRecord, NewFileRecord};
use crate::schema::files;
use crate::state::AppState;

const ALLOWED_FILE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "text/plain",
];

const FORBIDDEN_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

pub(crate) fn contains_forbidden_chars(name: &str) -> bool {
    name.contains(FORBIDDEN_NAME_CHARS)
}

/// Collision-free stored name: the original base name plus a random suffix,
/// extension preserved.
fn unique_stored_name(original_name: &str) -> String {
    let path = FsPath::new(original_name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("file");

    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{stem}_{}.{ext}", Uuid::new_v4()),
        None => format!("{stem}_{}", Uuid::new_v4()),
    }
}

fn webp_sibling_name(current_name: &str) -> String {
    match current_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{stem}.webp"),
        _ => format!("{current_name}.webp"),
    }
}

fn tenant_relative_path(folder_path: &str, file_name: &str) -> String {
    format!("{folder_path}/{file_name}")
}

fn attachment_content_disposition(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            _ => ch,
        })
        .collect();

    let encoded =
        percent_encoding::utf8_percent_encode(&sanitized, percent_encoding::NON_ALPHANUMERIC);
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    )
}

fn find_tenant_file(
    conn: &mut SqliteConnection,
    application_id: &str,
    file_id: &str,
) -> AppResult<FileRecord> {
    files::table
        .filter(files::id.eq(file_id))
        .filter(files::application_id.eq(application_id))
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("File not found"))
}

fn public_url_for(state: &AppState, file_id: &str, is_public: bool) -> Option<String> {
    is_public.then(|| state.config.public_file_url(file_id))
}

#[derive(Serialize)]
pub struct FileResponse {
    pub id: String,
    pub application_id: String,
    pub original_name: String,
    pub current_name: String,
    pub file_path: String,
    pub file_type: String,
    pub size: i64,
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    pub created_at: String,
}

impl FileResponse {
    fn from_record(state: &AppState, record: FileRecord) -> Self {
        let public_url = public_url_for(state, &record.id, record.is_public);
        Self {
            id: record.id,
            application_id: record.application_id,
            original_name: record.original_name,
            current_name: record.current_name,
            file_path: record.file_path,
            file_type: record.file_type,
            size: record.size,
            is_public: record.is_public,
            public_url,
            created_at: to_iso(record.created_at),
        }
    }
}

#[derive(Serialize)]
pub struct FileListResponse {
    pub files: Vec<FileResponse>,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub id: String,
    pub original_name: String,
    pub current_name: String,
    pub file_type: String,
    pub size: i64,
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

#[derive(Deserialize)]
pub struct RenameRequest {
    pub new_name: String,
}

#[derive(Serialize)]
pub struct RenameResponse {
    pub success: bool,
    pub new_name: String,
}

#[derive(Deserialize)]
pub struct VisibilityRequest {
    pub is_public: bool,
}

#[derive(Serialize)]
pub struct VisibilityResponse {
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

pub async fn upload_file(
    State(state): State<AppState>,
    Tenant(application): Tenant,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut original_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut is_public = false;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                original_name = field.file_name().map(|n| n.to_string());
                content_type = field.content_type().map(|mime| mime.to_string());
                let data = field.bytes().await.map_err(|err| {
                    error!(error = %err, "failed to read file bytes");
                    AppError::bad_request(format!("failed to read file bytes: {err}"))
                })?;
                file_bytes = Some(data.to_vec());
            }
            Some("is_public") => {
                let value = field.text().await.map_err(|err| {
                    AppError::bad_request(format!("invalid is_public field: {err}"))
                })?;
                is_public = matches!(value.trim(), "true" | "1");
            }
            _ => {}
        }
    }

    let bytes = file_bytes.ok_or_else(|| AppError::bad_request("No file uploaded"))?;
    let original_name =
        original_name.ok_or_else(|| AppError::bad_request("No file uploaded"))?;

    let content_type = content_type.unwrap_or_default();
    if !ALLOWED_FILE_TYPES.contains(&content_type.as_str()) {
        return Err(AppError::bad_request("File type not allowed"));
    }

    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::bad_request("File too large. Maximum size is 1GB"));
    }

    let current_name = unique_stored_name(&original_name);
    let file_path = tenant_relative_path(&application.folder_path, &current_name);

    // Disk first, row second; a failed insert rolls the object back.
    let size = state.storage.put(&file_path, &bytes).await.map_err(|err| {
        error!(error = %err, path = %file_path, "failed to store uploaded file");
        AppError::internal("Failed to store file")
    })?;

    let new_file = NewFileRecord {
        id: Uuid::new_v4().to_string(),
        application_id: application.id.clone(),
        original_name: original_name.clone(),
        current_name: current_name.clone(),
        file_path: file_path.clone(),
        file_type: content_type.clone(),
        size: size as i64,
        is_public,
    };

    let insert_result = {
        let mut conn = state.db()?;
        diesel::insert_into(files::table)
            .values(&new_file)
            .execute(&mut conn)
    };

    if let Err(err) = insert_result {
        if let Err(cleanup_err) = state.storage.remove(&file_path).await {
            error!(error = %cleanup_err, path = %file_path, "failed to roll back stored file");
        }
        error!(error = %err, original_name = %original_name, "failed to record uploaded file");
        return Err(AppError::internal("Failed to store file"));
    }

    info!(
        file_id = %new_file.id,
        application = %application.name,
        original_name = %original_name,
        size = new_file.size,
        is_public = new_file.is_public,
        "file uploaded"
    );

    let public_url = public_url_for(&state, &new_file.id, new_file.is_public);
    Ok(Json(UploadResponse {
        id: new_file.id,
        original_name: new_file.original_name,
        current_name: new_file.current_name,
        file_type: new_file.file_type,
        size: new_file.size,
        is_public: new_file.is_public,
        public_url,
    }))
}

pub async fn list_files(
    State(state): State<AppState>,
    Tenant(application): Tenant,
) -> AppResult<Json<FileListResponse>> {
    let mut conn = state.db()?;

    let records: Vec<FileRecord> = files::table
        .filter(files::application_id.eq(&application.id))
        .order(files::created_at.asc())
        .load(&mut conn)?;

    let files = records
        .into_iter()
        .map(|record| FileResponse::from_record(&state, record))
        .collect();

    Ok(Json(FileListResponse { files }))
}

pub async fn rename_file(
    State(state): State<AppState>,
    Tenant(application): Tenant,
    Path(file_id): Path<String>,
    Json(payload): Json<RenameRequest>,
) -> AppResult<Json<RenameResponse>> {
    let new_name = payload.new_name;
    if new_name.trim().is_empty() {
        return Err(AppError::bad_request("New name is required"));
    }
    if contains_forbidden_chars(&new_name) {
        return Err(AppError::bad_request("Filename contains invalid characters"));
    }

    let file = {
        let mut conn = state.db()?;
        find_tenant_file(&mut conn, &application.id, &file_id)?
    };

    let new_file_name = match FsPath::new(&file.current_name)
        .extension()
        .and_then(|ext| ext.to_str())
    {
        Some(ext) => format!("{new_name}.{ext}"),
        None => new_name.clone(),
    };

    if new_file_name == file.current_name {
        return Ok(Json(RenameResponse {
            success: true,
            new_name: new_file_name,
        }));
    }

    let new_path = tenant_relative_path(&application.folder_path, &new_file_name);

    let duplicate = {
        let mut conn = state.db()?;
        files::table
            .filter(files::application_id.eq(&application.id))
            .filter(files::current_name.eq(&new_file_name))
            .filter(files::id.ne(&file.id))
            .first::<FileRecord>(&mut conn)
            .optional()?
    };
    if duplicate.is_some() || state.storage.exists(&new_path).await {
        return Err(AppError::bad_request(
            "A file with that name already exists",
        ));
    }

    state
        .storage
        .rename(&file.file_path, &new_path)
        .await
        .map_err(|err| {
            error!(error = %err, from = %file.file_path, to = %new_path, "failed to rename file on disk");
            AppError::internal("Failed to rename file")
        })?;

    let update_result = {
        let mut conn = state.db()?;
        diesel::update(files::table.find(&file.id))
            .set((
                files::current_name.eq(&new_file_name),
                files::file_path.eq(&new_path),
            ))
            .execute(&mut conn)
    };

    if let Err(err) = update_result {
        // Put the object back under its old name so row and disk stay aligned.
        if let Err(rollback_err) = state.storage.rename(&new_path, &file.file_path).await {
            error!(
                error = %rollback_err,
                path = %new_path,
                "failed to roll back file rename"
            );
        }
        error!(error = %err, file_id = %file.id, "failed to record file rename");
        return Err(AppError::internal("Failed to rename file"));
    }

    info!(file_id = %file.id, new_name = %new_file_name, "file renamed");

    Ok(Json(RenameResponse {
        success: true,
        new_name: new_file_name,
    }))
}

pub async fn convert_to_webp(
    State(state): State<AppState>,
    Tenant(application): Tenant,
    Path(file_id): Path<String>,
) -> AppResult<Json<UploadResponse>> {
    let file = {
        let mut conn = state.db()?;
        find_tenant_file(&mut conn, &application.id, &file_id)?
    };

    if !file.file_type.starts_with("image/") || file.file_type == "image/webp" {
        return Err(AppError::bad_request("File must be a non-WebP image"));
    }

    let source_bytes = match state.storage.get(&file.file_path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(AppError::not_found("File not found on disk"));
        }
        Err(err) => {
            error!(error = %err, path = %file.file_path, "failed to read file for conversion");
            return Err(AppError::internal("Failed to convert image to WebP"));
        }
    };

    let webp_bytes = imaging::convert_to_webp(&source_bytes).map_err(|err| {
        error!(error = %err, file_id = %file.id, "webp conversion failed");
        AppError::internal("Failed to convert image to WebP")
    })?;

    let webp_name = webp_sibling_name(&file.current_name);
    let webp_path = tenant_relative_path(&application.folder_path, &webp_name);

    let size = state.storage.put(&webp_path, &webp_bytes).await.map_err(|err| {
        error!(error = %err, path = %webp_path, "failed to store converted file");
        AppError::internal("Failed to convert image to WebP")
    })?;

    let new_file = NewFileRecord {
        id: Uuid::new_v4().to_string(),
        application_id: application.id.clone(),
        original_name: format!("{} (WebP)", file.original_name),
        current_name: webp_name,
        file_path: webp_path.clone(),
        file_type: "image/webp".to_string(),
        size: size as i64,
        is_public: file.is_public,
    };

    let insert_result = {
        let mut conn = state.db()?;
        diesel::insert_into(files::table)
            .values(&new_file)
            .execute(&mut conn)
    };

    if let Err(err) = insert_result {
        if let Err(cleanup_err) = state.storage.remove(&webp_path).await {
            error!(error = %cleanup_err, path = %webp_path, "failed to roll back converted file");
        }
        error!(error = %err, file_id = %file.id, "failed to record converted file");
        return Err(AppError::internal("Failed to convert image to WebP"));
    }

    info!(
        source_file_id = %file.id,
        file_id = %new_file.id,
        application = %application.name,
        size = new_file.size,
        "file converted to webp"
    );

    let public_url = public_url_for(&state, &new_file.id, new_file.is_public);
    Ok(Json(UploadResponse {
        id: new_file.id,
        original_name: new_file.original_name,
        current_name: new_file.current_name,
        file_type: new_file.file_type,
        size: new_file.size,
        is_public: new_file.is_public,
        public_url,
    }))
}

pub async fn set_visibility(
    State(state): State<AppState>,
    Tenant(application): Tenant,
    Path(file_id): Path<String>,
    Json(payload): Json<VisibilityRequest>,
) -> AppResult<Json<VisibilityResponse>> {
    let mut conn = state.db()?;
    let file = find_tenant_file(&mut conn, &application.id, &file_id)?;

    diesel::update(files::table.find(&file.id))
        .set(files::is_public.eq(payload.is_public))
        .execute(&mut conn)?;

    info!(file_id = %file.id, is_public = payload.is_public, "file visibility changed");

    Ok(Json(VisibilityResponse {
        is_public: payload.is_public,
        public_url: public_url_for(&state, &file.id, payload.is_public),
    }))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Tenant(application): Tenant,
    Path(file_id): Path<String>,
) -> AppResult<Json<DeleteResponse>> {
    let file = {
        let mut conn = state.db()?;
        find_tenant_file(&mut conn, &application.id, &file_id)?
    };

    // Best-effort disk cleanup; the row is removed either way.
    if let Err(err) = state.storage.remove(&file.file_path).await {
        error!(error = %err, path = %file.file_path, "failed to delete file from disk");
    }

    let mut conn = state.db()?;
    diesel::delete(files::table.find(&file.id)).execute(&mut conn)?;

    info!(file_id = %file.id, application = %application.name, "file deleted");

    Ok(Json(DeleteResponse { success: true }))
}

pub async fn download_file(
    State(state): State<AppState>,
    Tenant(application): Tenant,
    Path(file_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let file = {
        let mut conn = state.db()?;
        find_tenant_file(&mut conn, &application.id, &file_id)?
    };

    let bytes = read_file_bytes(&state, &file).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&file.file_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&attachment_content_disposition(&file.current_name))
            .map_err(|err| AppError::internal(format!("invalid content disposition: {err}")))?,
    );

    Ok((headers, bytes))
}

pub(crate) async fn read_file_bytes(
    state: &AppState,
    file: &FileRecord,
) -> AppResult<Vec<u8>> {
    match state.storage.get(&file.file_path).await {
        Ok(bytes) => Ok(bytes),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Err(AppError::not_found("File not found on disk"))
        }
        Err(err) => {
            error!(error = %err, path = %file.file_path, "failed to read file from disk");
            Err(AppError::internal("Failed to read file"))
        }
    }
}
