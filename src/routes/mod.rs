use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{
    auth::{AdminUser, AuthenticatedUser},
    state::AppState,
};

pub mod admin;
pub mod auth;
pub mod files;
pub mod health;
pub mod public;
pub mod user;

pub const MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_origins() {
        let headers: Vec<HeaderValue> = origins
            .iter()
            .map(|origin| {
                origin
                    .parse::<HeaderValue>()
                    .expect("invalid CORS allowed origin")
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new().route("/login", post(auth::login));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route("/users/:id", delete(admin::delete_user))
        .route("/applications", post(admin::create_application))
        .route("/applications/:id", delete(admin::delete_application))
        .route(
            "/applications/:id/regenerate-key",
            put(admin::regenerate_api_key),
        )
        .layer(middleware::from_extractor_with_state::<AdminUser, _>(
            state.clone(),
        ));

    let user_routes = Router::new()
        .route("/applications", get(user::list_applications))
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(state.clone()));

    let files_routes = Router::new()
        .route("/", get(files::list_files))
        .route("/upload", post(files::upload_file))
        .route("/:id", delete(files::delete_file))
        .route("/:id/rename", put(files::rename_file))
        .route("/:id/convert-to-webp", post(files::convert_to_webp))
        .route("/:id/visibility", patch(files::set_visibility))
        .route("/:id/download", get(files::download_file));

    let public_routes = Router::new()
        .route("/:id", get(public::get_public_file))
        .route("/:id/info", get(public::get_public_file_info));

    Router::new()
        .nest("/auth", auth_routes)
        .nest("/admin", admin_routes)
        .nest("/user", user_routes)
        .nest("/files", files_routes)
        .nest("/public", public_routes)
        .route("/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}
