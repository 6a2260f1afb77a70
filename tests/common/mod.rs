use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, ensure, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use filedock::auth::jwt::JwtService;
use filedock::config::AppConfig;
use filedock::db;
use filedock::routes;
use filedock::state::AppState;
use filedock::storage::{FileStore, LocalFileStore};
use http_body_util::BodyExt;
use serde::Serialize;
use tempfile::TempDir;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const ADMIN_PASSWORD: &str = "test-admin-password";

pub struct TestApp {
    pub state: AppState,
    router: Router,
    _data_dir: TempDir,
    uploads_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let uploads_dir = tempfile::tempdir()?;
        let database_path = data_dir
            .path()
            .join("test.sqlite")
            .to_str()
            .ok_or_else(|| anyhow!("non-utf8 temp path"))?
            .to_string();

        let config = AppConfig {
            environment: "development".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 3001,
            backend_domain: "localhost".to_string(),
            backend_protocol: "http".to_string(),
            frontend_domain: "localhost".to_string(),
            frontend_protocol: "http".to_string(),
            frontend_port: 3002,
            production_domain: None,
            production_protocol: "https".to_string(),
            jwt_secret: "test-secret".to_string(),
            admin_password: ADMIN_PASSWORD.to_string(),
            database_path,
            uploads_dir: uploads_dir
                .path()
                .to_str()
                .ok_or_else(|| anyhow!("non-utf8 temp path"))?
                .to_string(),
        };

        let pool = db::init_pool(&config.database_path)?;
        db::run_migrations(&pool)?;
        db::seed_admin(&pool, &config.admin_password)?;

        let storage: Arc<dyn FileStore> = Arc::new(LocalFileStore::new(&config.uploads_dir));
        let jwt = JwtService::new(&config.jwt_secret);
        let state = AppState::new(pool, config, storage, jwt);
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            router,
            _data_dir: data_dir,
            uploads_dir,
        })
    }

    #[allow(dead_code)]
    pub fn uploads_path(&self) -> &Path {
        self.uploads_dir.path()
    }

    #[allow(dead_code)]
    pub async fn admin_token(&self) -> Result<String> {
        self.login_token("admin", ADMIN_PASSWORD).await
    }

    pub async fn login_token(&self, username: &str, password: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            username: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json("/auth/login", &LoginPayload { username, password }, None)
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        let body = body_to_vec(response.into_body()).await?;
        let parsed: serde_json::Value = serde_json::from_slice(&body)?;
        parsed["token"]
            .as_str()
            .map(|token| token.to_string())
            .ok_or_else(|| anyhow!("login response missing token"))
    }

    async fn send(&self, request: Request<Body>) -> Result<hyper::Response<Body>> {
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.json_with_auth(Method::POST, path, payload, token, None)
            .await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty())?).await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::DELETE).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty())?).await
    }

    #[allow(dead_code)]
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.json_with_auth(Method::PUT, path, payload, token, None)
            .await
    }

    async fn json_with_auth<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        if let Some(key) = api_key {
            builder = builder.header("x-api-key", key);
        }
        self.send(builder.body(Body::from(body))?).await
    }

    #[allow(dead_code)]
    pub async fn api_get(&self, path: &str, api_key: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .header("x-api-key", api_key)
            .body(Body::empty())?;
        self.send(request).await
    }

    #[allow(dead_code)]
    pub async fn api_post(&self, path: &str, api_key: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("x-api-key", api_key)
            .body(Body::empty())?;
        self.send(request).await
    }

    #[allow(dead_code)]
    pub async fn api_delete(&self, path: &str, api_key: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri(path)
            .header("x-api-key", api_key)
            .body(Body::empty())?;
        self.send(request).await
    }

    #[allow(dead_code)]
    pub async fn api_put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        api_key: &str,
    ) -> Result<hyper::Response<Body>> {
        self.json_with_auth(Method::PUT, path, payload, None, Some(api_key))
            .await
    }

    #[allow(dead_code)]
    pub async fn api_patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        api_key: &str,
    ) -> Result<hyper::Response<Body>> {
        self.json_with_auth(Method::PATCH, path, payload, None, Some(api_key))
            .await
    }

    #[allow(dead_code)]
    pub async fn upload_file(
        &self,
        filename: &str,
        content_type: &str,
        data: &[u8],
        is_public: Option<bool>,
        api_key: &str,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();
        body.extend(format!("--{boundary}\r\n").as_bytes());
        body.extend(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend(data);
        body.extend(b"\r\n");

        if let Some(flag) = is_public {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(b"Content-Disposition: form-data; name=\"is_public\"\r\n\r\n");
            body.extend(flag.to_string().as_bytes());
            body.extend(b"\r\n");
        }

        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/files/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header("x-api-key", api_key)
            .body(Body::from(body))?;
        self.send(request).await
    }

    /// Creates an application through the admin API and returns (id, api_key).
    #[allow(dead_code)]
    pub async fn create_application(&self, name: &str) -> Result<(String, String)> {
        let token = self.admin_token().await?;
        let response = self
            .post_json(
                "/admin/applications",
                &serde_json::json!({ "name": name }),
                Some(&token),
            )
            .await?;
        ensure!(
            response.status() == StatusCode::OK,
            "create application failed with status {}",
            response.status()
        );
        let body = body_to_vec(response.into_body()).await?;
        let parsed: serde_json::Value = serde_json::from_slice(&body)?;
        let id = parsed["id"]
            .as_str()
            .ok_or_else(|| anyhow!("missing application id"))?
            .to_string();
        let api_key = parsed["api_key"]
            .as_str()
            .ok_or_else(|| anyhow!("missing api key"))?
            .to_string();
        Ok((id, api_key))
    }
}

#[allow(dead_code)]
pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn body_to_json(body: Body) -> Result<serde_json::Value> {
    let bytes = body_to_vec(body).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// A tiny valid PNG for upload and conversion tests.
#[allow(dead_code)]
pub fn png_fixture() -> Vec<u8> {
    use image::{ImageBuffer, Rgba};
    use std::io::Cursor;

    let img = ImageBuffer::from_pixel(16, 16, Rgba([30u8, 144, 255, 255]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode png fixture");
    bytes
}
