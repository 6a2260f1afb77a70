use std::env;

use anyhow::{Context, Result};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub environment: String,
    pub server_host: String,
    pub server_port: u16,
    pub backend_domain: String,
    pub backend_protocol: String,
    pub frontend_domain: String,
    pub frontend_protocol: String,
    pub frontend_port: u16,
    pub production_domain: Option<String>,
    pub production_protocol: String,
    pub jwt_secret: String,
    pub admin_password: String,
    pub database_path: String,
    pub uploads_dir: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse()
            .context("SERVER_PORT must be a valid u16")?;
        let backend_domain = env::var("BACKEND_DOMAIN").unwrap_or_else(|_| "localhost".to_string());
        let backend_protocol = env::var("BACKEND_PROTOCOL").unwrap_or_else(|_| "http".to_string());
        let frontend_domain =
            env::var("FRONTEND_DOMAIN").unwrap_or_else(|_| "localhost".to_string());
        let frontend_protocol =
            env::var("FRONTEND_PROTOCOL").unwrap_or_else(|_| "http".to_string());
        let frontend_port = env::var("FRONTEND_PORT")
            .unwrap_or_else(|_| "3002".to_string())
            .parse()
            .context("FRONTEND_PORT must be a valid u16")?;
        let production_domain = env::var("PRODUCTION_DOMAIN").ok();
        let production_protocol =
            env::var("PRODUCTION_PROTOCOL").unwrap_or_else(|_| "https".to_string());
        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) => secret,
            Err(_) => {
                tracing::warn!("JWT_SECRET not set, using fallback. Set JWT_SECRET for production!");
                "fallback-secret-key".to_string()
            }
        };
        let admin_password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());
        let database_path =
            env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/database.sqlite".to_string());
        let uploads_dir = env::var("UPLOADS_DIR").unwrap_or_else(|_| "./uploads".to_string());

        Ok(Self {
            environment,
            server_host,
            server_port,
            backend_domain,
            backend_protocol,
            frontend_domain,
            frontend_protocol,
            frontend_port,
            production_domain,
            production_protocol,
            jwt_secret,
            admin_password,
            database_path,
            uploads_dir,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Base URL clients can reach this server on, used to build public file URLs.
    pub fn public_base_url(&self) -> String {
        if self.is_production() {
            if let Some(domain) = &self.production_domain {
                return format!("{}://{}", self.production_protocol, domain);
            }
        }
        format!(
            "{}://{}:{}",
            self.backend_protocol, self.backend_domain, self.server_port
        )
    }

    pub fn frontend_url(&self) -> String {
        if self.is_production() {
            if let Some(domain) = &self.production_domain {
                return format!("{}://{}", self.production_protocol, domain);
            }
        }
        format!(
            "{}://{}:{}",
            self.frontend_protocol, self.frontend_domain, self.frontend_port
        )
    }

    /// Allowed CORS origins. `None` means any origin (development mode).
    pub fn cors_origins(&self) -> Option<Vec<String>> {
        if !self.is_production() {
            return None;
        }

        let mut origins = vec![self.frontend_url()];
        if let Some(domain) = &self.production_domain {
            origins.push(format!("{}://{}", self.production_protocol, domain));
            origins.push(format!("{}://www.{}", self.production_protocol, domain));
        }
        Some(origins)
    }

    pub fn public_file_url(&self, file_id: &str) -> String {
        format!("{}/public/{}", self.public_base_url(), file_id)
    }
}
