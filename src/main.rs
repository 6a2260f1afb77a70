use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use filedock::auth::jwt::JwtService;
use filedock::config::AppConfig;
use filedock::db;
use filedock::routes;
use filedock::state::AppState;
use filedock::storage::{FileStore, LocalFileStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        environment = %config.environment,
        server_host = %config.server_host,
        server_port = config.server_port,
        database_path = %config.database_path,
        uploads_dir = %config.uploads_dir,
        public_base_url = %config.public_base_url(),
        "loaded configuration"
    );

    let pool = db::init_pool(&config.database_path)?;
    db::run_migrations(&pool)?;
    db::seed_admin(&pool, &config.admin_password)?;

    std::fs::create_dir_all(&config.uploads_dir)?;
    let storage: Arc<dyn FileStore> = Arc::new(LocalFileStore::new(&config.uploads_dir));
    let jwt = JwtService::new(&config.jwt_secret);

    let listen_addr: SocketAddr =
        format!("{}:{}", config.server_host, config.server_port).parse()?;

    let state = AppState::new(pool, config, storage, jwt);
    let router = routes::create_router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, router).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
