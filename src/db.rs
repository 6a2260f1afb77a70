use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use uuid::Uuid;

use crate::auth::password;
use crate::models::NewUser;
use crate::schema::users;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

pub const DEFAULT_MAX_POOL_SIZE: u32 = 2;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(Debug)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(
            "PRAGMA busy_timeout = 5000; PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;",
        )
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub fn init_pool(database_path: &str) -> Result<DbPool> {
    init_pool_with_size(database_path, DEFAULT_MAX_POOL_SIZE)
}

pub fn init_pool_with_size(database_path: &str, max_size: u32) -> Result<DbPool> {
    if let Some(parent) = Path::new(database_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create database directory {parent:?}"))?;
        }
    }

    let manager = ConnectionManager::<SqliteConnection>::new(database_path);
    let pool = Pool::builder()
        .max_size(max_size.max(1))
        .connection_timeout(Duration::from_secs(10))
        .connection_customizer(Box::new(SqlitePragmas))
        .build(manager)?;
    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> Result<()> {
    let mut conn = pool
        .get()
        .map_err(|err| anyhow!("failed to acquire connection for migrations: {err}"))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
    Ok(())
}

/// Ensures an admin account exists; runs once at startup.
pub fn seed_admin(pool: &DbPool, admin_password: &str) -> Result<()> {
    let mut conn = pool
        .get()
        .map_err(|err| anyhow!("failed to acquire connection for admin bootstrap: {err}"))?;

    let existing: Option<String> = users::table
        .filter(users::role.eq("admin"))
        .select(users::id)
        .first(&mut conn)
        .optional()?;

    if existing.is_some() {
        return Ok(());
    }

    let admin = NewUser {
        id: Uuid::new_v4().to_string(),
        username: "admin".to_string(),
        password_hash: password::hash_password(admin_password)?,
        role: "admin".to_string(),
    };
    diesel::insert_into(users::table)
        .values(&admin)
        .execute(&mut conn)
        .context("failed to seed admin user")?;

    tracing::info!(username = "admin", "seeded default admin account");
    Ok(())
}
