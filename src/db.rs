use std::{future::Future, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{error, warn};

use crate::{config::AppConfig, error::AppError};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(config.db_timeout)
        .connect(&config.database_url)
        .await
        .context("connect to database")
}

pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")
}

/// Runs a database call under `limit`. Elapsed calls surface as a transient
/// storage error; driver errors go through [`classify`].
pub async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res.map_err(classify),
        Err(_) => {
            warn!(timeout_ms = limit.as_millis() as u64, "database call timed out");
            Err(AppError::storage("database call timed out"))
        }
    }
}

pub fn classify(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                return match db_err.constraint() {
                    Some("uq_title_version") => {
                        AppError::conflict("A product with this title and version already exists")
                    }
                    Some("users_email_key") => AppError::conflict("Email already registered"),
                    _ => AppError::conflict("Record already exists"),
                }
            }
            Some(FOREIGN_KEY_VIOLATION) => {
                return AppError::not_found("Referenced record not found");
            }
            _ => {}
        }
    }
    if let sqlx::Error::RowNotFound = e {
        return AppError::not_found("Record not found");
    }
    error!(error = %e, "database error");
    AppError::storage("Database unavailable")
}
