use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::products::versioning::VersionOrdering;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// S3/MinIO bucket holding uploaded artifacts and images.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base URL under which stored objects are publicly reachable.
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub db_timeout: Duration,
    pub upload_limit_bytes: usize,
    pub version_ordering: VersionOrdering,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).with_context(|| format!("{key} must be set"));

        let database_url = required("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "softswap".into()),
            audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "softswap-users".into()),
            ttl_minutes: parse_or(&lookup, "JWT_TTL_MINUTES", 60 * 24)?,
        };

        let endpoint = required("MINIO_ENDPOINT")?;
        let bucket = required("MINIO_BUCKET")?;
        let public_url = lookup("MINIO_PUBLIC_URL")
            .unwrap_or_else(|| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));
        let storage = StorageConfig {
            access_key: required("MINIO_ACCESS_KEY")?,
            secret_key: required("MINIO_SECRET_KEY")?,
            region: lookup("MINIO_REGION").unwrap_or_else(|| "us-east-1".into()),
            public_url: public_url.trim_end_matches('/').to_string(),
            endpoint,
            bucket,
        };

        let db_timeout = Duration::from_millis(parse_or(&lookup, "DB_TIMEOUT_MS", 5_000u64)?);
        let upload_limit_bytes = parse_or(&lookup, "UPLOAD_LIMIT_MB", 20usize)? * 1024 * 1024;
        let version_ordering = match lookup("VERSION_ORDERING") {
            Some(v) => v.parse().map_err(anyhow::Error::msg)?,
            None => VersionOrdering::default(),
        };

        Ok(Self {
            database_url,
            jwt,
            storage,
            db_timeout,
            upload_limit_bytes,
            version_ordering,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw}: {e}")),
        None => Ok(default),
    }
}
