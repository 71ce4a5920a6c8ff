use bytes::Bytes;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

/// A file received from a client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub body: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

/// Persists `upload` under a fresh random name and returns its public URL.
/// The client's file name only contributes the extension.
pub async fn store(st: &AppState, upload: Upload) -> AppResult<StoredObject> {
    if upload.body.is_empty() {
        return Err(AppError::validation(format!(
            "Uploaded file '{}' is empty",
            upload.file_name
        )));
    }

    let key = match extension(&upload.file_name, &upload.content_type) {
        Some(ext) => format!("uploads/{}.{}", Uuid::new_v4(), ext),
        None => format!("uploads/{}", Uuid::new_v4()),
    };
    let size = upload.body.len();
    st.storage
        .put_object(&key, upload.body, &upload.content_type)
        .await
        .map_err(|e| {
            error!(error = %e, %key, "put_object failed");
            AppError::storage(format!("could not store {}", upload.file_name))
        })?;

    info!(%key, size, "artifact stored");
    Ok(StoredObject {
        url: st.storage.object_url(&key),
        key,
    })
}

/// Best-effort removal of stored objects; failures are logged, not returned.
pub async fn discard(st: &AppState, keys: &[String]) {
    for key in keys {
        if let Err(e) = st.storage.delete_object(key).await {
            warn!(error = %e, %key, "could not delete stored object");
        }
    }
}

fn extension(file_name: &str, content_type: &str) -> Option<String> {
    let from_name = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 10)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()));
    from_name.or_else(|| ext_from_mime(content_type).map(str::to_string))
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "application/zip" => Some("zip"),
        "application/gzip" => Some("gz"),
        "application/pdf" => Some("pdf"),
        _ => None,
    }
}
