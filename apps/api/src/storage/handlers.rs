use std::collections::{BTreeMap, HashMap};

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::info;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::state::AppState;
use crate::storage::uploads::{
    can_delete, can_presign, object_key, validate_file, validate_key, UploadField,
};
use crate::storage::{delete_object, presigned_get, public_url, put_object, SIGNED_URL_TTL_SECS};

#[derive(Debug, Serialize)]
pub struct UploadedFile {
    pub key: String,
    pub original_name: String,
    pub size: usize,
    pub mimetype: String,
    pub url: String,
    pub signed_url: String,
}

#[derive(Debug, Serialize)]
pub struct FileUrlResponse {
    pub key: String,
    pub url: String,
    pub signed_url: String,
    pub expires_in: u64,
}

struct PendingFile {
    field: UploadField,
    original_name: String,
    mimetype: String,
    ext: String,
    bytes: Bytes,
}

/// POST /api/v1/upload
pub async fn handle_upload(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<BTreeMap<&'static str, Vec<UploadedFile>>>), AppError> {
    let mut pending: Vec<PendingFile> = Vec::new();
    let mut counts: HashMap<UploadField, usize> = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let Some(kind) = field.name().and_then(UploadField::parse) else {
            continue;
        };
        let original_name = field.file_name().unwrap_or("file").to_string();
        let mimetype = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read {original_name}: {e}")))?;

        let count = counts.entry(kind).or_default();
        *count += 1;
        if *count > kind.max_files() {
            return Err(AppError::Validation(format!(
                "Too many files for '{}' (max {})",
                kind.name(),
                kind.max_files()
            )));
        }

        let ext = validate_file(&original_name, &mimetype, bytes.len())?;
        pending.push(PendingFile {
            field: kind,
            original_name,
            mimetype,
            ext,
            bytes,
        });
    }

    if pending.is_empty() {
        return Err(AppError::Validation("No files uploaded".to_string()));
    }

    let bucket = &state.config.s3_bucket;
    let mut result: BTreeMap<&'static str, Vec<UploadedFile>> = BTreeMap::new();
    for file in pending {
        let key = object_key(file.field, user.id, &file.ext);
        let size = file.bytes.len();
        put_object(&state.s3, bucket, &key, file.bytes, &file.mimetype).await?;
        let signed_url = presigned_get(&state.s3, bucket, &key, SIGNED_URL_TTL_SECS).await?;
        result.entry(file.field.name()).or_default().push(UploadedFile {
            url: public_url(&state.config.s3_endpoint, bucket, &key),
            key,
            original_name: file.original_name,
            size,
            mimetype: file.mimetype,
            signed_url,
        });
    }

    info!(
        "User {} uploaded {} file(s)",
        user.id,
        result.values().map(Vec::len).sum::<usize>()
    );
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /api/v1/upload/*key
pub async fn handle_file_url(
    State(state): State<AppState>,
    user: AuthUser,
    Path(key): Path<String>,
) -> Result<Json<FileUrlResponse>, AppError> {
    validate_key(&key)?;
    if !can_presign(&key, user.is_admin()) {
        return Err(AppError::forbidden());
    }
    let bucket = &state.config.s3_bucket;
    let signed_url = presigned_get(&state.s3, bucket, &key, SIGNED_URL_TTL_SECS).await?;
    Ok(Json(FileUrlResponse {
        url: public_url(&state.config.s3_endpoint, bucket, &key),
        key,
        signed_url,
        expires_in: SIGNED_URL_TTL_SECS,
    }))
}

/// DELETE /api/v1/upload/*key
pub async fn handle_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(key): Path<String>,
) -> Result<StatusCode, AppError> {
    validate_key(&key)?;
    if !can_delete(&key, user.id, user.is_admin()) {
        return Err(AppError::forbidden());
    }
    delete_object(&state.s3, &state.config.s3_bucket, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}
