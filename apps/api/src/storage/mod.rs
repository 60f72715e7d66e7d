//! S3-compatible object storage: uploads, deletes and presigned reads.

pub mod handlers;
pub mod uploads;

use std::time::Duration;

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use tracing::info;

use crate::errors::AppError;

pub const SIGNED_URL_TTL_SECS: u64 = 3600;

pub async fn put_object(
    s3: &S3Client,
    bucket: &str,
    key: &str,
    body: impl Into<Bytes>,
    content_type: &str,
) -> Result<(), AppError> {
    s3.put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(body.into()))
        .content_type(content_type)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("upload of {key} failed: {e}")))?;
    info!("Uploaded s3://{bucket}/{key}");
    Ok(())
}

pub async fn delete_object(s3: &S3Client, bucket: &str, key: &str) -> Result<(), AppError> {
    s3.delete_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("delete of {key} failed: {e}")))?;
    info!("Deleted s3://{bucket}/{key}");
    Ok(())
}

pub async fn presigned_get(
    s3: &S3Client,
    bucket: &str,
    key: &str,
    ttl_secs: u64,
) -> Result<String, AppError> {
    let config = PresigningConfig::expires_in(Duration::from_secs(ttl_secs))
        .map_err(|e| AppError::S3(format!("invalid presign ttl: {e}")))?;
    let request = s3
        .get_object()
        .bucket(bucket)
        .key(key)
        .presigned(config)
        .await
        .map_err(|e| AppError::S3(format!("presign of {key} failed: {e}")))?;
    Ok(request.uri().to_string())
}

/// Path-style URL of an object, valid when the bucket is public.
pub fn public_url(endpoint: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url() {
        assert_eq!(
            public_url("http://localhost:9000/", "jobfinder", "uploads/avatar/u/x.png"),
            "http://localhost:9000/jobfinder/uploads/avatar/u/x.png"
        );
    }
}
