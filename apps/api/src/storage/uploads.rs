//! Upload field rules, file validation and object key layout.

use std::path::Path;

use uuid::Uuid;

use crate::errors::AppError;

const UPLOAD_PREFIX: &str = "uploads/";

pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

const ALLOWED: &[(&str, &[&str])] = &[
    ("pdf", &["application/pdf"]),
    ("doc", &["application/msword"]),
    (
        "docx",
        &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"],
    ),
    ("txt", &["text/plain"]),
    ("jpg", &["image/jpeg", "image/jpg"]),
    ("jpeg", &["image/jpeg", "image/jpg"]),
    ("png", &["image/png"]),
    ("gif", &["image/gif"]),
    ("webp", &["image/webp"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadField {
    Resume,
    Avatar,
    Logo,
    Portfolio,
    Document,
}

impl UploadField {
    pub const ALL: [UploadField; 5] = [
        UploadField::Resume,
        UploadField::Avatar,
        UploadField::Logo,
        UploadField::Portfolio,
        UploadField::Document,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            UploadField::Resume => "resume",
            UploadField::Avatar => "avatar",
            UploadField::Logo => "logo",
            UploadField::Portfolio => "portfolio",
            UploadField::Document => "document",
        }
    }

    pub fn max_files(self) -> usize {
        match self {
            UploadField::Resume | UploadField::Avatar | UploadField::Logo => 1,
            UploadField::Portfolio => 5,
            UploadField::Document => 10,
        }
    }
}

/// Request body cap for the upload route: every field filled to its limit,
/// plus 1 MiB of multipart framing.
pub fn max_upload_body_bytes() -> usize {
    let files: usize = UploadField::ALL.iter().map(|f| f.max_files()).sum();
    files * MAX_FILE_BYTES + 1024 * 1024
}

/// Validates size, extension and MIME type; returns the lowercased extension.
pub fn validate_file(file_name: &str, mime: &str, size: usize) -> Result<String, AppError> {
    if size == 0 {
        return Err(AppError::Validation(format!("{file_name} is empty")));
    }
    if size > MAX_FILE_BYTES {
        return Err(AppError::Validation(format!(
            "{file_name} exceeds the 10 MB limit"
        )));
    }

    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| AppError::Validation(format!("{file_name} has no file extension")))?;

    let mime = mime.to_ascii_lowercase();
    let ok = ALLOWED
        .iter()
        .any(|(allowed_ext, mimes)| *allowed_ext == ext && mimes.contains(&mime.as_str()));
    if !ok {
        return Err(AppError::Validation(format!(
            "File type not allowed: {file_name} ({mime})"
        )));
    }
    Ok(ext)
}

pub fn object_key(field: UploadField, user_id: Uuid, ext: &str) -> String {
    format!("{UPLOAD_PREFIX}{}/{}/{}.{}", field.name(), user_id, Uuid::new_v4(), ext)
}

/// Owners may delete keys that carry their id as a path segment; admins any key.
pub fn can_delete(key: &str, user_id: Uuid, is_admin: bool) -> bool {
    if is_admin {
        return true;
    }
    let id = user_id.to_string();
    key.split('/').any(|segment| segment == id)
}

/// Any caller may sign user uploads under `uploads/`. Generated objects such
/// as application summaries go through their scoped endpoints; only admins
/// sign those directly.
pub fn can_presign(key: &str, is_admin: bool) -> bool {
    is_admin || key.starts_with(UPLOAD_PREFIX)
}

/// Rejects keys that could escape the bucket layout.
pub fn validate_key(key: &str) -> Result<(), AppError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|s| s == ".." || s.is_empty());
    if bad {
        return Err(AppError::Validation("Invalid file key".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_cap_covers_every_field() {
        assert_eq!(max_upload_body_bytes(), 18 * MAX_FILE_BYTES + 1024 * 1024);
    }

    #[test]
    fn test_field_limits() {
        assert_eq!(UploadField::parse("portfolio"), Some(UploadField::Portfolio));
        assert_eq!(UploadField::parse("cv"), None);
        assert_eq!(UploadField::Resume.max_files(), 1);
        assert_eq!(UploadField::Portfolio.max_files(), 5);
        assert_eq!(UploadField::Document.max_files(), 10);
    }

    #[test]
    fn test_validate_file_accepts_allow_list() {
        assert_eq!(validate_file("CV.PDF", "application/pdf", 1024).unwrap(), "pdf");
        assert_eq!(validate_file("me.jpeg", "image/jpeg", 10).unwrap(), "jpeg");
    }

    #[test]
    fn test_validate_file_rejections() {
        assert!(validate_file("big.pdf", "application/pdf", MAX_FILE_BYTES + 1).is_err());
        assert!(validate_file("empty.pdf", "application/pdf", 0).is_err());
        assert!(validate_file("run.exe", "application/octet-stream", 10).is_err());
        assert!(validate_file("fake.pdf", "image/png", 10).is_err());
        assert!(validate_file("noext", "text/plain", 10).is_err());
    }

    #[test]
    fn test_key_layout_and_ownership() {
        let user = Uuid::new_v4();
        let key = object_key(UploadField::Avatar, user, "png");
        assert!(key.starts_with(&format!("uploads/avatar/{user}/")));
        assert!(key.ends_with(".png"));
        assert!(can_delete(&key, user, false));
        assert!(!can_delete(&key, Uuid::new_v4(), false));
        assert!(can_delete(&key, Uuid::new_v4(), true));
    }

    #[test]
    fn test_generated_objects_are_admin_signed_only() {
        let upload = object_key(UploadField::Resume, Uuid::new_v4(), "pdf");
        assert!(can_presign(&upload, false));

        let summary = format!("applications/{}/summary.md", Uuid::new_v4());
        assert!(!can_presign(&summary, false));
        assert!(can_presign(&summary, true));
    }

    #[test]
    fn test_key_validation() {
        assert!(validate_key("uploads/a/b.png").is_ok());
        assert!(validate_key("../secret").is_err());
        assert!(validate_key("/abs").is_err());
        assert!(validate_key("").is_err());
    }
}
