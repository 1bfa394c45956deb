//! Upload path and file checks.
//!
//! Upload-adjacent fields name files relative to an upload directory. Every
//! such name is checked for traversal and resolved to a path that is
//! lexically contained in the base directory before anything is written.

use std::path::{Component, Path, PathBuf};

use super::errors::{FieldIssue, IssueKind, ValidationError};

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];
pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx", "txt", "md", "csv"];

pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_DOCUMENT_BYTES: u64 = 20 * 1024 * 1024;

/// Longest file name component kept by [`sanitize_filename`].
pub const MAX_FILENAME_LEN: usize = 255;

/// Category of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Document,
}

impl UploadKind {
    pub fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            UploadKind::Image => IMAGE_EXTENSIONS,
            UploadKind::Document => DOCUMENT_EXTENSIONS,
        }
    }

    pub fn max_bytes(self) -> u64 {
        match self {
            UploadKind::Image => MAX_IMAGE_BYTES,
            UploadKind::Document => MAX_DOCUMENT_BYTES,
        }
    }

    /// Classify a file name by its extension.
    pub fn for_filename(name: &str) -> Option<Self> {
        let ext = extension(name)?;
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(UploadKind::Image)
        } else if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
            Some(UploadKind::Document)
        } else {
            None
        }
    }
}

fn extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Traversal markers in a requested upload name, if any.
pub fn traversal_issue(field: &str, requested: &str) -> Option<FieldIssue> {
    let reason = if requested.contains('\0') {
        Some("contains a NUL byte")
    } else if requested.contains('\\') {
        Some("contains a backslash")
    } else if requested.starts_with('/') || requested.starts_with('~') {
        Some("must be a relative path")
    } else if requested.len() >= 2 && requested.as_bytes()[1] == b':' {
        Some("contains a drive prefix")
    } else if requested
        .split('/')
        .any(|part| part == ".." || part == "." || part.is_empty())
    {
        Some("contains a traversal sequence or empty component")
    } else {
        None
    };
    reason.map(|r| FieldIssue::new(field, IssueKind::PathTraversal, r))
}

/// Reduce an arbitrary client file name to a safe single component.
///
/// Directory parts are dropped, characters outside `[A-Za-z0-9._-]` become
/// `_`, leading dots are removed and the result is capped at
/// [`MAX_FILENAME_LEN`] bytes with the extension preserved.
pub fn sanitize_filename(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or("");
    let mut cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        cleaned = "file".to_string();
    }
    if cleaned.len() > MAX_FILENAME_LEN {
        match cleaned.rsplit_once('.') {
            Some((stem, ext)) if ext.len() < 16 => {
                let keep = MAX_FILENAME_LEN - ext.len() - 1;
                cleaned = format!("{}.{}", &stem[..keep.min(stem.len())], ext);
            }
            _ => cleaned.truncate(MAX_FILENAME_LEN),
        }
    }
    cleaned
}

/// Resolve `requested` (a relative, `/`-separated name) under `base`.
///
/// Rejects traversal, absolute paths and disallowed extensions. Each
/// component is sanitized, and the result is verified to stay under `base`.
pub fn resolve_upload_path(base: &Path, requested: &str) -> Result<PathBuf, ValidationError> {
    const FIELD: &str = "path";

    if let Some(issue) = traversal_issue(FIELD, requested) {
        return Err(ValidationError::new(vec![issue]));
    }

    let mut resolved = base.to_path_buf();
    for part in requested.split('/') {
        resolved.push(sanitize_filename(part));
    }

    let file_name = resolved
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    if UploadKind::for_filename(&file_name).is_none() {
        return Err(ValidationError::single(
            FIELD,
            IssueKind::DisallowedExtension,
            format!("file type of '{file_name}' is not allowed"),
        ));
    }

    let relative = resolved.strip_prefix(base).map_err(|_| {
        ValidationError::single(FIELD, IssueKind::PathTraversal, "escapes the upload directory")
    })?;
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(ValidationError::single(
            FIELD,
            IssueKind::PathTraversal,
            "escapes the upload directory",
        ));
    }

    Ok(resolved)
}

/// Check an upload's extension and size against its category.
pub fn validate_upload(filename: &str, size: u64, kind: UploadKind) -> Result<(), ValidationError> {
    let mut issues = Vec::new();
    if let Some(issue) = traversal_issue("filename", filename) {
        issues.push(issue);
    }
    match extension(filename) {
        Some(ext) if kind.allowed_extensions().contains(&ext.as_str()) => {}
        _ => issues.push(FieldIssue::new(
            "filename",
            IssueKind::DisallowedExtension,
            format!("allowed: {}", kind.allowed_extensions().join(", ")),
        )),
    }
    if size > kind.max_bytes() {
        issues.push(FieldIssue::new(
            "size",
            IssueKind::TooLarge,
            format!("maximum is {} MiB", kind.max_bytes() / (1024 * 1024)),
        ));
    }
    ValidationError::from_issues(issues)
}
