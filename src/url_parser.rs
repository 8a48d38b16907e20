//! Extracts Drive folder/file IDs and Classroom course IDs from URLs.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use regex::Regex;
use std::sync::LazyLock;

use crate::error::{Result, StudyError};

static FOLDER_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://drive\.google\.com/drive/(?:u/\d+/)?folders/([a-zA-Z0-9_-]+)")
        .expect("Invalid folder URL regex")
});

static FILE_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:drive|docs)\.google\.com/(?:file|document|presentation)/d/([a-zA-Z0-9_-]+)")
        .expect("Invalid file URL regex")
});

static OPEN_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://drive\.google\.com/open\?id=([a-zA-Z0-9_-]+)")
        .expect("Invalid open URL regex")
});

/// Classroom course URLs carry the course ID base64-encoded.
static CLASSROOM_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://classroom\.google\.com/(?:u/\d+/)?(?:c|w|r)/([A-Za-z0-9_=+-]+?)(?:/|\?|$)")
        .expect("Invalid classroom URL regex")
});

static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("Invalid ID regex"));

static NUMERIC_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("Invalid numeric ID regex"));

/// Extract a Google Drive ID from a URL or validate a raw ID.
///
/// Supports the following URL formats:
/// - `https://drive.google.com/drive/folders/<ID>`
/// - `https://drive.google.com/drive/u/0/folders/<ID>`
/// - `https://drive.google.com/file/d/<ID>/view`
/// - `https://docs.google.com/document/d/<ID>/edit`
/// - `https://drive.google.com/open?id=<ID>`
/// - Raw ID string
///
/// # Examples
///
/// ```
/// use classroom_study::url_parser::extract_id;
///
/// let id = extract_id("https://drive.google.com/drive/folders/1abc123").unwrap();
/// assert_eq!(id, "1abc123");
///
/// let id = extract_id("root").unwrap();
/// assert_eq!(id, "root");
/// ```
pub fn extract_id(url_or_id: &str) -> Result<String> {
    let trimmed = url_or_id.trim();

    for regex in [&*FOLDER_URL_REGEX, &*FILE_URL_REGEX, &*OPEN_URL_REGEX] {
        if let Some(id) = regex.captures(trimmed).and_then(|c| c.get(1)) {
            return Ok(id.as_str().to_string());
        }
    }

    if !trimmed.is_empty() && ID_REGEX.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    Err(StudyError::InvalidUrlOrId(url_or_id.to_string()))
}

/// Extract a Classroom course ID from a course URL or a raw numeric ID.
///
/// ```
/// use classroom_study::url_parser::extract_course_id;
///
/// // "NjI1MDAwMDAwMDAx" is base64 for "625000000001"
/// let id = extract_course_id("https://classroom.google.com/c/NjI1MDAwMDAwMDAx").unwrap();
/// assert_eq!(id, "625000000001");
/// ```
pub fn extract_course_id(url_or_id: &str) -> Result<String> {
    let trimmed = url_or_id.trim();

    if NUMERIC_ID_REGEX.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    if let Some(token) = CLASSROOM_URL_REGEX.captures(trimmed).and_then(|c| c.get(1)) {
        let token = token.as_str().trim_end_matches('=');
        let decoded = STANDARD_NO_PAD
            .decode(token)
            .or_else(|_| URL_SAFE_NO_PAD.decode(token))
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok());

        if let Some(id) = decoded.filter(|id| NUMERIC_ID_REGEX.is_match(id)) {
            return Ok(id);
        }
    }

    // Aliases such as "d:..." or "p:..." are accepted by the API as-is
    if !trimmed.is_empty() && !trimmed.contains('/') && !trimmed.contains(char::is_whitespace) {
        return Ok(trimmed.to_string());
    }

    Err(StudyError::InvalidUrlOrId(url_or_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_folder_url() {
        let url = "https://drive.google.com/drive/u/2/folders/1abc123XYZ";
        assert_eq!(extract_id(url).unwrap(), "1abc123XYZ");
    }

    #[test]
    fn test_extract_docs_url() {
        let url = "https://docs.google.com/document/d/1docID_x/edit";
        assert_eq!(extract_id(url).unwrap(), "1docID_x");
    }

    #[test]
    fn test_invalid_drive_id() {
        assert!(extract_id("https://example.com/folder/123").is_err());
        assert!(extract_id("   ").is_err());
    }

    #[test]
    fn test_course_id_numeric() {
        assert_eq!(extract_course_id(" 625000000001 ").unwrap(), "625000000001");
    }

    #[test]
    fn test_course_id_from_url_with_suffix() {
        let url = "https://classroom.google.com/u/0/c/NjI1MDAwMDAwMDAx/a/details";
        assert_eq!(extract_course_id(url).unwrap(), "625000000001");
    }

    #[test]
    fn test_course_id_rejects_garbage() {
        assert!(extract_course_id("").is_err());
        assert!(extract_course_id("https://example.com/c/abc").is_err());
    }
}
