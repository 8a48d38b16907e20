//! Error types for the classroom_study crate.

use thiserror::Error;

use crate::models::ApiErrorResponse;

/// Errors that can occur while scanning Classroom and producing study aids.
#[derive(Error, Debug)]
pub enum StudyError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Failed to read credentials file: {0}")]
    CredentialsParse(String),

    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("JWT encoding error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Content extraction failed: {0}")]
    Extraction(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Document error: {0}")]
    Document(String),

    #[error("Invalid URL or ID: {0}")]
    InvalidUrlOrId(String),

    #[error("Source directory error: {0}")]
    SourceDirectory(String),

    #[error("Glob pattern error: {0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),
}

/// Coarse error category used for batch propagation decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Needs user re-consent. Aborts the command.
    Auth,
    /// Transport, quota or permission failure. Aborts the current course.
    Api,
    /// Skips one material.
    Extraction,
    /// Skips one item in batch mode, fatal for single-item commands.
    Generation,
    /// Fatal for one artifact.
    Io,
    /// Bad input or configuration. Aborts the command.
    Input,
}

impl StudyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StudyError::Auth(_)
            | StudyError::CredentialsParse(_)
            | StudyError::TokenRefresh(_)
            | StudyError::Jwt(_) => ErrorKind::Auth,
            StudyError::Http(_) | StudyError::Api { .. } => ErrorKind::Api,
            StudyError::Extraction(_) => ErrorKind::Extraction,
            StudyError::Generation(_) => ErrorKind::Generation,
            StudyError::Io(_)
            | StudyError::Json(_)
            | StudyError::Csv(_)
            | StudyError::Document(_) => ErrorKind::Io,
            StudyError::InvalidUrlOrId(_)
            | StudyError::SourceDirectory(_)
            | StudyError::GlobPattern(_)
            | StudyError::MissingConfig(_) => ErrorKind::Input,
        }
    }

    /// True when the whole command must stop rather than skip one item.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Auth | ErrorKind::Input)
    }
}

/// Result type alias for StudyError.
pub type Result<T> = std::result::Result<T, StudyError>;

/// Convert a non-success Google API response into `StudyError::Api`.
///
/// 401 means the bearer token was revoked or expired mid-run and maps to
/// `StudyError::Auth`.
pub(crate) async fn api_error(response: reqwest::Response) -> StudyError {
    let status = response.status().as_u16();
    let error_body = response.text().await.unwrap_or_default();
    let (status, message) = match serde_json::from_str::<ApiErrorResponse>(&error_body) {
        Ok(api_error) => (api_error.error.code, api_error.error.message),
        Err(_) => (status, error_body),
    };
    if status == 401 {
        return StudyError::Auth(message);
    }
    StudyError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(StudyError::Auth("declined".into()).kind(), ErrorKind::Auth);
        let api = StudyError::Api {
            status: 403,
            message: "quota".into(),
        };
        assert_eq!(api.kind(), ErrorKind::Api);
        assert_eq!(
            StudyError::Generation("bad json".into()).kind(),
            ErrorKind::Generation
        );
        assert!(StudyError::MissingConfig("GEMINI_API_KEY".into()).is_fatal());
        assert!(!StudyError::Extraction("empty".into()).is_fatal());
    }
}
