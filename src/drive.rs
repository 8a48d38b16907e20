//! Google Drive API client: artifact uploads and attachment downloads.

use std::path::Path;

use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, info};

use crate::auth::AuthSession;
use crate::error::{api_error, Result, StudyError};
use crate::models::{FileListResponse, FileMetadata, FOLDER_MIME};

/// Base URL for Google Drive API v3.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Upload URL for Google Drive API.
const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

const FILE_FIELDS: &str = "id, name, mimeType, webViewLink";

/// Client for uploading artifacts to and reading attachments from Drive.
pub struct DriveClient {
    session: AuthSession,
    http: Client,
    api_base: String,
    upload_base: String,
}

impl DriveClient {
    pub fn new(session: AuthSession) -> Self {
        Self::with_base_urls(session, DRIVE_API_BASE, UPLOAD_API_BASE)
    }

    /// Point the client at other endpoints (used by tests).
    pub fn with_base_urls(session: AuthSession, api_base: impl Into<String>, upload_base: impl Into<String>) -> Self {
        Self {
            session,
            http: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            upload_base: upload_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Query files using Google Drive query syntax.
    pub async fn query_files(&self, query: &str) -> Result<Vec<FileMetadata>> {
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;
        let fields = format!("nextPageToken, files({})", FILE_FIELDS);

        loop {
            let mut request = self
                .http
                .get(format!("{}/files", self.api_base))
                .bearer_auth(self.session.access_token())
                .query(&[("q", query), ("spaces", "drive"), ("fields", fields.as_str())]);

            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(api_error(response).await);
            }

            let list_response: FileListResponse = response.json().await?;
            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_files)
    }

    /// Find a file by name in a folder.
    pub async fn find_file(&self, name: &str, parent_id: &str) -> Result<Option<FileMetadata>> {
        let query = format!(
            "name = '{}' and '{}' in parents and trashed = false",
            escape_query(name),
            parent_id
        );
        let files = self.query_files(&query).await?;
        Ok(files.into_iter().last())
    }

    /// Return the ID of folder `name` under `parent_id`, creating it if absent.
    pub async fn ensure_folder(&self, name: &str, parent_id: &str) -> Result<String> {
        let query = format!(
            "name = '{}' and '{}' in parents and mimeType = '{}' and trashed = false",
            escape_query(name),
            parent_id,
            FOLDER_MIME
        );
        if let Some(existing) = self.query_files(&query).await?.into_iter().next() {
            debug!(folder = name, id = %existing.id, "using existing folder");
            return Ok(existing.id);
        }

        let metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME,
            "parents": [parent_id]
        });

        let response = self
            .http
            .post(format!("{}/files", self.api_base))
            .bearer_auth(self.session.access_token())
            .query(&[("fields", FILE_FIELDS)])
            .json(&metadata)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let folder: FileMetadata = response.json().await?;
        info!(folder = name, id = %folder.id, "created Drive folder");
        Ok(folder.id)
    }

    /// Get file metadata by ID.
    pub async fn get_file(&self, file_id: &str) -> Result<FileMetadata> {
        let response = self
            .http
            .get(format!("{}/files/{}", self.api_base, file_id))
            .bearer_auth(self.session.access_token())
            .query(&[("fields", FILE_FIELDS)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.json().await?)
    }

    /// Delete a file by ID. A missing file is not an error.
    pub async fn delete_file(&self, file_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/files/{}", self.api_base, file_id))
            .bearer_auth(self.session.access_token())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() && status.as_u16() != 404 {
            return Err(api_error(response).await);
        }

        Ok(())
    }

    /// Upload a local file into `folder_id`.
    pub async fn upload_path<P: AsRef<Path>>(&self, local_path: P, folder_id: &str) -> Result<FileMetadata> {
        let local_path = local_path.as_ref();
        let filename = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StudyError::InvalidUrlOrId(local_path.display().to_string()))?;
        let bytes = tokio::fs::read(local_path).await?;
        self.upload(bytes, filename, folder_id).await
    }

    /// Upload `bytes` as `name` into `folder_id`.
    ///
    /// A file with the same name in the folder is replaced. Use [`share_link`]
    /// on the result for a browser URL.
    pub async fn upload(&self, bytes: Vec<u8>, name: &str, folder_id: &str) -> Result<FileMetadata> {
        if let Some(existing) = self.find_file(name, folder_id).await? {
            self.delete_file(&existing.id).await?;
        }

        let mime_type = mime_guess::from_path(name).first_or_octet_stream().to_string();
        let metadata = serde_json::json!({
            "name": name,
            "parents": [folder_id]
        });

        let metadata_part = Part::text(metadata.to_string()).mime_str("application/json")?;
        let file_part = Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str(&mime_type)?;

        let form = Form::new()
            .part("metadata", metadata_part)
            .part("file", file_part);

        let response = self
            .http
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(self.session.access_token())
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let metadata: FileMetadata = response.json().await?;
        info!(name, id = %metadata.id, "uploaded artifact");
        Ok(metadata)
    }

    /// Let anyone with the link read the file.
    pub async fn share_with_link(&self, file_id: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/files/{}/permissions", self.api_base, file_id))
            .bearer_auth(self.session.access_token())
            .json(&serde_json::json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(())
    }

    /// Download a file's content into memory.
    pub async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(format!("{}/files/{}", self.api_base, file_id))
            .bearer_auth(self.session.access_token())
            .query(&[("alt", "media")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let mut content = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            content.extend_from_slice(&chunk?);
        }

        Ok(content)
    }

    /// Export a Google Workspace file (Docs, Slides) to `mime_type`.
    pub async fn export_text(&self, file_id: &str, mime_type: &str) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/files/{}/export", self.api_base, file_id))
            .bearer_auth(self.session.access_token())
            .query(&[("mimeType", mime_type)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.text().await?)
    }
}

/// `webViewLink` when Drive returned one, otherwise the canonical file URL.
pub fn share_link(metadata: &FileMetadata) -> String {
    metadata
        .web_view_link
        .clone()
        .unwrap_or_else(|| format!("https://drive.google.com/file/d/{}/view", metadata.id))
}

/// Escape a literal for Drive's query language.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_query() {
        assert_eq!(escape_query("Ann's notes"), "Ann\\'s notes");
        assert_eq!(escape_query(r"a\b"), r"a\\b");
    }

    #[test]
    fn test_share_link_fallback() {
        let metadata = FileMetadata {
            id: "abc".to_string(),
            name: "quiz.md".to_string(),
            mime_type: None,
            web_view_link: None,
        };
        assert_eq!(share_link(&metadata), "https://drive.google.com/file/d/abc/view");
    }
}
