//! Turns a material's attachments into plain text for the generator.

use tracing::{debug, warn};

use crate::drive::DriveClient;
use crate::error::{Result, StudyError};
use crate::models::{AttachmentRef, Material, GOOGLE_DOC_MIME, GOOGLE_SLIDES_MIME, PDF_MIME};

/// Extracts text from Drive attachments.
pub struct ContentExtractor<'a> {
    drive: &'a DriveClient,
}

impl<'a> ContentExtractor<'a> {
    pub fn new(drive: &'a DriveClient) -> Self {
        Self { drive }
    }

    /// Text of all usable attachments, or the material's own title and
    /// description when none yields any.
    pub async fn extract(&self, material: &Material) -> Result<String> {
        let mut parts = Vec::new();

        for attachment in &material.attachments {
            match self.extract_attachment(attachment).await {
                Ok(text) if !text.trim().is_empty() => parts.push(text),
                Ok(_) => debug!(file = %attachment.title, "attachment has no text"),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(file = %attachment.title, error = %e, "skipping attachment"),
            }
        }

        if parts.is_empty() {
            return fallback_text(material);
        }
        Ok(parts.join("\n\n"))
    }

    async fn extract_attachment(&self, attachment: &AttachmentRef) -> Result<String> {
        let mime_type = match &attachment.mime_type {
            Some(m) => m.clone(),
            None => self
                .drive
                .get_file(&attachment.file_id)
                .await?
                .mime_type
                .unwrap_or_default(),
        };

        match mime_type.as_str() {
            PDF_MIME => {
                let bytes = self.drive.download(&attachment.file_id).await?;
                pdf_text(bytes).await
            }
            GOOGLE_DOC_MIME | GOOGLE_SLIDES_MIME => {
                self.drive.export_text(&attachment.file_id, "text/plain").await
            }
            m if m.starts_with("text/") => {
                let bytes = self.drive.download(&attachment.file_id).await?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            other => Err(StudyError::Extraction(format!(
                "unsupported type {:?} for {}",
                other, attachment.title
            ))),
        }
    }
}

/// Concatenated page text of a PDF.
///
/// Parsing runs on the blocking pool. The parser panics on some malformed
/// files; a panic is reported as an extraction error for this file only.
pub async fn pdf_text(bytes: Vec<u8>) -> Result<String> {
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| StudyError::Extraction(format!("PDF parser crashed: {}", e)))?
        .map_err(|e| StudyError::Extraction(e.to_string()))
}

/// Title plus description, used when a material has no readable attachment.
pub fn fallback_text(material: &Material) -> Result<String> {
    let description = material.description.trim();
    if description.is_empty() {
        return Err(StudyError::Extraction(format!(
            "no extractable content in '{}'",
            material.title
        )));
    }
    Ok(format!("{}\n\n{}", material.title.trim(), description))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MaterialKind;
    use chrono::Utc;

    fn material(description: &str) -> Material {
        Material {
            id: "m1".into(),
            course_id: "c1".into(),
            title: "Week 4: Scheduling".into(),
            description: description.into(),
            created_at: Utc::now(),
            kind: MaterialKind::CourseWorkMaterial,
            attachments: vec![],
            link: None,
        }
    }

    #[test]
    fn test_fallback_uses_title_and_description() {
        let text = fallback_text(&material("Round robin and priority scheduling.")).unwrap();
        assert!(text.starts_with("Week 4: Scheduling"));
        assert!(text.ends_with("priority scheduling."));
    }

    #[test]
    fn test_fallback_blank_description_is_extraction_error() {
        let err = fallback_text(&material("   ")).unwrap_err();
        assert!(matches!(err, StudyError::Extraction(_)));
    }
}
