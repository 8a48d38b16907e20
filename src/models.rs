//! Data models for Classroom and Drive API responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Google Docs MIME type.
pub const GOOGLE_DOC_MIME: &str = "application/vnd.google-apps.document";

/// Google Slides MIME type.
pub const GOOGLE_SLIDES_MIME: &str = "application/vnd.google-apps.presentation";

/// Drive folder MIME type.
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// PDF MIME type.
pub const PDF_MIME: &str = "application/pdf";

// ─────────────────────────────────────────────────────────────────────────────
// Classroom
// ─────────────────────────────────────────────────────────────────────────────

/// A Classroom course.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub course_state: Option<String>,
    #[serde(default)]
    pub alternate_link: Option<String>,
}

impl Course {
    pub fn is_active(&self) -> bool {
        self.course_state.as_deref() == Some("ACTIVE")
    }

    /// Name used in reports, falling back to the ID.
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            format!("Course {}", self.id)
        } else {
            self.name.clone()
        }
    }
}

impl std::fmt::Display for Course {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.section.as_deref().filter(|s| !s.is_empty()) {
            Some(section) => write!(f, "{}\t{} ({})", self.id, self.display_name(), section),
            None => write!(f, "{}\t{}", self.id, self.display_name()),
        }
    }
}

/// Where a material was posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialKind {
    CourseWork,
    CourseWorkMaterial,
}

/// A reference to a file attached to a material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub file_id: String,
    pub title: String,
    /// Not part of the Classroom payload; resolved through Drive when absent.
    pub mime_type: Option<String>,
    pub link: Option<String>,
}

/// A material posted to a course, either coursework or a coursework material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub kind: MaterialKind,
    pub attachments: Vec<AttachmentRef>,
    pub link: Option<String>,
}

/// A course stream announcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub id: String,
    pub course_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub link: Option<String>,
}

/// Anything selectable by the change detector.
pub trait Timestamped {
    fn item_id(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
}

impl Timestamped for Material {
    fn item_id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Timestamped for Announcement {
    fn item_id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Response from courses.list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseListResponse {
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Raw coursework or coursework-material item.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMaterial {
    pub id: String,
    pub course_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub creation_time: DateTime<Utc>,
    #[serde(default)]
    pub alternate_link: Option<String>,
    #[serde(default)]
    pub materials: Vec<RawAttachment>,
}

impl RawMaterial {
    pub fn into_material(self, kind: MaterialKind) -> Material {
        let attachments = self
            .materials
            .into_iter()
            .filter_map(|m| m.drive_file)
            .map(|shared| AttachmentRef {
                title: shared.drive_file.title.unwrap_or_default(),
                file_id: shared.drive_file.id,
                mime_type: None,
                link: shared.drive_file.alternate_link,
            })
            .collect();

        Material {
            id: self.id,
            course_id: self.course_id,
            title: self.title,
            description: self.description,
            created_at: self.creation_time,
            kind,
            attachments,
            link: self.alternate_link,
        }
    }
}

/// One entry of a material's `materials` array. Only Drive files are kept.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAttachment {
    #[serde(default)]
    pub drive_file: Option<SharedDriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedDriveFile {
    pub drive_file: DriveFileRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFileRef {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub alternate_link: Option<String>,
}

/// Response from courseWork.list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseWorkListResponse {
    #[serde(default)]
    pub course_work: Vec<RawMaterial>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Response from courseWorkMaterials.list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseWorkMaterialListResponse {
    #[serde(default)]
    pub course_work_material: Vec<RawMaterial>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAnnouncement {
    pub id: String,
    pub course_id: String,
    #[serde(default)]
    pub text: String,
    pub creation_time: DateTime<Utc>,
    #[serde(default)]
    pub update_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub alternate_link: Option<String>,
}

impl From<RawAnnouncement> for Announcement {
    fn from(raw: RawAnnouncement) -> Self {
        Announcement {
            id: raw.id,
            course_id: raw.course_id,
            text: raw.text,
            created_at: raw.creation_time,
            updated_at: raw.update_time,
            link: raw.alternate_link,
        }
    }
}

/// Response from announcements.list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementListResponse {
    #[serde(default)]
    pub announcements: Vec<RawAnnouncement>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Drive
// ─────────────────────────────────────────────────────────────────────────────

/// Metadata for a file or folder in Google Drive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub web_view_link: Option<String>,
}

/// Response from the files.list API endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Vec<FileMetadata>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Google API error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    pub message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Generated content
// ─────────────────────────────────────────────────────────────────────────────

/// One flashcard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub term: String,
    pub definition: String,
}

/// One multiple-choice question with exactly four choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizItem {
    pub question: String,
    pub choices: [String; 4],
    pub answer_index: usize,
}

/// Project ideas and practice questions derived from an announcement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub project_ideas: Vec<String>,
    pub practice_questions: Vec<String>,
}

/// Kind of artifact written for a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudyAidKind {
    Audio,
    Flashcards,
    Quiz,
}

impl StudyAidKind {
    pub fn extension(&self) -> &'static str {
        match self {
            StudyAidKind::Audio => "mp3",
            StudyAidKind::Flashcards => "csv",
            StudyAidKind::Quiz => "md",
        }
    }
}

/// Generated content for one material, held until written.
#[derive(Debug, Clone)]
pub enum StudyAidContent {
    Audio(Vec<u8>),
    Flashcards(Vec<Flashcard>),
    Quiz(Vec<QuizItem>),
}

#[derive(Debug, Clone)]
pub struct StudyAid {
    pub kind: StudyAidKind,
    pub source_material_id: String,
    pub content: StudyAidContent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_course_deserialize() {
        let json = r#"{
            "id": "123",
            "name": "Operating Systems",
            "section": "B",
            "courseState": "ACTIVE"
        }"#;

        let course: Course = serde_json::from_str(json).unwrap();
        assert_eq!(course.id, "123");
        assert!(course.is_active());
        assert!(format!("{}", course).contains("Operating Systems (B)"));
    }

    #[test]
    fn test_raw_material_keeps_drive_files_only() {
        let json = r#"{
            "id": "m1",
            "courseId": "c1",
            "title": "Week 3 slides",
            "creationTime": "2026-10-16T08:00:00.000Z",
            "materials": [
                {"driveFile": {"driveFile": {"id": "f1", "title": "week3.pdf"}, "shareMode": "VIEW"}},
                {"link": {"url": "https://example.com"}},
                {"youtubeVideo": {"id": "yt"}}
            ]
        }"#;

        let raw: RawMaterial = serde_json::from_str(json).unwrap();
        let material = raw.into_material(MaterialKind::CourseWorkMaterial);
        assert_eq!(material.attachments.len(), 1);
        assert_eq!(material.attachments[0].file_id, "f1");
        assert_eq!(material.attachments[0].title, "week3.pdf");
        assert!(material.attachments[0].mime_type.is_none());
    }

    #[test]
    fn test_announcement_from_raw() {
        let json = r#"{
            "id": "a1",
            "courseId": "c1",
            "text": "Lab test on Friday",
            "creationTime": "2026-10-16T08:00:00Z",
            "updateTime": "2026-10-16T09:00:00Z"
        }"#;
        let raw: RawAnnouncement = serde_json::from_str(json).unwrap();
        let ann = Announcement::from(raw);
        assert_eq!(ann.text, "Lab test on Friday");
        assert!(ann.updated_at.unwrap() > ann.created_at);
    }
}
