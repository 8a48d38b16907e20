//! Batch pipelines behind the `detect-*`, `list-materials` and
//! `summarize-announcements` commands.
//!
//! Courses are scanned one after another. A failed course scan is recorded
//! in its [`CourseReport`] and the batch moves on; a failed item is recorded
//! in its outcome and the course moves on. Only fatal errors (auth, bad
//! input) abort the whole run.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::classroom::ClassroomClient;
use crate::detector::KeywordFilter;
use crate::drive::{share_link, DriveClient};
use crate::error::{Result, StudyError};
use crate::extractor::ContentExtractor;
use crate::generator::{GenerationOptions, Generator, TextModel};
use crate::ledger::ProcessedLedger;
use crate::models::{
    AnalysisResult, Announcement, Course, Material, StudyAid, StudyAidContent, StudyAidKind,
};
use crate::writers::{self, artifact_path, slugify, TtsClient};

/// Which courses a command covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseScope {
    One(String),
    All,
}

/// Resolve `scope` to courses sorted by name, then ID.
pub async fn resolve_courses(classroom: &ClassroomClient, scope: &CourseScope) -> Result<Vec<Course>> {
    let mut courses = match scope {
        CourseScope::One(id) => vec![classroom.get_course(id).await?],
        CourseScope::All => classroom.list_courses().await?,
    };
    sort_courses(&mut courses);
    Ok(courses)
}

pub fn sort_courses(courses: &mut [Course]) {
    courses.sort_by(|a, b| {
        a.display_name()
            .to_lowercase()
            .cmp(&b.display_name().to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Result of scanning one course.
#[derive(Debug)]
pub struct CourseReport<T> {
    pub course: Course,
    pub items: Vec<T>,
    /// Set when the scan itself failed.
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct ScanReport<T> {
    pub courses: Vec<CourseReport<T>>,
}

impl<T> ScanReport<T> {
    /// True when no course was scanned or at least one scan succeeded.
    pub fn any_succeeded(&self) -> bool {
        self.courses.is_empty() || self.courses.iter().any(|c| c.error.is_none())
    }

    pub fn item_count(&self) -> usize {
        self.courses.iter().map(|c| c.items.len()).sum()
    }
}

fn course_failed<T>(course: &Course, err: StudyError) -> Result<CourseReport<T>> {
    if err.is_fatal() {
        return Err(err);
    }
    warn!(course = %course.display_name(), error = %err, "course scan failed");
    Ok(CourseReport {
        course: course.clone(),
        items: Vec::new(),
        error: Some(err.to_string()),
    })
}

/// New materials per course, without generating anything.
pub async fn list_new_materials(
    classroom: &ClassroomClient,
    courses: &[Course],
    since: DateTime<Utc>,
) -> Result<ScanReport<Material>> {
    let mut reports = Vec::with_capacity(courses.len());
    for course in courses {
        let report = match classroom.list_materials(&course.id, since).await {
            Ok(items) => CourseReport {
                course: course.clone(),
                items,
                error: None,
            },
            Err(e) => course_failed(course, e)?,
        };
        reports.push(report);
    }
    Ok(ScanReport { courses: reports })
}

// ─────────────────────────────────────────────────────────────────────────────
// Materials
// ─────────────────────────────────────────────────────────────────────────────

/// Knobs for `detect-materials`.
#[derive(Debug, Clone)]
pub struct StudyAidSettings {
    pub output_dir: PathBuf,
    pub upload: bool,
    pub audio: bool,
    pub drive_folder: String,
    pub drive_parent: String,
    pub share_with_link: bool,
    pub flashcard_count: usize,
    pub quiz_questions: usize,
    pub max_input_chars: usize,
}

/// A study aid written to disk and, optionally, uploaded.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: StudyAidKind,
    pub path: PathBuf,
    pub link: Option<String>,
}

/// A failed step while processing one material.
#[derive(Debug, Clone)]
pub struct AidError {
    /// The aid being generated, written or uploaded; `None` when extraction
    /// failed before any aid was attempted.
    pub kind: Option<StudyAidKind>,
    pub message: String,
}

impl AidError {
    fn new(kind: Option<StudyAidKind>, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for AidError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            Some(kind) => write!(f, "{:?}: {}", kind, self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug)]
pub struct MaterialOutcome {
    pub material: Material,
    /// Already in the ledger; nothing was done.
    pub skipped: bool,
    pub artifacts: Vec<Artifact>,
    pub errors: Vec<AidError>,
}

impl MaterialOutcome {
    fn new(material: Material) -> Self {
        Self {
            material,
            skipped: false,
            artifacts: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        !self.skipped && self.errors.is_empty()
    }

    /// Whether the material can be recorded as processed. Audio is optional:
    /// a failed narration alone does not bring the material back next run.
    pub fn is_recordable(&self) -> bool {
        !self.skipped
            && self
                .errors
                .iter()
                .all(|e| e.kind == Some(StudyAidKind::Audio))
    }
}

/// Collaborators for the materials pipeline.
pub struct MaterialPipeline<'a, M> {
    pub classroom: &'a ClassroomClient,
    pub drive: &'a DriveClient,
    pub generator: &'a Generator<M>,
    pub tts: Option<&'a TtsClient>,
    pub settings: StudyAidSettings,
}

impl<M: TextModel> MaterialPipeline<'_, M> {
    /// Scan `courses` for materials created at or after `since` and produce
    /// audio, flashcards and a quiz for each one.
    pub async fn run(
        &self,
        courses: &[Course],
        since: DateTime<Utc>,
        mut ledger: Option<&mut ProcessedLedger>,
    ) -> Result<ScanReport<MaterialOutcome>> {
        let mut reports = Vec::with_capacity(courses.len());
        let mut root_folder: Option<String> = None;

        for course in courses {
            let materials = match self.classroom.list_materials(&course.id, since).await {
                Ok(m) => m,
                Err(e) => {
                    reports.push(course_failed(course, e)?);
                    continue;
                }
            };
            info!(course = %course.display_name(), count = materials.len(), "new materials");

            let mut course_folder: Option<String> = None;
            let mut items = Vec::with_capacity(materials.len());

            for material in materials {
                let key = ProcessedLedger::material_key(&course.id, &material.id);
                if ledger.as_deref().is_some_and(|l| l.contains(&key)) {
                    let mut outcome = MaterialOutcome::new(material);
                    outcome.skipped = true;
                    items.push(outcome);
                    continue;
                }

                let outcome = self
                    .process(course, material, &mut root_folder, &mut course_folder)
                    .await?;

                if outcome.is_recordable() {
                    if !outcome.errors.is_empty() {
                        warn!(material = %outcome.material.title, "recorded without audio");
                    }
                    if let Some(l) = ledger.as_deref_mut() {
                        if let Err(e) = l.insert(key).await {
                            warn!(error = %e, "failed to update ledger");
                        }
                    }
                }
                items.push(outcome);
            }

            reports.push(CourseReport {
                course: course.clone(),
                items,
                error: None,
            });
        }

        Ok(ScanReport { courses: reports })
    }

    /// Errors are collected on the outcome; only fatal ones propagate.
    async fn process(
        &self,
        course: &Course,
        material: Material,
        root_folder: &mut Option<String>,
        course_folder: &mut Option<String>,
    ) -> Result<MaterialOutcome> {
        let text = match ContentExtractor::new(self.drive).extract(&material).await {
            Ok(text) => text,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(material = %material.title, error = %e, "no study aids");
                let mut outcome = MaterialOutcome::new(material);
                outcome.errors.push(AidError::new(None, e.to_string()));
                return Ok(outcome);
            }
        };

        let options = GenerationOptions::for_course(course.display_name())
            .with_max_input_chars(self.settings.max_input_chars);
        let course_dir = self.settings.output_dir.join(slugify(&course.display_name()));

        let mut aids = Vec::new();
        let mut errors = Vec::new();
        for kind in self.kinds() {
            match self.generate(kind, &text, &material, &options).await {
                Ok(aid) => aids.push(aid),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(material = %material.title, ?kind, error = %e, "generation failed");
                    errors.push(AidError::new(Some(kind), e.to_string()));
                }
            }
        }

        let mut artifacts = Vec::new();
        for aid in aids {
            let path = artifact_path(&course_dir, &material.title, &aid);
            if let Err(e) = write_aid(&path, &material, &aid) {
                errors.push(AidError::new(Some(aid.kind), e.to_string()));
                continue;
            }

            let link = if self.settings.upload {
                match self.upload(course, &path, root_folder, course_folder).await {
                    Ok(link) => Some(link),
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        errors.push(AidError::new(
                            Some(aid.kind),
                            format!("upload {}: {}", path.display(), e),
                        ));
                        None
                    }
                }
            } else {
                None
            };

            artifacts.push(Artifact {
                kind: aid.kind,
                path,
                link,
            });
        }

        Ok(MaterialOutcome {
            material,
            skipped: false,
            artifacts,
            errors,
        })
    }

    fn kinds(&self) -> Vec<StudyAidKind> {
        let mut kinds = Vec::with_capacity(3);
        if self.settings.audio && self.tts.is_some() {
            kinds.push(StudyAidKind::Audio);
        }
        kinds.push(StudyAidKind::Flashcards);
        kinds.push(StudyAidKind::Quiz);
        kinds
    }

    async fn generate(
        &self,
        kind: StudyAidKind,
        text: &str,
        material: &Material,
        options: &GenerationOptions,
    ) -> Result<StudyAid> {
        let content = match kind {
            StudyAidKind::Audio => {
                let tts = self
                    .tts
                    .ok_or_else(|| StudyError::MissingConfig("text-to-speech API key".to_string()))?;
                let script = self.generator.summary(text, options).await?;
                StudyAidContent::Audio(tts.synthesize(&script).await?)
            }
            StudyAidKind::Flashcards => {
                let options = options.clone().with_count(self.settings.flashcard_count);
                StudyAidContent::Flashcards(self.generator.flashcards(text, &options).await?)
            }
            StudyAidKind::Quiz => {
                let options = options.clone().with_count(self.settings.quiz_questions);
                StudyAidContent::Quiz(self.generator.quiz(text, &options).await?)
            }
        };

        Ok(StudyAid {
            kind,
            source_material_id: material.id.clone(),
            content,
        })
    }

    async fn upload(
        &self,
        course: &Course,
        path: &std::path::Path,
        root_folder: &mut Option<String>,
        course_folder: &mut Option<String>,
    ) -> Result<String> {
        let root = match root_folder.as_ref() {
            Some(id) => id.clone(),
            None => {
                let id = self
                    .drive
                    .ensure_folder(&self.settings.drive_folder, &self.settings.drive_parent)
                    .await?;
                *root_folder = Some(id.clone());
                id
            }
        };
        let folder = match course_folder.as_ref() {
            Some(id) => id.clone(),
            None => {
                let id = self.drive.ensure_folder(&course.display_name(), &root).await?;
                *course_folder = Some(id.clone());
                id
            }
        };

        let metadata = self.drive.upload_path(path, &folder).await?;
        if self.settings.share_with_link {
            self.drive.share_with_link(&metadata.id).await?;
        }
        Ok(share_link(&metadata))
    }
}

fn write_aid(path: &std::path::Path, material: &Material, aid: &StudyAid) -> Result<()> {
    match &aid.content {
        StudyAidContent::Audio(bytes) => writers::write_audio(path, bytes),
        StudyAidContent::Flashcards(cards) => writers::write_flashcards(path, cards),
        StudyAidContent::Quiz(items) => {
            writers::write_quiz(path, &format!("{} Quiz", material.title.trim()), items)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Announcements
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct AnnouncementOutcome {
    pub announcement: Announcement,
    pub matched: Vec<String>,
    pub skipped: bool,
    pub analysis: Option<AnalysisResult>,
    pub error: Option<String>,
}

/// Keyword-matching announcements with project ideas and practice questions.
pub async fn detect_announcements<M: TextModel>(
    classroom: &ClassroomClient,
    generator: &Generator<M>,
    courses: &[Course],
    since: DateTime<Utc>,
    filter: &KeywordFilter,
    options: &GenerationOptions,
    mut ledger: Option<&mut ProcessedLedger>,
) -> Result<ScanReport<AnnouncementOutcome>> {
    let mut reports = Vec::with_capacity(courses.len());

    for course in courses {
        let announcements = match classroom.list_announcements(&course.id, since).await {
            Ok(a) => a,
            Err(e) => {
                reports.push(course_failed(course, e)?);
                continue;
            }
        };

        let options = GenerationOptions {
            course_name: Some(course.display_name()),
            ..options.clone()
        };
        let mut items = Vec::new();

        for announcement in announcements {
            let matched: Vec<String> = filter
                .matches(&announcement.text)
                .into_iter()
                .map(str::to_string)
                .collect();
            if matched.is_empty() {
                continue;
            }

            let key = ProcessedLedger::announcement_key(&course.id, &announcement.id);
            if ledger.as_deref().is_some_and(|l| l.contains(&key)) {
                items.push(AnnouncementOutcome {
                    announcement,
                    matched,
                    skipped: true,
                    analysis: None,
                    error: None,
                });
                continue;
            }

            let (analysis, error) = match generator.analyze(&announcement.text, &options).await {
                Ok(result) => (Some(result), None),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(announcement = %announcement.id, error = %e, "analysis failed");
                    (None, Some(e.to_string()))
                }
            };

            if analysis.is_some() {
                if let Some(l) = ledger.as_deref_mut() {
                    if let Err(e) = l.insert(key).await {
                        warn!(error = %e, "failed to update ledger");
                    }
                }
            }

            items.push(AnnouncementOutcome {
                announcement,
                matched,
                skipped: false,
                analysis,
                error,
            });
        }

        info!(course = %course.display_name(), matched = items.len(), "announcements scanned");
        reports.push(CourseReport {
            course: course.clone(),
            items,
            error: None,
        });
    }

    Ok(ScanReport { courses: reports })
}

/// Announcements of one course plus their summary.
#[derive(Debug)]
pub struct CourseDigest {
    pub announcements: Vec<Announcement>,
    pub summary: Option<String>,
    pub summary_error: Option<String>,
}

/// Up to `max` most recent announcements per course, each course summarized
/// in one model call when `generator` is given.
pub async fn summarize_announcements<M: TextModel>(
    classroom: &ClassroomClient,
    generator: Option<&Generator<M>>,
    courses: &[Course],
    since: Option<DateTime<Utc>>,
    max: usize,
    options: &GenerationOptions,
) -> Result<ScanReport<CourseDigest>> {
    let since = since.unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut reports = Vec::with_capacity(courses.len());

    for course in courses {
        let announcements = match classroom.recent_announcements(&course.id, since, max).await {
            Ok(a) => a,
            Err(e) => {
                reports.push(course_failed(course, e)?);
                continue;
            }
        };

        let (summary, summary_error) = match generator {
            Some(generator) => {
                match generator
                    .summarize_announcements(&course.display_name(), &announcements, options)
                    .await
                {
                    Ok(s) => (Some(s), None),
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => (None, Some(e.to_string())),
                }
            }
            None => (None, None),
        };

        reports.push(CourseReport {
            course: course.clone(),
            items: vec![CourseDigest {
                announcements,
                summary,
                summary_error,
            }],
            error: None,
        });
    }

    Ok(ScanReport { courses: reports })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(id: &str, name: &str) -> Course {
        Course {
            id: id.into(),
            name: name.into(),
            section: None,
            course_state: Some("ACTIVE".into()),
            alternate_link: None,
        }
    }

    #[test]
    fn test_sort_courses_by_name_then_id() {
        let mut courses = vec![
            course("3", "networks"),
            course("2", "Algorithms"),
            course("1", "Networks"),
        ];
        sort_courses(&mut courses);
        let ids: Vec<_> = courses.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1", "3"]);
    }

    #[test]
    fn test_any_succeeded() {
        let report: ScanReport<Material> = ScanReport {
            courses: vec![
                CourseReport {
                    course: course("1", "A"),
                    items: vec![],
                    error: Some("403".into()),
                },
                CourseReport {
                    course: course("2", "B"),
                    items: vec![],
                    error: None,
                },
            ],
        };
        assert!(report.any_succeeded());
        assert!(ScanReport::<Material> { courses: vec![] }.any_succeeded());
    }
}
