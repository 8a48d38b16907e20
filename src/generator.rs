//! Study-aid generation: prompt building, one model call, strict decoding.
//!
//! Every kind asks the model for a single JSON object. Replies are decoded
//! into typed values and validated; anything that does not fit is a
//! [`StudyError::Generation`]. No partial results are kept.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::DEFAULT_MAX_INPUT_CHARS;
use crate::error::{Result, StudyError};
use crate::models::{AnalysisResult, Announcement, Flashcard, QuizItem};

/// A text-in, text-out generative model.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Send `prompt` and return the raw reply text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// What to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationKind {
    Summary,
    Flashcards,
    Quiz,
    ProjectIdeas,
    PracticeQuestions,
    /// Project ideas and practice questions in one call.
    Analysis,
}

impl GenerationKind {
    fn default_count(&self) -> usize {
        match self {
            GenerationKind::Summary => 0,
            GenerationKind::Flashcards => 10,
            GenerationKind::Quiz => 5,
            GenerationKind::ProjectIdeas | GenerationKind::PracticeQuestions => 5,
            GenerationKind::Analysis => 3,
        }
    }
}

impl std::fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GenerationKind::Summary => "summary",
            GenerationKind::Flashcards => "flashcards",
            GenerationKind::Quiz => "quiz",
            GenerationKind::ProjectIdeas => "project_ideas",
            GenerationKind::PracticeQuestions => "practice_questions",
            GenerationKind::Analysis => "analysis",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub course_name: Option<String>,
    /// Items to ask for. `None` uses the kind's default.
    pub count: Option<usize>,
    pub max_input_chars: usize,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            course_name: None,
            count: None,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }
}

impl GenerationOptions {
    pub fn for_course(course_name: impl Into<String>) -> Self {
        Self {
            course_name: Some(course_name.into()),
            ..Default::default()
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }
}

/// Decoded model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generated {
    Summary(String),
    Flashcards(Vec<Flashcard>),
    Quiz(Vec<QuizItem>),
    ProjectIdeas(Vec<String>),
    PracticeQuestions(Vec<String>),
    Analysis(AnalysisResult),
}

/// Generates study aids through a [`TextModel`].
pub struct Generator<M> {
    model: M,
}

impl<M: TextModel> Generator<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    /// One model call for `kind` over `text`.
    pub async fn generate(&self, kind: GenerationKind, text: &str, options: &GenerationOptions) -> Result<Generated> {
        let prompt = build_prompt(kind, text, options);
        debug!(%kind, prompt_chars = prompt.chars().count(), "calling model");
        let reply = self.model.complete(&prompt).await?;
        decode(kind, &reply)
    }

    pub async fn summary(&self, text: &str, options: &GenerationOptions) -> Result<String> {
        match self.generate(GenerationKind::Summary, text, options).await? {
            Generated::Summary(s) => Ok(s),
            other => Err(unexpected(GenerationKind::Summary, &other)),
        }
    }

    pub async fn flashcards(&self, text: &str, options: &GenerationOptions) -> Result<Vec<Flashcard>> {
        match self.generate(GenerationKind::Flashcards, text, options).await? {
            Generated::Flashcards(cards) => Ok(cards),
            other => Err(unexpected(GenerationKind::Flashcards, &other)),
        }
    }

    pub async fn quiz(&self, text: &str, options: &GenerationOptions) -> Result<Vec<QuizItem>> {
        match self.generate(GenerationKind::Quiz, text, options).await? {
            Generated::Quiz(items) => Ok(items),
            other => Err(unexpected(GenerationKind::Quiz, &other)),
        }
    }

    /// Project ideas and practice questions from one call. Both lists may be
    /// empty when the text has nothing project-like in it.
    pub async fn analyze(&self, text: &str, options: &GenerationOptions) -> Result<AnalysisResult> {
        match self.generate(GenerationKind::Analysis, text, options).await? {
            Generated::Analysis(result) => Ok(result),
            other => Err(unexpected(GenerationKind::Analysis, &other)),
        }
    }

    /// One summary over a course's announcements.
    pub async fn summarize_announcements(
        &self,
        course_name: &str,
        announcements: &[Announcement],
        options: &GenerationOptions,
    ) -> Result<String> {
        if announcements.is_empty() {
            return Ok("No recent announcements to summarize.".to_string());
        }
        let options = GenerationOptions {
            course_name: Some(course_name.to_string()),
            ..options.clone()
        };
        self.summary(&compile_announcements(announcements), &options)
            .await
    }
}

fn unexpected(kind: GenerationKind, got: &Generated) -> StudyError {
    StudyError::Generation(format!("expected {} output, got {:?}", kind, got))
}

/// `[YYYY-MM-DD HH:MM] text` per announcement, in the given order.
pub fn compile_announcements(announcements: &[Announcement]) -> String {
    announcements
        .iter()
        .map(|a| {
            let at = a.updated_at.unwrap_or(a.created_at);
            let text = match a.text.trim() {
                "" => "No content.",
                t => t,
            };
            format!("[{}] {}", at.format("%Y-%m-%d %H:%M"), text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Longest prefix of `text` with at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Build the prompt for `kind`.
pub fn build_prompt(kind: GenerationKind, text: &str, options: &GenerationOptions) -> String {
    let count = options.count.unwrap_or_else(|| kind.default_count());
    let course = options
        .course_name
        .as_deref()
        .map(|name| format!("Course: {}\n\n", name))
        .unwrap_or_default();

    let task = match kind {
        GenerationKind::Summary => r#"Write a concise, student-friendly summary of the material below.
Cover the main topics, any deadlines or key facts, and instructions students must follow.
Use plain sentences suitable for reading aloud. Do not use markdown.

Respond with JSON only: {"summary": "..."}"#
            .to_string(),
        GenerationKind::Flashcards => format!(
            r#"Create {} flashcards that capture the key terms and concepts in the material below.
Each definition must be one or two sentences.

Respond with JSON only: {{"flashcards": [{{"term": "...", "definition": "..."}}]}}"#,
            count
        ),
        GenerationKind::Quiz => format!(
            r#"Write {} multiple-choice questions that test understanding of the material below.
Every question has exactly 4 choices and one correct answer.
answer_index is the 0-based index of the correct choice.

Respond with JSON only: {{"questions": [{{"question": "...", "choices": ["...", "...", "...", "..."], "answer_index": 0}}]}}"#,
            count
        ),
        GenerationKind::ProjectIdeas => format!(
            r#"Suggest {} practical project ideas a student could build based on the text below.
Each idea is one sentence naming what to build and the skills it exercises.

Respond with JSON only: {{"project_ideas": ["..."]}}"#,
            count
        ),
        GenerationKind::PracticeQuestions => format!(
            r#"Write {} practice questions a student could use to prepare for what the text below describes.

Respond with JSON only: {{"practice_questions": ["..."]}}"#,
            count
        ),
        GenerationKind::Analysis => format!(
            r#"Read the course announcement below. If it mentions a project, lab test, practical, viva or assignment,
suggest up to {count} project ideas and up to {count} practice questions that would help a student prepare.
If nothing in it calls for preparation, return empty lists.

Respond with JSON only: {{"project_ideas": ["..."], "practice_questions": ["..."]}}"#
        ),
    };

    format!(
        "You are a study assistant for university students.\n\n{}{}\n\n---\n{}\n---\n",
        course,
        task,
        truncate_chars(text, options.max_input_chars)
    )
}

/// Strip markdown fences or surrounding prose from a JSON reply.
pub fn sanitize_json(raw: &str) -> &str {
    let trimmed = raw.trim();

    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        let body = match rest.rfind("```") {
            Some(end) => &rest[..end],
            None => rest,
        };
        return body.trim();
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

#[derive(Deserialize)]
struct SummaryReply {
    summary: String,
}

#[derive(Deserialize)]
struct FlashcardReply {
    flashcards: Vec<Flashcard>,
}

#[derive(Deserialize)]
struct QuizReply {
    questions: Vec<QuizItem>,
}

#[derive(Deserialize)]
struct ProjectIdeasReply {
    project_ideas: Vec<String>,
}

#[derive(Deserialize)]
struct PracticeQuestionsReply {
    practice_questions: Vec<String>,
}

fn parse<T: serde::de::DeserializeOwned>(kind: GenerationKind, raw: &str) -> Result<T> {
    serde_json::from_str(sanitize_json(raw))
        .map_err(|e| StudyError::Generation(format!("{} reply is not valid JSON: {}", kind, e)))
}

fn invalid(kind: GenerationKind, reason: &str) -> StudyError {
    StudyError::Generation(format!("{} reply rejected: {}", kind, reason))
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn check_strings(kind: GenerationKind, items: &[String], allow_empty: bool) -> Result<()> {
    if items.is_empty() && !allow_empty {
        return Err(invalid(kind, "empty list"));
    }
    if items.iter().any(|s| is_blank(s)) {
        return Err(invalid(kind, "blank entry"));
    }
    Ok(())
}

/// Decode and validate a raw reply for `kind`.
pub fn decode(kind: GenerationKind, raw: &str) -> Result<Generated> {
    match kind {
        GenerationKind::Summary => {
            let reply: SummaryReply = parse(kind, raw)?;
            if is_blank(&reply.summary) {
                return Err(invalid(kind, "blank summary"));
            }
            Ok(Generated::Summary(reply.summary.trim().to_string()))
        }
        GenerationKind::Flashcards => {
            let reply: FlashcardReply = parse(kind, raw)?;
            if reply.flashcards.is_empty() {
                return Err(invalid(kind, "no flashcards"));
            }
            if reply
                .flashcards
                .iter()
                .any(|c| is_blank(&c.term) || is_blank(&c.definition))
            {
                return Err(invalid(kind, "blank term or definition"));
            }
            Ok(Generated::Flashcards(reply.flashcards))
        }
        GenerationKind::Quiz => {
            let reply: QuizReply = parse(kind, raw)?;
            if reply.questions.is_empty() {
                return Err(invalid(kind, "no questions"));
            }
            for item in &reply.questions {
                if is_blank(&item.question) || item.choices.iter().any(|c| is_blank(c)) {
                    return Err(invalid(kind, "blank question or choice"));
                }
                if item.answer_index > 3 {
                    return Err(invalid(kind, "answer_index out of range"));
                }
            }
            Ok(Generated::Quiz(reply.questions))
        }
        GenerationKind::ProjectIdeas => {
            let reply: ProjectIdeasReply = parse(kind, raw)?;
            check_strings(kind, &reply.project_ideas, false)?;
            Ok(Generated::ProjectIdeas(reply.project_ideas))
        }
        GenerationKind::PracticeQuestions => {
            let reply: PracticeQuestionsReply = parse(kind, raw)?;
            check_strings(kind, &reply.practice_questions, false)?;
            Ok(Generated::PracticeQuestions(reply.practice_questions))
        }
        GenerationKind::Analysis => {
            let reply: AnalysisResult = parse(kind, raw)?;
            check_strings(kind, &reply.project_ideas, true)?;
            check_strings(kind, &reply.practice_questions, true)?;
            Ok(Generated::Analysis(reply))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_json_fences() {
        assert_eq!(sanitize_json("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(sanitize_json("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(sanitize_json("Sure! {\"a\": 1} Hope that helps."), "{\"a\": 1}");
        assert_eq!(sanitize_json("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_prompt_embeds_course_and_truncated_text() {
        let options = GenerationOptions::for_course("Compilers")
            .with_count(7)
            .with_max_input_chars(5);
        let prompt = build_prompt(GenerationKind::Flashcards, "abcdefghij", &options);
        assert!(prompt.contains("Course: Compilers"));
        assert!(prompt.contains("Create 7 flashcards"));
        assert!(prompt.contains("---\nabcde\n---"));
        assert!(!prompt.contains("abcdef"));
    }

    #[test]
    fn test_decode_quiz_rejects_three_choices() {
        let raw = r#"{"questions": [{"question": "Q", "choices": ["a", "b", "c"], "answer_index": 0}]}"#;
        assert!(matches!(
            decode(GenerationKind::Quiz, raw),
            Err(StudyError::Generation(_))
        ));
    }

    #[test]
    fn test_decode_quiz_rejects_out_of_range_answer() {
        let raw = r#"{"questions": [{"question": "Q", "choices": ["a", "b", "c", "d"], "answer_index": 4}]}"#;
        assert!(decode(GenerationKind::Quiz, raw).is_err());
    }

    #[test]
    fn test_decode_analysis_allows_empty_lists() {
        let raw = r#"{"project_ideas": [], "practice_questions": []}"#;
        assert_eq!(
            decode(GenerationKind::Analysis, raw).unwrap(),
            Generated::Analysis(AnalysisResult::default())
        );
        assert!(decode(GenerationKind::ProjectIdeas, r#"{"project_ideas": []}"#).is_err());
    }

    #[test]
    fn test_decode_flashcards_rejects_blank_definition() {
        let raw = r#"{"flashcards": [{"term": "Mutex", "definition": "  "}]}"#;
        assert!(decode(GenerationKind::Flashcards, raw).is_err());
    }

    #[test]
    fn test_compile_announcements_format() {
        use chrono::{TimeZone, Utc};
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 9, 5, 0).unwrap();
        let anns = vec![Announcement {
            id: "a1".into(),
            course_id: "c1".into(),
            text: "  ".into(),
            created_at: at,
            updated_at: None,
            link: None,
        }];
        assert_eq!(compile_announcements(&anns), "[2026-10-16 09:05] No content.");
    }
}
