//! Artifact writers: flashcards (CSV), quizzes (Markdown), narration (MP3)
//! and source-code documents (DOCX).

pub mod audio;
pub mod document;
pub mod flashcards;
pub mod quiz;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::models::StudyAid;

pub use audio::{split_into_chunks, write_audio, TtsClient};
pub use document::{generate_doc, DocumentOptions, DocumentReport};
pub use flashcards::{read_flashcards, write_flashcards};
pub use quiz::{render_quiz, write_quiz};

static NON_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("Invalid slug regex"));

const MAX_SLUG_CHARS: usize = 60;

/// Lowercase, `_`-separated file-name stem.
pub fn slugify(text: &str) -> String {
    let lower = text.to_lowercase();
    let slug = NON_SLUG.replace_all(&lower, "_");
    let slug: String = slug.trim_matches('_').chars().take(MAX_SLUG_CHARS).collect();
    let slug = slug.trim_end_matches('_');
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug.to_string()
    }
}

/// `<dir>/<title-slug>_<material-id>.<ext>`
pub fn artifact_path(dir: &Path, title: &str, aid: &StudyAid) -> PathBuf {
    dir.join(format!(
        "{}_{}.{}",
        slugify(title),
        aid.source_material_id,
        aid.kind.extension()
    ))
}
