//! Application configuration. Credentials paths, API keys, defaults.
//!
//! Values are layered: built-in defaults, then the optional file named by
//! `CLASSROOM_STUDY_CONFIG`, then `CLASSROOM_STUDY_*` environment variables.
//! CLI flags override all of these in `main`.

use std::path::PathBuf;

use serde::Deserialize;

/// Default change-detection window in hours.
pub const DEFAULT_SINCE_HOURS: i64 = 24;

/// Default Gemini model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Default Drive folder receiving uploaded artifacts.
pub const DEFAULT_DRIVE_FOLDER: &str = "Classroom Study Aids";

/// Input text is truncated to this many characters before prompting.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 30_000;

/// Terms that flag an announcement as project or lab-test related.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "project",
    "mini project",
    "lab test",
    "lab exam",
    "lab assessment",
    "practical",
    "viva",
    "assignment",
    "homework",
    "exercise",
    "deadline",
    "submission",
];

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// OAuth client secrets or service-account key. Read from CLASSROOM_STUDY_CREDENTIALS.
    #[serde(default)]
    pub credentials: Option<String>,

    /// Stored token file. Read from CLASSROOM_STUDY_TOKEN.
    #[serde(default)]
    pub token: Option<String>,

    /// Local directory for generated artifacts.
    #[serde(default)]
    pub output_dir: Option<String>,

    /// Processed-id ledger path. Defaults to `<output_dir>/.processed.json`.
    #[serde(default)]
    pub ledger_path: Option<String>,

    #[serde(default)]
    pub since_hours: Option<i64>,

    #[serde(default)]
    pub keywords: Option<Vec<String>>,

    // ─────────────────────────────────────────────────────────────────────────
    // AI
    // ─────────────────────────────────────────────────────────────────────────
    /// Gemini API key. Also read from the unprefixed GEMINI_API_KEY.
    #[serde(default)]
    pub gemini_api_key: Option<String>,

    #[serde(default)]
    pub gemini_model: Option<String>,

    #[serde(default)]
    pub max_input_chars: Option<usize>,

    #[serde(default)]
    pub flashcard_count: Option<usize>,

    #[serde(default)]
    pub quiz_questions: Option<usize>,

    // ─────────────────────────────────────────────────────────────────────────
    // Text-to-speech
    // ─────────────────────────────────────────────────────────────────────────
    /// Cloud Text-to-Speech key. Falls back to the Gemini key.
    #[serde(default)]
    pub tts_api_key: Option<String>,

    #[serde(default)]
    pub tts_language: Option<String>,

    #[serde(default)]
    pub tts_voice: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // Drive
    // ─────────────────────────────────────────────────────────────────────────
    #[serde(default)]
    pub drive_folder: Option<String>,

    /// Parent of the artifact folder, `root` when unset. Accepts a folder URL.
    #[serde(default)]
    pub drive_parent: Option<String>,

    /// Grant "anyone with the link" read access on uploads.
    #[serde(default)]
    pub share_with_link: Option<bool>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        if let Ok(path) = std::env::var("CLASSROOM_STUDY_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        c = c.add_source(
            config::Environment::with_prefix("CLASSROOM_STUDY")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("keywords"),
        );
        c.build()?.try_deserialize()
    }

    pub fn credentials_path(&self) -> PathBuf {
        PathBuf::from(self.credentials.as_deref().unwrap_or("credentials.json"))
    }

    pub fn token_path(&self) -> PathBuf {
        PathBuf::from(self.token.as_deref().unwrap_or("token.json"))
    }

    pub fn output_dir_or_default(&self) -> PathBuf {
        PathBuf::from(self.output_dir.as_deref().unwrap_or("./study_aids"))
    }

    /// Ledger path, placed inside `output_dir` unless configured.
    pub fn ledger_path_for(&self, output_dir: &std::path::Path) -> PathBuf {
        self.ledger_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| output_dir.join(".processed.json"))
    }

    pub fn since_hours_or_default(&self) -> i64 {
        self.since_hours.unwrap_or(DEFAULT_SINCE_HOURS)
    }

    /// Configured keywords, or the built-in list.
    pub fn keywords_or_default(&self) -> Vec<String> {
        match &self.keywords {
            Some(list) if !list.is_empty() => list.clone(),
            _ => DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // AI helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the Gemini key from config or the GEMINI_API_KEY env.
    pub fn gemini_api_key(&self) -> Option<String> {
        self.gemini_api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn gemini_model_or_default(&self) -> String {
        self.gemini_model
            .clone()
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string())
    }

    pub fn max_input_chars_or_default(&self) -> usize {
        self.max_input_chars.unwrap_or(DEFAULT_MAX_INPUT_CHARS)
    }

    pub fn flashcard_count_or_default(&self) -> usize {
        self.flashcard_count.unwrap_or(10)
    }

    pub fn quiz_questions_or_default(&self) -> usize {
        self.quiz_questions.unwrap_or(5)
    }

    pub fn tts_api_key(&self) -> Option<String> {
        self.tts_api_key.clone().or_else(|| self.gemini_api_key())
    }

    pub fn tts_language_or_default(&self) -> String {
        self.tts_language
            .clone()
            .unwrap_or_else(|| "en-US".to_string())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Drive helpers
    // ─────────────────────────────────────────────────────────────────────────

    pub fn drive_folder_or_default(&self) -> String {
        self.drive_folder
            .clone()
            .unwrap_or_else(|| DEFAULT_DRIVE_FOLDER.to_string())
    }

    pub fn drive_parent_or_default(&self) -> String {
        self.drive_parent
            .clone()
            .unwrap_or_else(|| "root".to_string())
    }

    pub fn share_with_link(&self) -> bool {
        self.share_with_link.unwrap_or(false)
    }
}
