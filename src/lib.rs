//! classroom_study - Turn new Google Classroom posts into study aids.
//!
//! This library provides functionality to:
//! - Authenticate against Google with a stored, refreshable OAuth token
//! - Detect materials and announcements posted within a time window
//! - Extract text from Drive attachments (PDF, Docs, Slides, plain text)
//! - Generate summaries, flashcards, quizzes and project ideas with Gemini
//! - Write MP3, CSV, Markdown and DOCX artifacts and upload them to Drive
//!
//! # Example
//!
//! ```no_run
//! use classroom_study::auth::CLASSROOM_SCOPES;
//! use classroom_study::detector::cutoff;
//! use classroom_study::{Authenticator, ClassroomClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let auth = Authenticator::from_files("credentials.json", "token.json")?;
//!     let session = auth.session(CLASSROOM_SCOPES).await?;
//!     let classroom = ClassroomClient::new(session);
//!
//!     let since = cutoff(chrono::Utc::now(), 24);
//!     for course in classroom.list_courses().await? {
//!         for material in classroom.list_materials(&course.id, since).await? {
//!             println!("{}: {}", course.display_name(), material.title);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod classroom;
pub mod config;
pub mod detector;
pub mod drive;
pub mod error;
pub mod extractor;
pub mod gemini;
pub mod generator;
pub mod ledger;
pub mod models;
pub mod url_parser;
pub mod workflow;
pub mod writers;

// Re-exports for convenience
pub use auth::{AuthSession, Authenticator};
pub use classroom::ClassroomClient;
pub use config::AppConfig;
pub use drive::DriveClient;
pub use error::{ErrorKind, Result, StudyError};
pub use gemini::GeminiClient;
pub use generator::{GenerationKind, GenerationOptions, Generator, TextModel};
pub use ledger::ProcessedLedger;
pub use url_parser::{extract_course_id, extract_id};
