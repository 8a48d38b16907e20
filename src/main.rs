//! classroom-study CLI - Study aids from Google Classroom.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use classroom_study::auth::CLASSROOM_SCOPES;
use classroom_study::detector::{cutoff, KeywordFilter};
use classroom_study::workflow::{
    self, CourseScope, MaterialPipeline, ScanReport, StudyAidSettings,
};
use classroom_study::writers::{generate_doc, DocumentOptions, TtsClient};
use classroom_study::{
    extract_course_id, extract_id, AppConfig, Authenticator, ClassroomClient, DriveClient,
    GeminiClient, GenerationOptions, Generator, ProcessedLedger, StudyError,
};

/// Turn new Google Classroom materials and announcements into study aids.
#[derive(Parser)]
#[command(name = "classroom-study")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// OAuth client secrets or service-account key file.
    #[arg(long, global = true, env = "CLASSROOM_STUDY_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Stored OAuth token file.
    #[arg(long, global = true, env = "CLASSROOM_STUDY_TOKEN")]
    token: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Exactly one of `--course-id` or `--all-courses`.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct CourseArgs {
    /// Course ID or classroom.google.com course URL.
    #[arg(long)]
    course_id: Option<String>,

    /// Every active course.
    #[arg(long)]
    all_courses: bool,
}

impl CourseArgs {
    fn scope(&self) -> Result<CourseScope> {
        match &self.course_id {
            Some(id) => Ok(CourseScope::One(
                extract_course_id(id).with_context(|| format!("Invalid course URL or ID: {}", id))?,
            )),
            None => Ok(CourseScope::All),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the OAuth consent flow and store the token.
    Auth,

    /// List active courses.
    ListCourses,

    /// List materials posted within the window without generating anything.
    ListMaterials {
        #[command(flatten)]
        scope: CourseArgs,

        /// Look-back window in hours.
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
        since: Option<i64>,
    },

    /// Generate audio, flashcards and a quiz for each new material.
    DetectMaterials {
        #[command(flatten)]
        scope: CourseArgs,

        /// Look-back window in hours.
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
        since: Option<i64>,

        /// Local directory for generated files.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Keep artifacts local.
        #[arg(long)]
        no_upload: bool,

        /// Re-process materials seen in earlier runs.
        #[arg(long)]
        no_ledger: bool,

        /// Skip the narrated summary.
        #[arg(long)]
        no_audio: bool,
    },

    /// Find announcements mentioning projects or assessments and suggest preparation.
    DetectAnnouncements {
        #[command(flatten)]
        scope: CourseArgs,

        /// Look-back window in hours.
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
        since: Option<i64>,

        /// Comma-separated keywords, replacing the configured list.
        #[arg(long, value_delimiter = ',')]
        keywords: Option<Vec<String>>,

        /// Re-analyze announcements seen in earlier runs.
        #[arg(long)]
        no_ledger: bool,
    },

    /// Print recent announcements with one summary per course.
    SummarizeAnnouncements {
        #[command(flatten)]
        scope: CourseArgs,

        /// Look-back window in hours. All announcements when omitted.
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
        since: Option<i64>,

        /// Most recent announcements per course.
        #[arg(long, default_value_t = 10)]
        max: usize,

        /// Print announcements only.
        #[arg(long)]
        no_summary: bool,
    },

    /// Suggest project ideas and practice questions for a piece of text.
    AnalyzeAnnouncement {
        /// Announcement text.
        text: String,

        #[arg(long)]
        course_name: Option<String>,
    },

    /// Write the source files of a project into one DOCX document.
    GenerateDoc {
        #[arg(long, default_value = ".")]
        source: PathBuf,

        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        #[arg(long, default_value = "project_documentation.docx")]
        filename: String,

        #[arg(long, default_value = "Project Documentation")]
        title: String,

        /// Comma-separated extensions, e.g. `rs,py,java`.
        #[arg(long, value_delimiter = ',')]
        extensions: Vec<String>,

        #[arg(long)]
        project_name: Option<String>,

        /// Repository URL.
        #[arg(long)]
        github: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let cfg = AppConfig::load().context("Failed to load configuration")?;
    let credentials = cli.credentials.unwrap_or_else(|| cfg.credentials_path());
    let token = cli.token.unwrap_or_else(|| cfg.token_path());

    match cli.command {
        Commands::Auth => {
            let auth = authenticator(&credentials, &token)?;
            let session = auth
                .session(CLASSROOM_SCOPES)
                .await
                .context("Authentication failed")?;
            println!(
                "Authenticated. Token saved to {:?} (expires {}).",
                token,
                session.expires_at().format("%Y-%m-%d %H:%M UTC")
            );
        }

        Commands::ListCourses => {
            let classroom = ClassroomClient::new(session(&credentials, &token).await?);
            let mut courses = classroom
                .list_courses()
                .await
                .context("Failed to list courses")?;
            workflow::sort_courses(&mut courses);

            if courses.is_empty() {
                println!("No active courses found.");
            } else {
                println!("{:<16} {}", "ID", "NAME");
                println!("{}", "-".repeat(60));
                for course in courses {
                    println!("{}", course);
                }
            }
        }

        Commands::ListMaterials { scope, since } => {
            let classroom = ClassroomClient::new(session(&credentials, &token).await?);
            let courses = courses(&classroom, &scope).await?;
            let since = cutoff(Utc::now(), since.unwrap_or_else(|| cfg.since_hours_or_default()));

            let report = workflow::list_new_materials(&classroom, &courses, since).await?;
            for course_report in &report.courses {
                println!("\n{}", course_report.course.display_name());
                if let Some(err) = &course_report.error {
                    println!("  scan failed: {}", err);
                    continue;
                }
                if course_report.items.is_empty() {
                    println!("  no new materials");
                }
                for m in &course_report.items {
                    println!(
                        "  {}  {}  ({} attachment(s))",
                        m.created_at.format("%Y-%m-%d %H:%M"),
                        m.title,
                        m.attachments.len()
                    );
                }
            }
            return Ok(exit_code(&report));
        }

        Commands::DetectMaterials {
            scope,
            since,
            output_dir,
            no_upload,
            no_ledger,
            no_audio,
        } => {
            let generator = generator(&cfg)?;
            let session = session(&credentials, &token).await?;
            let classroom = ClassroomClient::new(session.clone());
            let drive = DriveClient::new(session);
            let courses = courses(&classroom, &scope).await?;

            let output_dir = output_dir.unwrap_or_else(|| cfg.output_dir_or_default());
            let tts = match cfg.tts_api_key() {
                Some(key) if !no_audio => Some(TtsClient::new(
                    key,
                    cfg.tts_language_or_default(),
                    cfg.tts_voice.clone(),
                )),
                None if !no_audio => {
                    warn!("no text-to-speech key configured, skipping audio");
                    None
                }
                _ => None,
            };
            let drive_parent = extract_id(&cfg.drive_parent_or_default())
                .context("Invalid drive_parent setting")?;

            let pipeline = MaterialPipeline {
                classroom: &classroom,
                drive: &drive,
                generator: &generator,
                tts: tts.as_ref(),
                settings: StudyAidSettings {
                    output_dir: output_dir.clone(),
                    upload: !no_upload,
                    audio: !no_audio,
                    drive_folder: cfg.drive_folder_or_default(),
                    drive_parent,
                    share_with_link: cfg.share_with_link(),
                    flashcard_count: cfg.flashcard_count_or_default(),
                    quiz_questions: cfg.quiz_questions_or_default(),
                    max_input_chars: cfg.max_input_chars_or_default(),
                },
            };

            let mut ledger = if no_ledger {
                None
            } else {
                Some(ProcessedLedger::load(cfg.ledger_path_for(&output_dir)).await)
            };
            let since = cutoff(Utc::now(), since.unwrap_or_else(|| cfg.since_hours_or_default()));
            info!(courses = courses.len(), %since, "scanning for new materials");

            let report = pipeline.run(&courses, since, ledger.as_mut()).await?;
            print_materials(&report);
            return Ok(exit_code(&report));
        }

        Commands::DetectAnnouncements {
            scope,
            since,
            keywords,
            no_ledger,
        } => {
            let generator = generator(&cfg)?;
            let classroom = ClassroomClient::new(session(&credentials, &token).await?);
            let courses = courses(&classroom, &scope).await?;

            let keywords = keywords.unwrap_or_else(|| cfg.keywords_or_default());
            let filter = KeywordFilter::new(&keywords);
            if filter.is_empty() {
                anyhow::bail!("No keywords to match");
            }

            let mut ledger = if no_ledger {
                None
            } else {
                Some(ProcessedLedger::load(cfg.ledger_path_for(&cfg.output_dir_or_default())).await)
            };
            let since = cutoff(Utc::now(), since.unwrap_or_else(|| cfg.since_hours_or_default()));
            let options = GenerationOptions::default().with_max_input_chars(cfg.max_input_chars_or_default());

            let report = workflow::detect_announcements(
                &classroom,
                &generator,
                &courses,
                since,
                &filter,
                &options,
                ledger.as_mut(),
            )
            .await?;

            for course_report in &report.courses {
                println!("\n=== {} ===", course_report.course.display_name());
                if let Some(err) = &course_report.error {
                    println!("scan failed: {}", err);
                    continue;
                }
                if course_report.items.is_empty() {
                    println!("No matching announcements.");
                }
                for outcome in &course_report.items {
                    let a = &outcome.announcement;
                    println!(
                        "\n[{}] matched: {}",
                        a.created_at.format("%Y-%m-%d %H:%M"),
                        outcome.matched.join(", ")
                    );
                    println!("{}", a.text.trim());
                    if outcome.skipped {
                        println!("(already analyzed)");
                    }
                    if let Some(err) = &outcome.error {
                        println!("analysis failed: {}", err);
                    }
                    if let Some(analysis) = &outcome.analysis {
                        print_analysis(analysis);
                    }
                }
            }
            return Ok(exit_code(&report));
        }

        Commands::SummarizeAnnouncements {
            scope,
            since,
            max,
            no_summary,
        } => {
            let generator = if no_summary { None } else { Some(generator(&cfg)?) };
            let classroom = ClassroomClient::new(session(&credentials, &token).await?);
            let courses = courses(&classroom, &scope).await?;
            let since = since.map(|hours| cutoff(Utc::now(), hours));
            let options = GenerationOptions::default().with_max_input_chars(cfg.max_input_chars_or_default());

            let report = workflow::summarize_announcements(
                &classroom,
                generator.as_ref(),
                &courses,
                since,
                max,
                &options,
            )
            .await?;

            for course_report in &report.courses {
                println!("\n=== {} ===", course_report.course.display_name());
                if let Some(err) = &course_report.error {
                    println!("scan failed: {}", err);
                    continue;
                }
                for digest in &course_report.items {
                    if digest.announcements.is_empty() {
                        println!("No announcements.");
                    }
                    for a in &digest.announcements {
                        let at = a.updated_at.unwrap_or(a.created_at);
                        println!("\n[{}]\n{}", at.format("%Y-%m-%d %H:%M"), a.text.trim());
                    }
                    if let Some(summary) = &digest.summary {
                        println!("\n--- Summary ---\n{}", summary);
                    }
                    if let Some(err) = &digest.summary_error {
                        println!("\nSummary failed: {}", err);
                    }
                }
            }
            return Ok(exit_code(&report));
        }

        Commands::AnalyzeAnnouncement { text, course_name } => {
            let generator = generator(&cfg)?;
            let options = GenerationOptions {
                course_name,
                ..GenerationOptions::default()
            }
            .with_max_input_chars(cfg.max_input_chars_or_default());

            let analysis = generator
                .analyze(&text, &options)
                .await
                .context("Analysis failed")?;
            print_analysis(&analysis);
        }

        Commands::GenerateDoc {
            source,
            output_dir,
            filename,
            title,
            extensions,
            project_name,
            github,
        } => {
            let options = DocumentOptions {
                title: Some(title),
                project_name,
                github,
                extensions,
            };
            let output = output_dir.join(&filename);
            let report = generate_doc(&source, &output, &options)
                .with_context(|| format!("Failed to document {:?}", source))?;
            println!(
                "Wrote {} section(s) to {:?}",
                report.sections, report.path
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn authenticator(credentials: &Path, token: &Path) -> Result<Authenticator> {
    Authenticator::from_files(credentials, token)
        .with_context(|| format!("Failed to load credentials from {:?}", credentials))
}

async fn session(credentials: &Path, token: &Path) -> Result<classroom_study::AuthSession> {
    authenticator(credentials, token)?
        .session(CLASSROOM_SCOPES)
        .await
        .context("Authentication failed")
}

async fn courses(classroom: &ClassroomClient, args: &CourseArgs) -> Result<Vec<classroom_study::models::Course>> {
    let scope = args.scope()?;
    workflow::resolve_courses(classroom, &scope)
        .await
        .context("Failed to load courses")
}

fn generator(cfg: &AppConfig) -> Result<Generator<GeminiClient>> {
    let key = cfg
        .gemini_api_key()
        .ok_or_else(|| StudyError::MissingConfig("GEMINI_API_KEY is not set".to_string()))?;
    let client = GeminiClient::new(key, cfg.gemini_model_or_default());
    debug!(model = client.model(), "text model");
    Ok(Generator::new(client))
}

fn exit_code<T>(report: &ScanReport<T>) -> ExitCode {
    if report.any_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_materials(report: &ScanReport<workflow::MaterialOutcome>) {
    for course_report in &report.courses {
        println!("\n=== {} ===", course_report.course.display_name());
        if let Some(err) = &course_report.error {
            println!("scan failed: {}", err);
            continue;
        }
        if course_report.items.is_empty() {
            println!("No new materials.");
        }
        for outcome in &course_report.items {
            let m = &outcome.material;
            let status = if outcome.skipped {
                "SKIPPED (already processed)"
            } else if outcome.succeeded() {
                "OK"
            } else if outcome.is_recordable() {
                "OK (no audio)"
            } else if outcome.artifacts.is_empty() {
                "FAILED"
            } else {
                "PARTIAL"
            };
            println!(
                "\n[{}] {} - {}",
                m.created_at.format("%Y-%m-%d %H:%M"),
                m.title,
                status
            );
            for artifact in &outcome.artifacts {
                match &artifact.link {
                    Some(link) => println!("  {:?} {} -> {}", artifact.kind, artifact.path.display(), link),
                    None => println!("  {:?} {}", artifact.kind, artifact.path.display()),
                }
            }
            for err in &outcome.errors {
                println!("  error: {}", err);
            }
        }
    }
    println!("\n{} material(s) scanned.", report.item_count());
}

fn print_analysis(analysis: &classroom_study::models::AnalysisResult) {
    println!("\nProject ideas:");
    if analysis.project_ideas.is_empty() {
        println!("  (none)");
    }
    for (i, idea) in analysis.project_ideas.iter().enumerate() {
        println!("  {}. {}", i + 1, idea);
    }

    println!("\nPractice questions:");
    if analysis.practice_questions.is_empty() {
        println!("  (none)");
    }
    for (i, q) in analysis.practice_questions.iter().enumerate() {
        println!("  {}. {}", i + 1, q);
    }
}
