//! Source-code documentation as a single DOCX file.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::Local;
use docx_rs::{Docx, Paragraph, Run, RunFonts, Style, StyleType};
use glob::{glob, Pattern};
use tracing::{debug, info};

use crate::error::{Result, StudyError};

/// Directories never descended into.
pub const SKIP_DIRS: &[&str] = &[".git", "target", "node_modules", "__pycache__", ".venv", "venv"];

pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "rs", "py", "java", "c", "cpp", "h", "hpp", "js", "ts", "go", "kt", "cs", "sql", "html", "css",
];

const CODE_FONT: &str = "Courier New";

#[derive(Debug, Clone, Default)]
pub struct DocumentOptions {
    pub title: Option<String>,
    pub project_name: Option<String>,
    pub github: Option<String>,
    /// Extensions without the leading dot. Empty means [`DEFAULT_EXTENSIONS`].
    pub extensions: Vec<String>,
}

impl DocumentOptions {
    fn extensions(&self) -> Vec<String> {
        let list: Vec<String> = self
            .extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        if list.is_empty() {
            DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
        } else {
            list
        }
    }

    fn has_metadata(&self) -> bool {
        self.title.is_some() || self.project_name.is_some() || self.github.is_some()
    }
}

/// One source file rendered as a heading plus code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Path relative to the source root, `/`-separated.
    pub heading: String,
    pub content: String,
}

#[derive(Debug)]
pub struct DocumentReport {
    pub path: PathBuf,
    pub sections: usize,
}

/// Matching files under `source`, sorted, skipping [`SKIP_DIRS`].
pub fn collect_sources(source: &Path, options: &DocumentOptions) -> Result<Vec<PathBuf>> {
    if !source.is_dir() {
        return Err(StudyError::SourceDirectory(format!(
            "{} does not exist or is not a directory",
            source.display()
        )));
    }

    let extensions = options.extensions();
    let pattern = format!(
        "{}/**/*",
        Pattern::escape(&source.to_string_lossy()).trim_end_matches('/')
    );

    let mut files: Vec<PathBuf> = glob(&pattern)?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .filter(|path| !in_skipped_dir(source, path))
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| extensions.contains(&e.to_lowercase()))
        })
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(StudyError::SourceDirectory(format!(
            "no files with extensions [{}] under {}",
            extensions.join(", "),
            source.display()
        )));
    }

    debug!(count = files.len(), "collected source files");
    Ok(files)
}

fn in_skipped_dir(source: &Path, path: &Path) -> bool {
    path.strip_prefix(source)
        .unwrap_or(path)
        .parent()
        .into_iter()
        .flat_map(|p| p.components())
        .any(|c| SKIP_DIRS.iter().any(|skip| c.as_os_str() == *skip))
}

/// Read each file into a [`Section`]. Content is decoded lossily.
pub fn build_sections(source: &Path, files: &[PathBuf]) -> Result<Vec<Section>> {
    files
        .iter()
        .map(|path| -> Result<Section> {
            let relative = path.strip_prefix(source).unwrap_or(path);
            let heading = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let bytes = std::fs::read(path)?;
            Ok(Section {
                heading,
                content: String::from_utf8_lossy(&bytes).into_owned(),
            })
        })
        .collect()
}

fn heading(text: &str, style: &str) -> Paragraph {
    Paragraph::new()
        .add_run(Run::new().add_text(text))
        .style(style)
}

fn code_line(line: &str) -> Paragraph {
    Paragraph::new().add_run(
        Run::new()
            .add_text(line.trim_end_matches('\r'))
            .fonts(RunFonts::new().ascii(CODE_FONT).hi_ansi(CODE_FONT))
            .size(18),
    )
}

/// Assemble the document in memory.
pub fn render_docx(sections: &[Section], options: &DocumentOptions) -> Docx {
    let mut docx = Docx::new()
        .add_style(Style::new("Title", StyleType::Paragraph).name("Title").size(48).bold())
        .add_style(Style::new("Heading1", StyleType::Paragraph).name("Heading 1").size(32).bold())
        .add_style(Style::new("Heading2", StyleType::Paragraph).name("Heading 2").size(26).bold());

    if options.has_metadata() {
        if let Some(title) = &options.title {
            docx = docx.add_paragraph(heading(title, "Title"));
        }
        if let Some(project) = &options.project_name {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(format!("Project: {}", project))));
        }
        if let Some(github) = &options.github {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(format!("GitHub: {}", github))));
        }
        docx = docx.add_paragraph(Paragraph::new().add_run(
            Run::new().add_text(format!("Generated: {}", Local::now().format("%Y-%m-%d"))),
        ));
    }

    for section in sections {
        docx = docx.add_paragraph(heading(&section.heading, "Heading1"));
        for line in section.content.lines() {
            docx = docx.add_paragraph(code_line(line));
        }
    }
    docx
}

/// Walk `source`, render matching files and write `output`.
pub fn generate_doc(source: &Path, output: &Path, options: &DocumentOptions) -> Result<DocumentReport> {
    let files = collect_sources(source, options)?;
    let sections = build_sections(source, &files)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(output)?;
    render_docx(&sections, options)
        .build()
        .pack(file)
        .map_err(|e| StudyError::Document(e.to_string()))?;

    info!(path = %output.display(), sections = sections.len(), "document written");
    Ok(DocumentReport {
        path: output.to_path_buf(),
        sections: sections.len(),
    })
}
