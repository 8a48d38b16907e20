//! Tests for the artifact writers: CSV, Markdown quiz, DOCX and audio.

use std::fs;
use std::io::Read;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use mockito::{Matcher, Server};
use serde_json::json;
use tempfile::TempDir;

use classroom_study::models::{Flashcard, QuizItem};
use classroom_study::writers::document::{build_sections, collect_sources};
use classroom_study::writers::{
    generate_doc, read_flashcards, render_quiz, write_audio, write_flashcards, DocumentOptions,
    TtsClient,
};
use classroom_study::StudyError;

mod flashcards {
    use super::*;

    #[test]
    fn csv_keeps_pairs_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("paging.csv");
        let cards: Vec<Flashcard> = (1..=4)
            .map(|i| Flashcard {
                term: format!("Term {}", i),
                definition: format!("Definition {}, with a comma", i),
            })
            .collect();

        write_flashcards(&path, &cards).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("Term,Definition\n"));
        assert_eq!(read_flashcards(&path).unwrap(), cards);
    }

    #[test]
    fn wrong_header_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "Front,Back\nA,B\n").unwrap();

        assert!(matches!(read_flashcards(&path), Err(StudyError::Document(_))));
    }
}

mod quiz {
    use super::*;

    fn item(n: usize, answer_index: usize) -> QuizItem {
        QuizItem {
            question: format!("Question text {}?", n),
            choices: [
                "first".to_string(),
                "second".to_string(),
                "third".to_string(),
                "fourth".to_string(),
            ],
            answer_index,
        }
    }

    #[test]
    fn one_heading_and_key_line_per_question() {
        let items = vec![item(1, 0), item(2, 3), item(3, 1)];
        let md = render_quiz("Paging Quiz", &items);

        assert!(md.starts_with("# Paging Quiz\n\n"));
        assert_eq!(md.matches("## Question ").count(), 3);
        assert_eq!(md.matches("A) first").count(), 3);

        let key = md.split("## Answer Key\n\n").nth(1).unwrap();
        let lines: Vec<_> = key.lines().collect();
        assert_eq!(lines, vec!["1. A", "2. D", "3. B"]);
    }
}

mod document {
    use super::*;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/net")).unwrap();
        fs::create_dir_all(root.join("target/debug")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();

        fs::write(root.join("src/main.rs"), "fn main() {\n    println!(\"hi\");\n}\n").unwrap();
        fs::write(root.join("src/net/socket.py"), "import socket\n").unwrap();
        fs::write(root.join("README.md"), "# readme\n").unwrap();
        fs::write(root.join("target/debug/build.rs"), "// generated\n").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "module.exports = 1;\n").unwrap();
        dir
    }

    #[test]
    fn skips_unmatched_and_ignored_dirs() {
        let dir = project();
        let files = collect_sources(dir.path(), &DocumentOptions::default()).unwrap();
        let sections = build_sections(dir.path(), &files).unwrap();

        let headings: Vec<_> = sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings, vec!["src/main.rs", "src/net/socket.py"]);
        assert!(sections[0].content.contains("println!"));
    }

    #[test]
    fn extension_filter_is_honored() {
        let dir = project();
        let options = DocumentOptions {
            extensions: vec![".py".to_string()],
            ..Default::default()
        };
        let files = collect_sources(dir.path(), &options).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("src/net/socket.py"));
    }

    #[test]
    fn writes_a_docx_archive() {
        let dir = project();
        let out = TempDir::new().unwrap();
        let output = out.path().join("docs/project_documentation.docx");
        let options = DocumentOptions {
            title: Some("Project Documentation".to_string()),
            project_name: Some("Tiny Shell".to_string()),
            github: Some("https://github.com/student/tiny-shell".to_string()),
            extensions: Vec::new(),
        };

        let report = generate_doc(dir.path(), &output, &options).unwrap();

        assert_eq!(report.sections, 2);
        assert_eq!(report.path, output);
        let bytes = fs::read(&output).unwrap();
        assert!(bytes.starts_with(b"PK"));

        let mut archive = zip::ZipArchive::new(fs::File::open(&output).unwrap()).unwrap();
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        assert_eq!(xml.matches("w:pStyle w:val=\"Heading1\"").count(), 2);
        assert!(xml.contains("src/main.rs"));
        assert!(xml.contains("src/net/socket.py"));
        assert!(xml.contains("import socket"));
        assert!(xml.contains("Project: Tiny Shell"));
        assert!(!xml.contains("build.rs"));
    }

    #[test]
    fn missing_or_empty_source_is_error() {
        let out = TempDir::new().unwrap();
        let missing = out.path().join("nope");
        assert!(matches!(
            generate_doc(&missing, &out.path().join("a.docx"), &DocumentOptions::default()),
            Err(StudyError::SourceDirectory(_))
        ));

        let empty = TempDir::new().unwrap();
        fs::write(empty.path().join("notes.txt"), "text").unwrap();
        assert!(matches!(
            collect_sources(empty.path(), &DocumentOptions::default()),
            Err(StudyError::SourceDirectory(_))
        ));
        assert!(!out.path().join("a.docx").exists());
    }
}

mod audio {
    use super::*;

    #[tokio::test]
    async fn chunks_are_synthesized_and_joined() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/text:synthesize")
            .match_query(Matcher::UrlEncoded("key".into(), "tts-key".into()))
            .match_body(Matcher::PartialJson(json!({
                "voice": {"languageCode": "en-US"},
                "audioConfig": {"audioEncoding": "MP3"}
            })))
            .with_header("content-type", "application/json")
            .with_body(json!({"audioContent": STANDARD.encode(b"ID3")}).to_string())
            .expect(2)
            .create_async()
            .await;

        let sentence = format!("{}. ", "a".repeat(3000));
        let text = sentence.repeat(2);
        let client = TtsClient::new("tts-key", "en-US", None).with_base_url(server.url());

        let audio = client.synthesize(&text).await.unwrap();
        assert_eq!(audio, b"ID3ID3");
        mock.assert_async().await;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.mp3");
        write_audio(&path, &audio).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"ID3ID3");
    }
}
