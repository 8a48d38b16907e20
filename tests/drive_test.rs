//! Tests for DriveClient and ContentExtractor with mocked HTTP responses.

use chrono::{Duration, Utc};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

use classroom_study::drive::share_link;
use classroom_study::extractor::{pdf_text, ContentExtractor};
use classroom_study::models::{AttachmentRef, Material, MaterialKind, FOLDER_MIME};
use classroom_study::{AuthSession, DriveClient, StudyError};

fn client(server: &ServerGuard) -> DriveClient {
    let session = AuthSession::from_access_token("test-token", Utc::now() + Duration::hours(1));
    DriveClient::with_base_urls(session, server.url(), format!("{}/upload", server.url()))
}

mod folders {
    use super::*;

    #[tokio::test]
    async fn existing_folder_is_reused() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files")
            .match_query(Matcher::UrlEncoded(
                "q".into(),
                format!(
                    "name = 'Classroom Study Aids' and 'root' in parents and mimeType = '{}' and trashed = false",
                    FOLDER_MIME
                ),
            ))
            .with_header("content-type", "application/json")
            .with_body(json!({"files": [{"id": "fold1", "name": "Classroom Study Aids"}]}).to_string())
            .create_async()
            .await;
        let create = server.mock("POST", "/files").expect(0).create_async().await;

        let id = client(&server)
            .ensure_folder("Classroom Study Aids", "root")
            .await
            .unwrap();
        assert_eq!(id, "fold1");
        create.assert_async().await;
    }

    #[tokio::test]
    async fn missing_folder_is_created() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(json!({"files": []}).to_string())
            .create_async()
            .await;
        let create = server
            .mock("POST", "/files")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({
                "name": "Operating Systems",
                "mimeType": FOLDER_MIME,
                "parents": ["fold1"]
            })))
            .with_header("content-type", "application/json")
            .with_body(json!({"id": "fold2", "name": "Operating Systems"}).to_string())
            .create_async()
            .await;

        let id = client(&server)
            .ensure_folder("Operating Systems", "fold1")
            .await
            .unwrap();
        assert_eq!(id, "fold2");
        create.assert_async().await;
    }
}

mod uploads {
    use super::*;

    #[tokio::test]
    async fn same_named_file_is_replaced() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(json!({"files": [{"id": "old", "name": "quiz.md"}]}).to_string())
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/files/old")
            .with_status(204)
            .create_async()
            .await;
        let upload = server
            .mock("POST", "/upload/files")
            .match_query(Matcher::UrlEncoded("uploadType".into(), "multipart".into()))
            .match_body(Matcher::Regex("# OS Quiz".into()))
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "id": "new",
                    "name": "quiz.md",
                    "webViewLink": "https://drive.google.com/file/d/new/view"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let metadata = client(&server)
            .upload(b"# OS Quiz\n".to_vec(), "quiz.md", "fold1")
            .await
            .unwrap();

        assert_eq!(metadata.id, "new");
        assert_eq!(share_link(&metadata), "https://drive.google.com/file/d/new/view");
        delete.assert_async().await;
        upload.assert_async().await;
    }

    #[tokio::test]
    async fn quota_error_is_reported() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(json!({"files": []}).to_string())
            .create_async()
            .await;
        server
            .mock("POST", "/upload/files")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body(json!({"error": {"code": 403, "message": "Storage quota exceeded"}}).to_string())
            .create_async()
            .await;

        let err = client(&server)
            .upload(vec![1, 2, 3], "audio.mp3", "fold1")
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::Api { status: 403, .. }));
    }
}

mod extraction {
    use super::*;

    fn material(attachments: Vec<AttachmentRef>, description: &str) -> Material {
        Material {
            id: "m1".into(),
            course_id: "c1".into(),
            title: "Week 2".into(),
            description: description.into(),
            created_at: Utc::now(),
            kind: MaterialKind::CourseWorkMaterial,
            attachments,
            link: None,
        }
    }

    fn attachment(id: &str, mime: Option<&str>) -> AttachmentRef {
        AttachmentRef {
            file_id: id.into(),
            title: format!("{}.file", id),
            mime_type: mime.map(str::to_string),
            link: None,
        }
    }

    #[tokio::test]
    async fn google_doc_is_exported_and_text_downloaded() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files/doc1")
            .match_query(Matcher::UrlEncoded("fields".into(), "id, name, mimeType, webViewLink".into()))
            .with_header("content-type", "application/json")
            .with_body(
                json!({"id": "doc1", "name": "Notes", "mimeType": "application/vnd.google-apps.document"})
                    .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("GET", "/files/doc1/export")
            .match_query(Matcher::UrlEncoded("mimeType".into(), "text/plain".into()))
            .with_body("Virtual memory notes")
            .create_async()
            .await;
        server
            .mock("GET", "/files/txt1")
            .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
            .with_body("Page replacement")
            .create_async()
            .await;

        let drive = client(&server);
        let text = ContentExtractor::new(&drive)
            .extract(&material(
                vec![attachment("doc1", None), attachment("txt1", Some("text/plain"))],
                "",
            ))
            .await
            .unwrap();

        assert_eq!(text, "Virtual memory notes\n\nPage replacement");
    }

    /// One-page PDF drawing `text` with font `/F1`. `resources` is the page's
    /// resource dictionary.
    fn one_page_pdf(text: &str, resources: &str) -> Vec<u8> {
        let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources {} >>",
                resources
            ),
            format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_string(),
        ];

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref_at = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for offset in offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref_at
            )
            .as_bytes(),
        );
        pdf
    }

    const FONT_RESOURCES: &str = "<< /Font << /F1 5 0 R >> >>";

    async fn serve_pdf(server: &mut ServerGuard, id: &str, pdf: Vec<u8>) {
        server
            .mock("GET", format!("/files/{}", id).as_str())
            .match_query(Matcher::UrlEncoded("fields".into(), "id, name, mimeType, webViewLink".into()))
            .with_header("content-type", "application/json")
            .with_body(json!({"id": id, "name": "notes.pdf", "mimeType": "application/pdf"}).to_string())
            .create_async()
            .await;
        server
            .mock("GET", format!("/files/{}", id).as_str())
            .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
            .with_header("content-type", "application/pdf")
            .with_body(pdf)
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn pdf_attachment_is_downloaded_and_parsed() {
        let mut server = Server::new_async().await;
        serve_pdf(&mut server, "f1", one_page_pdf("Hello paging", FONT_RESOURCES)).await;
        let drive = client(&server);

        let text = ContentExtractor::new(&drive)
            .extract(&material(vec![attachment("f1", None)], ""))
            .await
            .unwrap();
        assert!(text.contains("Hello paging"), "got {:?}", text);
    }

    #[tokio::test]
    async fn pdf_parser_crash_is_extraction_error() {
        // Content uses /F1 but the page declares no fonts.
        let broken = one_page_pdf("Hello paging", "<< >>");
        let err = pdf_text(broken).await.unwrap_err();
        assert!(matches!(err, StudyError::Extraction(_)));

        let garbage = pdf_text(b"%PDF-1.4\nnot really a pdf".to_vec()).await.unwrap_err();
        assert!(matches!(garbage, StudyError::Extraction(_)));
    }

    #[tokio::test]
    async fn broken_pdf_falls_back_to_description() {
        let mut server = Server::new_async().await;
        serve_pdf(&mut server, "f1", one_page_pdf("Hello paging", "<< >>")).await;
        let drive = client(&server);

        let text = ContentExtractor::new(&drive)
            .extract(&material(vec![attachment("f1", None)], "Read chapter 9 on paging."))
            .await
            .unwrap();
        assert_eq!(text, "Week 2\n\nRead chapter 9 on paging.");
    }

    #[tokio::test]
    async fn revoked_token_aborts_extraction() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files/f1")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(json!({"error": {"code": 401, "message": "Invalid Credentials"}}).to_string())
            .create_async()
            .await;
        let drive = client(&server);

        let err = ContentExtractor::new(&drive)
            .extract(&material(vec![attachment("f1", None)], "Read chapter 9 on paging."))
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::Auth(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn unsupported_attachment_falls_back_to_description() {
        let server = Server::new_async().await;
        let drive = client(&server);

        let text = ContentExtractor::new(&drive)
            .extract(&material(
                vec![attachment("img1", Some("image/png"))],
                "Read chapter 9 on paging.",
            ))
            .await
            .unwrap();
        assert_eq!(text, "Week 2\n\nRead chapter 9 on paging.");
    }

    #[tokio::test]
    async fn nothing_usable_is_extraction_error() {
        let server = Server::new_async().await;
        let drive = client(&server);

        let err = ContentExtractor::new(&drive)
            .extract(&material(vec![attachment("img1", Some("image/png"))], " "))
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::Extraction(_)));
    }
}
