//! Spoken summaries through the Google Cloud Text-to-Speech REST API.
//!
//! `text:synthesize` accepts at most 5000 bytes of input, so longer scripts
//! are split at sentence boundaries and the returned MP3 segments are
//! concatenated in order.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{api_error, Result, StudyError};

const TTS_API_BASE: &str = "https://texttospeech.googleapis.com/v1";

/// Largest input sent in one synthesize call.
pub const MAX_CHUNK_BYTES: usize = 4500;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

/// Text-to-speech client producing MP3 audio.
pub struct TtsClient {
    http: Client,
    api_key: String,
    language_code: String,
    voice: Option<String>,
    base_url: String,
}

impl TtsClient {
    pub fn new(api_key: impl Into<String>, language_code: impl Into<String>, voice: Option<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            language_code: language_code.into(),
            voice,
            base_url: TTS_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Synthesize `text` as one MP3 byte stream.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let chunks = split_into_chunks(text, MAX_CHUNK_BYTES);
        if chunks.is_empty() {
            return Err(StudyError::Generation("nothing to narrate".to_string()));
        }

        let mut audio = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            debug!(chunk = i + 1, of = chunks.len(), bytes = chunk.len(), "synthesizing");
            audio.extend(self.synthesize_chunk(chunk).await?);
        }
        Ok(audio)
    }

    async fn synthesize_chunk(&self, text: &str) -> Result<Vec<u8>> {
        let request = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &self.language_code,
                name: self.voice.as_deref(),
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
            },
        };

        let response = self
            .http
            .post(format!("{}/text:synthesize", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            // Keyed endpoint: a 401 is a bad key, not a lost session.
            return Err(match api_error(response).await {
                StudyError::Auth(message) => StudyError::Api { status: 401, message },
                other => other,
            });
        }

        let body: SynthesizeResponse = response.json().await?;
        STANDARD
            .decode(body.audio_content)
            .map_err(|e| StudyError::Generation(format!("invalid audio content: {}", e)))
    }
}

pub fn write_audio<P: AsRef<Path>>(path: P, audio: &[u8]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, audio)?;
    Ok(())
}

/// Group sentences into chunks of at most `max_bytes`.
///
/// A sentence longer than `max_bytes` is cut at the last whitespace that fits,
/// or at a char boundary when there is none.
pub fn split_into_chunks(text: &str, max_bytes: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in sentences(text) {
        for piece in split_long(sentence, max_bytes) {
            if !current.is_empty() && current.len() + 1 + piece.len() > max_bytes {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(piece);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let at_break = matches!(c, '.' | '!' | '?')
            && chars.peek().map_or(true, |&(_, next)| next.is_whitespace());
        if at_break {
            let end = i + c.len_utf8();
            out.push(text[start..end].trim());
            start = end;
        }
    }
    out.push(text[start..].trim());
    out.retain(|s| !s.is_empty());
    out
}

fn split_long(sentence: &str, max_bytes: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = sentence;

    while rest.len() > max_bytes {
        let mut cut = max_bytes;
        while cut > 0 && !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if let Some(ws) = rest[..cut].rfind(char::is_whitespace).filter(|&ws| ws > 0) {
            cut = ws;
        }
        if cut == 0 {
            break;
        }
        pieces.push(rest[..cut].trim());
        rest = rest[cut..].trim_start();
    }

    if !rest.is_empty() {
        pieces.push(rest);
    }
    pieces.retain(|p| !p.is_empty());
    pieces
}
