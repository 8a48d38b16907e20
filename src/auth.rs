//! OAuth authentication for Google APIs.
//!
//! Two credential shapes are accepted: desktop/web OAuth client secrets, which
//! go through the browser consent flow, and service-account keys, which are
//! exchanged with a signed JWT. Either way the resulting token is persisted to
//! the token file and handed out as an immutable [`AuthSession`].

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::error::{Result, StudyError};

/// Google OAuth2 token endpoint.
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Google OAuth2 consent endpoint.
const AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// Tokens expiring within this window are treated as expired.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Scopes needed by the Classroom and Drive commands.
pub const CLASSROOM_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/classroom.courses.readonly",
    "https://www.googleapis.com/auth/classroom.coursework.me.readonly",
    "https://www.googleapis.com/auth/classroom.courseworkmaterials.readonly",
    "https://www.googleapis.com/auth/classroom.announcements.readonly",
    "https://www.googleapis.com/auth/drive.readonly",
    "https://www.googleapis.com/auth/drive.file",
];

/// OAuth client secrets as downloaded from the Cloud Console.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

/// Service account credentials from JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountCredentials {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

/// The user-supplied credentials file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Credentials {
    Installed { installed: OAuthClientSecrets },
    Web { web: OAuthClientSecrets },
    ServiceAccount(ServiceAccountCredentials),
}

impl Credentials {
    fn token_uri(&self) -> &str {
        let uri = match self {
            Credentials::Installed { installed: c } | Credentials::Web { web: c } => {
                c.token_uri.as_deref()
            }
            Credentials::ServiceAccount(sa) => sa.token_uri.as_deref(),
        };
        uri.unwrap_or(TOKEN_URI)
    }
}

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    exp: u64,
    iat: u64,
}

/// OAuth2 token endpoint response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Token persisted between invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl StoredToken {
    fn from_response(response: TokenResponse, requested: &[&str], previous: Option<&StoredToken>) -> Self {
        let scopes = match response.scope {
            Some(s) => s.split_whitespace().map(str::to_string).collect(),
            None => requested.iter().map(|s| s.to_string()).collect(),
        };
        StoredToken {
            access_token: response.access_token,
            // Refresh responses usually omit the refresh token; keep the old one.
            refresh_token: response
                .refresh_token
                .or_else(|| previous.and_then(|p| p.refresh_token.clone())),
            expires_at: Utc::now() + Duration::seconds(response.expires_in),
            scopes,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now + Duration::seconds(EXPIRY_MARGIN_SECS)
    }

    pub fn covers(&self, scopes: &[&str]) -> bool {
        scopes.iter().all(|s| self.scopes.iter().any(|have| have == s))
    }
}

/// An authorized bearer token, passed explicitly to every API client.
#[derive(Debug, Clone)]
pub struct AuthSession {
    token: StoredToken,
}

impl AuthSession {
    /// Wrap an access token obtained elsewhere.
    pub fn from_access_token(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: StoredToken {
                access_token: access_token.into(),
                refresh_token: None,
                expires_at,
                scopes: Vec::new(),
            },
        }
    }

    pub fn access_token(&self) -> &str {
        &self.token.access_token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.token.expires_at
    }

    /// Obtain a fresh session. The current one is left untouched.
    pub async fn refresh(&self, auth: &Authenticator) -> Result<AuthSession> {
        let token = auth.refresh_stored(&self.token).await?;
        auth.save_token(&token)?;
        Ok(AuthSession { token })
    }
}

/// What the loopback listener received from the browser redirect.
#[derive(Debug, PartialEq, Eq)]
pub enum RedirectOutcome {
    Code { code: String, state: Option<String> },
    Denied(String),
    Ignored,
}

/// Parse the request line of the redirect hitting the loopback listener.
pub fn parse_redirect(request_line: &str) -> RedirectOutcome {
    let Some(target) = request_line.split_whitespace().nth(1) else {
        return RedirectOutcome::Ignored;
    };
    let Ok(url) = Url::parse(&format!("http://127.0.0.1{}", target)) else {
        return RedirectOutcome::Ignored;
    };
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

    if let Some(error) = params.get("error") {
        return RedirectOutcome::Denied(error.clone());
    }
    match params.get("code") {
        Some(code) => RedirectOutcome::Code {
            code: code.clone(),
            state: params.get("state").cloned(),
        },
        None => RedirectOutcome::Ignored,
    }
}

/// Loads, refreshes and grants tokens; the only writer of the token file.
pub struct Authenticator {
    credentials: Credentials,
    token_path: PathBuf,
    http: Client,
}

impl Authenticator {
    /// Create an authenticator from a credentials JSON file and a token path.
    pub fn from_files<P: AsRef<Path>, Q: AsRef<Path>>(credentials_path: P, token_path: Q) -> Result<Self> {
        let path = credentials_path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            StudyError::CredentialsParse(format!("{}: {}", path.display(), e))
        })?;
        let credentials: Credentials = serde_json::from_str(&content).map_err(|e| {
            StudyError::CredentialsParse(format!("{}: {}", path.display(), e))
        })?;
        Ok(Self::new(credentials, token_path.as_ref().to_path_buf()))
    }

    pub fn new(credentials: Credentials, token_path: PathBuf) -> Self {
        Self {
            credentials,
            token_path,
            http: Client::new(),
        }
    }

    /// Get an authorized session for `scopes`.
    ///
    /// Uses the stored token while it is valid, refreshes it when expired,
    /// and falls back to a new grant when refreshing fails or the stored token
    /// lacks a scope.
    pub async fn session(&self, scopes: &[&str]) -> Result<AuthSession> {
        let stored = self.load_token();

        let token = match stored {
            Some(token) if !token.covers(scopes) => {
                info!("stored token lacks required scopes, requesting new consent");
                self.grant(scopes).await?
            }
            Some(token) if token.is_valid_at(Utc::now()) => {
                debug!(expires_at = %token.expires_at, "using stored token");
                return Ok(AuthSession { token });
            }
            Some(token) => match self.refresh_stored(&token).await {
                Ok(refreshed) => {
                    info!("refreshed expired credentials");
                    refreshed
                }
                Err(e) => {
                    warn!(error = %e, "token refresh failed, re-running authorization");
                    self.grant(scopes).await?
                }
            },
            None => self.grant(scopes).await?,
        };

        self.save_token(&token)?;
        Ok(AuthSession { token })
    }

    fn load_token(&self) -> Option<StoredToken> {
        let content = fs::read_to_string(&self.token_path).ok()?;
        match serde_json::from_str(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(path = %self.token_path.display(), error = %e, "ignoring unreadable token file");
                None
            }
        }
    }

    fn save_token(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.token_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.token_path, serde_json::to_string_pretty(token)?)?;
        debug!(path = %self.token_path.display(), "token saved");
        Ok(())
    }

    async fn grant(&self, scopes: &[&str]) -> Result<StoredToken> {
        match &self.credentials {
            Credentials::Installed { installed: secrets } | Credentials::Web { web: secrets } => {
                self.interactive_grant(secrets, scopes).await
            }
            Credentials::ServiceAccount(sa) => self.service_account_grant(sa, scopes).await,
        }
    }

    async fn refresh_stored(&self, stored: &StoredToken) -> Result<StoredToken> {
        let (secrets, refresh_token) = match (&self.credentials, &stored.refresh_token) {
            (Credentials::Installed { installed: s } | Credentials::Web { web: s }, Some(rt)) => (s, rt),
            (Credentials::ServiceAccount(sa), _) => {
                let scopes: Vec<&str> = stored.scopes.iter().map(String::as_str).collect();
                return self.service_account_grant(sa, &scopes).await;
            }
            _ => {
                return Err(StudyError::TokenRefresh(
                    "stored token has no refresh token".to_string(),
                ))
            }
        };

        let params = [
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let response = self.post_token_form(&params).await?;
        let requested: Vec<&str> = stored.scopes.iter().map(String::as_str).collect();
        Ok(StoredToken::from_response(response, &requested, Some(stored)))
    }

    /// Browser consent with a loopback redirect.
    async fn interactive_grant(&self, secrets: &OAuthClientSecrets, scopes: &[&str]) -> Result<StoredToken> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let redirect_uri = format!("http://127.0.0.1:{}", listener.local_addr()?.port());
        let state = consent_state();

        let auth_url = Url::parse_with_params(
            secrets.auth_uri.as_deref().unwrap_or(AUTH_URI),
            &[
                ("client_id", secrets.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scopes.join(" ").as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| StudyError::Auth(format!("invalid auth URI: {}", e)))?;

        println!("Open this URL in your browser to authorize access:\n\n{}\n", auth_url);
        info!(redirect_uri = %redirect_uri, "waiting for authorization");

        let code = loop {
            let (mut stream, _) = listener.accept().await?;
            let mut buf = vec![0u8; 8192];
            let n = stream.read(&mut buf).await?;
            let request = String::from_utf8_lossy(&buf[..n]);
            let outcome = parse_redirect(request.lines().next().unwrap_or_default());

            let body = match &outcome {
                RedirectOutcome::Code { .. } => "Authorization complete. You can close this tab.",
                RedirectOutcome::Denied(_) => "Authorization was declined. You can close this tab.",
                RedirectOutcome::Ignored => "Waiting for authorization...",
            };
            let reply = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            // The browser may have gone away; the code is what matters.
            let _ = stream.write_all(reply.as_bytes()).await;

            match outcome {
                RedirectOutcome::Code { code, state: returned } => {
                    if returned.as_deref() != Some(state.as_str()) {
                        return Err(StudyError::Auth("state mismatch in OAuth redirect".to_string()));
                    }
                    break code;
                }
                RedirectOutcome::Denied(reason) => {
                    return Err(StudyError::Auth(format!("consent declined: {}", reason)));
                }
                RedirectOutcome::Ignored => continue,
            }
        };

        let params = [
            ("code", code.as_str()),
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        let response = self
            .post_token_form(&params)
            .await
            .map_err(|e| StudyError::Auth(format!("code exchange failed: {}", e)))?;

        info!("authorization granted");
        Ok(StoredToken::from_response(response, scopes, None))
    }

    /// JWT assertion grant for service accounts.
    async fn service_account_grant(&self, sa: &ServiceAccountCredentials, scopes: &[&str]) -> Result<StoredToken> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| StudyError::Auth(e.to_string()))?
            .as_secs();

        let claims = Claims {
            iss: sa.client_email.clone(),
            scope: scopes.join(" "),
            aud: self.credentials.token_uri().to_string(),
            iat: now,
            exp: now + 3600,
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(sa.private_key.as_bytes())?;
        let jwt = encode(&header, &claims, &key)?;

        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", jwt.as_str()),
        ];
        let response = self.post_token_form(&params).await?;
        Ok(StoredToken::from_response(response, scopes, None))
    }

    async fn post_token_form(&self, params: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(self.credentials.token_uri())
            .form(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StudyError::TokenRefresh(format!("Status {}: {}", status, body)));
        }

        Ok(response.json().await?)
    }
}

/// Opaque value echoed back through the consent redirect.
fn consent_state() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{:x}{:x}", nanos, std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_serialization() {
        let claims = Claims {
            iss: "bot@example.iam.gserviceaccount.com".to_string(),
            scope: CLASSROOM_SCOPES.join(" "),
            aud: TOKEN_URI.to_string(),
            iat: 1234567890,
            exp: 1234571490,
        };

        let json = serde_json::to_string(&claims).unwrap();
        assert!(json.contains("bot@example.iam.gserviceaccount.com"));
        assert!(json.contains("classroom.courses.readonly"));
    }

    #[test]
    fn test_parse_redirect_code() {
        let outcome = parse_redirect("GET /?state=abc&code=4%2F0Axyz&scope=x HTTP/1.1");
        assert_eq!(
            outcome,
            RedirectOutcome::Code {
                code: "4/0Axyz".to_string(),
                state: Some("abc".to_string())
            }
        );
    }

    #[test]
    fn test_parse_redirect_denied() {
        let outcome = parse_redirect("GET /?error=access_denied&state=abc HTTP/1.1");
        assert_eq!(outcome, RedirectOutcome::Denied("access_denied".to_string()));
    }

    #[test]
    fn test_parse_redirect_favicon() {
        assert_eq!(parse_redirect("GET /favicon.ico HTTP/1.1"), RedirectOutcome::Ignored);
        assert_eq!(parse_redirect(""), RedirectOutcome::Ignored);
    }

    #[test]
    fn test_token_validity_margin() {
        let now = Utc::now();
        let token = StoredToken {
            access_token: "t".to_string(),
            refresh_token: None,
            expires_at: now + Duration::seconds(30),
            scopes: vec![],
        };
        assert!(!token.is_valid_at(now));
        assert!(token.is_valid_at(now - Duration::seconds(60)));
    }

    #[test]
    fn test_token_covers_scopes() {
        let token = StoredToken {
            access_token: "t".to_string(),
            refresh_token: None,
            expires_at: Utc::now(),
            scopes: CLASSROOM_SCOPES.iter().map(|s| s.to_string()).collect(),
        };
        assert!(token.covers(CLASSROOM_SCOPES));
        assert!(!token.covers(&["https://www.googleapis.com/auth/gmail.readonly"]));
    }
}
