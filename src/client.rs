//! Console API session client.
//!
//! Authentication is cookie based: `POST /console/api/login` answers with
//! `Set-Cookie` headers carrying the access token and a CSRF token. Every
//! later call replays the whole cookie set and echoes the CSRF token in the
//! `X-CSRF-Token` header.
//!
//! Secure deployments prefix both cookies with `__Host-`; both spellings are
//! accepted.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::COOKIE;
use reqwest::{RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::credentials::Credentials;
use crate::fields::{first_cookie, ACCESS_TOKEN_COOKIES, CSRF_TOKEN_COOKIES};
use crate::settings::Settings;

/// All console endpoints live under this prefix
pub const API_PREFIX: &str = "/console/api";

/// Header carrying the CSRF token on authenticated calls
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Endpoint paths relative to [`API_PREFIX`]
pub mod endpoints {
    pub const LOGIN: &str = "/login";
    pub const DEBUGGING_KEY: &str = "/workspaces/current/plugin/debugging-key";
    pub const UPLOAD_PACKAGE: &str = "/workspaces/current/plugin/upload/pkg";
    pub const LIST_INSTALLATIONS: &str = "/workspaces/current/plugin/list/installations/ids";
    pub const UNINSTALL: &str = "/workspaces/current/plugin/uninstall";
    pub const INSTALL_PACKAGE: &str = "/workspaces/current/plugin/install/pkg";
}

/// Errors that can occur while talking to the console
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("{0}")]
    Auth(String),

    #[error("{action}: {status} - {body}")]
    Request {
        action: &'static str,
        status: u16,
        body: String,
    },

    #[error("{0}")]
    UnexpectedResponse(String),

    #[error("Invalid host URL '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Session
// ============================================================================

/// Cookies and tokens obtained from a successful login.
///
/// Lives for one invocation only; nothing here is persisted.
#[derive(Debug, Clone)]
pub struct Session {
    access_token: String,
    cookies: BTreeMap<String, String>,
    csrf_token: Option<String>,
}

impl Session {
    /// Build a session from the cookies set by the login response
    pub fn from_cookies(cookies: BTreeMap<String, String>) -> Result<Self, ConsoleError> {
        let access_token = first_cookie(&cookies, ACCESS_TOKEN_COOKIES)
            .map(str::to_string)
            .ok_or_else(|| {
                ConsoleError::Auth(format!(
                    "No access_token in cookies. Cookies: {:?}",
                    cookie_names(&cookies)
                ))
            })?;
        let csrf_token = first_cookie(&cookies, CSRF_TOKEN_COOKIES).map(str::to_string);

        Ok(Self {
            access_token,
            cookies,
            csrf_token,
        })
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    /// CSRF token, or an authentication error when login did not set one
    pub fn require_csrf_token(&self) -> Result<&str, ConsoleError> {
        self.csrf_token().ok_or_else(|| {
            ConsoleError::Auth(format!(
                "No csrf_token in cookies. Cookies: {:?}",
                cookie_names(&self.cookies)
            ))
        })
    }

    /// Value for the `Cookie` request header
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn cookie_names(cookies: &BTreeMap<String, String>) -> Vec<&str> {
    cookies.keys().map(String::as_str).collect()
}

// ============================================================================
// Client
// ============================================================================

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    /// Base64 of the plain password; this is the console's wire format
    password: String,
    remember_me: bool,
}

/// HTTP client bound to one console host
pub struct ConsoleClient {
    http: reqwest::Client,
    host: String,
    settings: Settings,
}

impl ConsoleClient {
    /// Create a client for `host` (e.g. `https://your-dify.com`).
    ///
    /// Trailing slashes are dropped; the host must be an absolute http(s) URL.
    pub fn new(host: &str, settings: Settings) -> Result<Self, ConsoleError> {
        let parsed = url::Url::parse(host).map_err(|e| ConsoleError::InvalidHost {
            host: host.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConsoleError::InvalidHost {
                host: host.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Ok(Self {
            http,
            host: host.trim_end_matches('/').to_string(),
            settings,
        })
    }

    /// Host without trailing slash
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Absolute URL for an endpoint path
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}{}", self.host, API_PREFIX, endpoint)
    }

    /// Authenticate and collect the session cookies
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, ConsoleError> {
        let url = self.url(endpoints::LOGIN);
        debug!("POST {}", url);

        let request = LoginRequest {
            email: &credentials.email,
            password: STANDARD.encode(credentials.password.as_bytes()),
            remember_me: true,
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .timeout(self.settings.request_timeout())
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ConsoleError::Auth(format!(
                "Login failed: {} - {}",
                status.as_u16(),
                body
            )));
        }

        let cookies: BTreeMap<String, String> = response
            .cookies()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();
        debug!("Login set cookies: {:?}", cookie_names(&cookies));

        Session::from_cookies(cookies)
    }

    /// GET request carrying the session cookies and CSRF header
    pub fn get(&self, session: &Session, endpoint: &str) -> RequestBuilder {
        let url = self.url(endpoint);
        debug!("GET {}", url);
        self.authenticate(self.http.get(url), session)
    }

    /// POST request carrying the session cookies and CSRF header
    pub fn post(&self, session: &Session, endpoint: &str) -> RequestBuilder {
        let url = self.url(endpoint);
        debug!("POST {}", url);
        self.authenticate(self.http.post(url), session)
    }

    fn authenticate(&self, builder: RequestBuilder, session: &Session) -> RequestBuilder {
        let builder = builder.header(COOKIE, session.cookie_header());
        match session.csrf_token() {
            Some(token) => builder.header(CSRF_HEADER, token),
            None => builder,
        }
    }

    /// Send a request and decode its JSON body.
    ///
    /// Any status other than 200 becomes [`ConsoleError::Request`] tagged with
    /// `action`.
    pub async fn send_json(
        &self,
        request: RequestBuilder,
        timeout: Duration,
        action: &'static str,
    ) -> Result<Value, ConsoleError> {
        let response = request.timeout(timeout).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            return Err(ConsoleError::Request {
                action,
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            ConsoleError::UnexpectedResponse(format!("{}: invalid JSON ({}): {}", action, e, body))
        })
    }
}
