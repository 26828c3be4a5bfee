//! Remote debugging key retrieval.
//!
//! A debugging key lets a plugin running on a developer machine attach to a
//! remote workspace through the plugin daemon. The key is printed either as a
//! readable note or as `.env` lines ready for redirection.

use std::fmt::Write as _;
use tracing::debug;

use crate::client::{endpoints, ConsoleClient, ConsoleError, Session};

/// How the key is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Key plus a sample `.env` block, for reading
    Human,
    /// Only the `.env` lines
    Env,
}

/// Fetch the workspace debugging key
pub async fn fetch_debugging_key(
    client: &ConsoleClient,
    session: &Session,
) -> Result<String, ConsoleError> {
    let request = client.get(session, endpoints::DEBUGGING_KEY);
    let data = client
        .send_json(
            request,
            client.settings().request_timeout(),
            "Failed to get debugging key",
        )
        .await?;

    match data.get("key").and_then(|k| k.as_str()) {
        Some(key) => {
            debug!("Debugging key received ({} chars)", key.len());
            Ok(key.to_string())
        }
        None => Err(ConsoleError::UnexpectedResponse(format!(
            "Unexpected response: {}",
            data
        ))),
    }
}

/// The four `.env` assignments for remote installation
pub fn env_lines(key: &str, host: &str, port: u16) -> [String; 4] {
    [
        "INSTALL_METHOD=remote".to_string(),
        format!("REMOTE_INSTALL_HOST={}", host),
        format!("REMOTE_INSTALL_PORT={}", port),
        format!("REMOTE_INSTALL_KEY={}", key),
    ]
}

/// Render the key for stdout. Every line ends with a newline.
pub fn render(key: &str, host: &str, port: u16, format: OutputFormat) -> String {
    let lines = env_lines(key, host, port);
    let mut out = String::new();

    match format {
        OutputFormat::Env => {
            for line in &lines {
                let _ = writeln!(out, "{}", line);
            }
        }
        OutputFormat::Human => {
            let _ = writeln!(out, "\nDebugging Key: {}", key);
            let _ = writeln!(out, "\nAdd to your plugin's .env file:");
            for line in &lines {
                let _ = writeln!(out, "  {}", line);
            }
        }
    }

    out
}
