//! Plugin package installation.
//!
//! Mirrors what the console web UI does when a package is dropped in:
//! 1. Upload the package and get back its unique identifier
//! 2. Look up existing installations of the same plugin
//! 3. Uninstall each of them
//! 4. Install the uploaded package
//!
//! Packages are processed one after another. A missing local file is skipped;
//! any console failure stops the whole run.

use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::client::{endpoints, ConsoleClient, ConsoleError, Session};
use crate::fields::{
    first_present, first_string, INSTALLATION_ID_KEYS, INSTALLATION_LIST_KEYS,
    UNIQUE_IDENTIFIER_KEYS,
};

/// Multipart field the upload endpoint reads the package from
const PACKAGE_FIELD: &str = "pkg";

/// Plugin name part of a unique identifier.
///
/// `langgenius/openai:0.2.6@0f3a...` → `langgenius/openai`
pub fn plugin_name(unique_identifier: &str) -> &str {
    unique_identifier
        .split_once(':')
        .map_or(unique_identifier, |(name, _)| name)
}

/// Result of installing one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPlugin {
    pub package: PathBuf,
    pub unique_identifier: String,
    pub plugin_name: String,
    /// Installation ids removed before installing
    pub uninstalled: Vec<String>,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallSummary {
    pub installed: Vec<InstalledPlugin>,
    /// Package paths that did not exist locally
    pub skipped: Vec<PathBuf>,
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Runs the upload / replace / install sequence against one console session
pub struct PluginInstaller<'a> {
    client: &'a ConsoleClient,
    session: &'a Session,
}

impl<'a> PluginInstaller<'a> {
    /// Installation endpoints reject requests without a CSRF token, so the
    /// session must carry one.
    pub fn new(client: &'a ConsoleClient, session: &'a Session) -> Result<Self, ConsoleError> {
        session.require_csrf_token()?;
        Ok(Self { client, session })
    }

    /// Upload a package file and return its unique identifier
    pub async fn upload(&self, path: &Path) -> Result<String, ConsoleError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ConsoleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "plugin.difypkg".to_string());
        debug!("Uploading {} ({} bytes)", file_name, bytes.len());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/octet-stream")?;
        let form = Form::new().part(PACKAGE_FIELD, part);

        let request = self
            .client
            .post(self.session, endpoints::UPLOAD_PACKAGE)
            .multipart(form);
        let response = self
            .client
            .send_json(
                request,
                self.client.settings().transfer_timeout(),
                "Upload failed",
            )
            .await?;
        debug!("Upload response: {}", pretty(&response));

        first_string(&response, UNIQUE_IDENTIFIER_KEYS).ok_or_else(|| {
            warn!("Upload response: {}", pretty(&response));
            ConsoleError::UnexpectedResponse(format!(
                "No unique_identifier in upload response: {}",
                response
            ))
        })
    }

    /// Installation records currently present for `plugin_name`
    pub async fn list_installations(&self, plugin_name: &str) -> Result<Vec<Value>, ConsoleError> {
        let request = self
            .client
            .post(self.session, endpoints::LIST_INSTALLATIONS)
            .json(&json!({ "plugin_ids": [plugin_name] }));
        let response = self
            .client
            .send_json(
                request,
                self.client.settings().request_timeout(),
                "List installations failed",
            )
            .await?;
        debug!("Installations response: {}", pretty(&response));

        Ok(first_present(&response, INSTALLATION_LIST_KEYS)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    pub async fn uninstall(&self, installation_id: &str) -> Result<Value, ConsoleError> {
        let request = self
            .client
            .post(self.session, endpoints::UNINSTALL)
            .json(&json!({ "plugin_installation_id": installation_id }));
        let response = self
            .client
            .send_json(
                request,
                self.client.settings().transfer_timeout(),
                "Uninstall failed",
            )
            .await?;
        debug!("Uninstall response: {}", pretty(&response));
        Ok(response)
    }

    pub async fn install(&self, unique_identifier: &str) -> Result<Value, ConsoleError> {
        let request = self
            .client
            .post(self.session, endpoints::INSTALL_PACKAGE)
            .json(&json!({ "plugin_unique_identifiers": [unique_identifier] }));
        let response = self
            .client
            .send_json(
                request,
                self.client.settings().transfer_timeout(),
                "Install failed",
            )
            .await?;
        debug!("Install response: {}", pretty(&response));
        Ok(response)
    }

    /// Upload one package, replace any existing installation, install it
    pub async fn install_package(&self, path: &Path) -> Result<InstalledPlugin, ConsoleError> {
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        info!("Installing {}...", display_name);

        info!("  Uploading...");
        let unique_identifier = self.upload(path).await?;
        info!("  Uploaded: {}", unique_identifier);

        let name = plugin_name(&unique_identifier).to_string();
        info!("  Checking installations for {}...", name);
        let installations = self.list_installations(&name).await?;

        let mut uninstalled = Vec::new();
        for record in &installations {
            let Some(installation_id) = first_string(record, INSTALLATION_ID_KEYS) else {
                debug!("Skipping installation record without id: {}", record);
                continue;
            };
            info!("  Uninstalling old version (id: {})...", installation_id);
            self.uninstall(&installation_id).await?;
            info!("  Old version uninstalled.");
            uninstalled.push(installation_id);
        }

        info!("  Installing new version...");
        self.install(&unique_identifier).await?;
        info!("  Installed successfully");

        Ok(InstalledPlugin {
            package: path.to_path_buf(),
            unique_identifier,
            plugin_name: name,
            uninstalled,
        })
    }

    /// Install every package in order, skipping paths that do not exist.
    ///
    /// Stops at the first console error; packages after it are not attempted.
    pub async fn install_all(&self, packages: &[PathBuf]) -> Result<InstallSummary, ConsoleError> {
        let mut summary = InstallSummary::default();

        for path in packages {
            if !path.exists() {
                warn!("Package not found: {}", path.display());
                summary.skipped.push(path.clone());
                continue;
            }
            summary.installed.push(self.install_package(path).await?);
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_name_strips_version_and_hash() {
        assert_eq!(plugin_name("ns/name:1.0.0@hash"), "ns/name");
        assert_eq!(
            plugin_name("petrus/mercury_tools:0.2.6@abc123"),
            "petrus/mercury_tools"
        );
    }

    #[test]
    fn test_plugin_name_without_version() {
        assert_eq!(plugin_name("ns/name"), "ns/name");
    }

    #[test]
    fn test_plugin_name_splits_on_first_colon() {
        assert_eq!(plugin_name("ns/name:1.0:extra"), "ns/name");
    }
}
