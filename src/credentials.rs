//! Console credential storage.
//!
//! Credentials are kept in a small JSON document (`.credential`) next to the
//! plugin project:
//!
//! ```json
//! { "host": "https://your-dify.com", "email": "me@example.com", "password": "..." }
//! ```
//!
//! The file is written with owner-only permissions. Lookup walks from a start
//! directory up through its ancestors, so the tools work from any
//! subdirectory of the project.

use rustyline::config::{ColorMode, Config};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::history::DefaultHistory;
use rustyline::{Completer, DefaultEditor, Editor, Helper, Hinter, Validator};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::settings::Settings;

/// Fixed name of the credential file
pub const CREDENTIAL_FILE_NAME: &str = ".credential";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Credential file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid credential file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Credential file {} is missing field '{field}'", path.display())]
    Incomplete { path: PathBuf, field: &'static str },

    #[error("Failed to read input: {0}")]
    Prompt(String),

    #[error("Interrupted")]
    Interrupted,
}

/// A complete set of console credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub host: String,
    pub email: String,
    pub password: String,
}

/// Credentials where any field may be absent.
///
/// Used both for command-line overrides and for the on-disk document, which
/// is not guaranteed to hold every field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl PartialCredentials {
    pub fn new(host: Option<String>, email: Option<String>, password: Option<String>) -> Self {
        Self {
            host: non_empty(host),
            email: non_empty(email),
            password: non_empty(password),
        }
    }

    /// True when every field holds a non-empty value
    pub fn is_complete(&self) -> bool {
        self.missing_field().is_none()
    }

    /// Name of the first field without a usable value
    pub fn missing_field(&self) -> Option<&'static str> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        if !present(&self.host) {
            Some("host")
        } else if !present(&self.email) {
            Some("email")
        } else if !present(&self.password) {
            Some("password")
        } else {
            None
        }
    }

    /// Fill fields missing here from `fallback`; values already set win
    pub fn or(self, fallback: PartialCredentials) -> PartialCredentials {
        PartialCredentials {
            host: non_empty(self.host).or(non_empty(fallback.host)),
            email: non_empty(self.email).or(non_empty(fallback.email)),
            password: non_empty(self.password).or(non_empty(fallback.password)),
        }
    }

    /// Convert into complete credentials if every field is set
    pub fn complete(self) -> Option<Credentials> {
        Some(Credentials {
            host: non_empty(self.host)?,
            email: non_empty(self.email)?,
            password: non_empty(self.password)?,
        })
    }
}

impl From<Credentials> for PartialCredentials {
    fn from(c: Credentials) -> Self {
        PartialCredentials::new(Some(c.host), Some(c.email), Some(c.password))
    }
}

// ============================================================================
// File access
// ============================================================================

/// Search `start_dir` and each of its ancestors for the credential file
pub fn find(start_dir: &Path) -> Option<PathBuf> {
    start_dir
        .ancestors()
        .map(|dir| dir.join(CREDENTIAL_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Load saved credentials, treating any problem as "nothing saved".
///
/// With no explicit `path` the file is located with [`find`]. A file that is
/// unreadable or not valid JSON produces a warning and `None`.
pub fn load(path: Option<&Path>, start_dir: &Path) -> Option<(PathBuf, PartialCredentials)> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => find(start_dir)?,
    };

    if !path.exists() {
        debug!("No credential file at {}", path.display());
        return None;
    }

    let parsed = fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|data| {
            serde_json::from_str::<PartialCredentials>(&data).map_err(|e| e.to_string())
        });

    match parsed {
        Ok(creds) => Some((path, creds)),
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            None
        }
    }
}

/// Read a credential file that must exist and hold all three fields
pub fn read(path: &Path) -> Result<Credentials, CredentialError> {
    if !path.exists() {
        return Err(CredentialError::NotFound(path.to_path_buf()));
    }

    let data = fs::read_to_string(path).map_err(|source| CredentialError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let partial: PartialCredentials =
        serde_json::from_str(&data).map_err(|source| CredentialError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let missing = partial.missing_field();
    partial.complete().ok_or_else(|| CredentialError::Incomplete {
        path: path.to_path_buf(),
        field: missing.unwrap_or("host"),
    })
}

/// Write credentials to `path` (or `<start_dir>/.credential`), replacing any
/// existing file, and restrict it to the owner.
pub fn save(
    credentials: &Credentials,
    path: Option<&Path>,
    start_dir: &Path,
) -> Result<PathBuf, CredentialError> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| start_dir.join(CREDENTIAL_FILE_NAME));

    let io_err = |source: io::Error| CredentialError::Io {
        path: path.clone(),
        source,
    };

    let json = serde_json::to_string_pretty(credentials).map_err(|source| {
        CredentialError::Parse {
            path: path.clone(),
            source,
        }
    })?;
    write_private(&path, json.as_bytes()).map_err(io_err)?;

    info!("Credentials saved to {}", path.display());
    Ok(path)
}

/// Write `contents` to a file that is owner-only from the moment it exists.
/// A file that was already there is tightened to 0600 as well.
fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents)?;
    file.flush()
}

/// Credential file used by the installer: the configured path, else the
/// nearest `.credential` above `start_dir`, else `<start_dir>/.credential`
/// (which `read` then reports as not found).
pub fn installer_path(settings: &Settings, start_dir: &Path) -> PathBuf {
    settings
        .credential_file
        .clone()
        .or_else(|| find(start_dir))
        .unwrap_or_else(|| start_dir.join(CREDENTIAL_FILE_NAME))
}

// ============================================================================
// Interactive input
// ============================================================================

/// Source of operator input for credential prompts
pub trait Prompter {
    /// Read one line of visible input
    fn read_line(&mut self, prompt: &str) -> Result<String, CredentialError>;

    /// Read a secret without echoing it
    fn read_password(&mut self, prompt: &str) -> Result<String, CredentialError>;
}

/// Hides typed characters by rendering each one as a blank
#[derive(Completer, Helper, Hinter, Validator)]
pub struct PasswordMask;

impl Highlighter for PasswordMask {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Owned(" ".repeat(line.chars().count()))
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn readline_error(e: ReadlineError) -> CredentialError {
    match e {
        ReadlineError::Interrupted | ReadlineError::Eof => CredentialError::Interrupted,
        e => CredentialError::Prompt(e.to_string()),
    }
}

/// Prompts on the controlling terminal.
///
/// Both prompts go through rustyline, which reads in raw mode, so Ctrl-C
/// comes back as [`CredentialError::Interrupted`] instead of a signal.
#[derive(Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn read_line(&mut self, prompt: &str) -> Result<String, CredentialError> {
        let mut editor = DefaultEditor::new().map_err(readline_error)?;
        editor.readline(prompt).map_err(readline_error)
    }

    fn read_password(&mut self, prompt: &str) -> Result<String, CredentialError> {
        // Forced color mode makes rustyline apply the mask even when it
        // would otherwise skip highlighting.
        let config = Config::builder()
            .color_mode(ColorMode::Forced)
            .auto_add_history(false)
            .build();
        let mut editor: Editor<PasswordMask, DefaultHistory> =
            Editor::with_config(config).map_err(readline_error)?;
        editor.set_helper(Some(PasswordMask));
        editor.readline(prompt).map_err(readline_error)
    }
}

/// Ask the operator for all three fields
pub fn prompt(prompter: &mut dyn Prompter) -> Result<Credentials, CredentialError> {
    eprintln!("No credentials found. Please enter Dify credentials:");
    eprintln!("(These will be saved to {} for future use)", CREDENTIAL_FILE_NAME);
    eprintln!();

    let host = prompter
        .read_line("Dify host URL (e.g., https://your-dify.com): ")?
        .trim()
        .to_string();
    let email = prompter.read_line("Email: ")?.trim().to_string();
    let password = prompter.read_password("Password: ")?;

    Ok(Credentials {
        host,
        email,
        password,
    })
}

/// Where resolved credentials came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Every field was given explicitly
    Explicit,
    /// At least one field was filled from this file
    File(PathBuf),
    /// The operator typed them in
    Prompted,
}

/// Resolve credentials field by field: explicit values, then the saved file,
/// then an interactive prompt for all three fields.
pub fn resolve(
    overrides: PartialCredentials,
    saved: Option<(PathBuf, PartialCredentials)>,
    prompter: &mut dyn Prompter,
) -> Result<(Credentials, CredentialSource), CredentialError> {
    if let Some(creds) = overrides.clone().complete() {
        return Ok((creds, CredentialSource::Explicit));
    }

    if let Some((path, file_creds)) = saved {
        if let Some(creds) = overrides.or(file_creds).complete() {
            return Ok((creds, CredentialSource::File(path)));
        }
    }

    Ok((prompt(prompter)?, CredentialSource::Prompted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    /// Replays canned answers in order
    struct ScriptedPrompter {
        answers: VecDeque<String>,
        asked: Vec<String>,
    }

    impl ScriptedPrompter {
        fn new(answers: &[&str]) -> Self {
            Self {
                answers: answers.iter().map(|s| s.to_string()).collect(),
                asked: Vec::new(),
            }
        }

        fn next(&mut self, prompt: &str) -> Result<String, CredentialError> {
            self.asked.push(prompt.to_string());
            self.answers.pop_front().ok_or(CredentialError::Interrupted)
        }
    }

    impl Prompter for ScriptedPrompter {
        fn read_line(&mut self, prompt: &str) -> Result<String, CredentialError> {
            self.next(prompt)
        }

        fn read_password(&mut self, prompt: &str) -> Result<String, CredentialError> {
            self.next(prompt)
        }
    }

    fn sample() -> Credentials {
        Credentials {
            host: "https://dify.example.com".to_string(),
            email: "dev@example.com".to_string(),
            password: "s3cret!".to_string(),
        }
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = save(&sample(), None, dir.path()).unwrap();
        assert_eq!(path, dir.path().join(CREDENTIAL_FILE_NAME));

        let (loaded_path, loaded) = load(None, dir.path()).unwrap();
        assert_eq!(loaded_path, path);
        assert_eq!(loaded.complete(), Some(sample()));
    }

    #[cfg(unix)]
    #[test]
    fn test_save_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = save(&sample(), None, dir.path()).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_tightens_existing_permissive_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CREDENTIAL_FILE_NAME);
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        save(&sample(), Some(&path), dir.path()).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(read(&path).unwrap(), sample());
    }

    #[test]
    fn test_save_overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("creds.json");
        fs::write(&path, "garbage").unwrap();

        save(&sample(), Some(&path), dir.path()).unwrap();
        assert_eq!(read(&path).unwrap(), sample());
    }

    #[test]
    fn test_find_walks_ancestors() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join(CREDENTIAL_FILE_NAME), "{}").unwrap();

        assert_eq!(
            find(&nested),
            Some(dir.path().join(CREDENTIAL_FILE_NAME))
        );
    }

    #[test]
    fn test_find_prefers_nearest() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("project");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join(CREDENTIAL_FILE_NAME), "{}").unwrap();
        fs::write(nested.join(CREDENTIAL_FILE_NAME), "{}").unwrap();

        assert_eq!(find(&nested), Some(nested.join(CREDENTIAL_FILE_NAME)));
    }

    #[test]
    fn test_installer_path_prefers_configured_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CREDENTIAL_FILE_NAME), "{}").unwrap();
        let configured = dir.path().join("elsewhere.json");
        let settings = Settings {
            credential_file: Some(configured.clone()),
            ..Settings::default()
        };

        assert_eq!(installer_path(&settings, dir.path()), configured);
    }

    #[test]
    fn test_installer_path_finds_file_in_ancestor() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("plugin/src");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join(CREDENTIAL_FILE_NAME), "{}").unwrap();

        assert_eq!(
            installer_path(&Settings::default(), &nested),
            dir.path().join(CREDENTIAL_FILE_NAME)
        );
    }

    #[test]
    fn test_installer_path_falls_back_to_start_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("plugin");
        fs::create_dir_all(&nested).unwrap();

        let path = installer_path(&Settings::default(), &nested);
        assert_eq!(path, nested.join(CREDENTIAL_FILE_NAME));
        assert!(matches!(read(&path), Err(CredentialError::NotFound(_))));
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(load(Some(&missing), dir.path()).is_none());
    }

    #[test]
    fn test_load_corrupt_file_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CREDENTIAL_FILE_NAME);
        fs::write(&path, "{not json").unwrap();
        assert!(load(Some(&path), dir.path()).is_none());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CREDENTIAL_FILE_NAME);
        fs::write(&path, r#"{"email": "dev@example.com"}"#).unwrap();

        let (_, loaded) = load(Some(&path), dir.path()).unwrap();
        assert_eq!(loaded.email.as_deref(), Some("dev@example.com"));
        assert!(!loaded.is_complete());
    }

    #[test]
    fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CREDENTIAL_FILE_NAME);
        let err = read(&path).unwrap_err();
        assert!(matches!(err, CredentialError::NotFound(_)));
        assert!(err.to_string().starts_with("Credential file not found"));
    }

    #[test]
    fn test_read_incomplete_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CREDENTIAL_FILE_NAME);
        fs::write(&path, r#"{"host": "https://h", "email": "e"}"#).unwrap();
        let err = read(&path).unwrap_err();
        assert!(matches!(
            err,
            CredentialError::Incomplete {
                field: "password",
                ..
            }
        ));
    }

    #[test]
    fn test_resolve_explicit_values_skip_everything() {
        let mut prompter = ScriptedPrompter::new(&[]);
        let overrides = PartialCredentials::from(sample());
        let saved = Some((
            PathBuf::from(".credential"),
            PartialCredentials::new(Some("https://other".into()), None, None),
        ));

        let (creds, source) = resolve(overrides, saved, &mut prompter).unwrap();
        assert_eq!(creds, sample());
        assert_eq!(source, CredentialSource::Explicit);
        assert!(prompter.asked.is_empty());
    }

    #[test]
    fn test_resolve_mixes_flag_and_file_per_field() {
        let mut prompter = ScriptedPrompter::new(&[]);
        let overrides = PartialCredentials::new(Some("https://flag-host".into()), None, None);
        let saved = Some((
            PathBuf::from("/work/.credential"),
            PartialCredentials::new(
                Some("https://file-host".into()),
                Some("file@example.com".into()),
                Some("file-pass".into()),
            ),
        ));

        let (creds, source) = resolve(overrides, saved, &mut prompter).unwrap();
        assert_eq!(creds.host, "https://flag-host");
        assert_eq!(creds.email, "file@example.com");
        assert_eq!(creds.password, "file-pass");
        assert_eq!(source, CredentialSource::File(PathBuf::from("/work/.credential")));
        assert!(prompter.asked.is_empty());
    }

    #[test]
    fn test_resolve_prompts_for_all_fields_when_still_missing() {
        let mut prompter =
            ScriptedPrompter::new(&["  https://typed-host  ", " typed@example.com ", "pw "]);
        let overrides = PartialCredentials::new(Some("https://flag-host".into()), None, None);
        let saved = Some((
            PathBuf::from(".credential"),
            PartialCredentials::new(None, Some("file@example.com".into()), None),
        ));

        let (creds, source) = resolve(overrides, saved, &mut prompter).unwrap();
        assert_eq!(source, CredentialSource::Prompted);
        assert_eq!(prompter.asked.len(), 3);
        assert_eq!(creds.host, "https://typed-host");
        assert_eq!(creds.email, "typed@example.com");
        // Passwords are taken verbatim
        assert_eq!(creds.password, "pw ");
    }

    #[test]
    fn test_resolve_prompts_without_saved_file() {
        let mut prompter = ScriptedPrompter::new(&["https://h", "e@x", "p"]);
        let (creds, source) =
            resolve(PartialCredentials::default(), None, &mut prompter).unwrap();
        assert_eq!(source, CredentialSource::Prompted);
        assert_eq!(creds.host, "https://h");
    }

    #[test]
    fn test_resolve_empty_flag_does_not_override_file() {
        let mut prompter = ScriptedPrompter::new(&[]);
        let overrides = PartialCredentials::new(Some(String::new()), None, None);
        let saved = Some((PathBuf::from(".credential"), PartialCredentials::from(sample())));

        let (creds, _) = resolve(overrides, saved, &mut prompter).unwrap();
        assert_eq!(creds.host, sample().host);
    }

    #[test]
    fn test_resolve_prompt_interrupted() {
        let mut prompter = ScriptedPrompter::new(&["https://h"]);
        let err = resolve(PartialCredentials::default(), None, &mut prompter).unwrap_err();
        assert!(matches!(err, CredentialError::Interrupted));
    }

    #[test]
    fn test_password_interrupt_aborts_run() {
        // Host and email answered, Ctrl-C at the password prompt
        let mut prompter = ScriptedPrompter::new(&["https://h", "e@x"]);
        let err = resolve(PartialCredentials::default(), None, &mut prompter).unwrap_err();
        assert_eq!(prompter.asked.last().map(String::as_str), Some("Password: "));
        assert!(matches!(err, CredentialError::Interrupted));
        assert_eq!(crate::cli::error_line(&err.into()), "\nAborted.");
    }

    #[test]
    fn test_readline_interrupt_and_eof_map_to_interrupted() {
        assert!(matches!(
            readline_error(ReadlineError::Interrupted),
            CredentialError::Interrupted
        ));
        assert!(matches!(
            readline_error(ReadlineError::Eof),
            CredentialError::Interrupted
        ));
        assert!(matches!(
            readline_error(ReadlineError::Io(io::Error::other("tty gone"))),
            CredentialError::Prompt(_)
        ));
    }

    #[test]
    fn test_password_mask_hides_every_character() {
        let masked = PasswordMask.highlight("s3cr€t", 0);
        assert_eq!(masked, "      ");
        assert!(!masked.contains('s'));
        assert!(PasswordMask.highlight_char("s3cr€t", 6, CmdKind::Other));
    }
}
