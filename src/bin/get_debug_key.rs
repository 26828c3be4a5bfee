//! get-debug-key - fetch a Dify plugin remote debugging key.
//!
//! First run prompts for console credentials and saves them to `.credential`;
//! later runs reuse the nearest saved file.
//!
//! ```text
//! get-debug-key
//! get-debug-key --host https://your-dify.com --email me@example.com --password ...
//! get-debug-key --output-env > .env
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use dify_plugin_tools::cli;
use dify_plugin_tools::client::ConsoleClient;
use dify_plugin_tools::credentials::{self, Credentials, PartialCredentials, TerminalPrompter};
use dify_plugin_tools::debug_key::{self, OutputFormat};
use dify_plugin_tools::logging;
use dify_plugin_tools::settings::{self, Settings};

#[derive(Parser)]
#[command(name = "get-debug-key")]
#[command(version, about = "Get Dify plugin debugging credentials")]
struct Cli {
    /// Dify host URL (e.g., https://your-dify.com)
    #[arg(long)]
    host: Option<String>,

    /// Dify account email
    #[arg(long)]
    email: Option<String>,

    /// Dify account password
    #[arg(long)]
    password: Option<String>,

    /// Output as .env format
    #[arg(long)]
    output_env: bool,

    /// Path to credential file (default: nearest .credential, saved to ./.credential)
    #[arg(long)]
    credential_file: Option<PathBuf>,

    /// Don't save credentials to file
    #[arg(long)]
    no_save: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Cli::parse();
    logging::init(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => cli::report(&e),
    }
}

async fn run(args: Cli) -> anyhow::Result<()> {
    let settings = settings::load_settings().context("Failed to load settings")?;
    let cwd = std::env::current_dir().context("Failed to determine working directory")?;

    // The prompts read in raw mode and report Ctrl-C themselves, so the
    // signal handler is only installed for the network calls.
    let credential_file = args.credential_file.or_else(|| settings.credential_file.clone());
    let overrides = PartialCredentials::new(args.host, args.email, args.password);
    let saved = if overrides.is_complete() {
        None
    } else {
        credentials::load(credential_file.as_deref(), &cwd)
    };
    if let Some((path, _)) = &saved {
        info!("Loaded credentials from {}", path.display());
    }
    let (creds, _) = credentials::resolve(overrides, saved, &mut TerminalPrompter)?;

    if !args.no_save {
        credentials::save(&creds, credential_file.as_deref(), &cwd)?;
    }

    let format = if args.output_env {
        OutputFormat::Env
    } else {
        OutputFormat::Human
    };
    let output = cli::interruptible(fetch_and_render(&creds, settings, format)).await?;
    print!("{}", output);
    Ok(())
}

async fn fetch_and_render(
    creds: &Credentials,
    settings: Settings,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let port = settings.remote_install_port;
    let client = ConsoleClient::new(&creds.host, settings)?;

    info!("Logging in to {}...", creds.host);
    let session = client.login(creds).await?;
    info!("Login successful.");

    info!("Fetching debugging key...");
    let key = debug_key::fetch_debugging_key(&client, &session).await?;

    Ok(debug_key::render(&key, &creds.host, port, format))
}
