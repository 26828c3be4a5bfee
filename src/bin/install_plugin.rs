//! install-plugin - upload and install Dify plugin packages.
//!
//! For every package: upload it, uninstall any existing installation of the
//! same plugin, then install the uploaded version.
//!
//! ```text
//! install-plugin dist/*.difypkg
//! ```
//!
//! Credentials come from the `.credential` file written by `get-debug-key`
//! (or from `DIFY_PLUGIN_CREDENTIAL_FILE`).

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};

use dify_plugin_tools::cli;
use dify_plugin_tools::client::ConsoleClient;
use dify_plugin_tools::credentials::{self, Credentials};
use dify_plugin_tools::installer::PluginInstaller;
use dify_plugin_tools::logging;
use dify_plugin_tools::settings::{self, Settings};

#[derive(Parser)]
#[command(name = "install-plugin")]
#[command(version, about = "Install Dify plugins via API")]
struct Cli {
    /// Plugin packages to install
    #[arg(required = true)]
    packages: Vec<PathBuf>,

    /// Verbose output
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

    let creds = credentials::read(&credentials::installer_path(&settings, &cwd))?;
    cli::interruptible(install(creds, settings, &args.packages)).await
}

async fn install(creds: Credentials, settings: Settings, packages: &[PathBuf]) -> anyhow::Result<()> {
    let client = ConsoleClient::new(&creds.host, settings)?;

    info!("Logging in to {}...", creds.host);
    let session = client.login(&creds).await?;
    info!("Login successful.");

    let installer = PluginInstaller::new(&client, &session)?;
    let summary = installer.install_all(packages).await?;

    if !summary.skipped.is_empty() {
        warn!("Skipped {} missing package(s)", summary.skipped.len());
    }
    info!("All plugins installed! ({} installed)", summary.installed.len());
    Ok(())
}
