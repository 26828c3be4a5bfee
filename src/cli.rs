//! Process-level plumbing shared by the binaries: Ctrl-C handling and the
//! single-line `Error:` report.

use std::future::Future;
use std::process::ExitCode;
use thiserror::Error;
use tracing::debug;

use crate::credentials::CredentialError;

/// The operator interrupted the run
#[derive(Debug, Error)]
#[error("Aborted.")]
pub struct Interrupted;

/// Run `work` until it finishes or Ctrl-C arrives, whichever is first
pub async fn interruptible<T, F>(work: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    tokio::pin!(work);
    tokio::select! {
        result = &mut work => result,
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => Err(Interrupted.into()),
            Err(e) => {
                debug!("Ctrl-C handler unavailable: {}", e);
                work.await
            }
        },
    }
}

/// Whether `err` stems from an operator interrupt (Ctrl-C at a prompt or
/// during a request)
pub fn is_interrupt(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Interrupted>().is_some()
        || matches!(
            err.downcast_ref::<CredentialError>(),
            Some(CredentialError::Interrupted)
        )
}

/// One-line message printed to stderr for a failed run
pub fn error_line(err: &anyhow::Error) -> String {
    if is_interrupt(err) {
        "\nAborted.".to_string()
    } else {
        format!("Error: {:#}", err)
    }
}

/// Print the failure and return the exit status for it
pub fn report(err: &anyhow::Error) -> ExitCode {
    eprintln!("{}", error_line(err));
    ExitCode::FAILURE
}
