//! Invokes the external spam scanner on the scratch file (§4.7 step 2), bounded to 30
//! seconds wall time with stdout/stderr inherited, matching the process this codebase has
//! always shelled out to.

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;

const SPAM_SCANNER: &str = "/usr/local/spamc.py";
const SCAN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum SpamScanError {
    #[error("spam scanner timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to run spam scanner: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("spam scanner exited with {0}")]
    NonZeroExit(std::process::ExitStatus),
}

/// Runs the scanner against `path`, which it rewrites in place with `X-Spam-Status` headers
/// on success (§4.7 step 2).
///
/// # Errors
/// Returns [`SpamScanError`] on timeout, spawn failure, or non-zero exit.
pub async fn scan(path: &Path) -> Result<(), SpamScanError> {
    let run = Command::new(SPAM_SCANNER).arg(path).status();

    let status = tokio::time::timeout(SCAN_TIMEOUT, run).await.map_err(|_| SpamScanError::Timeout(SCAN_TIMEOUT))?.map_err(SpamScanError::Spawn)?;

    if !status.success() {
        return Err(SpamScanError::NonZeroExit(status));
    }
    Ok(())
}

/// Parses an `X-Spam-Status` header value of the form `Yes, score=...` / `No, score=...`
/// (§4.7 step 5). Returns `None` if the header is absent or malformed.
#[must_use]
pub fn is_spam(header_value: &str) -> Option<bool> {
    let verdict = header_value.split(", ").next()?;
    match verdict {
        "Yes" => Some(true),
        "No" => Some(false),
        _ => None,
    }
}
