//! The per-session on-disk `.eml` scratch buffer (§4.6) and its cleanup guard.
//!
//! The original design only deleted the scratch file on the drop and webhook-accept
//! branches, leaving it behind on every error return (§9's "known rough edge"). This is
//! fixed here by unifying cleanup behind `ScratchGuard`, which removes the file on `Drop`
//! from every terminal path — including error returns — unless explicitly disarmed. No
//! call site in this codebase disarms it: the file is always scratch.

use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

/// Builds the scratch-file path for a session id, per §4.6/§6: `{runtime}/{uuid}.eml`.
#[must_use]
pub fn buffer_path(runtime: &Path, id: Uuid) -> PathBuf {
    runtime.join(format!("{id}.eml"))
}

/// Owns a session's scratch file and deletes it on `Drop` (§4.6, §9).
///
/// Opened read/write on the first `DATA` line, written as bytes arrive, and re-read if
/// the spam scanner rewrites it with added headers (§4.7 step 2).
pub struct ScratchGuard {
    path: PathBuf,
    armed: bool,
}

impl ScratchGuard {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates (or truncates) the scratch file and writes `bytes` to it.
    ///
    /// # Errors
    /// Propagates the underlying filesystem error.
    pub async fn write(&self, bytes: &[u8]) -> std::io::Result<()> {
        tokio::fs::write(&self.path, bytes).await
    }

    /// Appends `bytes` to the scratch file, creating it if absent.
    ///
    /// # Errors
    /// Propagates the underlying filesystem error.
    pub async fn append(&self, bytes: &[u8]) -> std::io::Result<()> {
        use tokio::io::AsyncWriteExt as _;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(bytes).await
    }

    /// Reads the scratch file back, used after the spam scanner has rewritten it with
    /// `X-Spam-Status` headers (§4.7 step 2).
    ///
    /// # Errors
    /// Propagates the underlying filesystem error.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        match std::fs::remove_file(&self.path) {
            Ok(()) | Err(_) if !self.path.exists() => {}
            Err(err) => warn!(path = %self.path.display(), %err, "failed to remove scratch file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let guard = ScratchGuard::new(dir.path().join("msg.eml"));
        guard.write(b"hello").await.unwrap();
        assert_eq!(guard.read().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn drop_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("msg.eml");
        {
            let guard = ScratchGuard::new(path.clone());
            guard.write(b"hello").await.unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn drop_on_an_error_path_still_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("msg.eml");

        async fn fails_after_writing(guard: &ScratchGuard) -> Result<(), &'static str> {
            guard.write(b"partial").await.map_err(|_| "io")?;
            Err("pipeline error")
        }

        {
            let guard = ScratchGuard::new(path.clone());
            let _ = fails_after_writing(&guard).await;
        }

        assert!(!path.exists());
    }

    #[test]
    fn buffer_path_matches_runtime_uuid_eml_layout() {
        let id = Uuid::nil();
        let path = buffer_path(Path::new("/var/run/fwdr"), id);
        assert_eq!(path, PathBuf::from(format!("/var/run/fwdr/{id}.eml")));
    }
}
