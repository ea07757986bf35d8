//! Raw file access seam shared by writable backends.

use async_trait::async_trait;

use crate::application::source::SourceError;

/// A file fetched from a backing store, with the version identifier the
/// store demands back on update (GitHub's content sha; the local directory
/// has none).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub text: String,
    pub sha: Option<String>,
}

impl StoredFile {
    pub fn new(text: impl Into<String>, sha: Option<String>) -> Self {
        Self {
            text: text.into(),
            sha,
        }
    }
}

/// Read/write access to individual repository files.
///
/// The manifest manager and every read-modify-write sequence run over this
/// seam, so the same logic serves the local directory and the GitHub API.
/// Writes are optimistic-concurrency checked where the store supports it: a
/// write against an existing file must echo the sha from the read, and the
/// store rejects a stale one. No retry happens here; callers re-read and
/// reapply.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Fetch one file; `Ok(None)` when it does not exist.
    async fn read_file(&self, path: &str) -> Result<Option<StoredFile>, SourceError>;

    /// Create or update one file. `sha` must be `Some` when updating an
    /// existing file and `None` when creating.
    async fn write_file(
        &self,
        path: &str,
        text: &str,
        sha: Option<&str>,
        message: &str,
    ) -> Result<(), SourceError>;
}
