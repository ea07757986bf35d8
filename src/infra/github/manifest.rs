//! Blog manifest maintenance.
//!
//! The manifest is the discovery index for backends that cannot list the
//! blog directory. Every mutator here propagates its errors; the write-path
//! wrappers in the backends decide that a failed manifest sync is not fatal
//! to the primary write, and log it there instead.

use serde_json::to_string_pretty;
use tracing::debug;

use crate::application::source::SourceError;
use crate::domain::entities::BlogManifest;
use crate::domain::paths;
use crate::infra::files::FileStore;

const COMMIT_MESSAGE: &str = "Update blog manifest";

/// Read-modify-write helper over the manifest file of one store.
pub struct ManifestManager<'a, S: FileStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: FileStore + ?Sized> ManifestManager<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Fetch and parse the manifest. A missing file reads as the empty
    /// manifest with no sha; the legacy `{files}` shape migrates on parse.
    pub async fn load(&self) -> Result<(BlogManifest, Option<String>), SourceError> {
        match self.store.read_file(paths::MANIFEST).await? {
            Some(file) => {
                let manifest = serde_json::from_str(&file.text).map_err(SourceError::decode)?;
                Ok((manifest, file.sha))
            }
            None => Ok((BlogManifest::default(), None)),
        }
    }

    /// Write the manifest back; `sha` only when updating an existing file.
    pub async fn save(
        &self,
        manifest: &BlogManifest,
        sha: Option<&str>,
    ) -> Result<(), SourceError> {
        let text = to_string_pretty(manifest).map_err(SourceError::decode)?;
        self.store
            .write_file(paths::MANIFEST, &text, sha, COMMIT_MESSAGE)
            .await
    }

    /// Materialize the manifest upstream when it does not exist yet.
    pub async fn ensure_exists(&self) -> Result<(), SourceError> {
        let (manifest, sha) = self.load().await?;
        if sha.is_some() {
            return Ok(());
        }
        self.save(&manifest, None).await
    }

    /// Record a published post. A filename already present is a no-op
    /// without a write, so duplicate-add attempts cost no commit.
    pub async fn add_post(&self, filename: &str) -> Result<(), SourceError> {
        let (mut manifest, sha) = self.load().await?;
        if manifest.is_published(filename) {
            debug!(filename, "manifest already lists post");
            return Ok(());
        }
        manifest.published.push(filename.to_string());
        self.save(&manifest, sha.as_deref()).await
    }

    /// Drop a published post. Writes even when the filename was absent; the
    /// extra commit is harmless and keeps this a single read-write pass.
    pub async fn remove_post(&self, filename: &str) -> Result<(), SourceError> {
        let (mut manifest, sha) = self.load().await?;
        manifest.published.retain(|f| f != filename);
        self.save(&manifest, sha.as_deref()).await
    }

    /// Record a draft; idempotent like [`Self::add_post`].
    pub async fn add_draft(&self, filename: &str) -> Result<(), SourceError> {
        let (mut manifest, sha) = self.load().await?;
        if manifest.is_draft(filename) {
            debug!(filename, "manifest already lists draft");
            return Ok(());
        }
        manifest.drafts.push(filename.to_string());
        self.save(&manifest, sha.as_deref()).await
    }

    /// Drop a draft; always writes, like [`Self::remove_post`].
    pub async fn remove_draft(&self, filename: &str) -> Result<(), SourceError> {
        let (mut manifest, sha) = self.load().await?;
        manifest.drafts.retain(|f| f != filename);
        self.save(&manifest, sha.as_deref()).await
    }

    /// Move a filename from drafts to published.
    pub async fn publish_draft(&self, filename: &str) -> Result<(), SourceError> {
        let (mut manifest, sha) = self.load().await?;
        manifest.drafts.retain(|f| f != filename);
        if !manifest.is_published(filename) {
            manifest.published.push(filename.to_string());
        }
        self.save(&manifest, sha.as_deref()).await
    }

    /// Move a filename from published back to drafts.
    pub async fn unpublish_post(&self, filename: &str) -> Result<(), SourceError> {
        let (mut manifest, sha) = self.load().await?;
        manifest.published.retain(|f| f != filename);
        if !manifest.is_draft(filename) {
            manifest.drafts.push(filename.to_string());
        }
        self.save(&manifest, sha.as_deref()).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::infra::files::StoredFile;

    use super::*;

    /// In-memory store with sha-checked writes, mirroring the backing
    /// store's optimistic-concurrency rules.
    #[derive(Default)]
    struct FakeStore {
        files: Mutex<HashMap<String, (String, u64)>>,
        writes: AtomicUsize,
    }

    impl FakeStore {
        fn seed(&self, path: &str, text: &str) {
            self.files
                .lock()
                .expect("files lock")
                .insert(path.to_string(), (text.to_string(), 1));
        }

        fn write_count(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FileStore for FakeStore {
        async fn read_file(&self, path: &str) -> Result<Option<StoredFile>, SourceError> {
            Ok(self
                .files
                .lock()
                .expect("files lock")
                .get(path)
                .map(|(text, version)| StoredFile::new(text.clone(), Some(format!("v{version}")))))
        }

        async fn write_file(
            &self,
            path: &str,
            text: &str,
            sha: Option<&str>,
            _message: &str,
        ) -> Result<(), SourceError> {
            let mut files = self.files.lock().expect("files lock");
            let next = match files.get(path) {
                Some((_, version)) => {
                    if sha != Some(format!("v{version}").as_str()) {
                        return Err(SourceError::api(409, "sha mismatch"));
                    }
                    version + 1
                }
                None => {
                    if sha.is_some() {
                        return Err(SourceError::api(422, "sha given for new file"));
                    }
                    1
                }
            };
            files.insert(path.to_string(), (text.to_string(), next));
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn missing_manifest_loads_as_empty() {
        let store = FakeStore::default();
        let manager = ManifestManager::new(&store);

        let (manifest, sha) = manager.load().await.expect("load");
        assert_eq!(manifest, BlogManifest::default());
        assert!(sha.is_none());
    }

    #[tokio::test]
    async fn legacy_shape_migrates_on_load() {
        let store = FakeStore::default();
        store.seed(paths::MANIFEST, r#"{"files":["a.md","b.md"]}"#);
        let manager = ManifestManager::new(&store);

        let (manifest, sha) = manager.load().await.expect("load");
        assert_eq!(manifest.published, vec!["a.md", "b.md"]);
        assert!(manifest.drafts.is_empty());
        assert_eq!(sha.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn add_post_is_idempotent() {
        let store = FakeStore::default();
        let manager = ManifestManager::new(&store);

        manager.add_post("x.md").await.expect("first add");
        manager.add_post("x.md").await.expect("second add");

        assert_eq!(store.write_count(), 1);
        let (manifest, _) = manager.load().await.expect("load");
        assert_eq!(manifest.published, vec!["x.md"]);
    }

    #[tokio::test]
    async fn remove_post_writes_even_when_absent() {
        let store = FakeStore::default();
        store.seed(paths::MANIFEST, r#"{"published":["a.md"],"drafts":[]}"#);
        let manager = ManifestManager::new(&store);

        manager.remove_post("missing.md").await.expect("remove");

        assert_eq!(store.write_count(), 1);
        let (manifest, _) = manager.load().await.expect("load");
        assert_eq!(manifest.published, vec!["a.md"]);
    }

    #[tokio::test]
    async fn publish_draft_moves_filename() {
        let store = FakeStore::default();
        store.seed(paths::MANIFEST, r#"{"published":[],"drafts":["d.md"]}"#);
        let manager = ManifestManager::new(&store);

        manager.publish_draft("d.md").await.expect("publish");

        let (manifest, _) = manager.load().await.expect("load");
        assert_eq!(manifest.published, vec!["d.md"]);
        assert!(manifest.drafts.is_empty());
    }

    #[tokio::test]
    async fn unpublish_post_moves_filename_back() {
        let store = FakeStore::default();
        store.seed(paths::MANIFEST, r#"{"published":["p.md"],"drafts":[]}"#);
        let manager = ManifestManager::new(&store);

        manager.unpublish_post("p.md").await.expect("unpublish");

        let (manifest, _) = manager.load().await.expect("load");
        assert!(manifest.published.is_empty());
        assert_eq!(manifest.drafts, vec!["p.md"]);
    }

    #[tokio::test]
    async fn ensure_exists_materializes_missing_manifest() {
        let store = FakeStore::default();
        let manager = ManifestManager::new(&store);

        manager.ensure_exists().await.expect("ensure");
        manager.ensure_exists().await.expect("ensure again");

        // The second call found a sha and wrote nothing.
        assert_eq!(store.write_count(), 1);
        let (_, sha) = manager.load().await.expect("load");
        assert_eq!(sha.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn parse_errors_propagate() {
        let store = FakeStore::default();
        store.seed(paths::MANIFEST, "not json");
        let manager = ManifestManager::new(&store);

        let error = manager.load().await.expect_err("should fail");
        assert!(matches!(error, SourceError::Decode { .. }));
    }
}
