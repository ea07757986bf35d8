//! Local directory backend for development.
//!
//! Reads and writes the same `data/` tree a content repository carries, so a
//! checkout of the repository doubles as the dev content source. Unlike the
//! raw CDN, a directory can be listed, but post writes still maintain the
//! manifest to keep dev and prod shape-compatible.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::fs;
use tracing::{debug, warn};

use crate::application::source::{ContentSource, MemoUpdate, NewPost, PostUpdate, SourceError};
use crate::cache::ContentCache;
use crate::domain::entities::{BlogPost, Likes, Memo, RepoTarget, SiteConfig};
use crate::domain::frontmatter;
use crate::domain::paths;
use crate::infra::files::{FileStore, StoredFile};
use crate::infra::github::ManifestManager;

/// Owner name used when no owner is configured for local development.
pub const LOCAL_OWNER: &str = "local";

pub struct LocalStore {
    inner: Arc<LocalInner>,
    cache: Arc<ContentCache>,
    target: RepoTarget,
}

struct LocalInner {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(
        root: impl Into<PathBuf>,
        owner: Option<&str>,
        repo: impl Into<String>,
        cache: Arc<ContentCache>,
    ) -> Self {
        Self {
            inner: Arc::new(LocalInner { root: root.into() }),
            cache,
            target: RepoTarget::new(owner.unwrap_or(LOCAL_OWNER), repo),
        }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.inner.root
    }

    async fn sync_manifest<F, Fut>(&self, op: &'static str, apply: F)
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<(), SourceError>>,
    {
        if let Err(error) = apply().await {
            warn!(%error, op, "manifest sync failed after local write");
        }
    }
}

impl LocalInner {
    fn absolute(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    async fn read_text(&self, path: &str) -> Result<Option<String>, SourceError> {
        match fs::read_to_string(self.absolute(path)).await {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(SourceError::io(err)),
        }
    }

    async fn write_text(&self, path: &str, text: &str) -> Result<(), SourceError> {
        let absolute = self.absolute(path);
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await.map_err(SourceError::io)?;
        }
        fs::write(absolute, text).await.map_err(SourceError::io)
    }

    async fn remove(&self, path: &str) -> Result<(), SourceError> {
        match fs::remove_file(self.absolute(path)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(SourceError::NotFound),
            Err(err) => Err(SourceError::io(err)),
        }
    }

    async fn load_posts(&self) -> Result<Vec<BlogPost>, SourceError> {
        let dir = self.absolute(paths::BLOG_DIR);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(SourceError::io(err)),
        };

        let mut posts = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(SourceError::io)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(id) = paths::post_id(&name) else {
                continue;
            };
            let text = fs::read_to_string(entry.path())
                .await
                .map_err(SourceError::io)?;
            posts.push(BlogPost::from_file(id, text));
        }
        Ok(posts)
    }

    async fn load_post(&self, id: &str) -> Result<Option<BlogPost>, SourceError> {
        let text = self.read_text(&paths::blog_post(id)).await?;
        Ok(text.map(|text| BlogPost::from_file(id, text)))
    }

    async fn load_memos_lenient(&self) -> Vec<Memo> {
        match self.read_text(paths::MEMOS).await {
            Ok(Some(text)) => serde_json::from_str(&text).unwrap_or_else(|error| {
                debug!(%error, "memos file unreadable; treating as empty");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(error) => {
                debug!(%error, "memos read failed; treating as empty");
                Vec::new()
            }
        }
    }

    /// Strict memo read for write paths: a malformed list must fail the
    /// write rather than be silently replaced.
    async fn load_memos_strict(&self) -> Result<Vec<Memo>, SourceError> {
        match self.read_text(paths::MEMOS).await? {
            Some(text) => serde_json::from_str(&text).map_err(SourceError::decode),
            None => Ok(Vec::new()),
        }
    }

    async fn store_memos(&self, memos: &[Memo]) -> Result<(), SourceError> {
        let text = serde_json::to_string_pretty(memos).map_err(SourceError::decode)?;
        self.write_text(paths::MEMOS, &text).await
    }
}

#[async_trait]
impl FileStore for LocalStore {
    async fn read_file(&self, path: &str) -> Result<Option<StoredFile>, SourceError> {
        let text = self.inner.read_text(path).await?;
        Ok(text.map(|text| {
            // Content fingerprint in place of a real version id; the local
            // store does not enforce it on write.
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            StoredFile::new(text, Some(format!("{:016x}", hasher.finish())))
        }))
    }

    async fn write_file(
        &self,
        path: &str,
        text: &str,
        _sha: Option<&str>,
        _message: &str,
    ) -> Result<(), SourceError> {
        self.inner.write_text(path, text).await
    }
}

#[async_trait]
impl ContentSource for LocalStore {
    async fn blog_posts(&self) -> Result<Vec<BlogPost>, SourceError> {
        let inner = Arc::clone(&self.inner);
        self.cache
            .posts(&self.target, move || async move { inner.load_posts().await })
            .await
    }

    async fn blog_post(&self, id: &str) -> Result<Option<BlogPost>, SourceError> {
        let inner = Arc::clone(&self.inner);
        let id_owned = id.to_string();
        self.cache
            .post(&self.target, &paths::post_filename(id), move || async move {
                inner.load_post(&id_owned).await
            })
            .await
    }

    async fn memos(&self) -> Result<Vec<Memo>, SourceError> {
        let inner = Arc::clone(&self.inner);
        self.cache
            .memos(&self.target, move || async move {
                Ok(inner.load_memos_lenient().await)
            })
            .await
    }

    async fn site_config(&self) -> Result<SiteConfig, SourceError> {
        let inner = Arc::clone(&self.inner);
        self.cache
            .site_config(&self.target, move || async move {
                match inner.read_text(paths::SITE_CONFIG).await? {
                    Some(text) => serde_json::from_str(&text).map_err(SourceError::decode),
                    None => Ok(SiteConfig::default()),
                }
            })
            .await
    }

    async fn likes(&self) -> Result<Likes, SourceError> {
        let inner = Arc::clone(&self.inner);
        self.cache
            .likes(&self.target, move || async move {
                match inner.read_text(paths::LIKES).await? {
                    Some(text) => serde_json::from_str(&text).map_err(SourceError::decode),
                    None => Ok(Likes::default()),
                }
            })
            .await
    }

    async fn create_blog_post(&self, post: NewPost) -> Result<BlogPost, SourceError> {
        let content = frontmatter::compose(
            &post.title,
            OffsetDateTime::now_utc(),
            &post.discussions,
            &post.body,
        );
        self.inner
            .write_text(&paths::blog_post(&post.title), &content)
            .await?;

        let filename = paths::post_filename(&post.title);
        self.sync_manifest("add_post", || async move {
            let manager = ManifestManager::new(self);
            manager.ensure_exists().await?;
            manager.add_post(&filename).await
        })
        .await;

        Ok(BlogPost::from_file(post.title.clone(), content))
    }

    async fn update_blog_post(
        &self,
        id: &str,
        update: PostUpdate,
    ) -> Result<BlogPost, SourceError> {
        let existing = self
            .inner
            .read_text(&paths::blog_post(id))
            .await?
            .ok_or(SourceError::NotFound)?;
        let original = frontmatter::parse_post_metadata(&existing);

        let content = frontmatter::compose(
            &update.title,
            original.date,
            &original.discussions,
            &update.body,
        );
        self.inner
            .write_text(&paths::blog_post(id), &content)
            .await?;
        Ok(BlogPost::from_file(id, content))
    }

    async fn delete_blog_post(&self, id: &str) -> Result<(), SourceError> {
        self.inner.remove(&paths::blog_post(id)).await?;

        let filename = paths::post_filename(id);
        self.sync_manifest("remove_post", || async move {
            ManifestManager::new(self).remove_post(&filename).await
        })
        .await;
        Ok(())
    }

    async fn create_memo(&self, memo: Memo) -> Result<Memo, SourceError> {
        let mut memos = self.inner.load_memos_strict().await?;
        memos.insert(0, memo.clone());
        self.inner.store_memos(&memos).await?;
        Ok(memo)
    }

    async fn update_memo(&self, id: &str, update: MemoUpdate) -> Result<Memo, SourceError> {
        let mut memos = self.inner.load_memos_strict().await?;
        let memo = memos
            .iter_mut()
            .find(|memo| memo.id == id)
            .ok_or(SourceError::NotFound)?;
        memo.content = update.content;
        memo.image = update.image;
        let updated = memo.clone();
        self.inner.store_memos(&memos).await?;
        Ok(updated)
    }

    async fn delete_memo(&self, id: &str) -> Result<(), SourceError> {
        let mut memos = self.inner.load_memos_strict().await?;
        let before = memos.len();
        memos.retain(|memo| memo.id != id);
        if memos.len() == before {
            return Err(SourceError::NotFound);
        }
        self.inner.store_memos(&memos).await
    }

    async fn update_likes(&self, likes: Likes) -> Result<Likes, SourceError> {
        let text = serde_json::to_string_pretty(&likes).map_err(SourceError::decode)?;
        self.inner.write_text(paths::LIKES, &text).await?;
        Ok(likes)
    }
}
