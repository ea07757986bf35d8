//! Unauthenticated raw-content client.
//!
//! Serves the same logical resources as the API client from the CDN that
//! mirrors raw repository files: no token, no API rate-limit exposure, and
//! read-only. The CDN cannot list a directory, so post discovery rides on
//! the manifest; a repository without one reads as an empty site.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, warn};

use crate::application::source::{ContentSource, MemoUpdate, NewPost, PostUpdate, SourceError};
use crate::cache::ContentCache;
use crate::domain::entities::{BlogManifest, BlogPost, Likes, Memo, RepoTarget, SiteConfig};
use crate::domain::paths;

#[derive(Debug, Clone)]
pub struct RawContentOptions {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub raw_base: Url,
    pub timeout: Duration,
}

pub struct RawContentClient {
    inner: Arc<RawInner>,
    cache: Arc<ContentCache>,
    target: RepoTarget,
}

struct RawInner {
    http: Client,
    raw_base: Url,
    owner: String,
    repo: String,
    branch: String,
}

impl RawContentClient {
    pub fn new(options: RawContentOptions, cache: Arc<ContentCache>) -> Result<Self, SourceError> {
        let http = super::http_client(options.timeout)?;
        let target = RepoTarget::new(options.owner.clone(), options.repo.clone());
        Ok(Self {
            inner: Arc::new(RawInner {
                http,
                raw_base: options.raw_base,
                owner: options.owner,
                repo: options.repo,
                branch: options.branch,
            }),
            cache,
            target,
        })
    }

    /// Fetch and parse the manifest; a missing file reads as the empty
    /// manifest.
    pub async fn manifest(&self) -> Result<BlogManifest, SourceError> {
        match self.inner.fetch_text(paths::MANIFEST).await? {
            Some(text) => serde_json::from_str(&text).map_err(SourceError::decode),
            None => Ok(BlogManifest::default()),
        }
    }

    fn read_only_error() -> SourceError {
        SourceError::auth_required("write operations require an access token")
    }
}

impl RawInner {
    fn url(&self, path: &str) -> Result<Url, SourceError> {
        self.raw_base
            .join(&format!(
                "{}/{}/{}/{path}",
                self.owner, self.repo, self.branch
            ))
            .map_err(SourceError::http)
    }

    /// GET one raw file; `Ok(None)` on 404.
    async fn fetch_text(&self, path: &str) -> Result<Option<String>, SourceError> {
        let url = self.url(path)?;
        let response = self.http.get(url).send().await.map_err(SourceError::http)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::api(status, body));
        }
        response.text().await.map(Some).map_err(SourceError::http)
    }

    async fn fetch_post(&self, filename: &str) -> Result<Option<BlogPost>, SourceError> {
        let Some(id) = paths::post_id(filename) else {
            return Ok(None);
        };
        let text = self.fetch_text(&paths::blog_file(filename)).await?;
        Ok(text.map(|text| BlogPost::from_file(id, text)))
    }

    async fn fetch_posts(&self) -> Result<Vec<BlogPost>, SourceError> {
        let Some(text) = self.fetch_text(paths::MANIFEST).await? else {
            warn!(
                owner = %self.owner,
                "no blog manifest in repository; publish a post to create it"
            );
            return Ok(Vec::new());
        };
        let manifest: BlogManifest =
            serde_json::from_str(&text).map_err(SourceError::decode)?;

        // Stale manifest entries and transient per-file failures drop out of
        // the listing silently; one bad file must not blank the whole site.
        let fetches = manifest.published.iter().map(|filename| async move {
            match self.fetch_post(filename).await {
                Ok(post) => post,
                Err(error) => {
                    debug!(%error, filename, "skipping unreadable post");
                    None
                }
            }
        });
        Ok(join_all(fetches).await.into_iter().flatten().collect())
    }
}

#[async_trait]
impl ContentSource for RawContentClient {
    async fn blog_posts(&self) -> Result<Vec<BlogPost>, SourceError> {
        let inner = Arc::clone(&self.inner);
        self.cache
            .posts(&self.target, move || async move {
                inner.fetch_posts().await
            })
            .await
    }

    async fn blog_post(&self, id: &str) -> Result<Option<BlogPost>, SourceError> {
        let inner = Arc::clone(&self.inner);
        let filename = paths::post_filename(id);
        let loader_filename = filename.clone();
        self.cache
            .post(&self.target, &filename, move || async move {
                inner.fetch_post(&loader_filename).await
            })
            .await
    }

    async fn memos(&self) -> Result<Vec<Memo>, SourceError> {
        let inner = Arc::clone(&self.inner);
        self.cache
            .memos(&self.target, move || async move {
                match inner.fetch_text(paths::MEMOS).await? {
                    Some(text) => serde_json::from_str(&text).map_err(SourceError::decode),
                    None => Ok(Vec::new()),
                }
            })
            .await
    }

    async fn site_config(&self) -> Result<SiteConfig, SourceError> {
        let inner = Arc::clone(&self.inner);
        self.cache
            .site_config(&self.target, move || async move {
                match inner.fetch_text(paths::SITE_CONFIG).await? {
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
                match inner.fetch_text(paths::LIKES).await? {
                    Some(text) => serde_json::from_str(&text).map_err(SourceError::decode),
                    None => Ok(Likes::default()),
                }
            })
            .await
    }

    async fn create_blog_post(&self, _post: NewPost) -> Result<BlogPost, SourceError> {
        Err(Self::read_only_error())
    }

    async fn update_blog_post(
        &self,
        _id: &str,
        _update: PostUpdate,
    ) -> Result<BlogPost, SourceError> {
        Err(Self::read_only_error())
    }

    async fn delete_blog_post(&self, _id: &str) -> Result<(), SourceError> {
        Err(Self::read_only_error())
    }

    async fn create_memo(&self, _memo: Memo) -> Result<Memo, SourceError> {
        Err(Self::read_only_error())
    }

    async fn update_memo(&self, _id: &str, _update: MemoUpdate) -> Result<Memo, SourceError> {
        Err(Self::read_only_error())
    }

    async fn delete_memo(&self, _id: &str) -> Result<(), SourceError> {
        Err(Self::read_only_error())
    }

    async fn update_likes(&self, _likes: Likes) -> Result<Likes, SourceError> {
        Err(Self::read_only_error())
    }
}
