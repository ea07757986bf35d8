//! Backend selection.
//!
//! The routing decision is explicit configuration, not ambient environment
//! sniffing: the mode and token arrive through the constructor, so selection
//! is deterministic and testable. Local mode serves development from a
//! directory; remote mode uses the authenticated API when a token is present
//! and falls back to the read-only raw-content CDN otherwise.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tracing::info;

use crate::cache::ContentCache;
use crate::domain::entities::{BlogManifest, BlogPost, Likes, Memo, SiteConfig};
use crate::infra::github::{
    GitHubApiClient, GitHubApiOptions, ManifestManager, RawContentClient, RawContentOptions,
};
use crate::infra::local::LocalStore;

use super::source::{ContentSource, MemoUpdate, NewPost, PostUpdate, SourceError};

/// Where content comes from: the development directory or GitHub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    Local,
    Remote,
}

/// Constructor inputs for [`ContentRouter`].
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub mode: SourceMode,
    pub token: Option<String>,
    pub owner: Option<String>,
    pub repo: String,
    pub branch: String,
    pub api_base: Url,
    pub raw_base: Url,
    pub local_dir: PathBuf,
    pub http_timeout: Duration,
}

/// The concrete backend a router resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectedBackend {
    Local,
    Api,
    Raw,
}

/// One uniform content interface in front of the three backends.
pub struct ContentRouter {
    backend: Backend,
}

impl std::fmt::Debug for ContentRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self.backend {
            Backend::Local(_) => "Local",
            Backend::Api(_) => "Api",
            Backend::Raw(_) => "Raw",
        };
        f.debug_struct("ContentRouter")
            .field("backend", &variant)
            .finish()
    }
}

enum Backend {
    Local(LocalStore),
    Api(GitHubApiClient),
    Raw(RawContentClient),
}

impl ContentRouter {
    /// Resolve the backend from the options.
    ///
    /// Remote mode without a token requires a configured owner: failing fast
    /// on missing identity surfaces the misconfiguration instead of masking
    /// it behind an empty site.
    pub fn new(options: RouterOptions, cache: Arc<ContentCache>) -> Result<Self, SourceError> {
        let backend = match options.mode {
            SourceMode::Local => Backend::Local(LocalStore::new(
                options.local_dir,
                options.owner.as_deref(),
                options.repo,
                cache,
            )),
            SourceMode::Remote => match options.token {
                Some(token) => Backend::Api(GitHubApiClient::new(
                    GitHubApiOptions {
                        token,
                        owner: options.owner,
                        repo: options.repo,
                        api_base: options.api_base,
                        timeout: options.http_timeout,
                    },
                    cache,
                )?),
                None => {
                    let owner = options.owner.ok_or_else(|| {
                        SourceError::configuration(
                            "no owner configured for unauthenticated access; \
                             set GITHUB_USERNAME or provide an access token",
                        )
                    })?;
                    Backend::Raw(RawContentClient::new(
                        RawContentOptions {
                            owner,
                            repo: options.repo,
                            branch: options.branch,
                            raw_base: options.raw_base,
                            timeout: options.http_timeout,
                        },
                        cache,
                    )?)
                }
            },
        };

        let router = Self { backend };
        info!(backend = ?router.backend(), "content router initialized");
        Ok(router)
    }

    fn source(&self) -> &dyn ContentSource {
        match &self.backend {
            Backend::Local(store) => store,
            Backend::Api(client) => client,
            Backend::Raw(client) => client,
        }
    }

    pub fn backend(&self) -> SelectedBackend {
        match &self.backend {
            Backend::Local(_) => SelectedBackend::Local,
            Backend::Api(_) => SelectedBackend::Api,
            Backend::Raw(_) => SelectedBackend::Raw,
        }
    }

    /// Whether write operations can succeed on the selected backend.
    pub fn writable(&self) -> bool {
        !matches!(self.backend, Backend::Raw(_))
    }

    /// Read the discovery manifest through the selected backend.
    pub async fn manifest(&self) -> Result<BlogManifest, SourceError> {
        match &self.backend {
            Backend::Local(store) => Ok(ManifestManager::new(store).load().await?.0),
            Backend::Api(client) => Ok(ManifestManager::new(client).load().await?.0),
            Backend::Raw(client) => client.manifest().await,
        }
    }

    /// Materialize the manifest upstream when it does not exist yet.
    pub async fn ensure_manifest(&self) -> Result<(), SourceError> {
        match &self.backend {
            Backend::Local(store) => ManifestManager::new(store).ensure_exists().await,
            Backend::Api(client) => ManifestManager::new(client).ensure_exists().await,
            Backend::Raw(_) => Err(SourceError::auth_required(
                "manifest creation requires an access token",
            )),
        }
    }
}

#[async_trait]
impl ContentSource for ContentRouter {
    async fn blog_posts(&self) -> Result<Vec<BlogPost>, SourceError> {
        self.source().blog_posts().await
    }

    async fn blog_post(&self, id: &str) -> Result<Option<BlogPost>, SourceError> {
        self.source().blog_post(id).await
    }

    async fn memos(&self) -> Result<Vec<Memo>, SourceError> {
        self.source().memos().await
    }

    async fn site_config(&self) -> Result<SiteConfig, SourceError> {
        self.source().site_config().await
    }

    async fn likes(&self) -> Result<Likes, SourceError> {
        self.source().likes().await
    }

    async fn create_blog_post(&self, post: NewPost) -> Result<BlogPost, SourceError> {
        self.source().create_blog_post(post).await
    }

    async fn update_blog_post(
        &self,
        id: &str,
        update: PostUpdate,
    ) -> Result<BlogPost, SourceError> {
        self.source().update_blog_post(id, update).await
    }

    async fn delete_blog_post(&self, id: &str) -> Result<(), SourceError> {
        self.source().delete_blog_post(id).await
    }

    async fn create_memo(&self, memo: Memo) -> Result<Memo, SourceError> {
        self.source().create_memo(memo).await
    }

    async fn update_memo(&self, id: &str, update: MemoUpdate) -> Result<Memo, SourceError> {
        self.source().update_memo(id, update).await
    }

    async fn delete_memo(&self, id: &str) -> Result<(), SourceError> {
        self.source().delete_memo(id).await
    }

    async fn update_likes(&self, likes: Likes) -> Result<Likes, SourceError> {
        self.source().update_likes(likes).await
    }
}
