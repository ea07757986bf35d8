//! Typed cache sections for content resources.
//!
//! Every section keys by the resource's repository address
//! (`{owner}/{repo}/{path}`), so multiple owners share one cache without
//! crosstalk and a router swap never serves another repository's content.

use std::future::Future;
use std::sync::Arc;

use crate::application::source::SourceError;
use crate::domain::entities::{BlogPost, Likes, Memo, RepoTarget, SiteConfig};
use crate::domain::paths;

use super::config::CacheConfig;
use super::flight::FlightMap;

/// The injectable content cache: one instance per process (or per test),
/// passed to every backend that reads content.
pub struct ContentCache {
    posts: FlightMap<String, Vec<BlogPost>>,
    post: FlightMap<String, Option<BlogPost>>,
    memos: FlightMap<String, Vec<Memo>>,
    site_config: FlightMap<String, SiteConfig>,
    likes: FlightMap<String, Likes>,
}

impl ContentCache {
    pub fn new(config: &CacheConfig) -> Self {
        let collections = config.collection_limit_non_zero();
        Self {
            posts: FlightMap::new(collections, config.ttl),
            post: FlightMap::new(config.post_limit_non_zero(), config.ttl),
            memos: FlightMap::new(collections, config.ttl),
            site_config: FlightMap::new(collections, config.ttl),
            likes: FlightMap::new(collections, config.ttl),
        }
    }

    /// Convenience constructor for the common shared-handle shape.
    pub fn shared(config: &CacheConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    pub async fn posts<F, Fut>(
        &self,
        target: &RepoTarget,
        load: F,
    ) -> Result<Vec<BlogPost>, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<BlogPost>, SourceError>> + Send + 'static,
    {
        self.posts
            .get_or_fetch(target.resource_key(paths::BLOG_DIR), load)
            .await
    }

    pub async fn post<F, Fut>(
        &self,
        target: &RepoTarget,
        filename: &str,
        load: F,
    ) -> Result<Option<BlogPost>, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<BlogPost>, SourceError>> + Send + 'static,
    {
        self.post
            .get_or_fetch(target.resource_key(&paths::blog_file(filename)), load)
            .await
    }

    pub async fn memos<F, Fut>(&self, target: &RepoTarget, load: F) -> Result<Vec<Memo>, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Memo>, SourceError>> + Send + 'static,
    {
        self.memos
            .get_or_fetch(target.resource_key(paths::MEMOS), load)
            .await
    }

    pub async fn site_config<F, Fut>(
        &self,
        target: &RepoTarget,
        load: F,
    ) -> Result<SiteConfig, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SiteConfig, SourceError>> + Send + 'static,
    {
        self.site_config
            .get_or_fetch(target.resource_key(paths::SITE_CONFIG), load)
            .await
    }

    pub async fn likes<F, Fut>(&self, target: &RepoTarget, load: F) -> Result<Likes, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Likes, SourceError>> + Send + 'static,
    {
        self.likes
            .get_or_fetch(target.resource_key(paths::LIKES), load)
            .await
    }

    /// Drop every resolved entry across all sections.
    pub fn clear(&self) {
        self.posts.clear();
        self.post.clear();
        self.memos.clear();
        self.site_config.clear();
        self.likes.clear();
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn sample_memo(id: &str) -> Memo {
        Memo {
            id: id.to_string(),
            content: "note".to_string(),
            timestamp: datetime!(2024-01-01 00:00:00 UTC),
            image: None,
        }
    }

    #[tokio::test]
    async fn sections_are_keyed_by_owner() {
        let cache = ContentCache::default();
        let a = RepoTarget::new("alice", "journal");
        let b = RepoTarget::new("bob", "journal");

        let memos_a = cache
            .memos(&a, || async { Ok(vec![sample_memo("1")]) })
            .await
            .expect("alice memos");
        let memos_b = cache
            .memos(&b, || async { Ok(vec![sample_memo("2")]) })
            .await
            .expect("bob memos");

        assert_eq!(memos_a[0].id, "1");
        assert_eq!(memos_b[0].id, "2");
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let cache = ContentCache::default();
        let target = RepoTarget::new("alice", "journal");

        cache
            .likes(&target, || async {
                Ok(Likes {
                    counts: [("hello".to_string(), 2)].into(),
                })
            })
            .await
            .expect("first");
        let cached = cache
            .likes(&target, || async {
                Err(SourceError::http("loader must not run for a live entry"))
            })
            .await
            .expect("cached");

        assert_eq!(cached.counts.get("hello"), Some(&2));
    }

    #[tokio::test]
    async fn clear_forgets_resolved_entries() {
        let cache = ContentCache::default();
        let target = RepoTarget::new("alice", "journal");

        cache
            .site_config(&target, || async { Ok(SiteConfig::default()) })
            .await
            .expect("first");
        cache.clear();

        let reloaded = cache
            .site_config(&target, || async {
                Ok(SiteConfig {
                    links: [("blog".to_string(), "https://example.com".to_string())].into(),
                })
            })
            .await
            .expect("reloaded");
        assert_eq!(reloaded.links.len(), 1);
    }
}
