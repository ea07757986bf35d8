//! Foglio: a GitHub-backed content client for personal blogs and
//! micro-journals.
//!
//! All content (blog posts, short memos, likes, site links) lives as files
//! in a GitHub repository. Three backends serve it: a local directory for
//! development, the authenticated REST API for full read/write, and the
//! raw-content CDN for anonymous, rate-limit-free reads. One router fronts
//! them behind a single [`application::source::ContentSource`] interface,
//! and an injectable [`cache::ContentCache`] collapses concurrent fetches
//! for the same resource into one upstream call.
//!
//! ```no_run
//! use foglio::application::router::ContentRouter;
//! use foglio::application::source::ContentSource;
//! use foglio::cache::{CacheConfig, ContentCache};
//! use foglio::config::{self, Overrides};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = config::load(None, &Overrides::default())?;
//! let cache = ContentCache::shared(&CacheConfig::from(&settings.cache));
//! let router = ContentRouter::new(settings.router_options(), cache)?;
//!
//! let mut posts = router.blog_posts().await?;
//! posts.sort_by(|a, b| b.date.cmp(&a.date));
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;

pub use application::router::{ContentRouter, RouterOptions, SelectedBackend, SourceMode};
pub use application::source::{ContentSource, MemoUpdate, NewPost, PostUpdate, SourceError};
pub use cache::{CacheConfig, ContentCache};
pub use domain::entities::{BlogManifest, BlogPost, Discussion, Likes, Memo, SiteConfig};
