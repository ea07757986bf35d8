//! The uniform interface every content backend implements.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{BlogPost, Discussion, Likes, Memo, SiteConfig};

/// Errors crossing the content-source seam.
///
/// Transport causes are stringified at the boundary so the error is `Clone`:
/// the cache hands one shared failure to every coalesced waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("resource not found")]
    NotFound,
    #[error("authentication required: {message}")]
    AuthenticationRequired { message: String },
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("http error: {message}")]
    Http { message: String },
    #[error("malformed content: {message}")]
    Decode { message: String },
    #[error("io error: {message}")]
    Io { message: String },
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl SourceError {
    pub fn auth_required(message: impl Into<String>) -> Self {
        Self::AuthenticationRequired {
            message: message.into(),
        }
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn http(err: impl std::fmt::Display) -> Self {
        Self::Http {
            message: err.to_string(),
        }
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode {
            message: err.to_string(),
        }
    }

    pub fn io(err: impl std::fmt::Display) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Input for creating a blog post. The post id is its title; the backend
/// composes the front matter (title, creation date, discussions) around the
/// body.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub discussions: Vec<Discussion>,
}

/// Replacement title and body for an existing post. The original creation
/// date is preserved by the backend.
#[derive(Debug, Clone)]
pub struct PostUpdate {
    pub title: String,
    pub body: String,
}

/// Replacement content for an existing memo.
#[derive(Debug, Clone)]
pub struct MemoUpdate {
    pub content: String,
    pub image: Option<String>,
}

/// Uniform content interface over the local directory, the authenticated
/// GitHub API and the raw-content CDN.
///
/// Read methods distinguish expected absence (empty list / `None`) from
/// backend failure (`Err`); write methods on a read-only backend fail with
/// [`SourceError::AuthenticationRequired`] before any network traffic.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// All known posts, unsorted; callers order by date for display.
    async fn blog_posts(&self) -> Result<Vec<BlogPost>, SourceError>;

    /// One post by id; `None` when the file does not exist or the backend
    /// returned a shape that is not a file.
    async fn blog_post(&self, id: &str) -> Result<Option<BlogPost>, SourceError>;

    /// All memos, newest first. A missing memos file is a normal initial
    /// state and reads as empty.
    async fn memos(&self) -> Result<Vec<Memo>, SourceError>;

    /// Site configuration; missing file reads as the empty default.
    async fn site_config(&self) -> Result<SiteConfig, SourceError>;

    /// Like counts; missing file reads as the empty default.
    async fn likes(&self) -> Result<Likes, SourceError>;

    async fn create_blog_post(&self, post: NewPost) -> Result<BlogPost, SourceError>;

    async fn update_blog_post(&self, id: &str, update: PostUpdate)
    -> Result<BlogPost, SourceError>;

    async fn delete_blog_post(&self, id: &str) -> Result<(), SourceError>;

    /// Prepend a memo to the list. The list is insertion-ordered at the
    /// front, never re-sorted.
    async fn create_memo(&self, memo: Memo) -> Result<Memo, SourceError>;

    /// Replace an existing memo's content; absence is an error here, unlike
    /// the list read.
    async fn update_memo(&self, id: &str, update: MemoUpdate) -> Result<Memo, SourceError>;

    async fn delete_memo(&self, id: &str) -> Result<(), SourceError>;

    /// Replace the whole likes document.
    async fn update_likes(&self, likes: Likes) -> Result<Likes, SourceError>;
}
