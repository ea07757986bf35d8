//! Domain entities mirrored from repository files.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

/// A blog post backed by one markdown file under `data/blog/`.
///
/// `content` carries the full raw file text, front matter included; `date`
/// and `title` are the parsed front-matter values. Identity is `id`, the
/// percent-decoded filename without extension, unique per owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discussions: Vec<Discussion>,
}

impl BlogPost {
    /// Build a post from its repository file.
    ///
    /// Title falls back to the id (the filename) when the front matter has
    /// none; the first markdown image in the content becomes `image_url`.
    pub fn from_file(id: impl Into<String>, content: String) -> Self {
        let id = id.into();
        let metadata = super::frontmatter::parse_post_metadata(&content);
        let title = if metadata.title.is_empty() {
            id.clone()
        } else {
            metadata.title
        };
        let image_url = super::frontmatter::first_image_url(&content);
        Self {
            id,
            title,
            content,
            image_url,
            date: metadata.date,
            discussions: metadata.discussions,
        }
    }
}

/// An external discussion thread referenced from a post's front matter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discussion {
    pub platform: String,
    pub url: String,
}

/// A short note, stored newest-first in one JSON array per owner.
///
/// `id` is a numeric-string timestamp by convention; the list order is
/// insertion order at the front, not a sort by `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memo {
    pub id: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Discovery index listing known post filenames.
///
/// The raw-content CDN cannot enumerate a directory, so this file is the
/// authoritative source for which posts exist. The legacy single-list shape
/// (`{"files": [...]}`) deserializes transparently into `published`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlogManifest {
    pub published: Vec<String>,
    pub drafts: Vec<String>,
}

impl BlogManifest {
    pub fn is_published(&self, filename: &str) -> bool {
        self.published.iter().any(|f| f == filename)
    }

    pub fn is_draft(&self, filename: &str) -> bool {
        self.drafts.iter().any(|f| f == filename)
    }
}

impl<'de> Deserialize<'de> for BlogManifest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Legacy must be tried first: the current shape's fields are both
        // defaulted, so it would also accept `{"files": [...]}` and lose the
        // filenames.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Legacy {
                files: Vec<String>,
            },
            Current {
                #[serde(default)]
                published: Vec<String>,
                #[serde(default)]
                drafts: Vec<String>,
            },
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Legacy { files } => BlogManifest {
                published: files,
                drafts: Vec::new(),
            },
            Wire::Current { published, drafts } => BlogManifest { published, drafts },
        })
    }
}

/// Site configuration document; currently just the link collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub links: BTreeMap<String, String>,
}

/// Like counts keyed by post id.
///
/// The fingerprinting that decides *whether* a like counts happens outside
/// this crate; here the document is read and replaced whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Likes {
    #[serde(flatten)]
    pub counts: BTreeMap<String, u64>,
}

/// The repository a set of content lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoTarget {
    pub owner: String,
    pub repo: String,
}

impl RepoTarget {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Cache key prefix for this repository: `{owner}/{repo}`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Cache key for one resource path: `{owner}/{repo}/{path}`.
    pub fn resource_key(&self, path: &str) -> String {
        format!("{}/{}/{}", self.owner, self.repo, path)
    }
}
