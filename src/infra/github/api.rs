//! Authenticated GitHub REST client.
//!
//! Reads and writes content through the repository contents API with a user
//! access token. Every write is a read-modify-write against the store's
//! optimistic-concurrency check: the fetched sha accompanies the write, and
//! the store rejects a stale one. There is no automatic retry on conflict;
//! callers re-fetch and reapply.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::future::try_join_all;
use reqwest::{Client, Response, StatusCode, Url, header};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::application::source::{ContentSource, MemoUpdate, NewPost, PostUpdate, SourceError};
use crate::cache::ContentCache;
use crate::domain::entities::{BlogPost, Likes, Memo, RepoTarget, SiteConfig};
use crate::domain::frontmatter;
use crate::domain::paths;
use crate::infra::files::{FileStore, StoredFile};
use crate::infra::github::ManifestManager;

const GITHUB_JSON: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Clone)]
pub struct GitHubApiOptions {
    pub token: String,
    /// Owner of the content repository; resolved through `GET /user` when
    /// absent (one extra round trip, cached per client instance).
    pub owner: Option<String>,
    pub repo: String,
    pub api_base: Url,
    pub timeout: Duration,
}

pub struct GitHubApiClient {
    inner: Arc<ApiInner>,
    cache: Arc<ContentCache>,
}

struct ApiInner {
    http: Client,
    api_base: Url,
    token: String,
    owner: Option<String>,
    repo: String,
    login: OnceCell<String>,
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    sha: String,
    #[serde(rename = "type")]
    kind: String,
    content: Option<String>,
    encoding: Option<String>,
}

// A file fetch returns an object, a directory fetch an array of entries.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentPayload {
    Directory(Vec<ContentEntry>),
    File(Box<ContentEntry>),
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, Serialize)]
struct PutContentRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct DeleteContentRequest<'a> {
    message: &'a str,
    sha: &'a str,
}

impl GitHubApiClient {
    pub fn new(options: GitHubApiOptions, cache: Arc<ContentCache>) -> Result<Self, SourceError> {
        let http = super::http_client(options.timeout)?;
        Ok(Self {
            inner: Arc::new(ApiInner {
                http,
                api_base: options.api_base,
                token: options.token,
                owner: options.owner,
                repo: options.repo,
                login: OnceCell::new(),
            }),
            cache,
        })
    }

    /// List all posts for `owner` (the authenticated identity when `None`),
    /// fetched and parsed concurrently, unsorted.
    pub async fn blog_posts_for(&self, owner: Option<&str>) -> Result<Vec<BlogPost>, SourceError> {
        let owner = self.inner.resolve_owner(owner).await?;
        let target = RepoTarget::new(owner.clone(), self.inner.repo.clone());
        let inner = Arc::clone(&self.inner);
        self.cache
            .posts(&target, move || async move {
                inner.fetch_posts(&owner).await
            })
            .await
    }

    /// Fetch one post; `None` when the file is absent or the API returned
    /// something that is not a file (directory confusion, missing content).
    pub async fn blog_post_for(
        &self,
        id: &str,
        owner: Option<&str>,
    ) -> Result<Option<BlogPost>, SourceError> {
        let owner = self.inner.resolve_owner(owner).await?;
        let target = RepoTarget::new(owner.clone(), self.inner.repo.clone());
        let inner = Arc::clone(&self.inner);
        let id = id.to_string();
        self.cache
            .post(&target, &paths::post_filename(&id), move || async move {
                let file = inner.read_file(&owner, &paths::blog_post(&id)).await?;
                Ok(file.map(|file| BlogPost::from_file(id, file.text)))
            })
            .await
    }

    /// All memos for `owner`. Any failure reads as an empty list: a missing
    /// memos file is a normal initial state, not an error condition.
    pub async fn memos_for(&self, owner: Option<&str>) -> Result<Vec<Memo>, SourceError> {
        let owner = self.inner.resolve_owner(owner).await?;
        let target = RepoTarget::new(owner.clone(), self.inner.repo.clone());
        let inner = Arc::clone(&self.inner);
        self.cache
            .memos(&target, move || async move {
                let memos = match inner.read_file(&owner, paths::MEMOS).await {
                    Ok(Some(file)) => serde_json::from_str(&file.text).unwrap_or_else(|error| {
                        debug!(%error, "memos document unreadable; treating as empty");
                        Vec::new()
                    }),
                    Ok(None) => Vec::new(),
                    Err(error) => {
                        debug!(%error, "memos fetch failed; treating as empty");
                        Vec::new()
                    }
                };
                Ok(memos)
            })
            .await
    }

    async fn resolved_target(&self) -> Result<(String, RepoTarget), SourceError> {
        let owner = self.inner.resolve_owner(None).await?;
        let target = RepoTarget::new(owner.clone(), self.inner.repo.clone());
        Ok((owner, target))
    }

    // Manifest maintenance is a best-effort side effect of post writes: a
    // failure here must not fail the successful primary write.
    async fn sync_manifest<F, Fut>(&self, op: &'static str, apply: F)
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<(), SourceError>>,
    {
        if let Err(error) = apply().await {
            warn!(%error, op, "manifest sync failed after post write");
        }
    }
}

impl ApiInner {
    fn contents_url(&self, owner: &str, path: &str) -> Result<Url, SourceError> {
        self.api_base
            .join(&format!("repos/{owner}/{}/contents/{path}", self.repo))
            .map_err(SourceError::http)
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .bearer_auth(&self.token)
            .header(header::ACCEPT, GITHUB_JSON)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    async fn error_for(response: Response) -> SourceError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|body| body.message)
            .unwrap_or(body);
        SourceError::api(status, message)
    }

    async fn get_content(
        &self,
        owner: &str,
        path: &str,
    ) -> Result<Option<ContentPayload>, SourceError> {
        let url = self.contents_url(owner, path)?;
        let response = self.get(url).send().await.map_err(SourceError::http)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        let payload = response
            .json::<ContentPayload>()
            .await
            .map_err(SourceError::decode)?;
        Ok(Some(payload))
    }

    async fn read_file(&self, owner: &str, path: &str) -> Result<Option<StoredFile>, SourceError> {
        match self.get_content(owner, path).await? {
            Some(ContentPayload::File(entry)) => decode_entry(*entry),
            Some(ContentPayload::Directory(_)) | None => Ok(None),
        }
    }

    async fn list_dir(&self, owner: &str, path: &str) -> Result<Vec<ContentEntry>, SourceError> {
        match self.get_content(owner, path).await? {
            Some(ContentPayload::Directory(entries)) => Ok(entries),
            Some(ContentPayload::File(_)) => {
                warn!(path, "expected a directory, got a file; treating as empty");
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }

    async fn put_file(
        &self,
        owner: &str,
        path: &str,
        text: &str,
        sha: Option<&str>,
        message: &str,
    ) -> Result<(), SourceError> {
        let url = self.contents_url(owner, path)?;
        let body = PutContentRequest {
            message,
            content: BASE64.encode(text),
            sha,
        };
        let response = self
            .http
            .put(url)
            .bearer_auth(&self.token)
            .header(header::ACCEPT, GITHUB_JSON)
            .header("X-GitHub-Api-Version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(SourceError::http)?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        Ok(())
    }

    async fn delete_file(
        &self,
        owner: &str,
        path: &str,
        sha: &str,
        message: &str,
    ) -> Result<(), SourceError> {
        let url = self.contents_url(owner, path)?;
        let body = DeleteContentRequest { message, sha };
        let response = self
            .http
            .delete(url)
            .bearer_auth(&self.token)
            .header(header::ACCEPT, GITHUB_JSON)
            .header("X-GitHub-Api-Version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(SourceError::http)?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        Ok(())
    }

    async fn login(&self) -> Result<String, SourceError> {
        let login = self
            .login
            .get_or_try_init(|| async {
                let url = self.api_base.join("user").map_err(SourceError::http)?;
                let response = self.get(url).send().await.map_err(SourceError::http)?;
                if !response.status().is_success() {
                    return Err(Self::error_for(response).await);
                }
                let user = response
                    .json::<UserResponse>()
                    .await
                    .map_err(SourceError::decode)?;
                Ok(user.login)
            })
            .await?;
        Ok(login.clone())
    }

    async fn resolve_owner(&self, explicit: Option<&str>) -> Result<String, SourceError> {
        if let Some(owner) = explicit {
            return Ok(owner.to_string());
        }
        if let Some(owner) = &self.owner {
            return Ok(owner.clone());
        }
        self.login().await
    }

    async fn fetch_posts(&self, owner: &str) -> Result<Vec<BlogPost>, SourceError> {
        let entries = self.list_dir(owner, paths::BLOG_DIR).await?;
        let fetches = entries
            .into_iter()
            .filter_map(|entry| paths::post_id(&entry.name).map(|id| (id, entry.name)))
            .map(|(id, name)| async move {
                let file = self.read_file(owner, &paths::blog_file(&name)).await?;
                Ok::<_, SourceError>(file.map(|file| BlogPost::from_file(id, file.text)))
            });
        let posts = try_join_all(fetches).await?;
        Ok(posts.into_iter().flatten().collect())
    }

    async fn load_memos_strict(&self, owner: &str) -> Result<(Vec<Memo>, Option<String>), SourceError> {
        match self.read_file(owner, paths::MEMOS).await? {
            Some(file) => {
                let memos = serde_json::from_str(&file.text).map_err(SourceError::decode)?;
                Ok((memos, file.sha))
            }
            None => Ok((Vec::new(), None)),
        }
    }

    async fn store_memos(
        &self,
        owner: &str,
        memos: &[Memo],
        sha: Option<&str>,
        message: &str,
    ) -> Result<(), SourceError> {
        let text = serde_json::to_string_pretty(memos).map_err(SourceError::decode)?;
        self.put_file(owner, paths::MEMOS, &text, sha, message).await
    }
}

fn decode_entry(entry: ContentEntry) -> Result<Option<StoredFile>, SourceError> {
    if entry.kind != "file" {
        return Ok(None);
    }
    let Some(content) = entry.content else {
        return Ok(None);
    };
    if entry.encoding.as_deref() != Some("base64") {
        return Ok(None);
    }
    // The API wraps base64 payloads at 60 columns.
    let compact: String = content.split_whitespace().collect();
    let bytes = BASE64.decode(compact).map_err(SourceError::decode)?;
    let text = String::from_utf8(bytes).map_err(SourceError::decode)?;
    Ok(Some(StoredFile::new(text, Some(entry.sha))))
}

#[async_trait]
impl FileStore for GitHubApiClient {
    async fn read_file(&self, path: &str) -> Result<Option<StoredFile>, SourceError> {
        let owner = self.inner.resolve_owner(None).await?;
        self.inner.read_file(&owner, path).await
    }

    async fn write_file(
        &self,
        path: &str,
        text: &str,
        sha: Option<&str>,
        message: &str,
    ) -> Result<(), SourceError> {
        let owner = self.inner.resolve_owner(None).await?;
        self.inner.put_file(&owner, path, text, sha, message).await
    }
}

#[async_trait]
impl ContentSource for GitHubApiClient {
    async fn blog_posts(&self) -> Result<Vec<BlogPost>, SourceError> {
        self.blog_posts_for(None).await
    }

    async fn blog_post(&self, id: &str) -> Result<Option<BlogPost>, SourceError> {
        self.blog_post_for(id, None).await
    }

    async fn memos(&self) -> Result<Vec<Memo>, SourceError> {
        self.memos_for(None).await
    }

    async fn site_config(&self) -> Result<SiteConfig, SourceError> {
        let (owner, target) = self.resolved_target().await?;
        let inner = Arc::clone(&self.inner);
        self.cache
            .site_config(&target, move || async move {
                match inner.read_file(&owner, paths::SITE_CONFIG).await? {
                    Some(file) => serde_json::from_str(&file.text).map_err(SourceError::decode),
                    None => Ok(SiteConfig::default()),
                }
            })
            .await
    }

    async fn likes(&self) -> Result<Likes, SourceError> {
        let (owner, target) = self.resolved_target().await?;
        let inner = Arc::clone(&self.inner);
        self.cache
            .likes(&target, move || async move {
                match inner.read_file(&owner, paths::LIKES).await? {
                    Some(file) => serde_json::from_str(&file.text).map_err(SourceError::decode),
                    None => Ok(Likes::default()),
                }
            })
            .await
    }

    async fn create_blog_post(&self, post: NewPost) -> Result<BlogPost, SourceError> {
        let (owner, _) = self.resolved_target().await?;
        let path = paths::blog_post(&post.title);
        let existing = self.inner.read_file(&owner, &path).await?;
        let content = frontmatter::compose(
            &post.title,
            OffsetDateTime::now_utc(),
            &post.discussions,
            &post.body,
        );
        self.inner
            .put_file(
                &owner,
                &path,
                &content,
                existing.as_ref().and_then(|file| file.sha.as_deref()),
                &format!("Add post: {}", post.title),
            )
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
        let (owner, _) = self.resolved_target().await?;
        let path = paths::blog_post(id);
        let existing = self
            .inner
            .read_file(&owner, &path)
            .await?
            .ok_or(SourceError::NotFound)?;
        let original = frontmatter::parse_post_metadata(&existing.text);

        let content = frontmatter::compose(
            &update.title,
            original.date,
            &original.discussions,
            &update.body,
        );
        self.inner
            .put_file(
                &owner,
                &path,
                &content,
                existing.sha.as_deref(),
                &format!("Update post: {id}"),
            )
            .await?;
        Ok(BlogPost::from_file(id, content))
    }

    async fn delete_blog_post(&self, id: &str) -> Result<(), SourceError> {
        let (owner, _) = self.resolved_target().await?;
        let path = paths::blog_post(id);
        let existing = self
            .inner
            .read_file(&owner, &path)
            .await?
            .ok_or(SourceError::NotFound)?;
        let sha = existing.sha.ok_or(SourceError::NotFound)?;
        self.inner
            .delete_file(&owner, &path, &sha, &format!("Delete post: {id}"))
            .await?;

        let filename = paths::post_filename(id);
        self.sync_manifest("remove_post", || async move {
            ManifestManager::new(self).remove_post(&filename).await
        })
        .await;
        Ok(())
    }

    async fn create_memo(&self, memo: Memo) -> Result<Memo, SourceError> {
        let (owner, _) = self.resolved_target().await?;
        let (mut memos, sha) = self.inner.load_memos_strict(&owner).await?;
        memos.insert(0, memo.clone());
        self.inner
            .store_memos(&owner, &memos, sha.as_deref(), "Add memo")
            .await?;
        Ok(memo)
    }

    async fn update_memo(&self, id: &str, update: MemoUpdate) -> Result<Memo, SourceError> {
        let (owner, _) = self.resolved_target().await?;
        let (mut memos, sha) = self.inner.load_memos_strict(&owner).await?;
        let memo = memos
            .iter_mut()
            .find(|memo| memo.id == id)
            .ok_or(SourceError::NotFound)?;
        memo.content = update.content;
        memo.image = update.image;
        let updated = memo.clone();
        self.inner
            .store_memos(&owner, &memos, sha.as_deref(), "Update memo")
            .await?;
        Ok(updated)
    }

    async fn delete_memo(&self, id: &str) -> Result<(), SourceError> {
        let (owner, _) = self.resolved_target().await?;
        let (mut memos, sha) = self.inner.load_memos_strict(&owner).await?;
        let before = memos.len();
        memos.retain(|memo| memo.id != id);
        if memos.len() == before {
            return Err(SourceError::NotFound);
        }
        self.inner
            .store_memos(&owner, &memos, sha.as_deref(), "Delete memo")
            .await
    }

    async fn update_likes(&self, likes: Likes) -> Result<Likes, SourceError> {
        let (owner, _) = self.resolved_target().await?;
        let existing = self.inner.read_file(&owner, paths::LIKES).await?;
        let text = serde_json::to_string_pretty(&likes).map_err(SourceError::decode)?;
        self.inner
            .put_file(
                &owner,
                paths::LIKES,
                &text,
                existing.as_ref().and_then(|file| file.sha.as_deref()),
                "Update likes",
            )
            .await?;
        Ok(likes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_payload_deserializes() {
        let json = r#"{
            "name": "hello.md",
            "path": "data/blog/hello.md",
            "sha": "abc123",
            "type": "file",
            "content": "LS0tCnRp\ndGxlOiBI\n",
            "encoding": "base64"
        }"#;
        let payload: ContentPayload = serde_json::from_str(json).expect("payload");
        assert!(matches!(payload, ContentPayload::File(_)));
    }

    #[test]
    fn directory_payload_deserializes() {
        let json = r#"[
            {"name": "a.md", "path": "data/blog/a.md", "sha": "s1", "type": "file"},
            {"name": ".gitkeep", "path": "data/blog/.gitkeep", "sha": "s2", "type": "file"}
        ]"#;
        let payload: ContentPayload = serde_json::from_str(json).expect("payload");
        let ContentPayload::Directory(entries) = payload else {
            panic!("expected directory");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.md");
    }

    #[test]
    fn decode_entry_unwraps_wrapped_base64() {
        let entry = ContentEntry {
            name: "hello.md".to_string(),
            sha: "abc".to_string(),
            kind: "file".to_string(),
            content: Some("aGVsbG8g\nd29ybGQ=\n".to_string()),
            encoding: Some("base64".to_string()),
        };
        let file = decode_entry(entry).expect("decode").expect("file");
        assert_eq!(file.text, "hello world");
        assert_eq!(file.sha.as_deref(), Some("abc"));
    }

    #[test]
    fn decode_entry_treats_shape_mismatch_as_absent() {
        let no_content = ContentEntry {
            name: "hello.md".to_string(),
            sha: "abc".to_string(),
            kind: "file".to_string(),
            content: None,
            encoding: None,
        };
        assert_eq!(decode_entry(no_content).expect("decode"), None);

        let directory = ContentEntry {
            name: "blog".to_string(),
            sha: "abc".to_string(),
            kind: "dir".to_string(),
            content: None,
            encoding: None,
        };
        assert_eq!(decode_entry(directory).expect("decode"), None);
    }

    #[test]
    fn decode_entry_fails_on_corrupt_base64() {
        let entry = ContentEntry {
            name: "hello.md".to_string(),
            sha: "abc".to_string(),
            kind: "file".to_string(),
            content: Some("!!not base64!!".to_string()),
            encoding: Some("base64".to_string()),
        };
        let error = decode_entry(entry).expect_err("should fail");
        assert!(matches!(error, SourceError::Decode { .. }));
    }
}
