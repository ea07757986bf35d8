//! End-to-end flows over the local directory backend.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use time::macros::datetime;
use url::Url;

use foglio::application::router::{ContentRouter, RouterOptions, SourceMode};
use foglio::application::source::{ContentSource, MemoUpdate, NewPost, PostUpdate, SourceError};
use foglio::cache::{CacheConfig, ContentCache};
use foglio::domain::entities::{Likes, Memo};

fn local_router(dir: &TempDir, cache: Arc<ContentCache>) -> ContentRouter {
    ContentRouter::new(
        RouterOptions {
            mode: SourceMode::Local,
            token: None,
            owner: Some("tester".to_string()),
            repo: "journal".to_string(),
            branch: "main".to_string(),
            api_base: Url::parse("https://api.github.com").expect("api base"),
            raw_base: Url::parse("https://raw.githubusercontent.com").expect("raw base"),
            local_dir: dir.path().to_path_buf(),
            http_timeout: Duration::from_secs(5),
        },
        cache,
    )
    .expect("router")
}

fn sample_memo(id: &str, content: &str, day: u8) -> Memo {
    Memo {
        id: id.to_string(),
        content: content.to_string(),
        timestamp: datetime!(2024-01-01 00:00:00 UTC).replace_day(day).expect("day"),
        image: None,
    }
}

#[tokio::test]
async fn post_lifecycle_maintains_the_manifest() {
    let dir = TempDir::new().expect("tempdir");
    let cache = ContentCache::shared(&CacheConfig::default());
    let router = local_router(&dir, Arc::clone(&cache));

    router
        .create_blog_post(NewPost {
            title: "hello-world".to_string(),
            body: "First!".to_string(),
            discussions: Vec::new(),
        })
        .await
        .expect("create first");
    router
        .create_blog_post(NewPost {
            title: "why rust".to_string(),
            body: "Because.".to_string(),
            discussions: Vec::new(),
        })
        .await
        .expect("create second");

    // Filenames are percent-encoded on disk, exactly as in the repository.
    assert!(dir.path().join("data/blog/hello-world.md").exists());
    assert!(dir.path().join("data/blog/why%20rust.md").exists());

    let mut posts = router.blog_posts().await.expect("list");
    posts.sort_by(|a, b| a.id.cmp(&b.id));
    let ids: Vec<&str> = posts.iter().map(|post| post.id.as_str()).collect();
    assert_eq!(ids, vec!["hello-world", "why rust"]);

    let manifest = router.manifest().await.expect("manifest");
    assert_eq!(manifest.published, vec!["hello-world.md", "why%20rust.md"]);
    assert!(manifest.drafts.is_empty());

    router
        .delete_blog_post("hello-world")
        .await
        .expect("delete");
    cache.clear();

    let posts = router.blog_posts().await.expect("list after delete");
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id, "why rust");

    let manifest = router.manifest().await.expect("manifest after delete");
    assert_eq!(manifest.published, vec!["why%20rust.md"]);
}

#[tokio::test]
async fn updating_a_post_preserves_its_creation_date() {
    let dir = TempDir::new().expect("tempdir");
    let cache = ContentCache::shared(&CacheConfig::default());
    let router = local_router(&dir, cache);

    let created = router
        .create_blog_post(NewPost {
            title: "evergreen".to_string(),
            body: "v1".to_string(),
            discussions: Vec::new(),
        })
        .await
        .expect("create");

    let updated = router
        .update_blog_post(
            "evergreen",
            PostUpdate {
                title: "Evergreen, revised".to_string(),
                body: "v2".to_string(),
            },
        )
        .await
        .expect("update");

    assert_eq!(updated.date, created.date);
    assert_eq!(updated.title, "Evergreen, revised");
    assert!(updated.content.ends_with("v2"));
}

#[tokio::test]
async fn creating_a_memo_prepends_to_the_list() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("data")).expect("data dir");
    std::fs::write(
        dir.path().join("data/memos.json"),
        r#"[{"id":"1","content":"a","timestamp":"2024-01-01T00:00:00Z"}]"#,
    )
    .expect("seed memos");

    let cache = ContentCache::shared(&CacheConfig::default());
    let router = local_router(&dir, cache);

    router
        .create_memo(sample_memo("2", "b", 2))
        .await
        .expect("create memo");

    let memos = router.memos().await.expect("memos");
    let ids: Vec<&str> = memos.iter().map(|memo| memo.id.as_str()).collect();
    assert_eq!(ids, vec!["2", "1"]);
    assert_eq!(memos[0].content, "b");
}

#[tokio::test]
async fn updating_a_missing_memo_is_an_error() {
    let dir = TempDir::new().expect("tempdir");
    let cache = ContentCache::shared(&CacheConfig::default());
    let router = local_router(&dir, cache);

    let error = router
        .update_memo(
            "nope",
            MemoUpdate {
                content: "updated".to_string(),
                image: None,
            },
        )
        .await
        .expect_err("should fail");
    assert_eq!(error, SourceError::NotFound);

    // The list read stays graceful: no memos file means no memos.
    assert!(router.memos().await.expect("memos").is_empty());
}

#[tokio::test]
async fn memo_update_and_delete_round_trip() {
    let dir = TempDir::new().expect("tempdir");
    let cache = ContentCache::shared(&CacheConfig::default());
    let router = local_router(&dir, Arc::clone(&cache));

    router
        .create_memo(sample_memo("10", "first", 1))
        .await
        .expect("create");
    router
        .create_memo(sample_memo("11", "second", 2))
        .await
        .expect("create");

    let updated = router
        .update_memo(
            "10",
            MemoUpdate {
                content: "first, edited".to_string(),
                image: Some("https://cdn.example.com/pic.png".to_string()),
            },
        )
        .await
        .expect("update");
    assert_eq!(updated.content, "first, edited");

    router.delete_memo("11").await.expect("delete");
    cache.clear();

    let memos = router.memos().await.expect("memos");
    assert_eq!(memos.len(), 1);
    assert_eq!(memos[0].id, "10");
    assert_eq!(memos[0].content, "first, edited");
    assert_eq!(
        memos[0].image.as_deref(),
        Some("https://cdn.example.com/pic.png")
    );
}

#[tokio::test]
async fn likes_and_links_read_and_write() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("data")).expect("data dir");
    std::fs::write(
        dir.path().join("data/site-config.json"),
        r#"{"links":{"sourcehut":"https://sr.ht/~tester"}}"#,
    )
    .expect("seed site config");

    let cache = ContentCache::shared(&CacheConfig::default());
    let router = local_router(&dir, cache);

    let site_config = router.site_config().await.expect("site config");
    assert_eq!(
        site_config.links.get("sourcehut").map(String::as_str),
        Some("https://sr.ht/~tester")
    );

    // No likes file yet reads as the empty default.
    assert!(router.likes().await.expect("likes").counts.is_empty());

    let likes = Likes {
        counts: [("hello-world".to_string(), 3)].into(),
    };
    let stored = router.update_likes(likes.clone()).await.expect("update");
    assert_eq!(stored, likes);

    let on_disk =
        std::fs::read_to_string(dir.path().join("data/likes.json")).expect("likes file");
    assert!(on_disk.contains("hello-world"));
}

#[tokio::test]
async fn reading_an_empty_content_dir_is_not_an_error() {
    let dir = TempDir::new().expect("tempdir");
    let cache = ContentCache::shared(&CacheConfig::default());
    let router = local_router(&dir, cache);

    assert!(router.blog_posts().await.expect("posts").is_empty());
    assert!(router.blog_post("missing").await.expect("post").is_none());
    assert!(router.memos().await.expect("memos").is_empty());
    assert!(router.manifest().await.expect("manifest").published.is_empty());
}
