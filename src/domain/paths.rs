//! Content addressing: how logical resources map onto repository paths.
//!
//! Every backend (local directory, REST API, raw-content CDN) realizes the
//! same path scheme, so a resource fetched through one backend is found at
//! the identical location by the others.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Directory holding one markdown file per blog post.
pub const BLOG_DIR: &str = "data/blog";
/// Discovery index for backends that cannot list a directory.
pub const MANIFEST: &str = "data/blog-manifest.json";
/// Single JSON document holding all memos, newest first.
pub const MEMOS: &str = "data/memos.json";
/// Site configuration, currently the link collection.
pub const SITE_CONFIG: &str = "data/site-config.json";
/// Like counts keyed by post id.
pub const LIKES: &str = "data/likes.json";

/// Placeholder file kept in otherwise-empty directories; never a post.
pub const PLACEHOLDER: &str = ".gitkeep";

// Mirrors `encodeURIComponent`: everything except unreserved characters.
const FILENAME_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Repository filename for a post id (percent-encoded, `.md` appended).
pub fn post_filename(id: &str) -> String {
    format!("{}.md", utf8_percent_encode(id, FILENAME_ENCODE))
}

/// Full repository path for a post id.
pub fn blog_post(id: &str) -> String {
    format!("{BLOG_DIR}/{}", post_filename(id))
}

/// Full repository path for an already-encoded filename (as listed in the
/// manifest or a directory listing).
pub fn blog_file(filename: &str) -> String {
    format!("{BLOG_DIR}/{filename}")
}

/// Post id for a repository filename: extension stripped, percent-decoded.
///
/// Returns `None` for files that are not markdown posts (wrong extension or
/// the directory placeholder).
pub fn post_id(filename: &str) -> Option<String> {
    if filename == PLACEHOLDER {
        return None;
    }
    let stem = filename.strip_suffix(".md")?;
    Some(percent_decode_str(stem).decode_utf8_lossy().into_owned())
}
