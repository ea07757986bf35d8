//! Front-matter parsing for markdown post files.
//!
//! A post file may begin with a metadata block delimited by `---` lines:
//!
//! ```text
//! ---
//! title: Hello
//! date: 2024-01-01T00:00:00Z
//! external_discussions:
//!   - platform: hackernews
//!     url: https://news.ycombinator.com/item?id=1
//! ---
//!
//! body…
//! ```
//!
//! The helpers here are pure functions over the raw file text; no I/O and no
//! full YAML parser. The subset actually written by the editor (scalar
//! `key: value` lines plus one list of flat maps) is parsed directly.

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::entities::Discussion;

const FENCE: &str = "---\n";

/// A content blob split into its front-matter block and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted<'a> {
    pub frontmatter: &'a str,
    pub body: &'a str,
}

/// Metadata recovered from a post file's front matter.
#[derive(Debug, Clone, PartialEq)]
pub struct PostMetadata {
    pub title: String,
    pub date: OffsetDateTime,
    pub discussions: Vec<Discussion>,
}

/// Split content into front matter and body.
///
/// Content without a leading `---` fence comes back unchanged with an empty
/// front-matter half. The single conventional blank line after the closing
/// fence is not part of the body.
pub fn extract(content: &str) -> Extracted<'_> {
    let without_block = Extracted {
        frontmatter: "",
        body: content,
    };

    let Some(rest) = content.strip_prefix(FENCE) else {
        return without_block;
    };

    let Some((frontmatter, after)) = split_at_closing_fence(rest) else {
        return without_block;
    };

    Extracted {
        frontmatter,
        body: after.strip_prefix('\n').unwrap_or(after),
    }
}

/// Return only the body half of [`extract`].
pub fn strip(content: &str) -> &str {
    extract(content).body
}

/// Parse the `external_discussions` list from a front-matter block.
///
/// An entry is kept only when both `platform` and `url` are present; partial
/// entries are dropped, not defaulted. Order is preserved.
pub fn parse_external_discussions(frontmatter: &str) -> Vec<Discussion> {
    let mut discussions = Vec::new();
    let mut platform: Option<String> = None;
    let mut url: Option<String> = None;
    let mut in_list = false;

    for line in frontmatter.lines() {
        if !in_list {
            if line.trim_end() == "external_discussions:" {
                in_list = true;
            }
            continue;
        }

        let item = line.trim_start();
        if item.is_empty() {
            continue;
        }
        if !line.starts_with([' ', '\t']) {
            // Left the indented list; a later sibling key ends it.
            break;
        }

        let fields = if let Some(first) = item.strip_prefix("- ") {
            flush_entry(&mut discussions, &mut platform, &mut url);
            first
        } else {
            item
        };

        if let Some((key, value)) = scalar_field(fields) {
            match key {
                "platform" => platform = Some(value),
                "url" => url = Some(value),
                _ => {}
            }
        }
    }

    flush_entry(&mut discussions, &mut platform, &mut url);
    discussions
}

/// Parse title, date and discussions from a full post file.
///
/// Title defaults to the empty string (callers substitute the filename).
/// Date defaults to the current time when absent or unparsable; no
/// authoritative timestamp exists outside the front matter, so "now" is the
/// best available fallback.
pub fn parse_post_metadata(content: &str) -> PostMetadata {
    let Extracted { frontmatter, .. } = extract(content);

    let mut title = String::new();
    let mut date = None;

    for line in frontmatter.lines() {
        if line.starts_with([' ', '\t']) {
            continue;
        }
        let Some((key, value)) = scalar_field(line) else {
            continue;
        };
        match key {
            "title" => title = value,
            "date" => date = parse_date(&value),
            _ => {}
        }
    }

    PostMetadata {
        title,
        date: date.unwrap_or_else(OffsetDateTime::now_utc),
        discussions: parse_external_discussions(frontmatter),
    }
}

/// Compose a post file from its metadata and body.
///
/// Inverse of [`parse_post_metadata`] for the fields this crate writes; the
/// conventional blank line separates the closing fence from the body.
pub fn compose(title: &str, date: OffsetDateTime, discussions: &[Discussion], body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 128);
    out.push_str(FENCE);
    out.push_str(&format!("title: {title}\n"));
    let formatted = date
        .format(&Rfc3339)
        .unwrap_or_else(|_| date.unix_timestamp().to_string());
    out.push_str(&format!("date: {formatted}\n"));
    if !discussions.is_empty() {
        out.push_str("external_discussions:\n");
        for discussion in discussions {
            out.push_str(&format!("  - platform: {}\n", discussion.platform));
            out.push_str(&format!("    url: {}\n", discussion.url));
        }
    }
    out.push_str(FENCE);
    out.push('\n');
    out.push_str(body);
    out
}

/// First markdown image URL (`![alt](url)`) in the content, if any.
pub fn first_image_url(content: &str) -> Option<String> {
    let mut rest = content;
    while let Some(start) = rest.find("![") {
        rest = &rest[start + 2..];
        let Some(close) = rest.find(']') else {
            return None;
        };
        if !rest[close..].starts_with("](") {
            continue;
        }
        let after_paren = &rest[close + 2..];
        let end = after_paren.find(')')?;
        let target = after_paren[..end].trim();
        // An optional title follows the URL after whitespace.
        let url = target.split_whitespace().next().unwrap_or_default();
        if !url.is_empty() {
            return Some(url.to_string());
        }
        rest = &after_paren[end..];
    }
    None
}

fn split_at_closing_fence(rest: &str) -> Option<(&str, &str)> {
    if let Some(frontmatter) = rest.strip_suffix("\n---") {
        // Closing fence at end of file, no trailing newline.
        if !frontmatter.contains("\n---\n") {
            return Some((frontmatter, ""));
        }
    }
    let index = rest.find("\n---\n")?;
    Some((&rest[..index], &rest[index + FENCE.len() + 1..]))
}

fn flush_entry(
    discussions: &mut Vec<Discussion>,
    platform: &mut Option<String>,
    url: &mut Option<String>,
) {
    if let (Some(platform), Some(url)) = (platform.take(), url.take()) {
        discussions.push(Discussion { platform, url });
    }
}

fn scalar_field(line: &str) -> Option<(&str, String)> {
    let (key, value) = line.split_once(':')?;
    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);
    Some((key.trim(), value.to_string()))
}

fn parse_date(value: &str) -> Option<OffsetDateTime> {
    if let Ok(parsed) = OffsetDateTime::parse(value, &Rfc3339) {
        return Some(parsed);
    }
    // Date-only front matter (`2024-01-01`) is common; treat it as midnight UTC.
    let format = time::macros::format_description!("[year]-[month]-[day]");
    time::Date::parse(value, &format)
        .ok()
        .map(|date| date.midnight().assume_utc())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn extract_round_trips_fenced_content() {
        let content = "---\ntitle: Hello\ndate: 2024-01-01T00:00:00Z\n---\n\nBody text.";
        let extracted = extract(content);
        assert_eq!(
            extracted.frontmatter,
            "title: Hello\ndate: 2024-01-01T00:00:00Z"
        );
        assert_eq!(extracted.body, "Body text.");
        assert_eq!(strip(content), "Body text.");
    }

    #[test]
    fn extract_without_fence_returns_content_unchanged() {
        let content = "Just a body, no metadata.";
        let extracted = extract(content);
        assert_eq!(extracted.frontmatter, "");
        assert_eq!(extracted.body, content);
    }

    #[test]
    fn extract_with_unterminated_fence_returns_content_unchanged() {
        let content = "---\ntitle: Dangling";
        let extracted = extract(content);
        assert_eq!(extracted.frontmatter, "");
        assert_eq!(extracted.body, content);
    }

    #[test]
    fn extract_handles_fence_closing_at_eof() {
        let content = "---\ntitle: Hello\n---";
        let extracted = extract(content);
        assert_eq!(extracted.frontmatter, "title: Hello");
        assert_eq!(extracted.body, "");
    }

    #[test]
    fn body_keeps_its_own_dashes() {
        let content = "---\ntitle: Hello\n---\nfirst\n---\nsecond";
        let extracted = extract(content);
        assert_eq!(extracted.frontmatter, "title: Hello");
        assert_eq!(extracted.body, "first\n---\nsecond");
    }

    #[test]
    fn discussions_drop_partial_entries_and_preserve_order() {
        let frontmatter = "title: Hello\nexternal_discussions:\n  - platform: v2ex\n    url: https://v2ex.com/t/1\n  - platform: reddit\n  - platform: hackernews\n    url: https://news.ycombinator.com/item?id=2\n";
        let discussions = parse_external_discussions(frontmatter);
        assert_eq!(
            discussions,
            vec![
                Discussion {
                    platform: "v2ex".to_string(),
                    url: "https://v2ex.com/t/1".to_string(),
                },
                Discussion {
                    platform: "hackernews".to_string(),
                    url: "https://news.ycombinator.com/item?id=2".to_string(),
                },
            ]
        );
    }

    #[test]
    fn discussions_stop_at_next_top_level_key() {
        let frontmatter =
            "external_discussions:\n  - platform: v2ex\n    url: https://v2ex.com/t/1\ntags:\n  - url: not-a-discussion\n";
        let discussions = parse_external_discussions(frontmatter);
        assert_eq!(discussions.len(), 1);
        assert_eq!(discussions[0].platform, "v2ex");
    }

    #[test]
    fn metadata_parses_title_and_date() {
        let content = "---\ntitle: \"Quoted Title\"\ndate: 2024-03-05T12:30:00Z\n---\n\nBody.";
        let metadata = parse_post_metadata(content);
        assert_eq!(metadata.title, "Quoted Title");
        assert_eq!(metadata.date, datetime!(2024-03-05 12:30:00 UTC));
        assert!(metadata.discussions.is_empty());
    }

    #[test]
    fn metadata_accepts_date_only_values() {
        let content = "---\ndate: 2024-03-05\n---\nBody.";
        let metadata = parse_post_metadata(content);
        assert_eq!(metadata.date, datetime!(2024-03-05 00:00:00 UTC));
    }

    #[test]
    fn metadata_defaults_when_frontmatter_is_missing() {
        let before = OffsetDateTime::now_utc();
        let metadata = parse_post_metadata("no front matter here");
        assert_eq!(metadata.title, "");
        assert!(metadata.date >= before);
    }

    #[test]
    fn compose_round_trips_through_the_parser() {
        let discussions = vec![Discussion {
            platform: "reddit".to_string(),
            url: "https://reddit.com/r/rust/1".to_string(),
        }];
        let content = compose(
            "Hello",
            datetime!(2024-06-01 08:00:00 UTC),
            &discussions,
            "Body text.",
        );

        let extracted = extract(&content);
        assert_eq!(extracted.body, "Body text.");

        let metadata = parse_post_metadata(&content);
        assert_eq!(metadata.title, "Hello");
        assert_eq!(metadata.date, datetime!(2024-06-01 08:00:00 UTC));
        assert_eq!(metadata.discussions, discussions);
    }

    #[test]
    fn first_image_url_finds_the_first_image() {
        let content = "intro [link](https://example.com)\n\n![cover](https://cdn.example.com/a.png \"caption\")\n![second](https://cdn.example.com/b.png)";
        assert_eq!(
            first_image_url(content).as_deref(),
            Some("https://cdn.example.com/a.png")
        );
    }

    #[test]
    fn first_image_url_ignores_plain_links() {
        assert_eq!(first_image_url("no images, [only](https://example.com)"), None);
        assert_eq!(first_image_url("dangling ![alt"), None);
    }
}
