//! On-disk post format and its parser.
//!
//! A post file starts with a header block followed by a markdown body:
//!
//! ```text
//! ### <title>
//! ###### <timestamp>     (optional)
//! ---
//! <body...>
//! ```
//!
//! Parsing is pure so it can be exercised without a filesystem.

use time::{
    OffsetDateTime, PrimitiveDateTime, UtcOffset, format_description::FormatItem,
    macros::format_description,
};

use super::error::DomainError;
use super::slug::url_segment;

pub const TITLE_PREFIX: &str = "### ";
pub const TIMESTAMP_PREFIX: &str = "###### ";
pub const SEPARATOR: &str = "---";

/// Date and time portion of a post timestamp (`Wed, 05 Feb 2025 17:54:14`).
pub const TIMESTAMP_FORMAT: &[FormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second]"
);
const NUMERIC_ZONE_FORMAT: &[FormatItem<'static>] =
    format_description!("[offset_hour sign:mandatory][offset_minute]");
/// Hour-only offset, written for zones that have no abbreviation (`+04`).
const HOUR_ZONE_FORMAT: &[FormatItem<'static>] =
    format_description!("[offset_hour sign:mandatory]");
const WRITTEN_ZONE: &str = "UTC";

/// Renders a markdown body into HTML.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, markdown: &str) -> String;
}

/// Listing projection of a post: everything but the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostHeader {
    pub title: String,
    pub timestamp: String,
    pub slug: String,
    /// Line index of the first body line.
    pub body_start: usize,
}

impl PostHeader {
    /// Public path of the post.
    pub fn href(&self) -> String {
        format!("/posts/{}", url_segment(&self.slug))
    }

    pub fn parsed_timestamp(&self) -> Option<OffsetDateTime> {
        parse_timestamp(&self.timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub header: PostHeader,
    pub body_markdown: String,
    pub body_html: String,
}

impl Post {
    pub fn header(&self) -> &PostHeader {
        &self.header
    }
}

/// Parse the header block of a post document.
pub fn parse_header(bytes: &[u8], slug: &str) -> Result<PostHeader, DomainError> {
    let text = normalize(bytes);
    let lines: Vec<&str> = text.split('\n').collect();
    header_from_lines(&lines, slug)
}

/// Parse a full post, rendering its body with `renderer`.
pub fn parse_post(
    bytes: &[u8],
    slug: &str,
    renderer: &dyn MarkdownRenderer,
) -> Result<Post, DomainError> {
    let text = normalize(bytes);
    let lines: Vec<&str> = text.split('\n').collect();
    let header = header_from_lines(&lines, slug)?;
    let body_markdown = lines[header.body_start..].join("\n");
    let body_html = renderer.render(&body_markdown);

    Ok(Post {
        header,
        body_markdown,
        body_html,
    })
}

/// Build the on-disk text of a post.
pub fn compose_document(title: &str, body: &str, timestamp: &str) -> String {
    let title = single_line(title);
    let body = body.replace('\r', "");
    format!("{TITLE_PREFIX}{title}\n{TIMESTAMP_PREFIX}{timestamp}\n{SEPARATOR}\n{body}")
}

pub fn format_timestamp(moment: OffsetDateTime) -> String {
    moment
        .to_offset(UtcOffset::UTC)
        .format(TIMESTAMP_FORMAT)
        .map(|formatted| format!("{formatted} {WRITTEN_ZONE}"))
        .unwrap_or_default()
}

/// Parse a post timestamp. Unknown alphabetic zone names are read as UTC.
pub fn parse_timestamp(text: &str) -> Option<OffsetDateTime> {
    let (datetime, zone) = text.trim().rsplit_once(' ')?;
    let offset = parse_zone(zone)?;
    let datetime = PrimitiveDateTime::parse(datetime, TIMESTAMP_FORMAT).ok()?;
    Some(datetime.assume_offset(offset))
}

fn parse_zone(zone: &str) -> Option<UtcOffset> {
    match zone {
        "UTC" | "GMT" | "UT" | "Z" => Some(UtcOffset::UTC),
        _ if zone.starts_with(['+', '-']) => {
            let format = if zone.len() == 3 {
                HOUR_ZONE_FORMAT
            } else {
                NUMERIC_ZONE_FORMAT
            };
            UtcOffset::parse(zone, format).ok()
        }
        _ if !zone.is_empty() && zone.chars().all(|ch| ch.is_ascii_alphabetic()) => {
            Some(UtcOffset::UTC)
        }
        _ => None,
    }
}

fn header_from_lines(lines: &[&str], slug: &str) -> Result<PostHeader, DomainError> {
    if lines.len() < 2 {
        return Err(DomainError::malformed("document has fewer than two lines"));
    }

    let separator = lines
        .iter()
        .position(|line| *line == SEPARATOR)
        .ok_or_else(|| DomainError::malformed("separator line is missing"))?;
    if separator == 0 {
        return Err(DomainError::malformed("separator precedes the title line"));
    }

    let timestamp = if separator >= 2 {
        strip(lines[1], TIMESTAMP_PREFIX)
    } else {
        ""
    };

    Ok(PostHeader {
        title: strip(lines[0], TITLE_PREFIX).to_string(),
        timestamp: timestamp.to_string(),
        slug: slug.to_string(),
        body_start: separator + 1,
    })
}

fn normalize(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).replace('\r', "")
}

fn strip<'a>(line: &'a str, prefix: &str) -> &'a str {
    line.strip_prefix(prefix).unwrap_or(line)
}

fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    struct Paragraphs;

    impl MarkdownRenderer for Paragraphs {
        fn render(&self, markdown: &str) -> String {
            format!("<p>{markdown}</p>")
        }
    }

    const FULL: &str = "### hello\n###### Wed, 05 Feb 2025 17:54:14 CET\n---\nHello, world!";

    #[test]
    fn parse_header_rejects_empty_document() {
        assert!(parse_header(b"", "test").is_err());
    }

    #[test]
    fn parse_header_requires_separator() {
        let err = parse_header(b"### hello\n\nHello, world!", "test").expect_err("no separator");
        assert_eq!(err, DomainError::malformed("separator line is missing"));
    }

    #[test]
    fn parse_header_rejects_leading_separator() {
        assert!(parse_header(b"---\nbody", "test").is_err());
    }

    #[test]
    fn parse_header_reads_title_and_timestamp() {
        let header = parse_header(FULL.as_bytes(), "test").expect("valid post");
        assert_eq!(header.title, "hello");
        assert_eq!(header.timestamp, "Wed, 05 Feb 2025 17:54:14 CET");
        assert_eq!(header.slug, "test");
        assert_eq!(header.body_start, 3);
        assert_eq!(header.href(), "/posts/test");
    }

    #[test]
    fn parse_header_without_timestamp_line() {
        let header = parse_header(b"### hello\n---\nHello, world!", "test").expect("valid post");
        assert_eq!(header.title, "hello");
        assert_eq!(header.timestamp, "");
        assert_eq!(header.body_start, 2);
    }

    #[test]
    fn parse_header_normalizes_crlf() {
        let header =
            parse_header(b"### hello\r\n###### ts\r\n---\r\nbody", "test").expect("valid post");
        assert_eq!(header.title, "hello");
        assert_eq!(header.timestamp, "ts");
    }

    #[test]
    fn parse_post_renders_only_the_body() {
        let post = parse_post(FULL.as_bytes(), "test", &Paragraphs).expect("valid post");
        assert_eq!(post.header.title, "hello");
        assert_eq!(post.body_markdown, "Hello, world!");
        assert_eq!(post.body_html, "<p>Hello, world!</p>");
        assert_eq!(post.header(), &post.header);
    }

    #[test]
    fn parse_post_rejects_invalid_documents() {
        assert!(parse_post(b"", "test", &Paragraphs).is_err());
        assert!(parse_post(b"### hello\n\nHello, world!", "test", &Paragraphs).is_err());
    }

    #[test]
    fn compose_document_parses_back() {
        let text = compose_document("Hello\nagain", "World", "Wed, 05 Feb 2025 17:54:14 UTC");
        let post = parse_post(text.as_bytes(), "hello", &Paragraphs).expect("valid post");
        assert_eq!(post.header.title, "Hello again");
        assert_eq!(post.header.timestamp, "Wed, 05 Feb 2025 17:54:14 UTC");
        assert_eq!(post.body_markdown, "World");
    }

    #[test]
    fn timestamps_round_trip_through_text() {
        let moment = datetime!(2025-02-05 17:54:14 UTC);
        let text = format_timestamp(moment);
        assert_eq!(text, "Wed, 05 Feb 2025 17:54:14 UTC");
        assert_eq!(parse_timestamp(&text), Some(moment));
    }

    #[test]
    fn parse_timestamp_accepts_numeric_and_named_zones() {
        assert_eq!(
            parse_timestamp("Wed, 05 Feb 2025 18:54:14 +0100"),
            Some(datetime!(2025-02-05 17:54:14 UTC))
        );
        assert_eq!(
            parse_timestamp("Wed, 05 Feb 2025 17:54:14 CET"),
            Some(datetime!(2025-02-05 17:54:14 UTC))
        );
        assert_eq!(
            parse_timestamp("Wed, 05 Feb 2025 21:54:14 +04"),
            Some(datetime!(2025-02-05 17:54:14 UTC))
        );
        assert_eq!(
            parse_timestamp("Wed, 05 Feb 2025 14:54:14 -03"),
            Some(datetime!(2025-02-05 17:54:14 UTC))
        );
        assert_eq!(parse_timestamp("Wed, 05 Feb 2025 17:54:14 +4"), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }
}
