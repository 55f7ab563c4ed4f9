//! Immutable post index snapshots.

use std::cmp::Ordering;
use std::collections::HashSet;

use time::OffsetDateTime;

use crate::domain::posts::PostHeader;

/// Point-in-time view of every post header, sorted for listing.
///
/// A snapshot is built wholesale by one refresh pass and never mutated
/// afterwards; readers share it through an `Arc`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PostIndex {
    generation: u64,
    slugs: HashSet<String>,
    headers: Vec<PostHeader>,
}

impl PostIndex {
    /// Snapshot served before the first refresh completes.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot, ordering headers newest first.
    ///
    /// Headers whose timestamp cannot be parsed sort before every parsable
    /// one. The sort is stable, so equal keys keep their input order.
    pub fn build(generation: u64, headers: Vec<PostHeader>) -> Self {
        let mut keyed: Vec<(Option<OffsetDateTime>, PostHeader)> = headers
            .into_iter()
            .map(|header| (header.parsed_timestamp(), header))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| newest_first(*a, *b));

        let headers: Vec<PostHeader> = keyed.into_iter().map(|(_, header)| header).collect();
        let slugs = headers.iter().map(|header| header.slug.clone()).collect();

        Self {
            generation,
            slugs,
            headers,
        }
    }

    /// Refresh pass that produced this snapshot; `0` for the initial empty one.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn headers(&self) -> &[PostHeader] {
        &self.headers
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.slugs.contains(slug)
    }

    pub fn find(&self, slug: &str) -> Option<&PostHeader> {
        if !self.contains(slug) {
            return None;
        }
        self.headers.iter().find(|header| header.slug == slug)
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// Descending by timestamp with unparsable timestamps first.
pub fn newest_first(a: Option<OffsetDateTime>, b: Option<OffsetDateTime>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => b.cmp(&a),
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::posts::format_timestamp;

    fn header(slug: &str, timestamp: &str) -> PostHeader {
        PostHeader {
            title: slug.to_uppercase(),
            timestamp: timestamp.to_string(),
            slug: slug.to_string(),
            body_start: 3,
        }
    }

    #[test]
    fn unparsable_timestamps_sort_first() {
        let t1 = format_timestamp(datetime!(2025-01-01 10:00 UTC));
        let t2 = format_timestamp(datetime!(2025-03-01 10:00 UTC));

        let index = PostIndex::build(
            1,
            vec![
                header("t2", &t2),
                header("invalid", "not a date"),
                header("t1", &t1),
            ],
        );

        let order: Vec<&str> = index.headers().iter().map(|h| h.slug.as_str()).collect();
        assert_eq!(order, vec!["invalid", "t2", "t1"]);
    }

    #[test]
    fn ordering_does_not_depend_on_input_position() {
        let t1 = format_timestamp(datetime!(2025-01-01 10:00 UTC));
        let t2 = format_timestamp(datetime!(2025-03-01 10:00 UTC));

        let index = PostIndex::build(
            1,
            vec![header("t1", &t1), header("t2", &t2), header("bad", "")],
        );

        let order: Vec<&str> = index.headers().iter().map(|h| h.slug.as_str()).collect();
        assert_eq!(order, vec!["bad", "t2", "t1"]);
    }

    #[test]
    fn invalid_timestamps_keep_input_order() {
        let index = PostIndex::build(1, vec![header("b", "x"), header("a", "y")]);
        let order: Vec<&str> = index.headers().iter().map(|h| h.slug.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn lookups_use_the_slug_set() {
        let index = PostIndex::build(4, vec![header("hello", "")]);
        assert_eq!(index.generation(), 4);
        assert!(index.contains("hello"));
        assert!(!index.contains("missing"));
        assert_eq!(index.find("hello").map(|h| h.title.as_str()), Some("HELLO"));
        assert_eq!(index.len(), 1);
        assert!(PostIndex::empty().is_empty());
    }
}
