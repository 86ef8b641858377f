//! Search aggregation for Quill
//!
//! Posts are indexed twice, once by title and once by content. A search
//! consults the title index first and the content index second, then merges
//! both relevance-ordered streams into one list without duplicates. Title
//! matches always come before content-only matches; there is no re-ranking
//! across the two sources.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{PostId, SearchHit};

/// Shortest query, in characters after trimming, that callers should submit
pub const MIN_QUERY_CHARS: usize = 2;

/// Which searchable field of a post an index covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchField {
    Title,
    Content,
}

impl SearchField {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Content => "content",
        }
    }
}

/// A relevance-ranked full-text index over posts
#[allow(async_fn_in_trait)]
pub trait PostSearchIndex {
    /// Up to `limit` hits for `query` in `field`, most relevant first
    async fn search_field(
        &self,
        field: SearchField,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>>;
}

/// How the merged list is bounded by `limit`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Truncation {
    /// Never return more than `limit` hits
    #[default]
    Exact,
    /// Stop only once the list holds more than `limit` hits, so up to
    /// `limit + 1` hits are returned
    Lenient,
}

impl fmt::Display for Truncation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => f.write_str("exact"),
            Self::Lenient => f.write_str("lenient"),
        }
    }
}

impl FromStr for Truncation {
    type Err = Error;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "lenient" => Ok(Self::Lenient),
            other => Err(Error::InvalidInput(format!(
                "unknown search truncation `{other}` (expected `exact` or `lenient`)"
            ))),
        }
    }
}

/// Merges title and content search results
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchAggregator {
    truncation: Truncation,
}

impl SearchAggregator {
    pub const fn new(truncation: Truncation) -> Self {
        Self { truncation }
    }

    /// Search both indexes for `query` and merge the hits
    ///
    /// The title index is queried first, then the content index. A post found
    /// by both appears once, in its title-pass position. Index errors are
    /// returned as-is.
    pub async fn search<I: PostSearchIndex>(
        &self,
        index: &I,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        if limit == 0 {
            return Err(Error::InvalidInput(
                "search limit must be positive".to_string(),
            ));
        }

        let mut merged = MergedHits::new(limit, self.truncation);

        for field in [SearchField::Title, SearchField::Content] {
            if merged.is_full() {
                tracing::debug!(field = field.label(), "Search list full, skipping index");
                break;
            }
            let hits = index.search_field(field, query, limit).await?;
            let added = merged.extend(hits);
            tracing::debug!(field = field.label(), added, "Merged search pass");
        }

        Ok(merged.into_hits())
    }
}

/// Deduplicating accumulator shared by both passes
#[derive(Debug)]
struct MergedHits {
    seen: HashSet<PostId>,
    hits: Vec<SearchHit>,
    limit: usize,
    truncation: Truncation,
}

impl MergedHits {
    fn new(limit: usize, truncation: Truncation) -> Self {
        Self {
            seen: HashSet::new(),
            hits: Vec::new(),
            limit,
            truncation,
        }
    }

    fn is_full(&self) -> bool {
        match self.truncation {
            Truncation::Exact => self.hits.len() >= self.limit,
            Truncation::Lenient => self.hits.len() > self.limit,
        }
    }

    /// Append unseen hits in order until full; returns how many were added
    fn extend(&mut self, hits: impl IntoIterator<Item = SearchHit>) -> usize {
        let before = self.hits.len();
        for hit in hits {
            if self.is_full() {
                break;
            }
            if self.seen.insert(hit.id) {
                self.hits.push(hit);
            }
        }
        self.hits.len() - before
    }

    fn into_hits(self) -> Vec<SearchHit> {
        self.hits
    }
}

/// Trim a user query and enforce the minimum length
pub fn normalize_search_query(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.chars().count() < MIN_QUERY_CHARS {
        return Err(Error::InvalidInput(format!(
            "search query must be at least {MIN_QUERY_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Default)]
    struct StubIndex {
        title: Vec<SearchHit>,
        content: Vec<SearchHit>,
        calls: Mutex<Vec<(SearchField, usize)>>,
        fail_on: Option<SearchField>,
    }

    impl StubIndex {
        fn new(title: Vec<SearchHit>, content: Vec<SearchHit>) -> Self {
            Self {
                title,
                content,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<(SearchField, usize)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PostSearchIndex for StubIndex {
        async fn search_field(
            &self,
            field: SearchField,
            _query: &str,
            limit: usize,
        ) -> Result<Vec<SearchHit>> {
            self.calls.lock().unwrap().push((field, limit));
            if self.fail_on == Some(field) {
                return Err(Error::Database("index unavailable".to_string()));
            }
            // Returns everything regardless of `limit` so boundary cases can
            // be exercised.
            Ok(match field {
                SearchField::Title => self.title.clone(),
                SearchField::Content => self.content.clone(),
            })
        }
    }

    fn hits(count: usize, label: &str) -> Vec<SearchHit> {
        (0..count)
            .map(|i| SearchHit {
                id: PostId::new(),
                title: format!("{label} title {i}"),
                content: format!("{label} content {i}"),
            })
            .collect()
    }

    fn ids(hits: &[SearchHit]) -> Vec<PostId> {
        hits.iter().map(|hit| hit.id).collect()
    }

    #[tokio::test]
    async fn no_matches_returns_empty() {
        let index = StubIndex::new(Vec::new(), Vec::new());
        let result = SearchAggregator::default()
            .search(&index, "nothing", 5)
            .await
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(
            index.calls(),
            vec![(SearchField::Title, 5), (SearchField::Content, 5)]
        );
    }

    #[tokio::test]
    async fn title_hits_precede_content_hits() {
        let title = hits(2, "t");
        let content = hits(2, "c");
        let index = StubIndex::new(title.clone(), content.clone());

        let result = SearchAggregator::default()
            .search(&index, "query", 5)
            .await
            .unwrap();

        let expected = [ids(&title), ids(&content)].concat();
        assert_eq!(ids(&result), expected);
    }

    #[tokio::test]
    async fn post_in_both_indexes_appears_once_in_title_position() {
        let shared = hits(1, "shared").remove(0);
        let title = vec![hits(1, "t").remove(0), shared.clone()];
        let content = vec![shared.clone(), hits(1, "c").remove(0)];
        let index = StubIndex::new(title.clone(), content.clone());

        let result = SearchAggregator::default()
            .search(&index, "query", 5)
            .await
            .unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result[1].id, shared.id);
        assert_eq!(result.iter().filter(|hit| hit.id == shared.id).count(), 1);
        assert_eq!(result[2].id, content[1].id);
    }

    #[tokio::test]
    async fn results_never_repeat_ids() {
        let pool = hits(6, "p");
        let title = vec![pool[0].clone(), pool[1].clone(), pool[0].clone()];
        let content = vec![pool[1].clone(), pool[2].clone(), pool[2].clone()];
        let index = StubIndex::new(title, content);

        let result = SearchAggregator::new(Truncation::Lenient)
            .search(&index, "query", 10)
            .await
            .unwrap();

        let unique: HashSet<PostId> = result.iter().map(|hit| hit.id).collect();
        assert_eq!(unique.len(), result.len());
        assert_eq!(ids(&result), ids(&pool[..3]));
    }

    #[tokio::test]
    async fn lenient_keeps_limit_plus_one_title_hits() {
        let title = hits(6, "t");
        let index = StubIndex::new(title.clone(), hits(3, "c"));

        let result = SearchAggregator::new(Truncation::Lenient)
            .search(&index, "query", 5)
            .await
            .unwrap();

        assert_eq!(ids(&result), ids(&title));
        // The list was already over the limit, so the content index is skipped.
        assert_eq!(index.calls(), vec![(SearchField::Title, 5)]);
    }

    #[tokio::test]
    async fn lenient_content_pass_may_add_one_past_limit() {
        let title = hits(5, "t");
        let content = hits(3, "c");
        let index = StubIndex::new(title.clone(), content.clone());

        let result = SearchAggregator::new(Truncation::Lenient)
            .search(&index, "query", 5)
            .await
            .unwrap();

        assert_eq!(result.len(), 6);
        assert_eq!(result[5].id, content[0].id);
    }

    #[tokio::test]
    async fn exact_caps_at_limit() {
        let title = hits(6, "t");
        let index = StubIndex::new(title.clone(), hits(3, "c"));

        let result = SearchAggregator::new(Truncation::Exact)
            .search(&index, "query", 5)
            .await
            .unwrap();

        assert_eq!(ids(&result), ids(&title[..5]));
        assert_eq!(index.calls(), vec![(SearchField::Title, 5)]);
    }

    #[tokio::test]
    async fn exact_fills_remaining_slots_from_content() {
        let title = hits(3, "t");
        let content = hits(4, "c");
        let index = StubIndex::new(title.clone(), content.clone());

        let result = SearchAggregator::new(Truncation::Exact)
            .search(&index, "query", 5)
            .await
            .unwrap();

        let expected = [ids(&title), ids(&content[..2])].concat();
        assert_eq!(ids(&result), expected);
    }

    #[tokio::test]
    async fn zero_limit_is_rejected() {
        let index = StubIndex::new(hits(1, "t"), Vec::new());
        let err = SearchAggregator::default()
            .search(&index, "query", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(index.calls().is_empty());
    }

    #[tokio::test]
    async fn index_failure_propagates() {
        let index = StubIndex {
            fail_on: Some(SearchField::Content),
            ..StubIndex::new(hits(1, "t"), hits(1, "c"))
        };
        let err = SearchAggregator::default()
            .search(&index, "query", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    #[test]
    fn truncation_parses_case_insensitively() {
        assert_eq!("Exact".parse::<Truncation>().unwrap(), Truncation::Exact);
        assert_eq!(" lenient ".parse::<Truncation>().unwrap(), Truncation::Lenient);
        assert!("loose".parse::<Truncation>().is_err());
        assert_eq!(Truncation::default(), Truncation::Exact);
    }

    #[test]
    fn normalize_search_query_enforces_minimum_length() {
        assert!(normalize_search_query("").is_err());
        assert!(normalize_search_query("  a  ").is_err());
        assert_eq!(normalize_search_query("  hi ").unwrap(), "hi");
    }
}
