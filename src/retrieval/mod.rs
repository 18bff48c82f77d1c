//! Grounding-document retrieval.
//!
//! The orchestrator sees only [`ContextRetriever`], whose contract is
//! infallible: an unavailable or failing index yields an empty list and a
//! warning, never an error. The index itself ([`DocumentIndex`]) is a black
//! box; [`InMemoryIndex`] is a small term-overlap implementation loaded from
//! a JSON corpus.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::agents::state::Subject;

/// A retrieved grounding document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Restrictions applied to a retrieval query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalFilter {
    pub subject: Subject,
    pub grade: u8,
    /// When set and non-empty, only documents on these topics are returned.
    pub topics: Option<Vec<String>>,
}

impl RetrievalFilter {
    pub fn new(subject: Subject, grade: u8) -> Self {
        Self {
            subject,
            grade,
            topics: None,
        }
    }

    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        self.topics = Some(topics);
        self
    }

    /// Topic restriction, if any; an empty list means no restriction.
    fn topic_set(&self) -> Option<HashSet<&str>> {
        self.topics
            .as_ref()
            .filter(|t| !t.is_empty())
            .map(|t| t.iter().map(String::as_str).collect())
    }
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Index unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to read corpus: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid corpus: {0}")]
    Corpus(#[from] serde_json::Error),
}

/// Search backend over the grounding corpus.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Best matches for `query`, at most `limit`.
    ///
    /// Implementations should apply `filter.topics` before limiting. Ones
    /// that cannot are still covered: [`IndexRetriever`] asks for
    /// [`TOPIC_OVERFETCH`] times the limit when a topic filter is set and
    /// filters the result itself.
    async fn search(
        &self,
        query: &str,
        filter: &RetrievalFilter,
        limit: usize,
    ) -> Result<Vec<Document>, RetrievalError>;
}

/// Retrieval as seen by the orchestrator.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Never fails; problems are logged and produce an empty list.
    async fn retrieve(&self, query: &str, filter: &RetrievalFilter, limit: usize) -> Vec<Document>;
}

/// Fetch multiplier used when a topic filter is applied after search.
pub const TOPIC_OVERFETCH: usize = 4;

/// [`ContextRetriever`] over an optional [`DocumentIndex`].
#[derive(Clone, Default)]
pub struct IndexRetriever {
    index: Option<Arc<dyn DocumentIndex>>,
}

impl IndexRetriever {
    pub fn new(index: Arc<dyn DocumentIndex>) -> Self {
        Self { index: Some(index) }
    }

    /// A retriever with no index configured; always returns nothing.
    pub fn unavailable() -> Self {
        Self { index: None }
    }

    pub fn is_available(&self) -> bool {
        self.index.is_some()
    }
}

#[async_trait]
impl ContextRetriever for IndexRetriever {
    async fn retrieve(&self, query: &str, filter: &RetrievalFilter, limit: usize) -> Vec<Document> {
        let Some(index) = &self.index else {
            tracing::warn!("Document index not configured, skipping retrieval");
            return Vec::new();
        };

        let topics = filter.topic_set();
        let fetch = if topics.is_some() {
            limit.saturating_mul(TOPIC_OVERFETCH)
        } else {
            limit
        };

        let docs = match index.search(query, filter, fetch).await {
            Ok(docs) => docs,
            Err(e) => {
                tracing::warn!(error = %e, "Document retrieval failed, continuing without context");
                return Vec::new();
            }
        };

        let mut docs: Vec<Document> = match topics {
            Some(topics) => docs
                .into_iter()
                .filter(|d| topics.contains(d.topic.as_str()))
                .collect(),
            None => docs,
        };
        docs.truncate(limit);

        tracing::info!(count = docs.len(), subject = %filter.subject, grade = filter.grade, "Retrieval completed");
        docs
    }
}

impl std::fmt::Debug for IndexRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexRetriever")
            .field("available", &self.index.is_some())
            .finish()
    }
}

/// One record of a JSON corpus file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusRecord {
    pub content: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub topic: String,
    /// Subject name in any accepted spelling; absent matches every subject.
    #[serde(default)]
    pub subject: Option<String>,
    /// Absent matches every grade.
    #[serde(default)]
    pub grade: Option<u8>,
}

struct IndexedRecord {
    record: CorpusRecord,
    subject: Option<Subject>,
    terms: HashSet<String>,
}

/// Term-overlap index held in memory.
pub struct InMemoryIndex {
    records: Vec<IndexedRecord>,
}

impl InMemoryIndex {
    pub fn new(records: Vec<CorpusRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| {
                let subject = match record.subject.as_deref() {
                    Some(s) => match s.parse::<Subject>() {
                        Ok(subject) => Some(subject),
                        Err(e) => {
                            tracing::warn!(subject = s, error = %e, "Unknown subject in corpus record, indexing without subject");
                            None
                        }
                    },
                    None => None,
                };
                let terms = tokenize(&format!("{} {}", record.topic, record.content));
                IndexedRecord {
                    record,
                    subject,
                    terms,
                }
            })
            .collect();
        Self { records }
    }

    /// Load a corpus from a JSON array of [`CorpusRecord`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RetrievalError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let records: Vec<CorpusRecord> = serde_json::from_str(&raw)?;
        tracing::info!(path = %path.as_ref().display(), records = records.len(), "Loaded retrieval corpus");
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl DocumentIndex for InMemoryIndex {
    async fn search(
        &self,
        query: &str,
        filter: &RetrievalFilter,
        limit: usize,
    ) -> Result<Vec<Document>, RetrievalError> {
        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }
        let topics = filter.topic_set();

        let mut scored: Vec<(f64, &CorpusRecord)> = self
            .records
            .iter()
            .filter(|r| r.subject.map_or(true, |s| s == filter.subject))
            .filter(|r| r.record.grade.map_or(true, |g| g == filter.grade))
            .filter(|r| {
                topics
                    .as_ref()
                    .map_or(true, |t| t.contains(r.record.topic.as_str()))
            })
            .filter_map(|r| {
                let overlap = query_terms.intersection(&r.terms).count();
                (overlap > 0).then(|| (overlap as f64 / query_terms.len() as f64, &r.record))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, record)| Document {
                content: record.content.clone(),
                source: record.source.clone(),
                topic: record.topic.clone(),
                score: Some(score),
            })
            .collect())
    }
}

impl std::fmt::Debug for InMemoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryIndex")
            .field("records", &self.records.len())
            .finish()
    }
}

/// Lowercased word set; words shorter than three characters are dropped.
fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| w.chars().count() >= 3)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct FailingIndex;

    #[async_trait]
    impl DocumentIndex for FailingIndex {
        async fn search(
            &self,
            _query: &str,
            _filter: &RetrievalFilter,
            _limit: usize,
        ) -> Result<Vec<Document>, RetrievalError> {
            Err(RetrievalError::Unavailable("qdrant down".to_string()))
        }
    }

    struct FixedIndex(Vec<Document>);

    #[async_trait]
    impl DocumentIndex for FixedIndex {
        async fn search(
            &self,
            _query: &str,
            _filter: &RetrievalFilter,
            _limit: usize,
        ) -> Result<Vec<Document>, RetrievalError> {
            Ok(self.0.clone())
        }
    }

    /// Ranks without looking at topics, then cuts at `limit`.
    struct TopicBlindIndex(Vec<Document>);

    #[async_trait]
    impl DocumentIndex for TopicBlindIndex {
        async fn search(
            &self,
            _query: &str,
            _filter: &RetrievalFilter,
            limit: usize,
        ) -> Result<Vec<Document>, RetrievalError> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
    }

    fn doc(topic: &str) -> Document {
        Document {
            content: format!("text about {}", topic),
            source: "Page 1".to_string(),
            topic: topic.to_string(),
            score: None,
        }
    }

    fn corpus() -> Vec<CorpusRecord> {
        vec![
            CorpusRecord {
                content: "Квадратні рівняння розв'язують через дискримінант".to_string(),
                source: "Алгебра 8, с. 112".to_string(),
                topic: "Квадратні рівняння".to_string(),
                subject: Some("алгебра".to_string()),
                grade: Some(8),
            },
            CorpusRecord {
                content: "Теорема Вієта пов'язує корені рівняння з коефіцієнтами".to_string(),
                source: "Алгебра 8, с. 120".to_string(),
                topic: "Теорема Вієта".to_string(),
                subject: Some("algebra".to_string()),
                grade: Some(8),
            },
            CorpusRecord {
                content: "Козацька доба та рівняння сил".to_string(),
                source: "Історія 8".to_string(),
                topic: "Козаччина".to_string(),
                subject: Some("history".to_string()),
                grade: Some(8),
            },
            CorpusRecord {
                content: "Лінійні рівняння з однією змінною".to_string(),
                source: "Алгебра 7".to_string(),
                topic: "Лінійні рівняння".to_string(),
                subject: Some("algebra".to_string()),
                grade: Some(7),
            },
        ]
    }

    #[tokio::test]
    async fn test_unavailable_index_returns_empty() {
        let retriever = IndexRetriever::unavailable();
        let docs = retriever
            .retrieve("рівняння", &RetrievalFilter::new(Subject::Algebra, 8), 5)
            .await;
        assert!(docs.is_empty());
        assert!(!retriever.is_available());
    }

    #[tokio::test]
    async fn test_index_error_returns_empty() {
        let retriever = IndexRetriever::new(Arc::new(FailingIndex));
        let docs = retriever
            .retrieve("рівняння", &RetrievalFilter::new(Subject::Algebra, 8), 5)
            .await;
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_topic_filter_never_falls_back() {
        let retriever = IndexRetriever::new(Arc::new(FixedIndex(vec![doc("a"), doc("b")])));
        let filter = RetrievalFilter::new(Subject::History, 9).with_topics(vec!["z".to_string()]);
        assert!(retriever.retrieve("q", &filter, 5).await.is_empty());

        let filter = RetrievalFilter::new(Subject::History, 9).with_topics(vec!["b".to_string()]);
        let docs = retriever.retrieve("q", &filter, 5).await;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].topic, "b");
    }

    #[tokio::test]
    async fn test_topic_match_beyond_limit_is_found() {
        let docs = ["a", "b", "c", "d", "e", "target", "f"].map(doc).to_vec();
        let retriever = IndexRetriever::new(Arc::new(TopicBlindIndex(docs)));
        let filter = RetrievalFilter::new(Subject::Algebra, 8).with_topics(vec!["target".to_string()]);

        let found = retriever.retrieve("q", &filter, 2).await;

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].topic, "target");

        let unfiltered = retriever
            .retrieve("q", &RetrievalFilter::new(Subject::Algebra, 8), 2)
            .await;
        assert_eq!(unfiltered.len(), 2);
    }

    #[tokio::test]
    async fn test_output_truncated_to_limit() {
        let retriever = IndexRetriever::new(Arc::new(FixedIndex(vec![doc("a"), doc("b"), doc("c")])));
        let docs = retriever
            .retrieve("q", &RetrievalFilter::new(Subject::History, 9), 2)
            .await;
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].topic, "a");
    }

    #[tokio::test]
    async fn test_in_memory_index_filters_subject_and_grade() {
        let index = InMemoryIndex::new(corpus());
        let docs = index
            .search("рівняння дискримінант", &RetrievalFilter::new(Subject::Algebra, 8), 5)
            .await
            .expect("search");

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].topic, "Квадратні рівняння");
        assert!(docs.iter().all(|d| d.source.starts_with("Алгебра 8")));
        assert!(docs[0].score.unwrap_or(0.0) > docs[1].score.unwrap_or(0.0));
    }

    #[tokio::test]
    async fn test_in_memory_index_no_overlap() {
        let index = InMemoryIndex::new(corpus());
        let docs = index
            .search("фотосинтез", &RetrievalFilter::new(Subject::Algebra, 8), 5)
            .await
            .expect("search");
        assert!(docs.is_empty());
    }

    #[test]
    fn test_load_corpus_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        let json = serde_json::to_string(&corpus()).expect("serialize");
        file.write_all(json.as_bytes()).expect("write");

        let index = InMemoryIndex::from_json_file(file.path()).expect("load");
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn test_load_invalid_corpus() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"{not json").expect("write");
        assert!(matches!(
            InMemoryIndex::from_json_file(file.path()),
            Err(RetrievalError::Corpus(_))
        ));
    }

    #[test]
    fn test_tokenize_keeps_apostrophes() {
        let terms = tokenize("Розв'яжи рівняння: x + 2 = 5");
        assert!(terms.contains("розв'яжи"));
        assert!(terms.contains("рівняння"));
        assert!(!terms.contains("x"));
    }
}
