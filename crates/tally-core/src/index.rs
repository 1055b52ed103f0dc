//! In-memory inverted index.
//!
//! The `Index` maps every term to the ascending list of documents containing
//! it, and tracks the number of ingested documents. Document ids are assigned
//! densely from 0, so the universe used by `NOT` is always `0..document_count`.
//!
//! ## Architecture
//!
//! - A `HashMap<String, PostingList>` is the dictionary
//! - Posting lists stay sorted for free because new ids are always the largest
//! - Queries are evaluated by [`crate::evaluate`] through the [`PostingSource`]
//!   implementation below
//!
//! Querying takes `&self` and never mutates, so a quiescent index can be shared
//! between readers. Ingestion and loading take `&mut self`.

use crate::ast::QueryTree;
use crate::error::{Result, TallyError};
use crate::evaluate::{count_matches, evaluate_tree, PostingSource};
use crate::parser::ParseOptions;
use crate::persistence::IndexFile;
use crate::types::{DocId, IndexStats, PostingList};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// The inverted index: dictionary of posting lists plus the document counter.
///
/// ## Example
///
/// ```rust
/// use tally_core::Index;
///
/// let mut index = Index::new();
/// index.add_document(["president", "obama"]);
/// index.add_document(["obama"]);
///
/// assert_eq!(index.count_text("obama AND NOT president").unwrap(), 1);
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Index {
    /// Term to ascending document ids
    dictionary: HashMap<String, PostingList>,

    /// Number of ingested documents
    document_count: u32,
}

impl Index {
    /// Create a new empty index.
    pub fn new() -> Self {
        Index::default()
    }

    /// Rebuild an index from already validated parts.
    pub(crate) fn from_parts(dictionary: HashMap<String, PostingList>, document_count: u32) -> Self {
        Index {
            dictionary,
            document_count,
        }
    }

    /// Ingest one document and return its id.
    ///
    /// The id is recorded once per distinct term; repeated terms within the
    /// document are ignored, as are empty terms (they could never be queried).
    ///
    /// # Panics
    ///
    /// Panics if the id space is exhausted; use
    /// [`Index::try_add_document`] to handle that case.
    pub fn add_document<I, S>(&mut self, terms: I) -> DocId
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self.try_add_document(terms) {
            Ok(id) => id,
            Err(e) => panic!("{}", e),
        }
    }

    /// Ingest one document, failing with [`TallyError::IndexFull`] once
    /// `u32::MAX` documents are stored. A failed call leaves the index
    /// untouched.
    pub fn try_add_document<I, S>(&mut self, terms: I) -> Result<DocId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let id = self.document_count;
        let next = id.checked_add(1).ok_or(TallyError::IndexFull { documents: id })?;
        let mut distinct = 0usize;

        for term in terms {
            let term = term.as_ref();
            if term.is_empty() {
                continue;
            }
            let inserted = match self.dictionary.get_mut(term) {
                Some(list) => list.push(id),
                None => self
                    .dictionary
                    .entry(term.to_string())
                    .or_default()
                    .push(id),
            };
            if inserted {
                distinct += 1;
            }
        }
        self.document_count = next;

        debug!(id, terms = distinct, "Added document");
        Ok(id)
    }

    /// Ingest a document given as whitespace-separated text.
    pub fn add_text(&mut self, text: &str) -> DocId {
        self.add_document(text.split_whitespace())
    }

    /// Fallible form of [`Index::add_text`].
    pub fn try_add_text(&mut self, text: &str) -> Result<DocId> {
        self.try_add_document(text.split_whitespace())
    }

    /// Number of ingested documents.
    pub fn document_count(&self) -> u32 {
        self.document_count
    }

    /// Number of distinct terms.
    pub fn term_count(&self) -> usize {
        self.dictionary.len()
    }

    /// Check if no document has been ingested.
    pub fn is_empty(&self) -> bool {
        self.document_count == 0
    }

    /// Ascending ids of the documents containing `term`, empty if unknown.
    pub fn postings(&self, term: &str) -> &[DocId] {
        self.dictionary
            .get(term)
            .map(PostingList::as_slice)
            .unwrap_or(&[])
    }

    /// Check whether any document contains `term`.
    pub fn contains_term(&self, term: &str) -> bool {
        self.dictionary.contains_key(term)
    }

    /// Every dictionary entry, in unspecified order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &PostingList)> {
        self.dictionary
            .iter()
            .map(|(term, list)| (term.as_str(), list))
    }

    /// Ascending ids of the documents matching `query`.
    pub fn search(&self, query: &QueryTree) -> Vec<DocId> {
        evaluate_tree(query, self).into_owned()
    }

    /// Parse `text` and return the matching ids.
    pub fn search_text(&self, text: &str) -> Result<Vec<DocId>> {
        self.search_text_with(text, &ParseOptions::default())
    }

    /// Parse `text` with explicit options and return the matching ids.
    pub fn search_text_with(&self, text: &str, options: &ParseOptions) -> Result<Vec<DocId>> {
        let query = QueryTree::parse_with(text, options)?;
        Ok(self.search(&query))
    }

    /// Number of documents matching `query`. The empty query matches nothing.
    pub fn count(&self, query: &QueryTree) -> usize {
        count_matches(query, self)
    }

    /// Parse `text` and count the matching documents.
    pub fn count_text(&self, text: &str) -> Result<usize> {
        self.count_text_with(text, &ParseOptions::default())
    }

    /// Parse `text` with explicit options and count the matching documents.
    pub fn count_text_with(&self, text: &str, options: &ParseOptions) -> Result<usize> {
        let query = QueryTree::parse_with(text, options)?;
        Ok(self.count(&query))
    }

    /// Summary numbers about the index.
    pub fn stats(&self) -> IndexStats {
        let (postings, longest) = self
            .dictionary
            .values()
            .fold((0usize, 0usize), |(total, longest), list| {
                (total + list.len(), longest.max(list.len()))
            });

        IndexStats {
            documents: self.document_count,
            terms: self.dictionary.len(),
            postings,
            longest_posting_list: longest,
        }
    }

    /// Drop every document and term.
    pub fn clear(&mut self) {
        self.dictionary.clear();
        self.document_count = 0;
    }

    /// Write the index to `path`, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        IndexFile::new(path).save(self)
    }

    /// Replace this index with the one stored at `path`.
    ///
    /// The file is fully decoded and validated before anything is swapped in,
    /// so on error the index is left exactly as it was.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let loaded = IndexFile::new(path).load()?;
        *self = loaded;
        Ok(())
    }

    /// Read a new index from `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Index> {
        IndexFile::new(path).load()
    }
}

impl PostingSource for Index {
    fn postings(&self, term: &str) -> &[DocId] {
        Index::postings(self, term)
    }

    fn document_count(&self) -> u32 {
        self.document_count
    }
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("document_count", &self.document_count)
            .field("term_count", &self.term_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{difference_sorted, union_sorted};
    use tempfile::TempDir;

    fn make_test_index() -> Index {
        let mut index = Index::new();
        for doc in [
            vec!["president", "obama"],
            vec!["president", "biden"],
            vec!["president", "trump"],
            vec!["obama"],
            vec!["biden"],
            vec!["obama", "kamala"],
        ] {
            index.add_document(doc);
        }
        index
    }

    #[test]
    fn test_add_document_assigns_dense_ids() {
        let mut index = Index::new();
        assert_eq!(index.add_document(["a"]), 0);
        assert_eq!(index.add_document(["b"]), 1);
        assert_eq!(index.add_document(Vec::<String>::new()), 2);
        assert_eq!(index.document_count(), 3);
        assert_eq!(index.term_count(), 2);
    }

    #[test]
    fn test_full_index_rejects_documents() {
        let mut index = Index::from_parts(HashMap::new(), u32::MAX - 1);
        assert_eq!(index.try_add_text("last").unwrap(), u32::MAX - 1);

        let err = index.try_add_document(["overflow"]).unwrap_err();
        assert!(matches!(err, TallyError::IndexFull { documents } if documents == u32::MAX));
        assert_eq!(index.document_count(), u32::MAX);
        assert!(!index.contains_term("overflow"));
        assert_eq!(index.postings("last"), &[u32::MAX - 1]);
    }

    #[test]
    fn test_repeated_terms_recorded_once() {
        let mut index = Index::new();
        index.add_document(["a", "b", "a", "a"]);
        index.add_document(["a", "", "a"]);

        assert_eq!(index.postings("a"), &[0, 1]);
        assert_eq!(index.postings("b"), &[0]);
        assert!(!index.contains_term(""));
        assert_eq!(index.stats().postings, 3);
    }

    #[test]
    fn test_add_text() {
        let mut index = Index::new();
        index.add_text("  the quick\tbrown   fox ");
        assert_eq!(index.term_count(), 4);
        assert_eq!(index.postings("quick"), &[0]);
    }

    #[test]
    fn test_postings_unknown_term() {
        let index = make_test_index();
        assert!(index.postings("clinton").is_empty());
        assert_eq!(index.postings("obama"), &[0, 3, 5]);
    }

    #[test]
    fn test_concrete_scenario() {
        let index = make_test_index();

        let included = union_sorted(
            &union_sorted(index.postings("president"), index.postings("obama")),
            index.postings("biden"),
        );
        let excluded = union_sorted(index.postings("trump"), index.postings("kamala"));
        let expected = difference_sorted(&included, &excluded);

        let query = "(president OR obama OR biden) AND NOT (trump OR kamala)";
        assert_eq!(index.search_text(query).unwrap(), expected);
        assert_eq!(index.count_text(query).unwrap(), expected.len());
    }

    #[test]
    fn test_count_is_pure() {
        let index = make_test_index();
        let before = index.clone();
        let query = QueryTree::parse("NOT obama OR biden").unwrap();

        let first = index.count(&query);
        let second = index.count(&query);
        assert_eq!(first, second);
        assert_eq!(index, before);
    }

    #[test]
    fn test_empty_query_counts_zero() {
        let index = make_test_index();
        assert_eq!(index.count_text("").unwrap(), 0);
        assert_eq!(index.count(&QueryTree::empty()), 0);
        assert_eq!(Index::new().count_text("NOT anything").unwrap(), 0);
    }

    #[test]
    fn test_count_text_parse_error() {
        let index = make_test_index();
        assert!(index.count_text("obama AND").is_err());
        assert!(index.search_text("(obama").is_err());
    }

    #[test]
    fn test_fold_case() {
        let index = make_test_index();
        let options = ParseOptions::default().with_fold_case(true);
        assert_eq!(index.count_text("OBAMA").unwrap(), 0);
        assert_eq!(index.count_text_with("Obama", &options).unwrap(), 3);
    }

    #[test]
    fn test_stats() {
        let index = make_test_index();
        let stats = index.stats();
        assert_eq!(stats.documents, 6);
        assert_eq!(stats.terms, 5);
        assert_eq!(stats.postings, 10);
        assert_eq!(stats.longest_posting_list, 3);
    }

    #[test]
    fn test_clear() {
        let mut index = make_test_index();
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.term_count(), 0);
        assert_eq!(index.add_document(["a"]), 0);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tally.idx");

        let index = make_test_index();
        index.save(&path).unwrap();

        let mut loaded = Index::new();
        loaded.add_document(["stale"]);
        loaded.load(&path).unwrap();
        assert_eq!(loaded, index);
        assert!(!loaded.contains_term("stale"));

        assert_eq!(Index::open(&path).unwrap(), index);
    }

    #[test]
    fn test_failed_load_leaves_index_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tally.idx");
        std::fs::write(&path, b"not an index").unwrap();

        let mut index = make_test_index();
        let before = index.clone();
        assert!(index.load(&path).is_err());
        assert!(index.load(temp_dir.path().join("missing.idx")).is_err());
        assert_eq!(index, before);
    }
}
