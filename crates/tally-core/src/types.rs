//! Core data types for Tally.
//!
//! This module defines the storage substrate shared by the index, the
//! evaluator and the persistence layer:
//!
//! - **DocId**: dense document identifiers assigned at ingestion
//! - **PostingList**: ascending, duplicate-free document id sets
//! - **IndexStats**: summary numbers for status reporting
//!
//! All set operations on posting lists are linear sorted merges.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Identifier of an ingested document.
///
/// Ids are assigned densely starting at 0, so the set of all ids is always
/// `0..document_count`.
pub type DocId = u32;

/// Ascending, duplicate-free list of document ids.
///
/// Because document ids only ever grow, appending to the newest document keeps
/// the list sorted without any reordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PostingList(Vec<DocId>);

impl PostingList {
    /// Create an empty posting list
    pub fn new() -> Self {
        PostingList(Vec::new())
    }

    /// Build a posting list from ids that are already strictly ascending.
    ///
    /// Returns `None` if the ids are out of order or contain duplicates.
    pub fn from_sorted(ids: Vec<DocId>) -> Option<Self> {
        if ids.windows(2).all(|w| w[0] < w[1]) {
            Some(PostingList(ids))
        } else {
            None
        }
    }

    /// Append a document id.
    ///
    /// Re-adding the newest id is a no-op, so a term repeated inside one
    /// document is recorded once. Returns true if the id was added.
    pub fn push(&mut self, id: DocId) -> bool {
        match self.0.last() {
            Some(&last) if last == id => false,
            Some(&last) => {
                debug_assert!(last < id, "posting ids must be appended in order");
                self.0.push(id);
                true
            }
            None => {
                self.0.push(id);
                true
            }
        }
    }

    /// Borrow the ids as a slice
    pub fn as_slice(&self) -> &[DocId] {
        &self.0
    }
}

impl Deref for PostingList {
    type Target = [DocId];

    fn deref(&self) -> &[DocId] {
        &self.0
    }
}

impl fmt::Display for PostingList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", id)?;
        }
        write!(f, "]")
    }
}

// === Sorted-merge set algebra ===

/// Ids present in both inputs.
pub fn intersect_sorted(a: &[DocId], b: &[DocId]) -> Vec<DocId> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let mut i = 0usize;
    let mut j = 0usize;
    while i < a.len() && j < b.len() {
        let x = a[i];
        let y = b[j];
        if x == y {
            out.push(x);
            i += 1;
            j += 1;
        } else if x < y {
            i += 1;
        } else {
            j += 1;
        }
    }
    out
}

/// Ids present in either input.
pub fn union_sorted(a: &[DocId], b: &[DocId]) -> Vec<DocId> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let mut i = 0usize;
    let mut j = 0usize;
    while i < a.len() && j < b.len() {
        let x = a[i];
        let y = b[j];
        if x == y {
            out.push(x);
            i += 1;
            j += 1;
        } else if x < y {
            out.push(x);
            i += 1;
        } else {
            out.push(y);
            j += 1;
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Ids present in `a` but not in `b`.
pub fn difference_sorted(a: &[DocId], b: &[DocId]) -> Vec<DocId> {
    let mut out = Vec::with_capacity(a.len());
    let mut j = 0usize;
    for &x in a {
        while j < b.len() && b[j] < x {
            j += 1;
        }
        if j < b.len() && b[j] == x {
            continue;
        }
        out.push(x);
    }
    out
}

/// Ids in `0..document_count` that are not in `ids`.
pub fn complement_sorted(ids: &[DocId], document_count: u32) -> Vec<DocId> {
    let mut out = Vec::with_capacity((document_count as usize).saturating_sub(ids.len()));
    let mut j = 0usize;
    for id in 0..document_count {
        if j < ids.len() && ids[j] == id {
            j += 1;
        } else {
            out.push(id);
        }
    }
    out
}

/// Statistics about the index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of ingested documents (the universe size)
    pub documents: u32,

    /// Number of distinct terms in the dictionary
    pub terms: usize,

    /// Total number of postings across all terms
    pub postings: usize,

    /// Length of the longest posting list
    pub longest_posting_list: usize,
}

impl IndexStats {
    /// Average number of distinct terms per document
    pub fn terms_per_document(&self) -> f64 {
        if self.documents == 0 {
            0.0
        } else {
            self.postings as f64 / self.documents as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_dedups_newest() {
        let mut list = PostingList::new();
        assert!(list.push(0));
        assert!(!list.push(0));
        assert!(list.push(3));
        assert_eq!(list.as_slice(), &[0, 3]);
    }

    #[test]
    fn test_from_sorted_rejects_disorder() {
        assert!(PostingList::from_sorted(vec![1, 2, 5]).is_some());
        assert!(PostingList::from_sorted(vec![]).is_some());
        assert!(PostingList::from_sorted(vec![2, 2]).is_none());
        assert!(PostingList::from_sorted(vec![3, 1]).is_none());
    }

    #[test]
    fn test_set_algebra() {
        let a = [0, 2, 4, 6];
        let b = [1, 2, 3, 6, 9];

        assert_eq!(intersect_sorted(&a, &b), vec![2, 6]);
        assert_eq!(union_sorted(&a, &b), vec![0, 1, 2, 3, 4, 6, 9]);
        assert_eq!(difference_sorted(&a, &b), vec![0, 4]);
        assert_eq!(difference_sorted(&b, &a), vec![1, 3, 9]);
    }

    #[test]
    fn test_set_algebra_with_empty() {
        let a = [1, 5];
        assert!(intersect_sorted(&a, &[]).is_empty());
        assert_eq!(union_sorted(&[], &a), vec![1, 5]);
        assert_eq!(difference_sorted(&a, &[]), vec![1, 5]);
        assert!(difference_sorted(&[], &a).is_empty());
    }

    #[test]
    fn test_complement() {
        assert_eq!(complement_sorted(&[0, 2, 3], 6), vec![1, 4, 5]);
        assert_eq!(complement_sorted(&[], 3), vec![0, 1, 2]);
        assert!(complement_sorted(&[], 0).is_empty());
    }

    #[test]
    fn test_display() {
        let list = PostingList::from_sorted(vec![1, 4]).unwrap();
        assert_eq!(list.to_string(), "[1, 4]");
    }

    #[test]
    fn test_stats_ratio() {
        let stats = IndexStats {
            documents: 4,
            terms: 3,
            postings: 6,
            longest_posting_list: 3,
        };
        assert!((stats.terms_per_document() - 1.5).abs() < f64::EPSILON);
        assert_eq!(IndexStats::default().terms_per_document(), 0.0);
    }
}
