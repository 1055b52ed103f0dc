//! Query evaluation against a posting store.
//!
//! Evaluation walks the tree bottom-up with an explicit work stack and
//! combines posting lists with sorted merges. Word leaves borrow their posting
//! list from the store; intermediate results are only allocated where an
//! operator actually produces a new set.
//!
//! `Not` is the only operator that materializes a complement against the
//! universe `0..document_count`. `AndNot` subtracts directly.

use crate::ast::{Operator, QueryNode, QueryTree};
use crate::types::{
    complement_sorted, difference_sorted, intersect_sorted, union_sorted, DocId,
};
use std::borrow::Cow;

/// Read access to term postings.
///
/// Implemented by [`crate::Index`]; evaluation only ever reads, so any number
/// of evaluations may share one source as long as nothing mutates it.
pub trait PostingSource {
    /// Ascending document ids containing `term`, empty if the term is unknown.
    fn postings(&self, term: &str) -> &[DocId];

    /// Number of documents, i.e. the size of the universe used by `NOT`.
    fn document_count(&self) -> u32;
}

/// Evaluation work item.
enum Step<'n> {
    /// Evaluate a subtree and push its result
    Visit(&'n QueryNode),
    /// The left operand's result is on top; schedule the right one unless
    /// the left result already decides the outcome
    Right(Operator, &'n QueryNode),
    /// Replace the top result by its complement
    Complement,
    /// Replace the two top results by their combination
    Merge(Operator),
}

fn merge<'s>(op: Operator, left: Cow<'s, [DocId]>, right: Cow<'s, [DocId]>) -> Cow<'s, [DocId]> {
    match op {
        Operator::And => Cow::Owned(intersect_sorted(&left, &right)),
        Operator::Or if right.is_empty() => left,
        Operator::Or if left.is_empty() => right,
        Operator::Or => Cow::Owned(union_sorted(&left, &right)),
        Operator::AndNot if right.is_empty() => left,
        Operator::AndNot => Cow::Owned(difference_sorted(&left, &right)),
    }
}

/// Evaluate a node to its ascending set of matching document ids.
///
/// The tree is walked with an explicit stack, so arbitrarily long operator
/// chains evaluate without deep recursion.
pub fn evaluate<'s, S>(node: &QueryNode, source: &'s S) -> Cow<'s, [DocId]>
where
    S: PostingSource + ?Sized,
{
    let mut steps = vec![Step::Visit(node)];
    let mut results: Vec<Cow<'s, [DocId]>> = Vec::new();

    while let Some(step) = steps.pop() {
        match step {
            Step::Visit(QueryNode::Word(term)) => {
                results.push(Cow::Borrowed(source.postings(term.as_str())));
            }
            Step::Visit(QueryNode::Not(child)) => {
                steps.push(Step::Complement);
                steps.push(Step::Visit(child));
            }
            Step::Visit(node) => {
                if let Some((op, left, right)) = node.as_binary() {
                    steps.push(Step::Right(op, right));
                    steps.push(Step::Visit(left));
                }
            }
            Step::Right(op, right) => {
                let decided = op != Operator::Or
                    && results.last().map_or(false, |left| left.is_empty());
                if !decided {
                    steps.push(Step::Merge(op));
                    steps.push(Step::Visit(right));
                }
            }
            Step::Complement => {
                let matched = results.pop().unwrap_or_default();
                results.push(Cow::Owned(complement_sorted(
                    &matched,
                    source.document_count(),
                )));
            }
            Step::Merge(op) => {
                let right = results.pop().unwrap_or_default();
                let left = results.pop().unwrap_or_default();
                results.push(merge(op, left, right));
            }
        }
    }

    results.pop().unwrap_or_default()
}

/// Evaluate a whole tree; the empty query matches nothing.
pub fn evaluate_tree<'s, S>(tree: &QueryTree, source: &'s S) -> Cow<'s, [DocId]>
where
    S: PostingSource + ?Sized,
{
    match tree.root() {
        Some(root) => evaluate(root, source),
        None => Cow::Borrowed(&[]),
    }
}

/// Number of documents matching a tree.
pub fn count_matches<S>(tree: &QueryTree, source: &S) -> usize
where
    S: PostingSource + ?Sized,
{
    evaluate_tree(tree, source).len()
}
