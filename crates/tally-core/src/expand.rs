//! Structural query expansion.
//!
//! Expansion combines an existing query with a new term under one of the
//! binary operators. All operations here are pure: they clone the input tree
//! into new structure and never modify it.
//!
//! - [`QueryTree::expand`] combines the whole tree with the new word;
//!   [`QueryTree::into_expanded`] does the same without copying.
//! - [`QueryTree::generate_all_expansions`] yields the root expansion for
//!   every operator, in the order AND, OR, AND NOT.
//! - [`QueryTree::expand_at`] and [`QueryTree::leaf_expansions`] target inner
//!   nodes addressed by a [`Branch`] path.

use crate::ast::{Operator, QueryNode, QueryTree, Term};
use crate::error::{Result, TallyError};
use std::fmt;
use std::mem;
use tracing::debug;

/// One step of a path from the root towards an inner node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Branch {
    /// Left operand of a binary node
    Left,
    /// Right operand of a binary node
    Right,
    /// Operand of a `Not` node
    Child,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Left => f.write_str("left"),
            Branch::Right => f.write_str("right"),
            Branch::Child => f.write_str("child"),
        }
    }
}

fn describe_path(path: &[Branch]) -> String {
    if path.is_empty() {
        return "<root>".to_string();
    }
    path.iter()
        .map(Branch::to_string)
        .collect::<Vec<_>>()
        .join("/")
}

fn combine(op: Operator, node: QueryNode, term: Term) -> QueryNode {
    QueryNode::binary(op, node, QueryNode::Word(term))
}

/// Replace the subtree of `root` at `path` by `op(subtree, term)`, in place.
fn expand_in_place(
    root: &mut QueryNode,
    path: &[Branch],
    term: Term,
    op: Operator,
) -> Result<()> {
    let mut slot = root;
    for step in path {
        slot = match (slot, step) {
            (QueryNode::Not(child), Branch::Child) => &mut **child,
            (QueryNode::And(l, _), Branch::Left)
            | (QueryNode::Or(l, _), Branch::Left)
            | (QueryNode::AndNot(l, _), Branch::Left) => &mut **l,
            (QueryNode::And(_, r), Branch::Right)
            | (QueryNode::Or(_, r), Branch::Right)
            | (QueryNode::AndNot(_, r), Branch::Right) => &mut **r,
            (node, _) => {
                return Err(TallyError::InvalidPath {
                    path: describe_path(path),
                    reason: format!("cannot take {} branch of {:?} node", step, node.kind()),
                });
            }
        };
    }

    let target = mem::replace(slot, QueryNode::vacant());
    *slot = combine(op, target, term);
    Ok(())
}

fn collect_leaf_paths(root: &QueryNode) -> Vec<Vec<Branch>> {
    let mut paths = Vec::new();
    let mut current = Vec::new();
    // Each entry records the path length of its parent and the branch taken
    let mut pending: Vec<(&QueryNode, usize, Option<Branch>)> = vec![(root, 0, None)];

    while let Some((node, parent_len, branch)) = pending.pop() {
        current.truncate(parent_len);
        current.extend(branch);

        let len = current.len();
        match node {
            QueryNode::Word(_) => paths.push(current.clone()),
            QueryNode::Not(child) => pending.push((&**child, len, Some(Branch::Child))),
            QueryNode::And(l, r) | QueryNode::Or(l, r) | QueryNode::AndNot(l, r) => {
                pending.push((&**r, len, Some(Branch::Right)));
                pending.push((&**l, len, Some(Branch::Left)));
            }
        }
    }
    paths
}

impl QueryTree {
    /// Combine the whole tree with `word` under `op`.
    ///
    /// The existing tree becomes the left operand and `Word(word)` the right
    /// one. Expanding the empty tree yields just `Word(word)`, whatever the
    /// operator. Fails only if `word` is empty.
    pub fn expand(&self, word: &str, op: Operator) -> Result<QueryTree> {
        let term = Term::new(word)?;
        let root = match self.root() {
            Some(root) => combine(op, root.clone(), term),
            None => QueryNode::Word(term),
        };
        Ok(QueryTree::from(root))
    }

    /// Consuming form of [`QueryTree::expand`].
    ///
    /// Builds the same tree without copying `self`, which keeps growing a
    /// query one word at a time linear in its size.
    pub fn into_expanded(self, word: &str, op: Operator) -> Result<QueryTree> {
        let term = Term::new(word)?;
        let root = match self.into_root() {
            Some(root) => combine(op, root, term),
            None => QueryNode::Word(term),
        };
        Ok(QueryTree::from(root))
    }

    /// Every root expansion of this tree with `word`.
    ///
    /// Returns three trees (AND, OR, AND NOT, in that order) for a non-empty
    /// tree, and the single tree `Word(word)` for the empty one. The result is
    /// recomputed on each call.
    pub fn generate_all_expansions(&self, word: &str) -> Result<Vec<QueryTree>> {
        if self.is_empty() {
            return Ok(vec![self.expand(word, Operator::default())?]);
        }
        Operator::ALL
            .iter()
            .map(|&op| self.expand(word, op))
            .collect()
    }

    /// Combine the subtree at `path` with `word` under `op`, leaving the rest
    /// of the tree in place.
    ///
    /// An empty path addresses the root, making this equivalent to
    /// [`QueryTree::expand`].
    pub fn expand_at(&self, path: &[Branch], word: &str, op: Operator) -> Result<QueryTree> {
        let term = Term::new(word)?;
        match self.root() {
            Some(root) => {
                let mut root = root.clone();
                expand_in_place(&mut root, path, term, op)?;
                Ok(QueryTree::from(root))
            }
            None if path.is_empty() => Ok(QueryTree::from(QueryNode::Word(term))),
            None => Err(TallyError::InvalidPath {
                path: describe_path(path),
                reason: "the query is empty".to_string(),
            }),
        }
    }

    /// Paths to every word leaf, in left-to-right order.
    pub fn leaf_paths(&self) -> Vec<Vec<Branch>> {
        self.root().map(collect_leaf_paths).unwrap_or_default()
    }

    /// Expansions at every word leaf.
    ///
    /// For each leaf, left to right, yields the AND, OR and AND NOT
    /// combinations of that leaf with `word`. The empty tree yields the single
    /// tree `Word(word)`.
    pub fn leaf_expansions(&self, word: &str) -> Result<Vec<QueryTree>> {
        if self.is_empty() {
            return self.generate_all_expansions(word);
        }

        let paths = self.leaf_paths();
        let mut expansions = Vec::with_capacity(paths.len() * Operator::ALL.len());
        for path in &paths {
            for op in Operator::ALL {
                expansions.push(self.expand_at(path, word, op)?);
            }
        }

        debug!(
            query = %self,
            word = word,
            leaves = paths.len(),
            expansions = expansions.len(),
            "Generated leaf expansions"
        );
        Ok(expansions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeKind;

    fn tree(text: &str) -> QueryTree {
        QueryTree::parse(text).unwrap()
    }

    fn rendered(trees: &[QueryTree]) -> Vec<String> {
        trees.iter().map(QueryTree::to_string).collect()
    }

    #[test]
    fn test_expand_root() {
        let original = tree("obama OR president");
        let expanded = original.expand("biden", Operator::And).unwrap();

        let root = expanded.root().unwrap();
        assert_eq!(root.kind(), NodeKind::And);
        assert_eq!(root.left().unwrap().kind(), NodeKind::Or);
        assert_eq!(root.right().and_then(QueryNode::as_word), Some("biden"));
        assert_eq!(expanded.to_string(), "(obama OR president) AND biden");

        // The input is untouched
        assert_eq!(original.to_string(), "obama OR president");
    }

    #[test]
    fn test_expand_each_operator() {
        let original = tree("obama OR president");
        assert_eq!(
            original.expand("biden", Operator::Or).unwrap().to_string(),
            "obama OR president OR biden"
        );
        assert_eq!(
            original.expand("biden", Operator::AndNot).unwrap().to_string(),
            "(obama OR president) AND NOT biden"
        );
    }

    #[test]
    fn test_expand_and_not_keeps_left_chain() {
        let original = tree("a AND NOT b");
        let expanded = original.expand("c", Operator::AndNot).unwrap();
        assert_eq!(expanded.to_string(), "a AND NOT b AND NOT c");
        assert_eq!(tree(&expanded.to_string()), expanded);
    }

    #[test]
    fn test_expand_empty_tree() {
        for op in Operator::ALL {
            let expanded = QueryTree::empty().expand("kamala", op).unwrap();
            assert_eq!(expanded.to_string(), "kamala");
        }
    }

    #[test]
    fn test_expand_rejects_empty_word() {
        assert!(tree("a").expand("", Operator::And).is_err());
        assert!(QueryTree::empty().generate_all_expansions("").is_err());
    }

    #[test]
    fn test_generate_all_expansions() {
        let all = tree("obama OR president").generate_all_expansions("biden").unwrap();
        assert_eq!(
            rendered(&all),
            vec![
                "(obama OR president) AND biden",
                "obama OR president OR biden",
                "(obama OR president) AND NOT biden",
            ]
        );

        let again = tree("obama OR president").generate_all_expansions("biden").unwrap();
        assert_eq!(all, again);
    }

    #[test]
    fn test_generate_all_expansions_empty() {
        let all = QueryTree::empty().generate_all_expansions("kamala").unwrap();
        assert_eq!(rendered(&all), vec!["kamala"]);
    }

    #[test]
    fn test_expand_at_inner_node() {
        let original = tree("(a OR b) AND NOT c");
        let expanded = original
            .expand_at(&[Branch::Left, Branch::Right], "d", Operator::And)
            .unwrap();
        assert_eq!(expanded.to_string(), "(a OR b AND d) AND NOT c");

        let expanded = original.expand_at(&[], "d", Operator::Or).unwrap();
        assert_eq!(expanded, original.expand("d", Operator::Or).unwrap());
    }

    #[test]
    fn test_expand_at_not_child() {
        let expanded = tree("NOT a")
            .expand_at(&[Branch::Child], "b", Operator::Or)
            .unwrap();
        assert_eq!(expanded.to_string(), "NOT (a OR b)");
    }

    #[test]
    fn test_expand_at_invalid_path() {
        let original = tree("NOT a");
        assert!(matches!(
            original.expand_at(&[Branch::Left], "b", Operator::And),
            Err(TallyError::InvalidPath { .. })
        ));
        assert!(matches!(
            original.expand_at(&[Branch::Child, Branch::Child], "b", Operator::And),
            Err(TallyError::InvalidPath { .. })
        ));
        assert!(QueryTree::empty()
            .expand_at(&[Branch::Left], "b", Operator::And)
            .is_err());
    }

    #[test]
    fn test_leaf_expansions() {
        let original = tree("a OR NOT b");
        assert_eq!(
            original.leaf_paths(),
            vec![vec![Branch::Left], vec![Branch::Right, Branch::Child]]
        );

        let all = original.leaf_expansions("c").unwrap();
        assert_eq!(
            rendered(&all),
            vec![
                "a AND c OR NOT b",
                "a OR c OR NOT b",
                "a AND NOT c OR NOT b",
                "a OR NOT (b AND c)",
                "a OR NOT (b OR c)",
                "a OR NOT (b AND NOT c)",
            ]
        );
    }

    #[test]
    fn test_leaf_expansions_empty() {
        let all = QueryTree::empty().leaf_expansions("kamala").unwrap();
        assert_eq!(rendered(&all), vec!["kamala"]);
    }

    #[test]
    fn test_into_expanded_matches_expand() {
        let original = tree("obama OR president");
        for op in Operator::ALL {
            assert_eq!(
                original.clone().into_expanded("biden", op).unwrap(),
                original.expand("biden", op).unwrap()
            );
        }
        assert!(original.into_expanded("", Operator::And).is_err());
    }

    #[test]
    fn test_long_expansion_chain() {
        let mut chain = QueryTree::empty();
        for i in 0..50_000 {
            chain = chain.into_expanded(&format!("t{}", i), Operator::Or).unwrap();
        }
        assert_eq!(chain.depth(), 50_000);
        assert_eq!(chain.len(), 99_999);

        let text = chain.to_string();
        assert!(text.starts_with("t0 OR t1 OR "));
        assert_eq!(tree(&text), chain);

        let all = chain.generate_all_expansions("kamala").unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].depth(), 50_001);
        assert_eq!(all[1].root().and_then(QueryNode::left), chain.root());

        let deepest = vec![Branch::Left; 49_999];
        let expanded = chain.expand_at(&deepest, "kamala", Operator::AndNot).unwrap();
        assert!(expanded.to_string().starts_with("t0 AND NOT kamala OR t1 OR "));
    }
}
