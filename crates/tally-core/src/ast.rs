//! Boolean query syntax tree.
//!
//! A query is a tree of [`QueryNode`]s wrapped in a [`QueryTree`]. The node set
//! is closed (`Word`, `Not`, `And`, `Or`, `AndNot`) and every node owns its
//! children, so trees are acyclic and never share structure.
//!
//! ## Canonical form
//!
//! `Display` renders the canonical text of a tree:
//!
//! - `Word(t)` renders as `t` (double-quoted if it would not re-lex as `t`)
//! - `Not(c)` renders as `NOT c`, with `c` parenthesized if it is binary
//! - binary nodes render as `l OP r`, parenthesizing a child whose operator
//!   binds more loosely than the parent's
//!
//! The right operand of `AND NOT` is also parenthesized when it has the same
//! precedence, because `a AND NOT (b AND c)` and `a AND NOT b AND c` select
//! different documents. Re-parsing canonical text always yields the same
//! canonical text.
//!
//! ## Deep trees
//!
//! The parser builds operator chains in a loop, so `a OR b OR c ...` yields a
//! tree whose height grows with the number of terms. Every walk over a tree
//! (rendering, cloning, comparison, evaluation and drop) therefore uses an
//! explicit work stack instead of recursion.

use crate::error::{Result, TallyError};
use crate::parser::{self, ParseOptions};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::str::FromStr;

/// Reserved operator keywords. Terms equal to one of these must be quoted.
pub const KEYWORDS: [&str; 3] = ["AND", "OR", "NOT"];

/// A non-empty search term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Term(String);

impl Term {
    /// Create a term, rejecting the empty string.
    pub fn new(term: impl Into<String>) -> Result<Self> {
        let term = term.into();
        if term.is_empty() {
            return Err(TallyError::InvalidTerm {
                term,
                reason: "terms must not be empty".to_string(),
            });
        }
        Ok(Term(term))
    }

    /// Get the term as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the term and return the owned string
    pub fn into_string(self) -> String {
        self.0
    }

    /// True if the term must be quoted to survive a render/parse round trip.
    pub fn needs_quotes(&self) -> bool {
        KEYWORDS.contains(&self.0.as_str())
            || self.0.starts_with('"')
            || self
                .0
                .chars()
                .any(|c| c.is_whitespace() || c == '(' || c == ')')
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.needs_quotes() {
            return f.write_str(&self.0);
        }
        f.write_str("\"")?;
        for c in self.0.chars() {
            if c == '"' || c == '\\' {
                f.write_str("\\")?;
            }
            write!(f, "{}", c)?;
        }
        f.write_str("\"")
    }
}

impl TryFrom<String> for Term {
    type Error = TallyError;

    fn try_from(s: String) -> Result<Self> {
        Term::new(s)
    }
}

impl TryFrom<&str> for Term {
    type Error = TallyError;

    fn try_from(s: &str) -> Result<Self> {
        Term::new(s)
    }
}

impl AsRef<str> for Term {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Binary boolean operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Intersection
    #[default]
    And,
    /// Union
    Or,
    /// Difference (`l AND NOT r`) without materializing a complement
    AndNot,
}

impl Operator {
    /// All operators in expansion order.
    pub const ALL: [Operator; 3] = [Operator::And, Operator::Or, Operator::AndNot];

    /// Keyword text as it appears in a query
    pub fn keyword(self) -> &'static str {
        match self {
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::AndNot => "AND NOT",
        }
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            Operator::Or => 1,
            Operator::And | Operator::AndNot => 2,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for Operator {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "and" => Ok(Operator::And),
            "or" => Ok(Operator::Or),
            "and not" | "and-not" | "and_not" | "andnot" => Ok(Operator::AndNot),
            _ => Err(TallyError::InvalidOperator {
                operator: s.to_string(),
            }),
        }
    }
}

/// Node kind tag, for introspection without matching on payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Word,
    Not,
    And,
    Or,
    AndNot,
}

/// A node of the query tree.
///
/// `Clone`, `PartialEq`, `Hash`, `Display` and `Drop` are implemented by hand
/// with work stacks, so trees of any height are safe to handle.
pub enum QueryNode {
    /// A single search term
    Word(Term),
    /// Documents not matching the child
    Not(Box<QueryNode>),
    /// Documents matching both operands
    And(Box<QueryNode>, Box<QueryNode>),
    /// Documents matching either operand
    Or(Box<QueryNode>, Box<QueryNode>),
    /// Documents matching the left operand but not the right
    AndNot(Box<QueryNode>, Box<QueryNode>),
}

const NOT_PRECEDENCE: u8 = 3;
const WORD_PRECEDENCE: u8 = 4;

impl QueryNode {
    /// Create a word node, rejecting empty terms.
    pub fn word(term: impl Into<String>) -> Result<Self> {
        Ok(QueryNode::Word(Term::new(term)?))
    }

    /// Negate a node
    pub fn not(child: QueryNode) -> Self {
        QueryNode::Not(Box::new(child))
    }

    /// Combine two nodes with a binary operator
    pub fn binary(op: Operator, left: QueryNode, right: QueryNode) -> Self {
        let (left, right) = (Box::new(left), Box::new(right));
        match op {
            Operator::And => QueryNode::And(left, right),
            Operator::Or => QueryNode::Or(left, right),
            Operator::AndNot => QueryNode::AndNot(left, right),
        }
    }

    /// Get the kind of this node
    pub fn kind(&self) -> NodeKind {
        match self {
            QueryNode::Word(_) => NodeKind::Word,
            QueryNode::Not(_) => NodeKind::Not,
            QueryNode::And(..) => NodeKind::And,
            QueryNode::Or(..) => NodeKind::Or,
            QueryNode::AndNot(..) => NodeKind::AndNot,
        }
    }

    /// The term of a word node
    pub fn as_word(&self) -> Option<&str> {
        match self {
            QueryNode::Word(term) => Some(term.as_str()),
            _ => None,
        }
    }

    /// The operand of a `Not` node
    pub fn child(&self) -> Option<&QueryNode> {
        match self {
            QueryNode::Not(child) => Some(child),
            _ => None,
        }
    }

    /// The binary operator, if this is a binary node
    pub fn operator(&self) -> Option<Operator> {
        match self {
            QueryNode::And(..) => Some(Operator::And),
            QueryNode::Or(..) => Some(Operator::Or),
            QueryNode::AndNot(..) => Some(Operator::AndNot),
            QueryNode::Word(_) | QueryNode::Not(_) => None,
        }
    }

    /// Both operands of a binary node
    pub fn operands(&self) -> Option<(&QueryNode, &QueryNode)> {
        match self {
            QueryNode::And(l, r) | QueryNode::Or(l, r) | QueryNode::AndNot(l, r) => {
                Some((&**l, &**r))
            }
            QueryNode::Word(_) | QueryNode::Not(_) => None,
        }
    }

    /// The left operand of a binary node
    pub fn left(&self) -> Option<&QueryNode> {
        self.operands().map(|(l, _)| l)
    }

    /// The right operand of a binary node
    pub fn right(&self) -> Option<&QueryNode> {
        self.operands().map(|(_, r)| r)
    }

    /// Operator and operands of a binary node
    pub fn as_binary(&self) -> Option<(Operator, &QueryNode, &QueryNode)> {
        match self {
            QueryNode::And(l, r) => Some((Operator::And, &**l, &**r)),
            QueryNode::Or(l, r) => Some((Operator::Or, &**l, &**r)),
            QueryNode::AndNot(l, r) => Some((Operator::AndNot, &**l, &**r)),
            QueryNode::Word(_) | QueryNode::Not(_) => None,
        }
    }

    /// True for `And`, `Or` and `AndNot`
    pub fn is_binary(&self) -> bool {
        self.operator().is_some()
    }

    /// Leaf left behind in a slot whose node has been moved out.
    ///
    /// It holds an empty term, so it must never escape into a tree that is
    /// still in use.
    pub(crate) fn vacant() -> Self {
        QueryNode::Word(Term(String::new()))
    }

    /// Copy of this node with vacant children, to be filled in by the caller.
    fn shallow_clone(&self) -> Self {
        match self {
            QueryNode::Word(term) => QueryNode::Word(term.clone()),
            QueryNode::Not(_) => QueryNode::not(QueryNode::vacant()),
            QueryNode::And(..) => QueryNode::binary(Operator::And, Self::vacant(), Self::vacant()),
            QueryNode::Or(..) => QueryNode::binary(Operator::Or, Self::vacant(), Self::vacant()),
            QueryNode::AndNot(..) => {
                QueryNode::binary(Operator::AndNot, Self::vacant(), Self::vacant())
            }
        }
    }

    /// Move every non-leaf child out into `out`, leaving vacant leaves behind.
    fn detach_children(&mut self, out: &mut Vec<QueryNode>) {
        fn detach(slot: &mut QueryNode, out: &mut Vec<QueryNode>) {
            if !matches!(slot, QueryNode::Word(_)) {
                out.push(mem::replace(slot, QueryNode::vacant()));
            }
        }

        match self {
            QueryNode::Word(_) => {}
            QueryNode::Not(child) => detach(child, out),
            QueryNode::And(l, r) | QueryNode::Or(l, r) | QueryNode::AndNot(l, r) => {
                detach(l, out);
                detach(r, out);
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            QueryNode::Word(_) => WORD_PRECEDENCE,
            QueryNode::Not(_) => NOT_PRECEDENCE,
            QueryNode::And(..) | QueryNode::AndNot(..) => Operator::And.precedence(),
            QueryNode::Or(..) => Operator::Or.precedence(),
        }
    }

    /// Number of nodes in this subtree
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Height of this subtree (a word node has depth 1)
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1usize)];
        while let Some((node, level)) = pending.pop() {
            deepest = deepest.max(level);
            match node {
                QueryNode::Word(_) => {}
                QueryNode::Not(child) => pending.push((&**child, level + 1)),
                QueryNode::And(l, r) | QueryNode::Or(l, r) | QueryNode::AndNot(l, r) => {
                    pending.push((&**l, level + 1));
                    pending.push((&**r, level + 1));
                }
            }
        }
        deepest
    }

    /// Pre-order iterator over this subtree
    pub fn iter(&self) -> Nodes<'_> {
        Nodes { stack: vec![self] }
    }
}

/// Rendering work item: a node still to render or literal text.
enum Piece<'a> {
    Node(&'a QueryNode),
    Text(&'static str),
}

/// Schedule `node`, wrapped in parentheses if asked. Pieces are popped in
/// reverse push order.
fn push_operand<'a>(pending: &mut Vec<Piece<'a>>, node: &'a QueryNode, parens: bool) {
    if parens {
        pending.push(Piece::Text(")"));
        pending.push(Piece::Node(node));
        pending.push(Piece::Text("("));
    } else {
        pending.push(Piece::Node(node));
    }
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pending = vec![Piece::Node(self)];
        while let Some(piece) = pending.pop() {
            match piece {
                Piece::Text(text) => f.write_str(text)?,
                Piece::Node(QueryNode::Word(term)) => write!(f, "{}", term)?,
                Piece::Node(QueryNode::Not(child)) => {
                    f.write_str("NOT ")?;
                    push_operand(&mut pending, child, child.is_binary());
                }
                Piece::Node(node) => {
                    if let Some((op, left, right)) = node.as_binary() {
                        let parent = op.precedence();
                        let right_parens = right.precedence() < parent
                            || (op == Operator::AndNot && right.precedence() == parent);

                        push_operand(&mut pending, right, right_parens);
                        pending.push(Piece::Text(" "));
                        pending.push(Piece::Text(op.keyword()));
                        pending.push(Piece::Text(" "));
                        push_operand(&mut pending, left, left.precedence() < parent);
                    }
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("QueryNode")
            .field(&format_args!("{}", self))
            .finish()
    }
}

impl Clone for QueryNode {
    fn clone(&self) -> Self {
        let mut root = self.shallow_clone();
        let mut pending: Vec<(&QueryNode, &mut QueryNode)> = vec![(self, &mut root)];

        while let Some((source, target)) = pending.pop() {
            match (source, target) {
                (QueryNode::Not(from), QueryNode::Not(to)) => {
                    **to = from.shallow_clone();
                    pending.push((&**from, &mut **to));
                }
                (QueryNode::And(fl, fr), QueryNode::And(tl, tr))
                | (QueryNode::Or(fl, fr), QueryNode::Or(tl, tr))
                | (QueryNode::AndNot(fl, fr), QueryNode::AndNot(tl, tr)) => {
                    **tl = fl.shallow_clone();
                    **tr = fr.shallow_clone();
                    pending.push((&**fr, &mut **tr));
                    pending.push((&**fl, &mut **tl));
                }
                _ => {}
            }
        }

        root
    }
}

impl PartialEq for QueryNode {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some(pair) = pending.pop() {
            match pair {
                (QueryNode::Word(a), QueryNode::Word(b)) => {
                    if a != b {
                        return false;
                    }
                }
                (QueryNode::Not(a), QueryNode::Not(b)) => pending.push((&**a, &**b)),
                (QueryNode::And(al, ar), QueryNode::And(bl, br))
                | (QueryNode::Or(al, ar), QueryNode::Or(bl, br))
                | (QueryNode::AndNot(al, ar), QueryNode::AndNot(bl, br)) => {
                    pending.push((&**ar, &**br));
                    pending.push((&**al, &**bl));
                }
                _ => return false,
            }
        }
        true
    }
}

impl Eq for QueryNode {}

impl Hash for QueryNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Node arity is fixed per kind, so the pre-order sequence of kinds
        // and terms identifies the tree.
        for node in self.iter() {
            node.kind().hash(state);
            if let QueryNode::Word(term) = node {
                term.hash(state);
            }
        }
    }
}

impl Drop for QueryNode {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.detach_children(&mut pending);
        while let Some(mut node) = pending.pop() {
            // Its children are moved out first, so dropping it does not recurse
            node.detach_children(&mut pending);
        }
    }
}

/// Pre-order traversal over a subtree.
pub struct Nodes<'a> {
    stack: Vec<&'a QueryNode>,
}

impl<'a> Iterator for Nodes<'a> {
    type Item = &'a QueryNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        match node {
            QueryNode::Word(_) => {}
            QueryNode::Not(child) => self.stack.push(child),
            QueryNode::And(l, r) | QueryNode::Or(l, r) | QueryNode::AndNot(l, r) => {
                self.stack.push(r);
                self.stack.push(l);
            }
        }
        Some(node)
    }
}

/// A parsed boolean query.
///
/// An absent root is the empty query, which matches nothing and renders as
/// the empty string.
///
/// ## Example
///
/// ```rust
/// use tally_core::QueryTree;
///
/// let tree = QueryTree::parse("(a OR b) AND NOT c").unwrap();
/// assert_eq!(tree.to_string(), "(a OR b) AND NOT c");
/// assert_eq!(tree.terms(), vec!["a", "b", "c"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QueryTree {
    root: Option<QueryNode>,
}

impl QueryTree {
    /// Create a tree from an optional root
    pub fn new(root: Option<QueryNode>) -> Self {
        QueryTree { root }
    }

    /// The empty query
    pub fn empty() -> Self {
        QueryTree { root: None }
    }

    /// Parse query text with default options.
    pub fn parse(text: &str) -> Result<Self> {
        parser::parse(text, &ParseOptions::default())
    }

    /// Parse query text with explicit options.
    pub fn parse_with(text: &str, options: &ParseOptions) -> Result<Self> {
        parser::parse(text, options)
    }

    /// The root node, if any
    pub fn root(&self) -> Option<&QueryNode> {
        self.root.as_ref()
    }

    /// Consume the tree and return its root
    pub fn into_root(self) -> Option<QueryNode> {
        self.root
    }

    /// True if this is the empty query
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of nodes in the tree
    pub fn len(&self) -> usize {
        self.root.as_ref().map_or(0, QueryNode::len)
    }

    /// Height of the tree (0 for the empty query)
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, QueryNode::depth)
    }

    /// Pre-order iterator over all nodes
    pub fn nodes(&self) -> Nodes<'_> {
        Nodes {
            stack: self.root.iter().collect(),
        }
    }

    /// Terms of all word leaves, left to right
    pub fn terms(&self) -> Vec<&str> {
        self.nodes().filter_map(QueryNode::as_word).collect()
    }
}

impl From<QueryNode> for QueryTree {
    fn from(node: QueryNode) -> Self {
        QueryTree { root: Some(node) }
    }
}

impl fmt::Display for QueryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            Some(root) => write!(f, "{}", root),
            None => Ok(()),
        }
    }
}

impl FromStr for QueryTree {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self> {
        QueryTree::parse(s)
    }
}
