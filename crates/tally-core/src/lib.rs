//! # Tally Core Library
//!
//! This crate provides boolean-query full-text retrieval over an in-memory
//! inverted index: documents are ingested as term lists, queries are parsed
//! into trees of `AND`, `OR`, `NOT` and `AND NOT`, and evaluated by sorted
//! merges of posting lists.
//!
//! ## Architecture
//!
//! - **AST** (`ast`): Query trees, nodes, operators and terms
//! - **Parser** (`parser`): Query text to tree, with precedence climbing
//! - **Evaluate** (`evaluate`): Tree to matching document ids
//! - **Expand** (`expand`): Structural query expansion
//! - **Types** (`types`): Document ids, posting lists and set algebra
//! - **Index** (`index`): In-memory dictionary of posting lists
//! - **Persistence** (`persistence`): On-disk storage of the index
//! - **Config** (`config`): Configuration management
//!
//! ## Example
//!
//! ```rust
//! use tally_core::{Index, Operator, QueryTree};
//!
//! let mut index = Index::new();
//! index.add_document(["president", "obama"]);
//! index.add_document(["president", "biden"]);
//! index.add_document(["obama", "kamala"]);
//!
//! let query = QueryTree::parse("president AND NOT biden")?;
//! assert_eq!(index.search(&query), vec![0]);
//!
//! for expanded in query.generate_all_expansions("kamala")? {
//!     println!("{} -> {}", expanded, index.count(&expanded));
//! }
//!
//! let widened = query.expand("kamala", Operator::Or)?;
//! assert_eq!(index.count(&widened), 2);
//! # Ok::<(), tally_core::TallyError>(())
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod expand;
pub mod index;
pub mod parser;
pub mod persistence;
pub mod types;

// Re-export commonly used types
pub use ast::{NodeKind, Operator, QueryNode, QueryTree, Term};
pub use config::Config;
pub use error::{ErrorKind, Result, TallyError};
pub use evaluate::PostingSource;
pub use expand::Branch;
pub use index::Index;
pub use parser::ParseOptions;
pub use persistence::IndexFile;
pub use types::{DocId, IndexStats, PostingList};
