//! Parse command - show how a query is understood.

use crate::OutputFormat;
use std::fmt::Write as _;
use tally_core::{Config, NodeKind, QueryNode, QueryTree};

/// Indented outline of the tree, one node per line.
pub fn dump_tree(tree: &QueryTree) -> String {
    let mut out = String::new();
    let Some(root) = tree.root() else {
        out.push_str("(empty)\n");
        return out;
    };

    let mut pending = vec![(root, 0usize)];
    while let Some((node, depth)) = pending.pop() {
        let indent = "  ".repeat(depth);
        match node {
            QueryNode::Word(term) => {
                let _ = writeln!(out, "{}Word {:?}", indent, term.as_str());
            }
            QueryNode::Not(child) => {
                let _ = writeln!(out, "{}Not", indent);
                pending.push((&**child, depth + 1));
            }
            QueryNode::And(l, r) | QueryNode::Or(l, r) | QueryNode::AndNot(l, r) => {
                let _ = writeln!(out, "{}{:?}", indent, node.kind());
                pending.push((&**r, depth + 1));
                pending.push((&**l, depth + 1));
            }
        }
    }
    out
}

fn kind_name(node: &QueryNode) -> &'static str {
    match node.kind() {
        NodeKind::Word => "word",
        NodeKind::Not => "not",
        NodeKind::And => "and",
        NodeKind::Or => "or",
        NodeKind::AndNot => "and_not",
    }
}

/// Pre-order node list; operators refer to their operands by id.
///
/// A flat list keeps the JSON shallow however deep the query is.
fn nodes_json(tree: &QueryTree) -> Vec<serde_json::Value> {
    let mut nodes: Vec<serde_json::Value> = Vec::new();
    let mut pending: Vec<(&QueryNode, Option<usize>)> =
        tree.root().map(|root| (root, None)).into_iter().collect();

    while let Some((node, parent)) = pending.pop() {
        let id = nodes.len();
        let mut entry = serde_json::json!({ "id": id, "kind": kind_name(node) });
        match node {
            QueryNode::Word(term) => entry["term"] = serde_json::json!(term.as_str()),
            QueryNode::Not(child) => {
                entry["children"] = serde_json::json!([]);
                pending.push((&**child, Some(id)));
            }
            QueryNode::And(l, r) | QueryNode::Or(l, r) | QueryNode::AndNot(l, r) => {
                entry["children"] = serde_json::json!([]);
                pending.push((&**r, Some(id)));
                pending.push((&**l, Some(id)));
            }
        }

        if let Some(parent) = parent {
            if let Some(children) = nodes[parent]["children"].as_array_mut() {
                children.push(serde_json::json!(id));
            }
        }
        nodes.push(entry);
    }
    nodes
}

/// JSON description of the tree.
pub fn tree_json(tree: &QueryTree) -> serde_json::Value {
    serde_json::json!({
        "query": tree.to_string(),
        "nodes": tree.len(),
        "depth": tree.depth(),
        "terms": tree.terms(),
        "tree": nodes_json(tree),
    })
}

/// Run the parse command.
pub fn run(config: Config, text: &str, output: OutputFormat) -> anyhow::Result<()> {
    // Parsing needs no index, only the query options
    let tree = QueryTree::parse_with(text, &config.parse_options())?;

    match output {
        OutputFormat::Text => {
            println!("{}", tree);
            print!("{}", dump_tree(&tree));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&tree_json(&tree))?);
        }
    }

    Ok(())
}
