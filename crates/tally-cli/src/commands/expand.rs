//! Expand command - combine a query with a new word and count each result.

use crate::app::App;
use crate::OutputFormat;
use tally_core::{Config, Index, Operator, QueryTree};

/// Which expansions to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One root expansion with the given operator
    Single(Operator),
    /// Root expansions for AND, OR and AND NOT
    AllOperators,
    /// Every operator at every word of the query
    Leaves,
}

/// Build the expansions for `mode`.
pub fn expansions(query: &QueryTree, word: &str, mode: Mode) -> anyhow::Result<Vec<QueryTree>> {
    let trees = match mode {
        Mode::Single(op) => vec![query.expand(word, op)?],
        Mode::AllOperators => query.generate_all_expansions(word)?,
        Mode::Leaves => query.leaf_expansions(word)?,
    };
    Ok(trees)
}

/// Count every expansion against the index.
pub fn counted(index: &Index, trees: Vec<QueryTree>) -> Vec<(QueryTree, usize)> {
    trees
        .into_iter()
        .map(|tree| {
            let count = index.count(&tree);
            (tree, count)
        })
        .collect()
}

/// Run the expand command.
pub fn run(
    config: Config,
    text: &str,
    word: &str,
    mode: Mode,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let app = App::new(config)?;
    app.warn_if_empty();

    let query = app.parse(text)?;
    let word = if app.config.query.fold_case {
        word.to_lowercase()
    } else {
        word.to_string()
    };

    let results = counted(&app.index, expansions(&query, &word, mode)?);

    match output {
        OutputFormat::Text => {
            let width = results
                .iter()
                .map(|(_, count)| count.to_string().len())
                .max()
                .unwrap_or(1);
            for (tree, count) in &results {
                println!("{:>width$}  {}", count, tree, width = width);
            }
        }
        OutputFormat::Json => {
            let json_results: Vec<serde_json::Value> = results
                .iter()
                .map(|(tree, count)| {
                    serde_json::json!({
                        "query": tree.to_string(),
                        "count": count,
                    })
                })
                .collect();

            println!("{}", serde_json::to_string_pretty(&json_results)?);
        }
    }

    Ok(())
}
