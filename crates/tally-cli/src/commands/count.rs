//! Count command - count documents matching a query.

use crate::app::App;
use crate::OutputFormat;
use std::time::Instant;
use tally_core::{Config, DocId, QueryTree};

/// Text output for a count, optionally followed by the ids.
fn format_text(count: usize, ids: Option<&[DocId]>) -> String {
    let mut out = count.to_string();
    if let Some(ids) = ids {
        let listed: Vec<String> = ids.iter().map(DocId::to_string).collect();
        out.push('\n');
        out.push_str(&listed.join(" "));
    }
    out
}

fn format_json(query: &QueryTree, count: usize, ids: Option<&[DocId]>) -> serde_json::Value {
    let mut value = serde_json::json!({
        "query": query.to_string(),
        "count": count,
    });
    if let Some(ids) = ids {
        value["ids"] = serde_json::json!(ids);
    }
    value
}

/// Run the count command.
pub fn run(config: Config, text: &str, show_ids: bool, output: OutputFormat) -> anyhow::Result<()> {
    let app = App::new(config)?;
    app.warn_if_empty();

    let query = app.parse(text)?;

    let start = Instant::now();
    let ids = app.index.search(&query);
    let elapsed = start.elapsed();

    let listed = show_ids.then_some(ids.as_slice());
    match output {
        OutputFormat::Text => {
            println!("{}", format_text(ids.len(), listed));
            eprintln!(
                "Matched {} of {} documents in {:.3}ms",
                ids.len(),
                app.index.document_count(),
                elapsed.as_secs_f64() * 1000.0
            );
        }
        OutputFormat::Json => {
            let value = format_json(&query, ids.len(), listed);
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}
