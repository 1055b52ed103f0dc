//! Status command - show index status and statistics.

use crate::app::App;
use crate::OutputFormat;
use tally_core::Config;

/// Run the status command.
pub fn run(config: Config, output: OutputFormat) -> anyhow::Result<()> {
    let app = App::new(config)?;
    let stats = app.index.stats();

    if output == OutputFormat::Json {
        let value = serde_json::json!({
            "index_path": app.file.path().display().to_string(),
            "exists": app.file.exists(),
            "compress": app.config.storage.compress,
            "fold_case": app.config.query.fold_case,
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Tally Index Status");
    println!("==================");
    println!();

    if app.index.is_empty() {
        println!("Index is empty. Run 'tally ingest <file>' to build the index.");
    } else {
        println!("Summary:");
        println!("  Documents:          {}", stats.documents);
        println!("  Distinct terms:     {}", stats.terms);
        println!("  Postings:           {}", stats.postings);
        println!("  Longest posting:    {}", stats.longest_posting_list);
        println!("  Terms per document: {:.2}", stats.terms_per_document());
    }

    println!();
    println!("Settings:");
    println!("  Case folding:       {}", app.config.query.fold_case);
    println!("  Compression:        {}", app.config.storage.compress);

    println!();
    println!("Index file: {}", app.file.path().display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_config;
    use tempfile::TempDir;

    #[test]
    fn test_status_without_index() {
        let temp_dir = TempDir::new().unwrap();
        run(test_config(temp_dir.path()), OutputFormat::Text).unwrap();
        run(test_config(temp_dir.path()), OutputFormat::Json).unwrap();
    }
}
