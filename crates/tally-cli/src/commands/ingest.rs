//! Ingest command - add documents to the index.

use crate::app::App;
use anyhow::Context;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Range;
use std::path::Path;
use std::time::Instant;
use tally_core::{Config, DocId, Index};

/// Add every line of `reader` as one document.
///
/// Blank lines still become (empty) documents so that ids line up with line
/// numbers. Returns the range of assigned ids.
pub fn ingest_lines<R: BufRead>(index: &mut Index, reader: R) -> anyhow::Result<Range<DocId>> {
    let first = index.document_count();
    for (number, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", number + 1))?;
        index
            .try_add_text(&line)
            .with_context(|| format!("failed to add line {}", number + 1))?;
    }
    Ok(first..index.document_count())
}

/// Run the ingest command.
pub fn run(config: Config, file: &Path, fresh: bool) -> anyhow::Result<()> {
    let mut app = if fresh {
        App::fresh(config)?
    } else {
        App::new(config)?
    };

    let reader = BufReader::new(
        File::open(file).with_context(|| format!("failed to open {}", file.display()))?,
    );

    let start = Instant::now();
    let ids = ingest_lines(&mut app.index, reader)?;
    app.save_index()?;
    let elapsed = start.elapsed();

    let stats = app.index.stats();

    println!("Ingested {} documents from {}", ids.len(), file.display());
    if !ids.is_empty() {
        println!("  Ids:         {}..={}", ids.start, ids.end - 1);
    }
    println!("  Documents:   {}", stats.documents);
    println!("  Terms:       {}", stats.terms);
    println!("  Index file:  {}", app.file.path().display());
    println!("  Time:        {:.2}s", elapsed.as_secs_f64());

    Ok(())
}
