//! Application state management.

use tally_core::{Config, Index, IndexFile, QueryTree};
use tracing::info;

/// Shared application state.
pub struct App {
    /// Configuration
    pub config: Config,

    /// The inverted index
    pub index: Index,

    /// Index persistence
    pub file: IndexFile,
}

impl App {
    /// Create a new application instance, loading the index if it exists.
    ///
    /// An index that exists but cannot be used is an error, with a hint to
    /// rebuild it.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let file = config.index_file()?;
        let index = match file.load_or_new() {
            Ok(index) => index,
            Err(e) if e.requires_rebuild() => {
                let hint = format!(
                    "index at {} cannot be used; rebuild it with 'tally ingest --fresh <file>'",
                    file.path().display()
                );
                return Err(anyhow::Error::new(e).context(hint));
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %file.path().display(),
            documents = index.document_count(),
            terms = index.term_count(),
            "Application initialized"
        );

        Ok(App {
            config,
            index,
            file,
        })
    }

    /// Create an application instance with an empty index, ignoring any
    /// existing file until the next save.
    pub fn fresh(config: Config) -> anyhow::Result<Self> {
        let file = config.index_file()?;
        info!(path = %file.path().display(), "Starting from an empty index");

        Ok(App {
            config,
            index: Index::new(),
            file,
        })
    }

    /// Parse query text with the configured options.
    pub fn parse(&self, text: &str) -> anyhow::Result<QueryTree> {
        let tree = QueryTree::parse_with(text, &self.config.parse_options())?;
        Ok(tree)
    }

    /// Save the current index to disk.
    pub fn save_index(&self) -> anyhow::Result<()> {
        self.file.save(&self.index)?;
        Ok(())
    }

    /// Print a hint when there is nothing to search.
    pub fn warn_if_empty(&self) {
        if self.index.is_empty() {
            eprintln!(
                "Index at {} is empty. Run 'tally ingest <file>' first.",
                self.file.path().display()
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    /// Configuration pointing at an index inside `dir`
    pub(crate) fn test_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.general.index_path = Some(dir.join("tally.idx"));
        config
    }

    #[test]
    fn test_new_without_index() {
        let temp_dir = TempDir::new().unwrap();
        let app = App::new(test_config(temp_dir.path())).unwrap();
        assert!(app.index.is_empty());
        assert!(!app.file.exists());
    }

    #[test]
    fn test_save_and_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = App::new(test_config(temp_dir.path())).unwrap();
        app.index.add_text("president obama");
        app.save_index().unwrap();

        let reopened = App::new(test_config(temp_dir.path())).unwrap();
        assert_eq!(reopened.index.document_count(), 1);

        let fresh = App::fresh(test_config(temp_dir.path())).unwrap();
        assert!(fresh.index.is_empty());
    }

    #[test]
    fn test_corrupt_index_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("tally.idx"), b"garbage").unwrap();

        let err = App::new(test_config(temp_dir.path())).err().unwrap();
        assert!(err.to_string().contains("tally ingest --fresh"));
        assert!(err.root_cause().to_string().contains("corrupted"));

        // A fresh start ignores the unusable file
        assert!(App::fresh(test_config(temp_dir.path())).is_ok());
    }

    #[test]
    fn test_parse_uses_config() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(temp_dir.path());
        config.query.fold_case = true;

        let app = App::new(config).unwrap();
        assert_eq!(app.parse("Obama").unwrap().terms(), vec!["obama"]);
    }
}
