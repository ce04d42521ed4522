//! Run options handed to rule factories and the engine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Preprocessor symbol defined during a run when tables are allowed
pub const FORMATTER_SYMBOL: &str = "CODE_FORMATTER";

/// Which pipeline the engine runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatMode {
    /// Syntax, local-semantic and global-semantic rule passes
    #[default]
    Rules,
    /// Diagnostic analyzers with batched fix-all
    Analyzers,
}

impl std::fmt::Display for FormatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatMode::Rules => write!(f, "rules"),
            FormatMode::Analyzers => write!(f, "analyzers"),
        }
    }
}

/// Options of a single formatting run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormattingOptions {
    /// Copyright header lines, with or without comment delimiters
    pub copyright_header: Vec<String>,
    /// File-name allow-list (empty = all files)
    pub file_names: Vec<String>,
    /// Preprocessor symbol sets the run is evaluated under
    pub preprocessor_configurations: Vec<Vec<String>>,
    /// Log per-document timing
    pub verbose: bool,
    /// Define [`FORMATTER_SYMBOL`] for the duration of the run
    pub allow_tables: bool,
    pub mode: FormatMode,
    /// Analyzer settings file passed as an additional file
    pub settings_file: Option<PathBuf>,
}

impl FormattingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_copyright_header(mut self, lines: Vec<String>) -> Self {
        self.copyright_header = lines;
        self
    }

    pub fn with_file_names(mut self, names: Vec<String>) -> Self {
        self.file_names = names;
        self
    }

    pub fn with_preprocessor_configuration(mut self, symbols: Vec<String>) -> Self {
        self.preprocessor_configurations.push(symbols);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_allow_tables(mut self, allow: bool) -> Self {
        self.allow_tables = allow;
        self
    }

    pub fn with_mode(mut self, mode: FormatMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_settings_file(mut self, path: Option<PathBuf>) -> Self {
        self.settings_file = path;
        self
    }

    /// Symbols defined only while the run is in progress
    pub fn transient_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = Vec::new();
        for config in &self.preprocessor_configurations {
            for symbol in config {
                if !symbols.contains(symbol) {
                    symbols.push(symbol.clone());
                }
            }
        }
        if self.allow_tables && !symbols.iter().any(|s| s == FORMATTER_SYMBOL) {
            symbols.push(FORMATTER_SYMBOL.to_string());
        }
        symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_symbols() {
        let opts = FormattingOptions::new();
        assert!(opts.transient_symbols().is_empty());

        let opts = opts
            .with_preprocessor_configuration(vec!["DEBUG".to_string()])
            .with_preprocessor_configuration(vec!["DEBUG".to_string(), "TRACE".to_string()])
            .with_allow_tables(true);
        assert_eq!(
            opts.transient_symbols(),
            vec!["DEBUG", "TRACE", FORMATTER_SYMBOL]
        );
    }

    #[test]
    fn test_format_mode_serde() {
        let mode: FormatMode = serde_yaml::from_str("analyzers").unwrap();
        assert_eq!(mode, FormatMode::Analyzers);
        assert_eq!(FormatMode::Rules.to_string(), "rules");
    }
}
