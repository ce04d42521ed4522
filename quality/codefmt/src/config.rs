//! Layered configuration
//!
//! Settings come from built-in defaults, then a YAML or JSON file (an explicit
//! `--config` path, or the first of `.codefmtrc.*` / `codefmt.*` in the working
//! directory or the home directory), then command line overrides.

use crate::options::{FormatMode, FormattingOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Malformed JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(String),
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Run the syntax pass on a worker pool
    pub parallel: bool,

    /// Number of workers (0 = auto-detect)
    pub jobs: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            jobs: 0,
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub color: ColorMode,
    /// Per-document timing and the rule timing table
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("text") {
            Ok(Self::Text)
        } else if s.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else {
            Err(format!("'{}' is not an output format (expected text or json)", s))
        }
    }
}

/// Color mode options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

/// Which documents a run may touch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Glob patterns of files to leave untouched
    pub exclude: Vec<String>,
}

/// Name toggles applied on top of the registered defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToggleConfig {
    pub enabled: Vec<String>,
    pub disabled: Vec<String>,
}

/// What a run does to the code
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Copyright header lines
    pub copyright_header: Vec<String>,

    /// Only format documents with these file names
    pub file_names: Vec<String>,

    /// Preprocessor symbol sets (one list per configuration)
    pub preprocessor_configs: Vec<Vec<String>>,

    /// Define the formatter symbol while running
    pub allow_tables: bool,

    /// Run analyzers with fix-all instead of rules
    pub use_analyzers: bool,

    /// Settings file handed to analyzers
    pub settings: Option<PathBuf>,
}

/// A configuration file, or the merge of several
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Extend from other configuration files
    pub extends: Vec<String>,

    pub engine: EngineConfig,

    pub output: OutputConfig,

    pub files: FilesConfig,

    /// Formatting rule toggles
    pub rules: ToggleConfig,

    /// Diagnostic id toggles
    pub diagnostics: ToggleConfig,

    pub format: FormatConfig,
}

/// Command line values that override the configuration
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub format: Option<OutputFormat>,
    pub verbose: bool,
    pub no_color: bool,
    pub jobs: Option<usize>,
    pub enable: Vec<String>,
    pub disable: Vec<String>,
    pub copyright_header: Option<Vec<String>>,
    pub file_names: Vec<String>,
    pub preprocessor_symbols: Vec<String>,
    pub allow_tables: bool,
    pub use_analyzers: bool,
    pub settings: Option<PathBuf>,
}

/// File names looked up by [`Config::load_default`], in priority order
const CONFIG_NAMES: [&str; 6] = [
    ".codefmtrc.yaml",
    ".codefmtrc.yml",
    ".codefmtrc.json",
    "codefmt.yaml",
    "codefmt.yml",
    "codefmt.json",
];

/// `extends` chains deeper than this are rejected
const MAX_EXTENDS_DEPTH: usize = 10;

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration file, following its `extends` chain
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_chain(path, 0)
    }

    fn load_chain(path: &Path, depth: usize) -> Result<Self, ConfigError> {
        if depth >= MAX_EXTENDS_DEPTH {
            return Err(ConfigError::Invalid(format!(
                "{} extends more than {} levels deep",
                path.display(),
                MAX_EXTENDS_DEPTH
            )));
        }

        let mut own = Self::parse(path, &std::fs::read_to_string(path)?)?;
        let dir = path.parent().unwrap_or(Path::new("."));

        if let Some(settings) = own.format.settings.take() {
            own.format.settings = Some(relative_to(dir, &settings));
        }
        if own.extends.is_empty() {
            return Ok(own);
        }

        let mut merged = Self::default();
        for parent in std::mem::take(&mut own.extends) {
            merged.merge(Self::load_chain(&relative_to(dir, Path::new(&parent)), depth + 1)?);
        }
        merged.merge(own);
        Ok(merged)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Ok(serde_yaml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::Invalid(format!(
                "{} is not a .yaml, .yml or .json file",
                path.display()
            ))),
        }
    }

    /// Layer `other` on top of this configuration
    ///
    /// Lists of toggles and excludes accumulate; scalar settings are taken
    /// from `other` only when it sets them away from their default.
    pub fn merge(&mut self, other: Self) {
        if other.engine.jobs != 0 {
            self.engine.jobs = other.engine.jobs;
        }
        if !other.engine.parallel {
            self.engine.parallel = false;
        }

        let output = other.output;
        if output.format != OutputFormat::default() {
            self.output.format = output.format;
        }
        if output.color != ColorMode::default() {
            self.output.color = output.color;
        }
        self.output.verbose |= output.verbose;

        self.files.exclude.extend(other.files.exclude);
        merge_toggles(&mut self.rules, other.rules);
        merge_toggles(&mut self.diagnostics, other.diagnostics);

        let format = other.format;
        if !format.copyright_header.is_empty() {
            self.format.copyright_header = format.copyright_header;
        }
        if !format.file_names.is_empty() {
            self.format.file_names = format.file_names;
        }
        self.format
            .preprocessor_configs
            .extend(format.preprocessor_configs);
        self.format.allow_tables |= format.allow_tables;
        self.format.use_analyzers |= format.use_analyzers;
        if format.settings.is_some() {
            self.format.settings = format.settings;
        }
    }

    /// Look for a configuration file in the working directory, then in the
    /// home directory; defaults when neither has one
    pub fn load_default() -> Result<Self, ConfigError> {
        let mut dirs_to_search = vec![PathBuf::from(".")];
        dirs_to_search.extend(dirs::home_dir());

        for dir in dirs_to_search {
            if let Some(path) = CONFIG_NAMES.iter().map(|n| dir.join(n)).find(|p| p.is_file()) {
                log::debug!("Using configuration {}", path.display());
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }

    /// Apply command line values; they win over every file setting
    pub fn merge_cli(&mut self, cli: CliOverrides) {
        if let Some(format) = cli.format {
            self.output.format = format;
        }
        if cli.no_color {
            self.output.color = ColorMode::Never;
        }
        self.output.verbose |= cli.verbose;
        if let Some(jobs) = cli.jobs {
            self.engine.jobs = jobs;
        }

        self.format.use_analyzers |= cli.use_analyzers;
        // Command line names are rule names, or diagnostic ids in analyzer mode
        let toggles = if self.format.use_analyzers {
            &mut self.diagnostics
        } else {
            &mut self.rules
        };
        merge_toggles(
            toggles,
            ToggleConfig {
                enabled: cli.enable,
                disabled: cli.disable,
            },
        );

        if let Some(header) = cli.copyright_header {
            self.format.copyright_header = header;
        }
        if !cli.file_names.is_empty() {
            self.format.file_names = cli.file_names;
        }
        if !cli.preprocessor_symbols.is_empty() {
            self.format.preprocessor_configs.push(cli.preprocessor_symbols);
        }
        self.format.allow_tables |= cli.allow_tables;
        if cli.settings.is_some() {
            self.format.settings = cli.settings;
        }
    }

    /// Build the run options described by this configuration
    pub fn to_formatting_options(&self) -> FormattingOptions {
        let mode = if self.format.use_analyzers {
            FormatMode::Analyzers
        } else {
            FormatMode::Rules
        };
        let mut options = FormattingOptions::new()
            .with_copyright_header(self.format.copyright_header.clone())
            .with_file_names(self.format.file_names.clone())
            .with_verbose(self.output.verbose)
            .with_allow_tables(self.format.allow_tables)
            .with_mode(mode)
            .with_settings_file(self.format.settings.clone());
        for symbols in &self.format.preprocessor_configs {
            options = options.with_preprocessor_configuration(symbols.clone());
        }
        options
    }
}

fn relative_to(dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        dir.join(path)
    }
}

/// A later enable cancels an earlier disable of the same name and vice versa
fn merge_toggles(base: &mut ToggleConfig, other: ToggleConfig) {
    for name in other.enabled {
        base.disabled.retain(|n| !n.eq_ignore_ascii_case(&name));
        base.enabled.push(name);
    }
    for name in other.disabled {
        base.enabled.retain(|n| !n.eq_ignore_ascii_case(&name));
        base.disabled.push(name);
    }
}
