//! Turn command line targets into solution snapshots
//!
//! A target is one of:
//! - a response file (`*.rsp`) listing sources and `/define:` options
//! - a solution manifest (`*.yaml`, `*.yml`, `*.json`)
//! - a directory, loaded as one project per language found below it

use crate::provider::AnalysisProvider;
use crate::syntax::{Language, ParseOptions};
use crate::workspace::{ProjectId, Solution, WorkspaceError};
use glob::glob;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Loader error
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The target '{0}' does not exist or is not a response file, manifest or directory")]
    MissingTarget(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("Unknown language '{0}'")]
    UnknownLanguage(String),

    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

/// What kind of target was loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    ResponseFile,
    Manifest,
    Directory,
}

/// A loaded target
#[derive(Debug, Clone)]
pub struct LoadedTarget {
    pub path: PathBuf,
    pub kind: TargetKind,
    pub solution: Solution,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    projects: Vec<ManifestProject>,
}

#[derive(Debug, Deserialize)]
struct ManifestProject {
    name: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    defines: Vec<String>,
}

/// Load a target into a fresh solution
///
/// `language` applies to response files, which carry no language of their own.
pub fn load_target(
    path: &Path,
    language: Language,
    provider: Arc<dyn AnalysisProvider>,
) -> Result<LoadedTarget, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let (kind, solution) = if path.is_dir() {
        (TargetKind::Directory, load_directory(path, provider)?)
    } else if path.is_file() && ext == "rsp" {
        (
            TargetKind::ResponseFile,
            load_response_file(path, language, provider)?,
        )
    } else if path.is_file() && matches!(ext.as_str(), "yaml" | "yml" | "json") {
        (TargetKind::Manifest, load_manifest(path, provider)?)
    } else {
        return Err(LoadError::MissingTarget(path.to_path_buf()));
    };

    log::info!(
        "Loaded {} with {} document(s)",
        path.display(),
        solution.document_count()
    );
    Ok(LoadedTarget {
        path: path.to_path_buf(),
        kind,
        solution,
    })
}

fn read(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Expand a path or glob pattern relative to `base`
fn expand(base: &Path, pattern: &str) -> Result<Vec<PathBuf>, LoadError> {
    let full = if Path::new(pattern).is_absolute() {
        PathBuf::from(pattern)
    } else {
        base.join(pattern)
    };
    let full = full.to_string_lossy().into_owned();

    let paths = glob(&full).map_err(|e| LoadError::Pattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    let mut files: Vec<PathBuf> = paths.flatten().filter(|p| p.is_file()).collect();
    files.sort();
    Ok(files)
}

/// Expand a user-supplied pattern, warning when it matches nothing
fn expand_listed(base: &Path, pattern: &str) -> Result<Vec<PathBuf>, LoadError> {
    let files = expand(base, pattern)?;
    if files.is_empty() {
        log::warn!("No files match '{}'", pattern);
    }
    Ok(files)
}

/// Split `/define:A;B` style values
fn split_symbols(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split([';', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn define_value(token: &str) -> Option<&str> {
    let lower = token.to_ascii_lowercase();
    ["/define:", "-define:", "/d:", "-d:"]
        .iter()
        .find(|prefix| lower.starts_with(*prefix))
        .map(|prefix| &token[prefix.len()..])
}

fn add_files(
    solution: Solution,
    project: ProjectId,
    files: &[PathBuf],
) -> Result<Solution, LoadError> {
    let mut solution = solution;
    for file in files {
        if solution.document_by_path(file).is_some() {
            continue;
        }
        let text = read(file)?;
        let (next, _) = solution.add_document(project, &file_name(file), Some(file.clone()), &text)?;
        solution = next;
    }
    Ok(solution)
}

/// Parse a compiler response file into one project
pub fn load_response_file(
    path: &Path,
    language: Language,
    provider: Arc<dyn AnalysisProvider>,
) -> Result<Solution, LoadError> {
    let text = read(path)?;
    let base = path.parent().unwrap_or(Path::new("."));

    let mut symbols = Vec::new();
    let mut files = Vec::new();
    for token in text.split_whitespace() {
        if let Some(value) = define_value(token) {
            symbols.extend(split_symbols(value));
        } else if token.starts_with('-') || (token.starts_with('/') && !token[1..].contains('/')) {
            log::debug!("Ignoring option {}", token);
        } else {
            files.extend(expand_listed(base, token.trim_matches('"'))?);
        }
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name(path));
    let symbol_refs: Vec<&str> = symbols.iter().map(String::as_str).collect();
    let (solution, project) =
        Solution::new(provider).add_project(&name, language, ParseOptions::new(&symbol_refs));
    add_files(solution, project, &files)
}

/// Parse a YAML or JSON solution manifest
pub fn load_manifest(path: &Path, provider: Arc<dyn AnalysisProvider>) -> Result<Solution, LoadError> {
    let text = read(path)?;
    let is_json = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let manifest: Manifest = if is_json {
        serde_json::from_str(&text).map_err(|e| LoadError::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
    } else {
        serde_yaml::from_str(&text).map_err(|e| LoadError::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
    };

    let base = path.parent().unwrap_or(Path::new("."));
    let mut solution = Solution::new(provider);
    for entry in &manifest.projects {
        let language = match &entry.language {
            Some(name) => name
                .parse::<Language>()
                .map_err(|_| LoadError::UnknownLanguage(name.clone()))?,
            None => Language::CSharp,
        };

        let mut files = Vec::new();
        for pattern in &entry.files {
            files.extend(expand_listed(base, pattern)?);
        }

        let defines: Vec<&str> = entry.defines.iter().map(String::as_str).collect();
        let (next, project) = solution.add_project(&entry.name, language, ParseOptions::new(&defines));
        solution = add_files(next, project, &files)?;
    }
    Ok(solution)
}

/// Load every C# and Visual Basic file below a directory
pub fn load_directory(path: &Path, provider: Arc<dyn AnalysisProvider>) -> Result<Solution, LoadError> {
    let mut by_language: BTreeMap<&'static str, (Language, Vec<PathBuf>)> = BTreeMap::new();
    for language in Language::ALL {
        let files = expand(path, &format!("**/*.{}", language.extension()))?;
        if !files.is_empty() {
            by_language.insert(language.extension(), (language, files));
        }
    }

    let name = file_name(path);
    let mixed = by_language.len() > 1;
    let mut solution = Solution::new(provider);
    for (language, files) in by_language.into_values() {
        let project_name = if mixed {
            format!("{} ({})", name, language)
        } else {
            name.clone()
        };
        let (next, project) = solution.add_project(&project_name, language, ParseOptions::default());
        solution = add_files(next, project, &files)?;
    }
    Ok(solution)
}
