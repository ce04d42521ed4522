//! Diagnostic analyzers run by the fix-all pipeline

use crate::diagnostic::{Diagnostic, DiagnosticDescriptor};
use crate::workspace::{Project, Solution};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// An extra input file made available to analyzers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditionalFile {
    pub path: PathBuf,
    pub text: String,
}

/// Options passed to every analyzer of a run
#[derive(Debug, Clone, Default)]
pub struct AnalyzerOptions {
    pub additional_files: Vec<AdditionalFile>,
}

impl AnalyzerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a settings file and attach it as an additional file
    pub fn with_settings_file(mut self, path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        self.additional_files.push(AdditionalFile {
            path: path.to_path_buf(),
            text,
        });
        Ok(self)
    }

    /// Find an additional file by file name
    pub fn additional_file(&self, file_name: &str) -> Option<&AdditionalFile> {
        self.additional_files.iter().find(|f| {
            f.path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case(file_name))
        })
    }
}

/// Reports diagnostics over a project snapshot
pub trait DiagnosticAnalyzer: Send + Sync {
    /// Analyzer name used in diagnostics and logs
    fn name(&self) -> &str;

    /// Diagnostics this analyzer can report
    fn supported_diagnostics(&self) -> Vec<DiagnosticDescriptor>;

    /// Analyze every document of a project
    fn analyze(
        &self,
        solution: &Solution,
        project: &Project,
        options: &AnalyzerOptions,
        cancel: &CancellationToken,
    ) -> Vec<Diagnostic>;
}
