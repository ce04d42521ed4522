//! Formatting rules: descriptors, rule traits, catalog and toggle map

use crate::options::FormattingOptions;
use crate::syntax::{Language, SyntaxTree};
use crate::workspace::{Document, Solution, WorkspaceError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Rule class, ordered by pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleClass {
    /// Tree-to-tree rewrite of one document
    Syntax,
    /// Rewrite of one document using its semantic model
    LocalSemantic,
    /// Rewrite that may touch any document of the solution
    GlobalSemantic,
}

impl fmt::Display for RuleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleClass::Syntax => write!(f, "syntax"),
            RuleClass::LocalSemantic => write!(f, "local-semantic"),
            RuleClass::GlobalSemantic => write!(f, "global-semantic"),
        }
    }
}

/// Metadata of a formatting rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleDescriptor {
    /// Unique name (compared case-insensitively)
    pub name: String,
    pub description: String,
    /// Position within the class; ties keep registration order
    pub order: i32,
    pub default_enabled: bool,
    pub class: RuleClass,
    pub languages: Vec<Language>,
}

impl RuleDescriptor {
    /// Descriptor enabled by default for every language
    pub fn new(name: &str, class: RuleClass) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            order: 0,
            default_enabled: true,
            class,
            languages: Language::ALL.to_vec(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_default_enabled(mut self, enabled: bool) -> Self {
        self.default_enabled = enabled;
        self
    }

    pub fn with_languages(mut self, languages: &[Language]) -> Self {
        self.languages = languages.to_vec();
        self
    }

    pub fn supports_language(&self, language: Language) -> bool {
        self.languages.contains(&language)
    }
}

/// Failure raised by a semantic rule
#[derive(Debug, Error)]
pub enum RuleError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("{0}")]
    Failed(String),
}

/// Pure tree-to-tree rewrite
///
/// Returning the input `Arc` means "no change".
pub trait SyntaxRule: Send + Sync {
    fn process(&self, tree: &Arc<SyntaxTree>, language: Language) -> Arc<SyntaxTree>;
}

/// Single-document rewrite that may read the document's semantic model
pub trait LocalSemanticRule: Send + Sync {
    fn process(
        &self,
        document: &Document,
        tree: &Arc<SyntaxTree>,
        cancel: &CancellationToken,
    ) -> Result<Arc<SyntaxTree>, RuleError>;
}

/// Solution-wide rewrite anchored at one document
pub trait GlobalSemanticRule: Send + Sync {
    fn process(
        &self,
        solution: &Solution,
        document: &Document,
        tree: &Arc<SyntaxTree>,
        cancel: &CancellationToken,
    ) -> Result<Solution, RuleError>;
}

/// An instantiated rule of any class
pub enum FormattingRule {
    Syntax(Box<dyn SyntaxRule>),
    LocalSemantic(Box<dyn LocalSemanticRule>),
    GlobalSemantic(Box<dyn GlobalSemanticRule>),
}

impl FormattingRule {
    pub fn class(&self) -> RuleClass {
        match self {
            FormattingRule::Syntax(_) => RuleClass::Syntax,
            FormattingRule::LocalSemantic(_) => RuleClass::LocalSemantic,
            FormattingRule::GlobalSemantic(_) => RuleClass::GlobalSemantic,
        }
    }
}

/// Builds a rule for a run
pub type RuleFactory = Arc<dyn Fn(&FormattingOptions) -> FormattingRule + Send + Sync>;

/// Registration error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Duplicate rule name: {0}")]
    Duplicate(String),
}

/// A registered rule
#[derive(Clone)]
pub struct CatalogEntry {
    pub descriptor: RuleDescriptor,
    factory: RuleFactory,
}

impl CatalogEntry {
    /// Instantiate the rule for a run
    pub fn instantiate(&self, options: &FormattingOptions) -> FormattingRule {
        (self.factory)(options)
    }
}

/// Registration-ordered rule list
#[derive(Clone, Default)]
pub struct RuleCatalog {
    entries: Vec<CatalogEntry>,
}

impl RuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule; names must be unique case-insensitively
    pub fn register<F>(&mut self, descriptor: RuleDescriptor, factory: F) -> Result<(), CatalogError>
    where
        F: Fn(&FormattingOptions) -> FormattingRule + Send + Sync + 'static,
    {
        if self.find(&descriptor.name).is_some() {
            return Err(CatalogError::Duplicate(descriptor.name));
        }
        self.entries.push(CatalogEntry {
            descriptor,
            factory: Arc::new(factory),
        });
        Ok(())
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &RuleDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    /// Case-insensitive lookup
    pub fn find(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| e.descriptor.name.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Enabled entries of a class, stable-sorted by order
    pub fn ordered_enabled(&self, class: RuleClass, toggles: &ToggleMap) -> Vec<&CatalogEntry> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.descriptor.class == class && toggles.is_enabled(&e.descriptor.name))
            .collect();
        entries.sort_by_key(|e| e.descriptor.order);
        entries
    }
}

/// Toggling a name that is not in the map
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown name: {0}")]
pub struct UnknownName(pub String);

/// Case-insensitive name -> enabled table
#[derive(Debug, Clone, Default)]
pub struct ToggleMap {
    entries: HashMap<String, (String, bool)>,
}

impl ToggleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from rule descriptors' default flags
    pub fn from_catalog(catalog: &RuleCatalog) -> Self {
        let mut map = Self::new();
        for descriptor in catalog.descriptors() {
            map.insert(&descriptor.name, descriptor.default_enabled);
        }
        map
    }

    /// Insert or overwrite an entry
    pub fn insert(&mut self, name: &str, enabled: bool) {
        self.entries
            .insert(name.to_lowercase(), (name.to_string(), enabled));
    }

    /// Toggle an existing entry; unknown names leave the map untouched
    pub fn toggle(&mut self, name: &str, enabled: bool) -> Result<(), UnknownName> {
        match self.entries.get_mut(&name.to_lowercase()) {
            Some(entry) => {
                entry.1 = enabled;
                Ok(())
            }
            None => Err(UnknownName(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    /// Unknown names count as enabled
    pub fn is_enabled(&self, name: &str) -> bool {
        self.entries
            .get(&name.to_lowercase())
            .map(|(_, enabled)| *enabled)
            .unwrap_or(true)
    }

    /// Entries sorted by name, with their original spelling
    pub fn entries(&self) -> Vec<(&str, bool)> {
        let mut out: Vec<_> = self
            .entries
            .values()
            .map(|(name, enabled)| (name.as_str(), *enabled))
            .collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
