//! Project linting
//!
//! Rules run over the markup documents of a project and the import graph
//! built for them. Reported warnings are filtered by code and severity
//! before they reach the user.

pub mod rules;

use crate::core::{BuildError, ContentKind};
use crate::project::DependencyGraph;
use console::style;
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub use rules::{MissingDoctype, Rule, RuleRegistry, UnresolvedReference};

/// Severity of a lint warning, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintWarning {
    pub code: &'static str,
    pub severity: Severity,
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for LintWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => style("error").red(),
            Severity::Warning => style("warning").yellow(),
            Severity::Info => style("info").green(),
        };
        write!(
            f,
            "{} {} [{}] {}",
            style(self.path.display()).bold(),
            severity,
            self.code,
            self.message
        )
    }
}

/// What a rule gets to look at
pub struct LintContext {
    pub graph: Arc<dyn DependencyGraph>,

    /// Linted documents with their source text
    pub documents: Vec<(PathBuf, String)>,
}

/// Drops ignored codes and anything less severe than the minimum
#[derive(Debug, Clone)]
pub struct WarningFilter {
    ignore_codes: HashSet<String>,
    minimum_severity: Severity,
}

impl WarningFilter {
    pub fn new(ignore_codes: impl IntoIterator<Item = String>, minimum_severity: Severity) -> Self {
        Self {
            ignore_codes: ignore_codes.into_iter().collect(),
            minimum_severity,
        }
    }

    pub fn should_ignore(&self, warning: &LintWarning) -> bool {
        self.ignore_codes.contains(warning.code) || warning.severity > self.minimum_severity
    }
}

/// Runs a set of rules over project documents
pub struct Linter {
    rules: Vec<Arc<dyn Rule>>,
    graph: Arc<dyn DependencyGraph>,
    root: PathBuf,
}

impl Linter {
    pub fn new(rules: Vec<Arc<dyn Rule>>, graph: Arc<dyn DependencyGraph>, root: impl Into<PathBuf>) -> Self {
        Self {
            rules,
            graph,
            root: root.into(),
        }
    }

    /// Lint the markup documents among `paths`
    pub async fn lint(&self, paths: &[PathBuf]) -> Result<Vec<LintWarning>, BuildError> {
        let mut documents = Vec::new();
        for path in paths {
            if ContentKind::from_path(path) != ContentKind::Markup {
                continue;
            }
            let full = self.root.join(path);
            let source = tokio::fs::read_to_string(&full)
                .await
                .map_err(|e| BuildError::io(&full, e))?;
            documents.push((path.clone(), source));
        }
        debug!("Linting {} documents with {} rules", documents.len(), self.rules.len());

        let context = LintContext {
            graph: self.graph.clone(),
            documents,
        };
        let mut warnings: Vec<LintWarning> = self
            .rules
            .iter()
            .flat_map(|rule| rule.check(&context))
            .collect();
        warnings.sort_by(|a, b| a.path.cmp(&b.path).then(a.severity.cmp(&b.severity)));
        Ok(warnings)
    }
}

/// Closing line of a lint run, e.g. `Found 1 errors 2 warnings.`
pub fn summary(warnings: &[LintWarning]) -> Option<String> {
    if warnings.is_empty() {
        return None;
    }
    let count = |severity| warnings.iter().filter(|w| w.severity == severity).count();

    let mut parts = Vec::new();
    let errors = count(Severity::Error);
    if errors > 0 {
        parts.push(format!("{} {}", errors, style("errors").red()));
    }
    let warned = count(Severity::Warning);
    if warned > 0 {
        parts.push(format!("{} {}", warned, style("warnings").yellow()));
    }
    let infos = count(Severity::Info);
    if infos > 0 {
        parts.push(format!("{} {} messages", infos, style("info").green()));
    }
    Some(format!("Found {}.", parts.join(" ")))
}

/// Project-relative input paths given on the command line
pub fn relative_inputs(root: &Path, inputs: &[PathBuf]) -> Vec<PathBuf> {
    inputs
        .iter()
        .map(|input| normalize(input.strip_prefix(root).unwrap_or(input)))
        .collect()
}

/// Drop `.` components and fold each `..` into the component before it
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir if out.file_name().is_some() => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
