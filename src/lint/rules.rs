//! Built-in lint rules and the rule registry

use crate::core::BuildError;
use crate::lint::{LintContext, LintWarning, Severity};
use std::collections::HashMap;
use std::sync::Arc;

/// A single lint check over the documents of a project
pub trait Rule: Send + Sync {
    fn code(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn check(&self, context: &LintContext) -> Vec<LintWarning>;
}

/// Local references whose target is not part of the project
pub struct UnresolvedReference;

impl Rule for UnresolvedReference {
    fn code(&self) -> &'static str {
        "unresolved-reference"
    }

    fn description(&self) -> &'static str {
        "Warns about local imports, scripts and stylesheets that do not exist"
    }

    fn check(&self, context: &LintContext) -> Vec<LintWarning> {
        let mut warnings = Vec::new();
        for (document, _) in &context.documents {
            for reference in context.graph.references(document) {
                if reference.exists {
                    continue;
                }
                let message = match &reference.target {
                    Some(target) => format!(
                        "'{}' resolves to {}, which does not exist",
                        reference.href,
                        target.display()
                    ),
                    None => format!("'{}' points outside the project root", reference.href),
                };
                warnings.push(LintWarning {
                    code: self.code(),
                    severity: Severity::Error,
                    path: document.clone(),
                    message,
                });
            }
        }
        warnings
    }
}

/// Entrypoint without `<!doctype html>`, which puts browsers in quirks mode
pub struct MissingDoctype;

impl Rule for MissingDoctype {
    fn code(&self) -> &'static str {
        "missing-doctype"
    }

    fn description(&self) -> &'static str {
        "Warns when the entrypoint does not start with <!doctype html>"
    }

    fn check(&self, context: &LintContext) -> Vec<LintWarning> {
        let entrypoint = context.graph.entrypoint();
        let Some((_, source)) = context.documents.iter().find(|(path, _)| path == entrypoint) else {
            return Vec::new();
        };

        let starts_with_doctype = source
            .trim_start_matches('\u{feff}')
            .trim_start()
            .get(..15)
            .is_some_and(|head| head.eq_ignore_ascii_case("<!doctype html>"));
        if starts_with_doctype {
            return Vec::new();
        }

        vec![LintWarning {
            code: self.code(),
            severity: Severity::Warning,
            path: entrypoint.to_path_buf(),
            message: "entrypoint should start with <!doctype html>".to_string(),
        }]
    }
}

/// Rules and named rule collections, looked up by code
pub struct RuleRegistry {
    rules: HashMap<&'static str, Arc<dyn Rule>>,
    collections: HashMap<&'static str, Vec<&'static str>>,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        let mut registry = Self {
            rules: HashMap::new(),
            collections: HashMap::new(),
        };
        registry.register(Arc::new(UnresolvedReference));
        registry.register(Arc::new(MissingDoctype));
        registry
            .collections
            .insert("assetline-1", vec!["unresolved-reference", "missing-doctype"]);
        registry
    }
}

impl RuleRegistry {
    pub fn register(&mut self, rule: Arc<dyn Rule>) {
        self.rules.insert(rule.code(), rule);
    }

    /// Resolve rule and collection codes, keeping first-seen order without
    /// duplicates
    pub fn get_rules(&self, codes: &[String]) -> Result<Vec<Arc<dyn Rule>>, BuildError> {
        let mut resolved: Vec<Arc<dyn Rule>> = Vec::new();
        for code in codes {
            let members = match self.collections.get(code.as_str()) {
                Some(members) => members.clone(),
                None if self.rules.contains_key(code.as_str()) => vec![code.as_str()],
                None => {
                    return Err(BuildError::Config(format!("Unknown lint rule or collection '{}'", code)));
                }
            };
            for member in members {
                if resolved.iter().any(|rule| rule.code() == member) {
                    continue;
                }
                if let Some(rule) = self.rules.get(member) {
                    resolved.push(rule.clone());
                }
            }
        }
        Ok(resolved)
    }
}
