//! Project and build configuration from YAML

use crate::core::BuildError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// File name looked up in the project root when no `--config` is given
pub const CONFIG_FILE_NAME: &str = "assetline.yaml";

/// Name used for a build that does not declare one
pub const DEFAULT_BUILD_NAME: &str = "default";

/// Markup optimization options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlOptions {
    /// Remove comments and collapse whitespace
    #[serde(default)]
    pub minify: bool,
}

/// Style optimization options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CssOptions {
    #[serde(default)]
    pub minify: bool,
}

/// Script optimization options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsOptions {
    #[serde(default)]
    pub minify: bool,

    /// Compile to ES5 with the project's compiler command
    #[serde(default)]
    pub compile: bool,
}

/// Per-kind optimization options; an absent kind is not optimized
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizeOptions {
    pub html: Option<HtmlOptions>,
    pub css: Option<CssOptions>,
    pub js: Option<JsOptions>,
}

impl OptimizeOptions {
    pub fn html_minify(&self) -> bool {
        self.html.as_ref().is_some_and(|o| o.minify)
    }

    pub fn css_minify(&self) -> bool {
        self.css.as_ref().is_some_and(|o| o.minify)
    }

    pub fn js_minify(&self) -> bool {
        self.js.as_ref().is_some_and(|o| o.minify)
    }

    pub fn js_compile(&self) -> bool {
        self.js.as_ref().is_some_and(|o| o.compile)
    }
}

/// One build variant. Immutable once a run starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Build name; also the output subdirectory
    #[serde(default)]
    pub name: Option<String>,

    /// Merge sources and dependencies into a minimum set of files
    #[serde(default)]
    pub bundle: bool,

    /// Insert prefetch/import links for dependencies into entry documents
    #[serde(default)]
    pub insert_prefetch_links: bool,

    /// Generate a service worker after the build is written
    #[serde(default)]
    pub add_service_worker: bool,

    /// Service worker config, relative to the project root
    #[serde(default)]
    pub sw_precache_config: Option<PathBuf>,

    #[serde(default)]
    pub html: Option<HtmlOptions>,

    #[serde(default)]
    pub css: Option<CssOptions>,

    #[serde(default)]
    pub js: Option<JsOptions>,
}

impl BuildConfig {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_BUILD_NAME)
    }

    /// The name becomes one directory directly under the build root
    pub fn validate(&self) -> Result<(), BuildError> {
        let name = self.name();
        let mut components = Path::new(name).components();
        let single_dir = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if name.trim().is_empty() || name.contains(['/', '\\']) || !single_dir {
            return Err(BuildError::Config(format!(
                "Build name '{}' must be a single directory name",
                name
            )));
        }
        Ok(())
    }

    pub fn optimize_options(&self) -> OptimizeOptions {
        OptimizeOptions {
            html: self.html.clone(),
            css: self.css.clone(),
            js: self.js.clone(),
        }
    }
}

/// Lint section of the project configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LintConfig {
    /// Rule codes or rule collections to run
    #[serde(default)]
    pub rules: Option<Vec<String>>,

    /// Warning codes to drop from the report
    #[serde(default)]
    pub ignore_warnings: Vec<String>,
}

/// Top-level project configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project root; relative roots are resolved against the config file
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Main entry document
    #[serde(default = "default_entrypoint")]
    pub entrypoint: PathBuf,

    /// App shell document
    #[serde(default)]
    pub shell: Option<PathBuf>,

    /// Lazily loaded fragment documents
    #[serde(default)]
    pub fragments: Vec<PathBuf>,

    /// Globs selecting first-party sources
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,

    /// Globs for dependencies the import graph cannot discover
    #[serde(default)]
    pub extra_dependencies: Vec<String>,

    /// Directory holding third-party dependencies
    #[serde(default = "default_components_dir")]
    pub components_dir: PathBuf,

    /// Command used to compile scripts (reads stdin, writes stdout)
    #[serde(default)]
    pub compiler: Option<Vec<String>>,

    /// Build variants
    #[serde(default)]
    pub builds: Option<Vec<BuildConfig>>,

    #[serde(default)]
    pub lint: Option<LintConfig>,
}

fn default_entrypoint() -> PathBuf {
    PathBuf::from("index.html")
}

fn default_sources() -> Vec<String> {
    vec!["src/**/*".to_string()]
}

fn default_components_dir() -> PathBuf {
    PathBuf::from("bower_components")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: None,
            entrypoint: default_entrypoint(),
            shell: None,
            fragments: Vec::new(),
            sources: default_sources(),
            extra_dependencies: Vec::new(),
            components_dir: default_components_dir(),
            compiler: None,
            builds: None,
            lint: None,
        }
    }
}

impl ProjectConfig {
    /// Load project configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, BuildError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        let mut config = Self::from_yaml(&content)?;

        let config_dir = path.parent().unwrap_or_else(|| Path::new("."));
        config.root = Some(match config.root.take() {
            Some(root) if root.is_absolute() => root,
            Some(root) => config_dir.join(root),
            None => config_dir.to_path_buf(),
        });
        Ok(config)
    }

    /// Parse project configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, BuildError> {
        let config: ProjectConfig =
            serde_yaml::from_str(yaml).map_err(|e| BuildError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Load `assetline.yaml` from `dir`, or fall back to defaults rooted there
    pub fn discover<P: AsRef<Path>>(dir: P) -> Result<Self, BuildError> {
        let dir = dir.as_ref();
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::from_file(candidate)
        } else {
            Ok(Self {
                root: Some(dir.to_path_buf()),
                ..Self::default()
            })
        }
    }

    pub fn root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Validate the configuration before any build starts
    pub fn validate(&self) -> Result<(), BuildError> {
        check_project_path("entrypoint", &self.entrypoint)?;
        if let Some(shell) = &self.shell {
            check_project_path("shell", shell)?;
        }
        for fragment in &self.fragments {
            check_project_path("fragment", fragment)?;
        }
        check_project_path("components_dir", &self.components_dir)?;

        if let Some(compiler) = &self.compiler {
            if compiler.is_empty() {
                return Err(BuildError::Config(
                    "compiler command must not be empty".to_string(),
                ));
            }
        }

        for pattern in self.sources.iter().chain(&self.extra_dependencies) {
            glob::Pattern::new(pattern).map_err(|e| {
                BuildError::Config(format!("Invalid glob '{}': {}", pattern, e))
            })?;
        }

        if let Some(builds) = &self.builds {
            let mut seen = HashSet::new();
            for build in builds {
                build.validate()?;
                if !seen.insert(build.name()) {
                    return Err(BuildError::Config(format!(
                        "Found multiple builds named '{}'",
                        build.name()
                    )));
                }
            }
        }

        Ok(())
    }

    /// Entrypoint, shell and fragments, in that order
    pub fn entry_documents(&self) -> Vec<PathBuf> {
        let mut docs = vec![self.entrypoint.clone()];
        docs.extend(self.shell.iter().cloned());
        docs.extend(self.fragments.iter().cloned());
        docs
    }
}

fn check_project_path(label: &str, path: &Path) -> Result<(), BuildError> {
    if path.is_absolute() || path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(BuildError::Config(format!(
            "{} '{}' must be a path inside the project root",
            label,
            path.display()
        )));
    }
    Ok(())
}
