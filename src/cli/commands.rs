//! CLI command definitions

use crate::core::{BuildConfig, CssOptions, HtmlOptions, JsOptions};
use crate::execution::SchedulingStrategy;
use clap::Args;
use std::path::PathBuf;

/// Build the project
#[derive(Debug, Args, Clone, Default)]
pub struct BuildCommand {
    /// Compile ES2015 JavaScript features down to ES5 for older browsers
    #[arg(long)]
    pub js_compile: bool,

    /// Minify inlined and external JavaScript
    #[arg(long)]
    pub js_minify: bool,

    /// Minify inlined and external CSS
    #[arg(long)]
    pub css_minify: bool,

    /// Minify HTML by removing comments and whitespace
    #[arg(long)]
    pub html_minify: bool,

    /// Combine sources and dependencies into a minimum set of files
    #[arg(long)]
    pub bundle: bool,

    /// Generate a service worker caching every file of the build
    #[arg(long)]
    pub add_service_worker: bool,

    /// Service worker options file (JSON or YAML, sw-precache option names)
    #[arg(long)]
    pub sw_precache_config: Option<String>,

    /// Insert prefetch links into the entrypoint and imports into the shell and fragments
    #[arg(long)]
    pub insert_prefetch_links: bool,

    /// Run configured builds one after another instead of all at once
    #[arg(long)]
    pub sequential: bool,
}

impl BuildCommand {
    /// One build made from the flags, or `None` when no build flag was passed
    pub fn to_build_config(&self) -> Option<BuildConfig> {
        let any_flag = self.js_compile
            || self.js_minify
            || self.css_minify
            || self.html_minify
            || self.bundle
            || self.add_service_worker
            || self.sw_precache_config.is_some()
            || self.insert_prefetch_links;
        if !any_flag {
            return None;
        }

        Some(BuildConfig {
            name: None,
            bundle: self.bundle,
            insert_prefetch_links: self.insert_prefetch_links,
            add_service_worker: self.add_service_worker,
            sw_precache_config: self.sw_precache_config.as_ref().map(PathBuf::from),
            html: Some(HtmlOptions {
                minify: self.html_minify,
            }),
            css: Some(CssOptions {
                minify: self.css_minify,
            }),
            js: Some(JsOptions {
                minify: self.js_minify,
                compile: self.js_compile,
            }),
        })
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        if self.sequential {
            SchedulingStrategy::Sequential
        } else {
            SchedulingStrategy::Parallel
        }
    }
}

/// Lint the project
#[derive(Debug, Args, Clone, Default)]
pub struct LintCommand {
    /// Lint rules or rule collections to run
    #[arg(long, num_args = 1..)]
    pub rules: Vec<String>,

    /// Files to lint; defaults to every document of the project
    #[arg(long, num_args = 1..)]
    pub input: Vec<PathBuf>,
}
