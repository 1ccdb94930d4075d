//! Minifiers for scripts, styles and markup.
//!
//! Uses oxc for JavaScript and lightningcss for CSS.

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;
use regex::Regex;
use std::sync::OnceLock;

/// Minify JavaScript source code.
///
/// Top-level declarations of classic scripts are page globals: they keep
/// their names and are never dropped as unused. Only ES modules get
/// top-level mangling. Without `module`, a source that uses import or
/// export syntax is still treated as a module.
pub fn minify_js(source: &str, module: bool) -> Result<String, String> {
    let allocator = Allocator::default();
    let source_type = if module { SourceType::mjs() } else { SourceType::unambiguous() };
    let ret = Parser::new(&allocator, source, source_type).parse();
    if !ret.errors.is_empty() {
        return Err(format!("{} syntax error(s)", ret.errors.len()));
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions {
            top_level: Some(program.source_type.is_module()),
            ..MangleOptions::default()
        }),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Ok(code)
}

/// Minify CSS source code.
pub fn minify_css(source: &str) -> Result<String, String> {
    let stylesheet = StyleSheet::parse(source, ParserOptions::default()).map_err(|e| e.to_string())?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;
    Ok(result.code)
}

/// Elements whose text must survive whitespace collapsing
fn preserved_regions() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)<pre\b.*?</pre\s*>|<textarea\b.*?</textarea\s*>|<script\b.*?</script\s*>|<style\b.*?</style\s*>",
        )
        .expect("static regex")
    })
}

fn comments() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Conditional comments (`<!--[if ...]>`) are kept
    RE.get_or_init(|| Regex::new(r"(?s)<!--[^\[].*?-->|<!---->").expect("static regex"))
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Minify HTML by removing comments and collapsing whitespace runs to a
/// single space.
///
/// Content of `pre`, `textarea`, `script` and `style` is left alone.
pub fn minify_html(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    for region in preserved_regions().find_iter(source) {
        out.push_str(&collapse(&source[last..region.start()]));
        out.push_str(region.as_str());
        last = region.end();
    }
    out.push_str(&collapse(&source[last..]));
    out
}

fn collapse(text: &str) -> String {
    let without_comments = comments().replace_all(text, "");
    whitespace().replace_all(&without_comments, " ").into_owned()
}
