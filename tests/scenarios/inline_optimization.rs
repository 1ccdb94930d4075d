//! Test: Inline scripts and styles are minified inside their documents

use crate::helpers::*;
use assetline::core::{BuildConfig, CssOptions, HtmlOptions, JsOptions};
use assetline::execution::BuildEngine;

const INDEX: &str = r#"<!doctype html>
<html>
<head>
  <style>
    a::before { content: '<b>'; }
    p > a { color: red; }
  </style>
</head>
<body>
  <button onclick="onTap()">tap</button>
  <script>
    function onTap() {
      if (count < limit) { tick(); }
    }
    var count = 0, limit = 3;
    var opener = '<script>';
    document.write('</' + 'div>');
  </script>
  <p>after</p>
</body>
</html>
"#;

fn minify_all() -> BuildConfig {
    BuildConfig {
        name: Some("min".to_string()),
        html: Some(HtmlOptions { minify: true }),
        css: Some(CssOptions { minify: true }),
        js: Some(JsOptions {
            minify: true,
            compile: false,
        }),
        ..BuildConfig::default()
    }
}

#[tokio::test]
async fn test_inline_bodies_with_markup_survive_minification() {
    let dir = fixture(&[("index.html", INDEX)]);
    let project = load_project(dir.path()).await;
    let engine = BuildEngine::new(project, build_root(dir.path()));

    engine.build(&minify_all()).await.unwrap();

    let index = read(build_root(dir.path()).join("min/index.html"));
    // Handlers in markup still find the page globals
    assert!(index.contains("function onTap("), "{}", index);
    assert!(index.contains("count"), "{}", index);
    assert!(index.contains("limit"), "{}", index);
    assert!(index.contains("tick()"), "{}", index);
    assert_eq!(index.matches("<script>").count(), 2, "{}", index);
    assert_eq!(index.matches("</script>").count(), 1, "{}", index);
    assert!(index.contains("\"<b>\""), "{}", index);
    assert!(index.contains("<p>after</p>"), "{}", index);
    assert!(!index.contains("\n    "), "{}", index);
}

#[tokio::test]
async fn test_module_script_is_minified_as_module() {
    let page = "<!doctype html><script type=\"module\">\n  import { start } from './src/app.js';\n  start();\n</script>";
    let dir = fixture(&[("index.html", page), ("src/app.js", "export function start() {}\n")]);
    let project = load_project(dir.path()).await;
    let engine = BuildEngine::new(project, build_root(dir.path()));

    engine.build(&minify_all()).await.unwrap();

    let index = read(build_root(dir.path()).join("min/index.html"));
    assert!(index.contains("<script type=\"module\">import"), "{}", index);
    assert!(index.contains("./src/app.js"), "{}", index);
    assert!(!index.contains("\n  start();"), "{}", index);
}
