//! Test: Prefetch and import hints in entry documents

use crate::helpers::*;
use assetline::core::BuildConfig;
use assetline::execution::BuildEngine;

#[tokio::test]
async fn test_entrypoint_and_shell_get_hints() {
    let dir = fixture(&[
        ("assetline.yaml", "shell: src/app-shell.html\n"),
        (
            "index.html",
            "<!doctype html><html><head></head><body><app-shell></app-shell></body></html>",
        ),
        ("src/app-shell.html", r#"<link rel="import" href="view.html">"#),
        ("src/view.html", r#"<link rel="import" href="widget.html">"#),
        ("src/widget.html", "<p>widget</p>"),
    ]);
    let project = load_project(dir.path()).await;
    let engine = BuildEngine::new(project, build_root(dir.path()));

    let config = BuildConfig {
        insert_prefetch_links: true,
        ..BuildConfig::default()
    };
    engine.build(&config).await.unwrap();

    let out = build_root(dir.path()).join("default");
    let index = read(out.join("index.html"));
    let head_end = index.find("</head>").unwrap();
    for href in ["src/app-shell.html", "src/view.html", "src/widget.html"] {
        let link = format!("<link rel=\"prefetch\" href=\"{}\">", href);
        let at = index.find(&link).unwrap_or_else(|| panic!("missing {}", link));
        assert!(at < head_end);
    }

    let shell = read(out.join("src/app-shell.html"));
    assert!(shell.starts_with("<link rel=\"import\" href=\"widget.html\">\n"));
    assert!(!shell.contains("href=\"view.html\">\n"));

    assert_eq!(read(out.join("src/widget.html")), "<p>widget</p>");
}

#[tokio::test]
async fn test_bundled_build_skips_hints_for_inlined_files() {
    let dir = fixture(&[
        ("assetline.yaml", "shell: src/app-shell.html\n"),
        (
            "index.html",
            r#"<!doctype html><html><head><link rel="import" href="src/app-shell.html"></head><body></body></html>"#,
        ),
        (
            "src/app-shell.html",
            r#"<link rel="stylesheet" href="app.css"><script src="app.js"></script><link rel="import" href="view.html">"#,
        ),
        ("src/view.html", "<p>view</p>"),
        ("src/app.css", "p{color:red}"),
        ("src/app.js", "run()"),
    ]);
    let project = load_project(dir.path()).await;
    let engine = BuildEngine::new(project, build_root(dir.path()));

    let config = BuildConfig {
        name: Some("bundled".to_string()),
        bundle: true,
        insert_prefetch_links: true,
        ..BuildConfig::default()
    };
    engine.build(&config).await.unwrap();

    let out = build_root(dir.path()).join("bundled");
    assert_eq!(
        files_under(&out),
        vec!["index.html", "src/app-shell.html", "src/view.html"]
    );

    let index = read(out.join("index.html"));
    assert!(index.contains(r#"<link rel="prefetch" href="src/view.html">"#));
    assert!(!index.contains("src/app.css"));
    assert!(!index.contains("src/app.js"));

    let shell = read(out.join("src/app-shell.html"));
    assert!(shell.contains("<style>p{color:red}</style>"));
    assert!(shell.contains("<script>run()</script>"));
}
