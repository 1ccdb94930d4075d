use anyhow::{Context, Result};
use assetline::cli::commands::{BuildCommand, LintCommand};
use assetline::cli::output::*;
use assetline::cli::{Cli, Command};
use assetline::core::ProjectConfig;
use assetline::execution::{resolve_builds, BuildDriver, BuildEngine};
use assetline::lint::{self, Linter, RuleRegistry, Severity, WarningFilter};
use assetline::pipeline::Toolchain;
use assetline::project::{Project, SourceProvider, BUILD_DIR_NAME};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Command::Build(cmd) => run_build(cmd, config).await?,
        Command::Lint(cmd) => run_lint(cmd, config).await?,
    }

    Ok(())
}

fn load_config(path: Option<&str>) -> Result<ProjectConfig> {
    let config = match path {
        Some(path) => ProjectConfig::from_file(path).context("Failed to load project config")?,
        None => ProjectConfig::discover(".").context("Failed to load project config")?,
    };
    config.validate().context("Invalid project config")?;
    Ok(config)
}

async fn run_build(cmd: &BuildCommand, config: ProjectConfig) -> Result<()> {
    let project = Arc::new(Project::load(&config).await.context("Failed to load project")?);
    let build_root = project.root().join(BUILD_DIR_NAME);

    let toolchain = match &config.compiler {
        Some(command) => Toolchain::with_compiler(command.clone()),
        None => Toolchain::default(),
    };

    let engine = BuildEngine::new(project, &build_root)
        .with_toolchain(toolchain)
        .with_event_handler(|event| println!("{}", format_build_event(&event)));

    let builds = resolve_builds(cmd.to_build_config(), config.builds.as_deref());
    println!(
        "{} {} build(s) into {}",
        INFO,
        style(builds.len()).cyan(),
        style(build_root.display()).dim()
    );

    let driver = BuildDriver::new(Arc::new(engine), &build_root).with_strategy(cmd.strategy());
    match driver.run(builds).await {
        Ok(states) => {
            println!();
            for state in &states {
                println!("{}", format_build_summary(state));
            }
            println!("\n{} Build {}", CHECK, style("successful").green());
            Ok(())
        }
        Err(e) => {
            println!("\n{} Build {}", CROSS, style("failed").red());
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

async fn run_lint(cmd: &LintCommand, config: ProjectConfig) -> Result<()> {
    let lint_config = config.lint.clone().unwrap_or_default();
    let rules = if cmd.rules.is_empty() {
        lint_config.rules.clone().unwrap_or_default()
    } else {
        cmd.rules.clone()
    };

    if rules.is_empty() {
        println!(
            "{} No lint rules given. Pass --rules or add a lint section to the project config:",
            WARN
        );
        println!("\n  lint:\n    rules:\n      - assetline-1\n");
        std::process::exit(1);
    }

    let rules = RuleRegistry::default()
        .get_rules(&rules)
        .context("Failed to resolve lint rules")?;
    let project = Project::load(&config).await.context("Failed to load project")?;
    let root = project.root().to_path_buf();

    let inputs = if cmd.input.is_empty() {
        project.source_paths().to_vec()
    } else {
        lint::relative_inputs(&root, &cmd.input)
    };

    let linter = Linter::new(rules, project.graph(), &root);
    let filter = WarningFilter::new(lint_config.ignore_warnings, Severity::Warning);
    let warnings: Vec<_> = linter
        .lint(&inputs)
        .await?
        .into_iter()
        .filter(|w| !filter.should_ignore(w))
        .collect();

    for warning in &warnings {
        println!("{}", warning);
    }

    match lint::summary(&warnings) {
        Some(summary) => {
            println!("\n{} {}", CROSS, summary);
            std::process::exit(1);
        }
        None => {
            println!("{} No lint problems in {}", CHECK, style(display_root(&root)).bold());
            Ok(())
        }
    }
}

fn display_root(root: &Path) -> String {
    root.canonicalize()
        .unwrap_or_else(|_| root.to_path_buf())
        .display()
        .to_string()
}
