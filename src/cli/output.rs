//! CLI output formatting

use crate::core::{BuildPhase, BuildState};
use crate::execution::BuildEvent;
use console::Emoji;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Format a build phase for display
pub fn format_phase(phase: BuildPhase) -> String {
    match phase {
        BuildPhase::Initializing => style("INITIALIZING").dim().to_string(),
        BuildPhase::Complete => style("COMPLETE").green().to_string(),
        BuildPhase::Failed => style("FAILED").red().to_string(),
        other => style(format!("{:?}", other).to_uppercase()).yellow().to_string(),
    }
}

/// Format a build event for display
pub fn format_build_event(event: &BuildEvent) -> String {
    match event {
        BuildEvent::BuildStarted {
            execution_id,
            build_name,
        } => format!(
            "{} ({}) Building... {}",
            ROCKET,
            style(build_name).bold(),
            style(&execution_id.to_string()[..8]).dim()
        ),
        BuildEvent::PhaseChanged { build_name, phase } => {
            format!("{} ({}) {}", SPINNER, style(build_name).dim(), format_phase(*phase))
        }
        BuildEvent::ServiceWorkerConfigMissing { build_name, path } => format!(
            "{} ({}) No service worker configuration found at {}, continuing with defaults",
            WARN,
            style(build_name).bold(),
            style(path.display()).dim()
        ),
        BuildEvent::BuildCompleted {
            build_name,
            files_written,
            ..
        } => format!(
            "{} ({}) Build complete! {}",
            CHECK,
            style(build_name).green(),
            style(format!("{} files", files_written)).dim()
        ),
        BuildEvent::BuildFailed {
            build_name, error, ..
        } => format!("{} ({}) {}", CROSS, style(build_name).red(), style(error).dim()),
    }
}

/// One line per finished build
pub fn format_build_summary(state: &BuildState) -> String {
    let duration = match (state.started_at, state.completed_at) {
        (Some(start), Some(end)) => end
            .signed_duration_since(start)
            .to_std()
            .map(format_duration)
            .unwrap_or_default(),
        _ => String::new(),
    };
    format!(
        "  {} {} - {} files {}",
        format_phase(state.phase),
        style(&state.name).bold(),
        style(state.files_written).cyan(),
        style(duration).dim()
    )
}

fn format_duration(duration: std::time::Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}
