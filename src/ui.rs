use anyhow::Result;
use colored::Colorize;
use declarative::{ApplyResult, ConfirmCallback, DeploymentReport};

use crate::progress::symbol;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Ask on the terminal
pub struct PromptConfirm;

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;
        Ok(confirmed)
    }
}

fn describe(result: &ApplyResult, preview: bool) -> String {
    let verb = |done: &str, planned: &str| {
        if preview { planned.to_string() } else { done.to_string() }
    };
    match result {
        ApplyResult::Created => verb("created", "create").green().to_string(),
        ApplyResult::Modified => verb("updated", "update").yellow().to_string(),
        ApplyResult::NoChange => "unchanged".dimmed().to_string(),
        ApplyResult::Failed { error } => format!("{} {}", "failed:".red(), error),
        ApplyResult::Skipped { reason } => format!("{} {}", "skipped:".yellow(), reason),
    }
}

/// Print resources grouped by kind, outputs and the summary
pub fn print_report(report: &DeploymentReport) {
    header(if report.preview { "Preview" } else { "Deployment" });

    for (kind, outcomes) in report.group_by_kind() {
        section(&format!("{} ({})", kind.description(), kind.tag()));
        for outcome in outcomes {
            println!(
                "  {} {} {}",
                symbol(&outcome.result),
                outcome.name,
                describe(&outcome.result, report.preview)
            );
        }
    }

    if !report.outputs.is_empty() || !report.unresolved_outputs.is_empty() {
        section("Outputs");
        for (name, value) in &report.outputs {
            let shown = value
                .as_str()
                .map_or_else(|| value.to_string(), str::to_string);
            kv(name, &shown);
        }
        for (name, reason) in &report.unresolved_outputs {
            kv(name, &format!("{} ({})", "unresolved".red(), reason));
        }
    }

    let summary = &report.summary;
    println!();
    if let Some(failure) = &report.failure {
        error(&format!("First failure: {failure}"));
    }
    let line = format!(
        "{} created, {} modified, {} unchanged, {} failed, {} skipped",
        summary.created, summary.modified, summary.no_change, summary.failed, summary.skipped
    );
    if report.is_success() {
        success(&line);
    } else {
        warn(&line);
    }
    if report.preview {
        dim("Preview only - no changes made");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_preview_wording() {
        colored::control::set_override(false);
        assert_eq!(describe(&ApplyResult::Created, true), "create");
        assert_eq!(describe(&ApplyResult::Created, false), "created");
        assert_eq!(
            describe(
                &ApplyResult::Skipped {
                    reason: "upstream".into()
                },
                false
            ),
            "skipped: upstream"
        );
    }
}
