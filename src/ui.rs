use colored::{ColoredString, Colorize};
use declarative::{
    Action, DiffSummary, ExecuteSummary, ExecutionPlan, ExecutionReport, ResourceStatus,
    group_by_kind,
};

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

// ============================================================================
// Plans and Reports
// ============================================================================

pub fn action_symbol(action: Action) -> ColoredString {
    match action {
        Action::Create => "+".green(),
        Action::Update => "~".yellow(),
        Action::Destroy => "-".red(),
        Action::NoOp => "=".dimmed(),
    }
}

pub fn status_symbol(status: ResourceStatus) -> ColoredString {
    match status {
        ResourceStatus::Applied | ResourceStatus::Destroyed => "✓".green(),
        ResourceStatus::Failed => "✗".red(),
        ResourceStatus::Blocked => "⊘".yellow(),
        ResourceStatus::Cancelled => "○".dimmed(),
        _ => "?".dimmed(),
    }
}

/// One-line plan summary, e.g. "2 to create, 0 to update, 1 to destroy"
pub fn plan_summary_line(summary: &DiffSummary) -> String {
    let mut line = format!(
        "{} to create, {} to update, {} to destroy",
        summary.additions, summary.updates, summary.removals
    );
    if summary.unchanged > 0 {
        line.push_str(&format!(", {} unchanged", summary.unchanged));
    }
    line
}

/// Print the changes a plan would make, grouped by resource kind
pub fn display_plan(plan: &ExecutionPlan) {
    let summary = DiffSummary::from_plan(plan);
    if !summary.has_changes() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Execution Plan".bold()
    );
    println!("│");

    for (kind, ops) in group_by_kind(plan) {
        println!("│ {}", kind.label().bold());
        for op in ops {
            let waits = if op.depends_on.is_empty() {
                String::new()
            } else {
                format!(" (after {})", op.depends_on.join(", "))
                    .dimmed()
                    .to_string()
            };
            println!(
                "│   {} {} {}{}",
                action_symbol(op.action),
                op.resource_id,
                op.action.as_str().dimmed(),
                waits
            );
        }
        println!("│");
    }

    println!("└─ Plan: {}", plan_summary_line(&summary));
}

/// Print problems recorded in a report
pub fn display_failures(report: &ExecutionReport) {
    let problems: Vec<_> = report
        .entries
        .iter()
        .filter(|e| !e.status.is_success())
        .collect();
    if problems.is_empty() {
        return;
    }

    section("Problems");
    for entry in problems {
        let detail = entry.error.as_deref().unwrap_or_default();
        println!(
            "  {} {} {} {}",
            status_symbol(entry.status),
            entry.resource_id,
            entry.status.as_str().dimmed(),
            detail
        );
    }
}

/// Print final summary
pub fn print_summary(summary: &ExecuteSummary, verb: &str) {
    println!();
    if summary.is_success() {
        println!("  {} {verb} complete!", "✓".green().bold());
    } else {
        println!("  {} {verb} finished with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} resources updated", summary.updated);
    }
    if summary.destroyed > 0 {
        println!("    • {} resources destroyed", summary.destroyed);
    }
    if summary.unchanged > 0 {
        println!("    • {} resources unchanged", summary.unchanged);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
    if summary.blocked > 0 {
        println!("    • {} resources blocked by failed dependencies", summary.blocked);
    }
    if summary.cancelled > 0 {
        println!("    • {} resources cancelled", summary.cancelled);
    }
}

/// Truncate a string for display, keeping the start
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_summary_line() {
        let summary = DiffSummary {
            additions: 2,
            updates: 0,
            removals: 1,
            unchanged: 0,
        };
        assert_eq!(
            plan_summary_line(&summary),
            "2 to create, 0 to update, 1 to destroy"
        );

        let summary = DiffSummary {
            unchanged: 3,
            ..summary
        };
        assert_eq!(
            plan_summary_line(&summary),
            "2 to create, 0 to update, 1 to destroy, 3 unchanged"
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 20), "short");
        assert_eq!(truncate("exact", 5), "exact");
        assert_eq!(truncate("function-records-writer", 12), "function-...");
        assert_eq!(truncate("test", 3), "...");
    }
}
