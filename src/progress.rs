//! Progress and confirmation for plan execution.

use crate::ui;
use declarative::{Action, ConfirmCallback, ProgressCallback, ReportEntry};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;

/// Progress bar over plan operations
pub struct BarProgress {
    bar: Option<ProgressBar>,
    quiet: bool,
}

impl BarProgress {
    pub fn new(quiet: bool) -> Self {
        Self { bar: None, quiet }
    }
}

impl ProgressCallback for BarProgress {
    fn on_plan_start(&mut self, total: usize) {
        let bar = if self.quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total as u64)
        };
        let template = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}";
        if let Ok(style) = ProgressStyle::default_bar().template(template) {
            bar.set_style(style.progress_chars("=>-"));
        }
        self.bar = Some(bar);
    }

    fn on_operation_start(&mut self, resource_id: &str, action: Action) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("{action} {}", ui::truncate(resource_id, 30)));
        }
    }

    fn on_operation_complete(&mut self, entry: &ReportEntry) {
        let Some(bar) = &self.bar else {
            return;
        };
        if !self.quiet {
            bar.suspend(|| {
                let detail = entry
                    .error
                    .as_deref()
                    .map(|e| format!(" ({e})"))
                    .unwrap_or_default();
                println!(
                    "  {} {} {} {}{}",
                    ui::status_symbol(entry.status),
                    ui::action_symbol(entry.action),
                    entry.resource_id,
                    entry.status,
                    detail
                );
            });
        }
        bar.inc(1);
    }

    fn on_plan_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

/// Interactive yes/no prompt
pub struct PromptConfirm;

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(io::Error::other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{ResourceKind, ResourceStatus};

    #[test]
    fn test_hidden_bar_counts_operations() {
        let mut progress = BarProgress::new(true);
        progress.on_plan_start(2);
        progress.on_operation_start("bucket", Action::Create);
        progress.on_operation_complete(&ReportEntry {
            resource_id: "bucket".into(),
            kind: ResourceKind::Bucket,
            action: Action::Create,
            status: ResourceStatus::Applied,
            error: None,
        });
        assert_eq!(progress.bar.as_ref().map(ProgressBar::position), Some(1));

        progress.on_plan_complete();
        assert!(progress.bar.is_none());
    }
}
