//! `state` subcommands

use anyhow::{Result, bail};
use colored::Colorize;
use declarative::{StateRecord, StateStore};

use super::open_state;
use crate::Context;
use crate::cli::StateCommand;
use crate::ui;

pub fn run(ctx: &Context, cmd: StateCommand) -> Result<()> {
    match cmd {
        StateCommand::List => list(ctx),
        StateCommand::Show { id } => show(ctx, &id),
        StateCommand::Rm { id } => rm(ctx, &id),
    }
}

fn list(ctx: &Context) -> Result<()> {
    let state = open_state(ctx)?;
    let snapshot = state.snapshot()?;

    if snapshot.is_empty() {
        ui::info("No resources recorded");
        return Ok(());
    }

    ui::header(&format!("State ({})", state.path().display()));
    for record in snapshot.values() {
        let status = if record.status.is_success() {
            record.status.as_str().green()
        } else {
            record.status.as_str().red()
        };
        println!(
            "  {:<24} {:<10} {:<10} {}",
            record.id,
            record.kind.as_str(),
            status,
            record.updated_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
        );
    }
    Ok(())
}

fn show(ctx: &Context, id: &str) -> Result<()> {
    let state = open_state(ctx)?;
    let Some(record) = state.get(id)? else {
        bail!("No resource `{id}` in state");
    };
    print_record(&record);
    Ok(())
}

fn print_record(record: &StateRecord) {
    ui::header(&record.id);
    ui::kv("kind", record.kind.as_str());
    ui::kv("status", record.status.as_str());
    ui::kv("updated", &record.updated_at.to_rfc3339());
    if !record.depends_on.is_empty() {
        ui::kv("depends on", &record.depends_on.join(", "));
    }
    if let Some(error) = &record.error {
        ui::kv("error", &error.red().to_string());
    }

    ui::section("Attributes");
    for (key, value) in &record.attributes {
        let declared = record.config.contains_key(key);
        let key = if declared {
            key.clone()
        } else {
            format!("{key} (output)")
        };
        ui::kv(&key, &value.to_string());
    }
}

fn rm(ctx: &Context, id: &str) -> Result<()> {
    let state = open_state(ctx)?;
    if state.get(id)?.is_none() {
        bail!("No resource `{id}` in state");
    }
    state.remove(id)?;
    if !ctx.quiet {
        ui::success(&format!("Forgot `{id}` (the resource itself was not destroyed)"));
    }
    Ok(())
}
