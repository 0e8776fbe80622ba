//! `apply` and `destroy` commands

use anyhow::{Result, bail};
use declarative::{
    AutoConfirm, CancelToken, ConfirmCallback, ExecuteOptions, ExecutionReport, Executor, execute,
};
use signal_hook::SigId;
use signal_hook::consts::SIGINT;

use super::{backend, open_state, plan};
use crate::Context;
use crate::cli::ApplyArgs;
use crate::config::StackConfig;
use crate::progress::{BarProgress, PromptConfirm};
use crate::ui;

pub fn apply(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let options = options(ctx, &args, false)?;
    let plan = plan::compute(ctx, &args.target, false)?;
    run(ctx, &args, &plan, options, "Apply")
}

pub fn destroy(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let options = options(ctx, &args, true)?;
    let plan = plan::compute(ctx, &args.target, true)?;
    run(ctx, &args, &plan, options, "Destroy")
}

/// Execution options: `[settings]` from the declaration file, then flags
fn options(ctx: &Context, args: &ApplyArgs, destroy: bool) -> Result<ExecuteOptions> {
    // A teardown works from state alone, so a missing file is fine there
    let mut options = if destroy && !ctx.file.exists() {
        StackConfig::default().execute_options()?
    } else {
        StackConfig::load(&ctx.file)?.execute_options()?
    };

    if let Some(jobs) = args.jobs {
        if jobs == 0 {
            bail!("--jobs must be at least 1");
        }
        options.jobs = jobs;
    }
    if let Some(max_attempts) = args.max_attempts {
        if max_attempts == 0 {
            bail!("--max-attempts must be at least 1");
        }
        options.retry.max_attempts = max_attempts;
    }
    Ok(options)
}

fn run(
    ctx: &Context,
    args: &ApplyArgs,
    plan: &declarative::ExecutionPlan,
    options: ExecuteOptions,
    verb: &str,
) -> Result<()> {
    if !ctx.quiet {
        ui::header(&format!("{verb} Plan"));
        ui::display_plan(plan);
    }
    if !plan.has_changes() {
        return Ok(());
    }

    let state = open_state(ctx)?;
    let backend = backend(ctx);
    let _interrupt = InterruptGuard::install(&options.cancel)?;
    let executor = Executor::new(&backend, &state, options);
    let mut progress = BarProgress::new(ctx.quiet);
    let mut confirm: Box<dyn ConfirmCallback> = if args.yes {
        Box::new(AutoConfirm)
    } else {
        Box::new(PromptConfirm)
    };

    let Some(report) = execute(&executor, plan, &mut progress, confirm.as_mut())? else {
        ui::warn("Aborted, no changes made");
        return Ok(());
    };

    finish(ctx, &report, verb)
}

/// Routes Ctrl-C to a cancel token while a run is in progress.
///
/// The first interrupt stops scheduling and lets in-flight operations
/// record their result; a second one exits immediately.
struct InterruptGuard {
    ids: Vec<SigId>,
}

impl InterruptGuard {
    fn install(token: &CancelToken) -> Result<Self> {
        // Registered first so it sees the flag before the second handler sets it
        let shutdown = signal_hook::flag::register_conditional_shutdown(SIGINT, 130, token.flag())?;
        let cancel = signal_hook::flag::register(SIGINT, token.flag())?;
        log::debug!("Interrupts now cancel the run");
        Ok(Self {
            ids: vec![shutdown, cancel],
        })
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}

fn finish(ctx: &Context, report: &ExecutionReport, verb: &str) -> Result<()> {
    let summary = report.summary();
    if !ctx.quiet {
        ui::display_failures(report);
        ui::print_summary(&summary, verb);
    }

    if !report.is_success() {
        bail!(
            "{verb} incomplete: {} failed, {} blocked, {} cancelled",
            summary.failed,
            summary.blocked,
            summary.cancelled
        );
    }
    Ok(())
}
