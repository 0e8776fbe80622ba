//! `validate` and `plan` commands

use anyhow::Result;
use declarative::{DiffSummary, ExecutionPlan};

use super::{load, open_state};
use crate::Context;
use crate::cli::PlanArgs;
use crate::ui;

pub fn validate(ctx: &Context) -> Result<()> {
    let loaded = load(ctx)?;
    if !ctx.quiet {
        ui::success(&format!(
            "{} is valid ({} resources)",
            ctx.file.display(),
            loaded.graph.len()
        ));
        for &node in &loaded.order {
            let decl = loaded.graph.node(node);
            ui::dim(&format!("{} ({})", decl.id, decl.kind));
        }
    }
    Ok(())
}

/// Compute the plan `apply` (or `destroy`) would run
pub fn compute(ctx: &Context, targets: &[String], destroy: bool) -> Result<ExecutionPlan> {
    let state = open_state(ctx)?;
    if destroy {
        return Ok(ExecutionPlan::destroy_targets(&state, targets)?);
    }

    let loaded = load(ctx)?;
    let plan = ExecutionPlan::build(&loaded.graph, &loaded.order, &state)?;
    Ok(plan.targeted(&loaded.graph, targets)?)
}

pub fn run(ctx: &Context, args: PlanArgs) -> Result<()> {
    let plan = compute(ctx, &args.target, args.destroy)?;
    let summary = DiffSummary::from_plan(&plan);
    log::debug!("Plan: {}", ui::plan_summary_line(&summary));

    if !ctx.quiet {
        ui::header(if args.destroy { "Destroy Plan" } else { "Plan" });
        ui::display_plan(&plan);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{STACK, context};
    use declarative::Action;

    #[test]
    fn test_validate_accepts_stack() {
        let (_dir, ctx) = context(STACK);
        validate(&ctx).unwrap();
    }

    #[test]
    fn test_validate_rejects_cycle() {
        let (_dir, ctx) = context(
            r#"
[[resource]]
id = "a"
kind = "role"
attributes = { policy = "${b.arn}" }

[[resource]]
id = "b"
kind = "policy"
attributes = { role = "${a.arn}" }
"#,
        );
        let err = validate(&ctx).unwrap_err();
        assert!(format!("{err:#}").contains("dependency cycle: a -> b -> a"));
    }

    #[test]
    fn test_validate_rejects_dangling_reference() {
        let (_dir, ctx) = context(
            r#"
[[resource]]
id = "writer"
kind = "function"
attributes = { role = "${exec.arn}" }
"#,
        );
        let err = validate(&ctx).unwrap_err();
        assert!(format!("{err:#}").contains("undeclared resource `exec`"));
    }

    #[test]
    fn test_compute_fresh_plan() {
        let (_dir, ctx) = context(STACK);
        let plan = compute(&ctx, &[], false).unwrap();
        let ids: Vec<&str> = plan.operations().iter().map(|o| o.resource_id.as_str()).collect();
        assert_eq!(ids, vec!["records", "exec", "writer"]);
        assert!(plan.operations().iter().all(|o| o.action == Action::Create));

        let targeted = compute(&ctx, &["bucket".to_string()], false).unwrap();
        assert_eq!(targeted.len(), 1);

        assert!(compute(&ctx, &[], true).unwrap().is_empty());
    }
}
