//! `invoke` command: run the record handler as a provisioned function

use anyhow::{Context as _, Result, bail};
use chrono::Utc;
use declarative::{ResourceKind, ResourceStatus, StateStore, Value};
use std::collections::BTreeMap;

use super::open_state;
use crate::Context;
use crate::cli::InvokeArgs;
use crate::handler::{self, DirectorySink, HandlerResponse};
use crate::paths;

pub fn run(ctx: &Context, args: InvokeArgs) -> Result<()> {
    let response = invoke(ctx, &args)?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.is_success() {
        bail!("{} returned status {}", args.function, response.status_code);
    }
    Ok(())
}

fn invoke(ctx: &Context, args: &InvokeArgs) -> Result<HandlerResponse> {
    let event: serde_json::Value =
        serde_json::from_str(&args.event).context("--event is not valid JSON")?;

    let state = open_state(ctx)?;
    let Some(record) = state.get(&args.function)? else {
        bail!("No function `{}` in state, run `strata apply` first", args.function);
    };
    if record.kind != ResourceKind::Function {
        bail!("`{}` is a {}, not a function", args.function, record.kind);
    }
    if record.status != ResourceStatus::Applied {
        bail!("`{}` is {}, apply it first", args.function, record.status);
    }

    let env = environment(record.attribute("environment"));
    log::debug!("Invoking {} with {} environment variables", args.function, env.len());

    let sink = DirectorySink::new(paths::objects_dir(&ctx.state_dir));
    Ok(handler::handle(&event, &env, &sink, Utc::now()))
}

/// Flatten a recorded `environment` table into strings
fn environment(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(Value::as_map)
        .map(|map| {
            map.iter()
                .map(|(k, v)| {
                    let v = v.as_str().map_or_else(|| v.to_string(), str::to_string);
                    (k.clone(), v)
                })
                .collect()
        })
        .unwrap_or_default()
}
