pub mod apply;
pub mod invoke;
pub mod plan;
pub mod state;

use anyhow::{Context as _, Result};
use declarative::{ResourceGraph, check};

use crate::Context;
use crate::backend::LocalBackend;
use crate::config::StackConfig;
use crate::paths;
use crate::state::FileStateStore;

/// Declarations loaded and checked, ready for planning
pub struct Loaded {
    pub graph: ResourceGraph,
    /// Topological order of `graph`
    pub order: Vec<usize>,
}

/// Load the declaration file, build the graph and check it for cycles
pub fn load(ctx: &Context) -> Result<Loaded> {
    let config = StackConfig::load(&ctx.file)?;
    let declarations = config.declarations()?;
    let graph = ResourceGraph::build(declarations)
        .with_context(|| format!("Invalid declarations in {}", ctx.file.display()))?;
    let order = check(&graph)
        .with_context(|| format!("Invalid declarations in {}", ctx.file.display()))?;
    log::debug!("Checked {} declarations", graph.len());

    Ok(Loaded { graph, order })
}

/// Open the state file under the state directory
pub fn open_state(ctx: &Context) -> Result<FileStateStore> {
    FileStateStore::load(&paths::state_file(&ctx.state_dir))
}

pub fn backend(ctx: &Context) -> LocalBackend {
    LocalBackend::new(paths::objects_dir(&ctx.state_dir))
}
