use crate::api::ConchApi;
use crate::error::{ConchError, Result};
use crate::models::Workspace;
use tracing::debug;

const GLOBAL_WORKSPACE: &str = "GLOBAL";

/// Preferred workspace (id or name) if present, else `GLOBAL`, else the first one.
pub fn choose_workspace<'a>(workspaces: &'a [Workspace], preferred: Option<&str>) -> Option<&'a Workspace> {
    preferred
        .and_then(|want| workspaces.iter().find(|w| w.id == want || w.name == want))
        .or_else(|| workspaces.iter().find(|w| w.name == GLOBAL_WORKSPACE))
        .or_else(|| workspaces.first())
}

pub async fn resolve_workspace(api: &dyn ConchApi, preferred: Option<&str>) -> Result<Workspace> {
    let workspaces = api.workspaces().await?;
    let chosen = choose_workspace(&workspaces, preferred).cloned().ok_or(ConchError::NoWorkspace)?;
    debug!(workspace = %chosen.id, name = %chosen.name, "workspace selected");
    Ok(chosen)
}
