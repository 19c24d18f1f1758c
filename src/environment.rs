//! Environment resolution
//!
//! Variables visible to a request are layered, later layers winning:
//! the workspace base environment, the selected sub environment, then the
//! `environment` of every ancestor folder from outermost to nearest.

use std::collections::HashSet;

use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

use crate::errors::Result;
use crate::models::{Environment, Request, RequestGroup, Workspace};
use crate::store::{self, DocFilter, DocumentStore};

/// Resolved variables plus the workspace the request lives in
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderScope {
    pub vars: Map<String, JsonValue>,
    pub workspace_id: Option<String>,
}

/// Resolve the variable bindings for `request`
///
/// An unknown `environment_id` is a `NotFound` error.
pub async fn resolve_environment(
    store: &dyn DocumentStore,
    request: &Request,
    environment_id: Option<&str>,
) -> Result<RenderScope> {
    let (folders, workspace_id) = ancestors(store, request.parent_id.as_deref()).await?;

    let mut vars = Map::new();

    if let Some(workspace_id) = &workspace_id {
        let base: Vec<Environment> = store::find_recent(store, &DocFilter::parent(workspace_id.as_str()), 1).await?;
        if let Some(base) = base.into_iter().next() {
            debug!(environment = %base.id, "Applying base environment");
            merge_into(&mut vars, &base.data);
        }
    }

    if let Some(id) = environment_id.filter(|id| !id.is_empty()) {
        let sub: Environment = store::get_required(store, id).await?;
        if workspace_id.as_deref() != sub.parent_id.as_deref() {
            debug!(environment = %sub.id, "Applying sub environment");
            merge_into(&mut vars, &sub.data);
        }
    }

    // outermost folder first so the nearest one wins
    for folder in folders.iter().rev() {
        merge_into(&mut vars, &folder.environment);
    }

    Ok(RenderScope { vars, workspace_id })
}

/// Walk parent links up to the workspace
///
/// Returns the folders nearest-first and the workspace id, if one was reached.
async fn ancestors(store: &dyn DocumentStore, parent_id: Option<&str>) -> Result<(Vec<RequestGroup>, Option<String>)> {
    let mut folders = Vec::new();
    let mut seen = HashSet::new();
    let mut current = parent_id.map(String::from);

    while let Some(id) = current.take() {
        if !seen.insert(id.clone()) {
            warn!(id = %id, "Cycle in document parents");
            break;
        }
        if let Some(folder) = store::get::<RequestGroup>(store, &id).await? {
            current = folder.parent_id.clone();
            folders.push(folder);
            continue;
        }
        if let Some(workspace) = store::get::<Workspace>(store, &id).await? {
            return Ok((folders, Some(workspace.id)));
        }
        debug!(id = %id, "Parent chain ends at unknown document");
        return Ok((folders, Some(id)));
    }

    Ok((folders, None))
}

/// Overlay `layer` onto `vars`; nested objects merge one level deep
fn merge_into(vars: &mut Map<String, JsonValue>, layer: &Map<String, JsonValue>) {
    for (key, value) in layer {
        match (vars.get_mut(key), value) {
            (Some(JsonValue::Object(existing)), JsonValue::Object(incoming)) => {
                for (k, v) in incoming {
                    existing.insert(k.clone(), v.clone());
                }
            }
            _ => {
                vars.insert(key.clone(), value.clone());
            }
        }
    }
}
