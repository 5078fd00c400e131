//! Four-way diff between desired and server state

use crate::context::DeletePolicy;
use crate::types::{CompositeKey, DesiredResource, ServerResource, SyncSummary};
use std::collections::{HashMap, HashSet};

/// Number of top-level scalars up to which an update stays partial
pub const PARTIAL_SCALAR_LIMIT: usize = 2;

/// A desired resource that differs from its server counterpart
#[derive(Debug, Clone)]
pub struct Update {
    pub desired: DesiredResource,
    pub server: ServerResource,
    /// Patch only the named properties instead of rebuilding the payload
    pub partial: bool,
}

/// A desired resource the server already matches
#[derive(Debug, Clone)]
pub struct Unchanged {
    pub desired: DesiredResource,
    pub server: ServerResource,
}

/// The convergence plan for one resource kind
#[derive(Debug, Clone, Default)]
pub struct Diff {
    pub create: Vec<DesiredResource>,
    pub update: Vec<Update>,
    pub unchanged: Vec<Unchanged>,
    /// Unmanaged server resources, before the delete policy is applied
    pub delete: Vec<ServerResource>,
}

impl Diff {
    /// Server resources the policy allows deleting
    pub fn deletions<'a>(&'a self, policy: &'a DeletePolicy) -> impl Iterator<Item = &'a ServerResource> {
        self.delete.iter().filter(|r| policy.allows(&r.name))
    }

    /// Whether applying this diff would change anything
    pub fn has_changes(&self, policy: &DeletePolicy) -> bool {
        !self.create.is_empty() || !self.update.is_empty() || self.deletions(policy).next().is_some()
    }

    /// Keep server resources under declared keys out of the delete batch
    ///
    /// A desired resource rejected by validation is still declared; its
    /// server counterpart is left alone rather than treated as unmanaged.
    pub fn spare_declared(&mut self, declared: &HashSet<CompositeKey>) {
        if declared.is_empty() {
            return;
        }
        self.delete.retain(|r| {
            let spared = declared.contains(&r.key());
            if spared {
                log::debug!("Keeping {}: declared but invalid", r.key());
            }
            !spared
        });
    }

    /// Counts a real run would report
    pub fn summary(&self, policy: &DeletePolicy) -> SyncSummary {
        SyncSummary {
            added: self.create.len(),
            updated: self.update.len(),
            removed: self.deletions(policy).count(),
            unchanged: self.unchanged.len(),
            ..Default::default()
        }
    }
}

/// Decide between a partial and a full update
///
/// A non-empty field map makes the desired resource authoritative over the
/// field contents, so the payload is rebuilt from the template. Without one,
/// up to [`PARTIAL_SCALAR_LIMIT`] scalars are patched in place.
pub fn update_is_partial(desired: &DesiredResource) -> bool {
    if desired.has_fields() {
        return false;
    }
    desired.scalars.len() <= PARTIAL_SCALAR_LIMIT
}

/// Compute the diff by composite key
///
/// When the server holds several resources under one key, the first is
/// matched and the others are left alone.
pub fn compute_diff<F>(desired: Vec<DesiredResource>, server: Vec<ServerResource>, equal: F) -> Diff
where
    F: Fn(&DesiredResource, &ServerResource) -> bool,
{
    let wanted: HashSet<CompositeKey> = desired.iter().map(DesiredResource::key).collect();

    let mut diff = Diff::default();
    let mut by_key: HashMap<CompositeKey, ServerResource> = HashMap::new();
    for resource in server {
        let key = resource.key();
        if !wanted.contains(&key) {
            diff.delete.push(resource);
        } else if by_key.contains_key(&key) {
            log::warn!("Server has more than one resource named {key}; only the first is managed");
        } else {
            by_key.insert(key, resource);
        }
    }

    for item in desired {
        match by_key.remove(&item.key()) {
            None => diff.create.push(item),
            Some(current) if equal(&item, &current) => diff.unchanged.push(Unchanged {
                desired: item,
                server: current,
            }),
            Some(current) => {
                let partial = update_is_partial(&item);
                diff.update.push(Update {
                    desired: item,
                    server: current,
                    partial,
                });
            }
        }
    }

    diff
}
