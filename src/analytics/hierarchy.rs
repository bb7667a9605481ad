//! Manager → employee tree resolution.
//!
//! Builds the org forest from `(id, parent_id, name)` entries and assigns each
//! node a depth and a `Root > Child > ..` path. Descent uses an explicit work
//! list, so pathological chains cannot exhaust the call stack.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use super::types::{AnalyticsError, AnalyticsResult};

/// Separator between names in a hierarchy path.
pub const PATH_SEPARATOR: &str = " > ";

/// One input entry of the parent relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyEntry {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
}

impl HierarchyEntry {
    pub fn new(id: i64, parent_id: Option<i64>, name: impl Into<String>) -> Self {
        Self {
            id,
            parent_id,
            name: name.into(),
        }
    }
}

/// A resolved node. Roots have depth 1 and a path equal to their own name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyNode {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub depth: usize,
    pub path: String,
    pub direct_reports: usize,
}

/// Resolve the forest, returning nodes ordered by path (then id).
///
/// Fails with [`AnalyticsError::Structural`] on a duplicate id, a parent id
/// that names no entry, or a cycle in the parent relation.
pub fn resolve(entries: &[HierarchyEntry]) -> AnalyticsResult<Vec<HierarchyNode>> {
    let mut by_id: FxHashMap<i64, usize> = FxHashMap::default();
    for (i, e) in entries.iter().enumerate() {
        if by_id.insert(e.id, i).is_some() {
            return Err(AnalyticsError::Structural(format!(
                "duplicate hierarchy id {}",
                e.id
            )));
        }
    }

    let mut children: FxHashMap<i64, Vec<usize>> = FxHashMap::default();
    let mut roots = Vec::new();
    for (i, e) in entries.iter().enumerate() {
        match e.parent_id {
            None => roots.push(i),
            Some(p) if !by_id.contains_key(&p) => {
                return Err(AnalyticsError::Structural(format!(
                    "entry {} references missing parent {p}",
                    e.id
                )));
            }
            Some(p) => children.entry(p).or_default().push(i),
        }
    }

    let mut visited: FxHashSet<i64> = FxHashSet::default();
    let mut nodes = Vec::with_capacity(entries.len());
    let mut stack: Vec<(usize, usize, String)> = roots
        .iter()
        .rev()
        .map(|&i| (i, 1, entries[i].name.clone()))
        .collect();

    while let Some((i, depth, path)) = stack.pop() {
        let e = &entries[i];
        if !visited.insert(e.id) {
            return Err(AnalyticsError::Structural(format!(
                "cycle detected at hierarchy id {}",
                e.id
            )));
        }
        let kids = children.get(&e.id).map(Vec::as_slice).unwrap_or_default();
        for &c in kids.iter().rev() {
            let child_path = format!("{path}{PATH_SEPARATOR}{}", entries[c].name);
            stack.push((c, depth + 1, child_path));
        }
        nodes.push(HierarchyNode {
            id: e.id,
            parent_id: e.parent_id,
            name: e.name.clone(),
            depth,
            path,
            direct_reports: kids.len(),
        });
    }

    // Every parent exists, so anything unreached hangs off a cycle.
    if let Some(e) = entries.iter().find(|e| !visited.contains(&e.id)) {
        return Err(AnalyticsError::Structural(format!(
            "cycle detected at hierarchy id {}",
            e.id
        )));
    }

    nodes.sort_by(|a, b| a.path.cmp(&b.path).then(a.id.cmp(&b.id)));
    debug!(
        nodes = nodes.len(),
        roots = roots.len(),
        max_depth = nodes.iter().map(|n| n.depth).max().unwrap_or(0),
        "resolved hierarchy"
    );
    Ok(nodes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
