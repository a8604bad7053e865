//! Scoped node identifiers and tree resolution.
//!
//! Events addressed at nodes inside nested subflows carry a scoped id: a
//! sequence of path segments joined by [`SCOPE_SEPARATOR`], where every
//! segment except the last is prefixed with [`SUBFLOW_PREFIX`] and names an
//! ancestor subflow node, and the last segment is the local node id.
//!
//! ```text
//! "@research/@sources/fetch"   ->  path = ["research", "sources"], local = "fetch"
//! "fetch"                      ->  path = [],                      local = "fetch"
//! ```
//!
//! Parsing is a pure string utility ([`ScopedId::parse`]); locating the
//! tree to mutate ([`resolve_tree_mut`]) creates ancestor subflow trees and
//! placeholder node entries on demand, so events that race ahead of their
//! owning subflow's `node_start` always have somewhere consistent to land.
//!
//! Malformed scoping (a non-last segment missing the prefix) falls back
//! to treating the entire string as an unscoped local id. That is a
//! deliberate fallback for engine ids that happen to contain the separator,
//! not a validation failure.

use crate::state::WorkflowTree;

/// Separator between path segments of a scoped id.
pub const SCOPE_SEPARATOR: char = '/';
/// Prefix marking a segment as an ancestor subflow id.
pub const SUBFLOW_PREFIX: char = '@';

/// A parsed node identifier: ancestor subflow path plus local node id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopedId {
    /// Ancestor subflow node ids, outermost first. Empty for root-level ids.
    pub path: Vec<String>,
    /// The local (unscoped) node id within the target tree.
    pub local: String,
}

impl ScopedId {
    /// Parse a possibly-scoped identifier.
    ///
    /// ```rust
    /// use streamloom::scope::ScopedId;
    ///
    /// let scoped = ScopedId::parse("@outer/@inner/node");
    /// assert_eq!(scoped.path, vec!["outer", "inner"]);
    /// assert_eq!(scoped.local, "node");
    ///
    /// let plain = ScopedId::parse("node");
    /// assert!(plain.path.is_empty());
    ///
    /// // Malformed scoping falls back to an unscoped local id.
    /// let fallback = ScopedId::parse("a/b");
    /// assert!(fallback.path.is_empty());
    /// assert_eq!(fallback.local, "a/b");
    /// ```
    pub fn parse(raw: &str) -> Self {
        if !raw.contains(SCOPE_SEPARATOR) {
            return Self {
                path: Vec::new(),
                local: raw.to_string(),
            };
        }
        let segments: Vec<&str> = raw.split(SCOPE_SEPARATOR).collect();
        let (last, ancestors) = segments.split_last().expect("split produced segments");
        let mut path = Vec::with_capacity(ancestors.len());
        for segment in ancestors {
            match segment.strip_prefix(SUBFLOW_PREFIX) {
                Some(id) if !id.is_empty() => path.push(id.to_string()),
                _ => {
                    // Not our grammar; treat the whole string as a local id.
                    return Self {
                        path: Vec::new(),
                        local: raw.to_string(),
                    };
                }
            }
        }
        Self {
            path,
            local: (*last).to_string(),
        }
    }

    /// Whether this id addresses a nested subflow tree.
    #[must_use]
    pub fn is_scoped(&self) -> bool {
        !self.path.is_empty()
    }

    /// Reconstruct the raw scoped string form.
    #[must_use]
    pub fn to_raw(&self) -> String {
        if self.path.is_empty() {
            return self.local.clone();
        }
        let mut out = String::new();
        for ancestor in &self.path {
            out.push(SUBFLOW_PREFIX);
            out.push_str(ancestor);
            out.push(SCOPE_SEPARATOR);
        }
        out.push_str(&self.local);
        out
    }
}

/// Observer-facing label for a subtree path; the root tree is `"root"`.
#[must_use]
pub fn scope_label(path: &[String]) -> String {
    if path.is_empty() {
        return "root".to_string();
    }
    let mut out = String::new();
    for (idx, ancestor) in path.iter().enumerate() {
        if idx > 0 {
            out.push(SCOPE_SEPARATOR);
        }
        out.push(SUBFLOW_PREFIX);
        out.push_str(ancestor);
    }
    out
}

/// Walk (and create on demand) the subflow chain named by `path`, returning
/// the tree that owns the local node id.
///
/// Every missing ancestor gets a placeholder node entry and a nested tree
/// with neutral defaults (`running`, empty maps); the real `node_start`
/// repairs labels when it arrives.
pub fn resolve_tree_mut<'a>(
    root: &'a mut WorkflowTree,
    path: &[String],
) -> &'a mut WorkflowTree {
    let mut tree = root;
    for ancestor in path {
        tree = tree.ensure_subflow(ancestor);
    }
    tree
}

/// Mutable walk of the subflow chain without creation; `None` if any
/// ancestor is missing. Used by mutators whose unknown-target behavior is a
/// silent no-op rather than placeholder creation.
#[must_use]
pub fn resolve_tree_existing_mut<'a>(
    root: &'a mut WorkflowTree,
    path: &[String],
) -> Option<&'a mut WorkflowTree> {
    let mut tree = root;
    for ancestor in path {
        tree = tree.nodes.get_mut(ancestor)?.subflow.as_deref_mut()?;
    }
    Some(tree)
}

/// Read-only walk of the subflow chain; `None` if any ancestor is missing.
#[must_use]
pub fn resolve_tree<'a>(root: &'a WorkflowTree, path: &[String]) -> Option<&'a WorkflowTree> {
    let mut tree = root;
    for ancestor in path {
        tree = tree.nodes.get(ancestor)?.subflow.as_deref()?;
    }
    Some(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unscoped_id() {
        let id = ScopedId::parse("n1");
        assert!(id.path.is_empty());
        assert_eq!(id.local, "n1");
        assert!(!id.is_scoped());
    }

    #[test]
    fn test_nested_path_round_trip() {
        let id = ScopedId::parse("@a/@b/c");
        assert_eq!(id.path, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(id.local, "c");
        assert_eq!(id.to_raw(), "@a/@b/c");
    }

    #[test]
    fn test_malformed_scope_falls_back_to_local() {
        for raw in ["a/b", "@a/b/c", "@/x", "a/@b/c"] {
            let id = ScopedId::parse(raw);
            assert!(id.path.is_empty(), "expected fallback for {raw:?}");
            assert_eq!(id.local, raw);
        }
    }

    #[test]
    fn test_resolver_creates_ancestors() {
        let mut root = WorkflowTree::new("wf", "Workflow");
        let scoped = ScopedId::parse("@outer/@inner/leaf");
        let tree = resolve_tree_mut(&mut root, &scoped.path);
        assert_eq!(tree.id, "inner");

        let outer = root.nodes["outer"].subflow.as_deref().expect("outer tree");
        assert!(outer.nodes.contains_key("inner"));
        assert_eq!(
            resolve_tree(&root, &scoped.path).map(|t| t.id.as_str()),
            Some("inner")
        );
    }

    #[test]
    fn test_scope_labels() {
        assert_eq!(scope_label(&[]), "root");
        assert_eq!(
            scope_label(&["a".to_string(), "b".to_string()]),
            "@a/@b"
        );
    }
}
