//! In-memory catalog tree.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. A node is
//! either a `Branch` (catalog, collection or generated subcatalog) or a
//! `Leaf` wrapping one record. Child names are the documents' ids and are
//! unique within a parent.
//!
//! Removed nodes leave an empty slot behind so ids stay stable for the
//! lifetime of the tree.

use std::collections::{BTreeMap, HashSet};

use super::{Link, Record, is_path_segment};
use crate::error::{AppError, Result};

/// Index of a node in a [`Catalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Node payload.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Branch {
        descriptor: Record,
        children: BTreeMap<String, NodeId>,
    },
    Leaf {
        record: Record,
    },
}

/// A node and its parent pointer.
#[derive(Debug, Clone)]
pub struct Node {
    parent: Option<NodeId>,
    kind: NodeKind,
}

impl Node {
    /// Child name within the parent.
    pub fn name(&self) -> &str {
        &self.document().id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_branch(&self) -> bool {
        matches!(self.kind, NodeKind::Branch { .. })
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// The descriptor of a branch or the record of a leaf.
    pub fn document(&self) -> &Record {
        match &self.kind {
            NodeKind::Branch { descriptor, .. } => descriptor,
            NodeKind::Leaf { record } => record,
        }
    }

    fn document_mut(&mut self) -> &mut Record {
        match &mut self.kind {
            NodeKind::Branch { descriptor, .. } => descriptor,
            NodeKind::Leaf { record } => record,
        }
    }

    /// Children in name order; empty for leaves.
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        let children = match &self.kind {
            NodeKind::Branch { children, .. } => Some(children.values().copied()),
            NodeKind::Leaf { .. } => None,
        };
        children.into_iter().flatten()
    }
}

/// A catalog tree rooted at a branch.
#[derive(Debug, Clone)]
pub struct Catalog {
    nodes: Vec<Option<Node>>,
    root: NodeId,
}

impl Catalog {
    /// Create a tree whose root branch is described by `descriptor`.
    pub fn new(descriptor: Record) -> Self {
        let root = Node {
            parent: None,
            kind: NodeKind::Branch {
                descriptor,
                children: BTreeMap::new(),
            },
        };
        Self {
            nodes: vec![Some(root)],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.get(id)
            .ok_or_else(|| AppError::not_found(format!("catalog node {}", id.0)))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| AppError::not_found(format!("catalog node {}", id.0)))
    }

    fn children_mut(&mut self, id: NodeId) -> Result<&mut BTreeMap<String, NodeId>> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Branch { children, .. } => Ok(children),
            NodeKind::Leaf { record } => Err(AppError::validation(format!(
                "'{}' is a leaf and cannot hold children",
                record.id
            ))),
        }
    }

    /// Look up a direct child by name.
    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        match &self.get(parent)?.kind {
            NodeKind::Branch { children, .. } => children.get(name).copied(),
            NodeKind::Leaf { .. } => None,
        }
    }

    /// Direct children of a node, in name order.
    pub fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.get(id)
            .map(|n| n.children().collect())
            .unwrap_or_default()
    }

    pub fn is_branch(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(Node::is_branch)
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(Node::is_leaf)
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> Result<NodeId> {
        let id = NodeId(self.nodes.len());
        let name = match &kind {
            NodeKind::Branch { descriptor, .. } => descriptor.id.clone(),
            NodeKind::Leaf { record } => record.id.clone(),
        };

        if !is_path_segment(&name) {
            return Err(AppError::validation(format!(
                "'{name}' cannot be used as a child name"
            )));
        }

        let children = self.children_mut(parent)?;
        if children.contains_key(&name) {
            return Err(AppError::validation(format!(
                "a child named '{name}' already exists"
            )));
        }
        children.insert(name, id);

        self.nodes.push(Some(Node {
            parent: Some(parent),
            kind,
        }));
        Ok(id)
    }

    /// Add a new branch under `parent`; fails if the name is taken.
    pub fn add_branch(&mut self, parent: NodeId, descriptor: Record) -> Result<NodeId> {
        self.push(
            parent,
            NodeKind::Branch {
                descriptor,
                children: BTreeMap::new(),
            },
        )
    }

    /// Insert a leaf, overwriting an existing leaf with the same id.
    ///
    /// Returns the leaf's id and `true` when a new leaf was created.
    pub fn upsert_leaf(&mut self, parent: NodeId, record: Record) -> Result<(NodeId, bool)> {
        if let Some(existing) = self.child(parent, &record.id) {
            let node = self.node_mut(existing)?;
            return match &mut node.kind {
                NodeKind::Leaf { record: current } => {
                    *current = record;
                    Ok((existing, false))
                }
                NodeKind::Branch { .. } => Err(AppError::validation(format!(
                    "'{}' is already a branch",
                    record.id
                ))),
            };
        }
        let id = self.push(parent, NodeKind::Leaf { record })?;
        Ok((id, true))
    }

    /// Detach and drop a node with its whole subtree. The root cannot be removed.
    ///
    /// Returns the number of nodes dropped.
    pub fn remove(&mut self, id: NodeId) -> Result<usize> {
        if id == self.root {
            return Err(AppError::validation("the catalog root cannot be removed"));
        }

        let node = self.node(id)?;
        let name = node.name().to_string();
        if let Some(parent) = node.parent {
            self.children_mut(parent)?.remove(&name);
        }

        let doomed = self.descendants(id);
        for dead in &doomed {
            self.nodes[dead.0] = None;
        }
        Ok(doomed.len())
    }

    /// Remove a leaf and hand back its record.
    pub fn take_leaf(&mut self, id: NodeId) -> Result<Record> {
        if !self.is_leaf(id) {
            return Err(AppError::validation("only leaves can be taken"));
        }
        let record = self.node(id)?.document().clone();
        self.remove(id)?;
        Ok(record)
    }

    /// Node ids of a subtree in pre-order, `id` first.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.get(current) else {
                continue;
            };
            out.push(current);
            let children: Vec<NodeId> = node.children().collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Names from below the root down to `id`. Empty for the root.
    pub fn path(&self, id: NodeId) -> Vec<String> {
        let mut names = Vec::new();
        let mut current = self.get(id);
        while let Some(node) = current {
            let Some(parent) = node.parent else {
                break;
            };
            names.push(node.name().to_string());
            current = self.get(parent);
        }
        names.reverse();
        names
    }

    /// Slash-joined path, or the root's id for the root.
    pub fn path_string(&self, id: NodeId) -> String {
        let path = self.path(id);
        if path.is_empty() {
            self.get(id)
                .map(|n| n.name().to_string())
                .unwrap_or_default()
        } else {
            path.join("/")
        }
    }

    /// Distance from the root.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.get(id).and_then(|n| n.parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.get(parent).and_then(|n| n.parent);
        }
        depth
    }

    /// Nearest ancestor (or self) whose descriptor is a collection.
    pub fn enclosing_collection(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(candidate) = current {
            let node = self.get(candidate)?;
            if node.is_branch() && node.document().is_collection() {
                return Some(candidate);
            }
            current = node.parent;
        }
        None
    }

    /// Leaves in the subtree under `id`.
    pub fn leaf_count(&self, id: NodeId) -> usize {
        self.descendants(id)
            .into_iter()
            .filter(|n| self.is_leaf(*n))
            .count()
    }

    /// Children in the arena plus `child`/`item` links not yet resolved.
    pub fn child_count(&self, id: NodeId) -> usize {
        self.get(id).map_or(0, |node| {
            let unresolved = node
                .document()
                .links
                .iter()
                .filter(|l| l.is_reference())
                .count();
            node.children().count() + unresolved
        })
    }

    /// Links stored on a node's document.
    pub fn links(&self, id: NodeId) -> &[Link] {
        self.get(id)
            .map(|n| n.document().links.as_slice())
            .unwrap_or_default()
    }

    /// Remove links matching `pred` from a node's document.
    pub fn remove_links(
        &mut self,
        id: NodeId,
        pred: impl FnMut(&Link) -> bool,
    ) -> Result<Vec<Link>> {
        Ok(self.node_mut(id)?.document_mut().remove_links(pred))
    }

    /// Remove links whose relation is in `rels`; returns how many went.
    pub fn strip_links(&mut self, id: NodeId, rels: &HashSet<String>) -> Result<usize> {
        Ok(self.remove_links(id, |l| rels.contains(&l.rel))?.len())
    }
}
