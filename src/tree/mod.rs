//! Tree node infrastructure
//!
//! Every generated class owns one [`Tree`]: an arena of nodes addressed by
//! [`NodeId`]. Nodes carry a globally unique monotonic `uid`, an owning
//! parent link, a kind payload and an attribute store. The structure is a
//! strict tree: a live node is never shared under two parents; attaching an
//! already-parented node goes through the copy protocol instead.

pub mod visitor;

pub use visitor::{walk, Visitor, WalkContext};

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ast::NodeKind;
use crate::attr::AttrStore;

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

/// Index of a node within its owning [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
pub struct Node {
    uid: u64,
    parent: Option<NodeId>,
    kind: NodeKind,
    attrs: AttrStore,
}

impl Node {
    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }
}

#[derive(Debug, Default)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn alloc(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        self.alloc_with_attrs(kind, parent, AttrStore::new())
    }

    fn alloc_with_attrs(&mut self, kind: NodeKind, parent: Option<NodeId>, attrs: AttrStore) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
            parent,
            kind,
            attrs,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Panics if `id` belongs to a different tree.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub(crate) fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.node_mut(id).kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn uid(&self, id: NodeId) -> u64 {
        self.node(id).uid
    }

    pub(crate) fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) {
        self.node_mut(id).parent = parent;
    }

    pub fn attrs(&self, id: NodeId) -> &AttrStore {
        &self.node(id).attrs
    }

    pub(crate) fn attrs_mut(&mut self, id: NodeId) -> &mut AttrStore {
        &mut self.node_mut(id).attrs
    }

    /// Walk parent links from `id` until a node matching `pred` is found.
    pub fn ancestor_where(&self, id: NodeId, pred: impl Fn(&NodeKind) -> bool) -> Option<NodeId> {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if pred(self.kind(node)) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// Produce an independent deep copy of `node` carrying the same parent
    /// reference as the original (shared, not copied). The copy is purely
    /// downward: ancestors are never duplicated, and intra-subtree aliasing
    /// is preserved through an old-to-new identity map.
    pub fn copy(&mut self, node: NodeId) -> NodeId {
        let mut map = HashMap::new();
        self.copy_subtree(node, &mut map)
    }

    /// As [`Tree::copy`], but rebind the copy's parent to `new_parent`.
    /// The copy is not inserted into any child list; attachment is the
    /// builder's job.
    pub fn copy_under(&mut self, node: NodeId, new_parent: NodeId) -> NodeId {
        let copy = self.copy(node);
        self.node_mut(copy).parent = Some(new_parent);
        copy
    }

    fn copy_subtree(&mut self, node: NodeId, map: &mut HashMap<NodeId, NodeId>) -> NodeId {
        if let Some(&already) = map.get(&node) {
            return already;
        }
        // Freeze the original's attributes first; both sides end up backed
        // by the same frozen delegate, isolated for future writes.
        let copied_attrs = self.node_mut(node).attrs.split_for_copy();
        let (kind, parent) = {
            let original = self.node(node);
            (original.kind.clone(), original.parent)
        };
        let copy = self.alloc_with_attrs(kind, parent, copied_attrs);
        map.insert(node, copy);

        let children = self.node(copy).kind.child_ids();
        for child in children {
            let child_copy = self.copy_subtree(child, map);
            self.node_mut(child_copy).parent = Some(copy);
        }
        self.node_mut(copy).kind.remap_children(map);
        copy
    }

    /// Indented one-line-per-node dump, used by the dump-after-setup option.
    pub fn dump(&self, root: NodeId) -> String {
        let mut out = String::new();
        self.dump_into(root, 0, &mut out);
        out
    }

    fn dump_into(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = self.node(id);
        let _ = writeln!(
            out,
            "{:indent$}{} #{}",
            "",
            node.kind.describe(),
            node.uid,
            indent = depth * 2
        );
        for child in node.kind.child_ids() {
            self.dump_into(child, depth + 1, out);
        }
    }

    /// All node ids reachable downward from `root`, including `root`.
    pub fn reachable_from(&self, root: NodeId) -> Vec<NodeId> {
        let mut seen = Vec::new();
        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);
            pending.extend(self.kind(id).child_ids());
        }
        seen
    }
}
