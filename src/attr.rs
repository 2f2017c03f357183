//! Typed, globally registered node attributes
//!
//! An [`Attribute`] is a named descriptor for a piece of metadata that can be
//! attached to any tree node without changing the node's static shape. Each
//! distinct attribute name is assigned an ordinal once, process-wide; per-node
//! storage is a sparse growable vector indexed by that ordinal rather than a
//! hash map, keeping the per-node overhead low at tens of attribute kinds
//! times thousands of nodes.

use std::any::Any;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::tree::{NodeId, Tree};

/// Process-wide, append-only registry mapping attribute name -> ordinal.
/// Synchronized because attributes are registered during static
/// initialization from arbitrary caller threads.
static REGISTRY: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(Vec::new()));

fn register(name: &str) -> usize {
    let mut names = REGISTRY.lock().expect("attribute registry lock");
    if let Some(index) = names.iter().position(|n| n == name) {
        return index;
    }
    names.push(name.to_string());
    names.len() - 1
}

/// Number of distinct attribute names registered so far.
pub fn registered_count() -> usize {
    REGISTRY.lock().expect("attribute registry lock").len()
}

enum Fallback<T> {
    Value(T),
    Init(fn() -> T),
}

/// A named, typed attribute descriptor.
///
/// Two descriptors constructed with the same name share one ordinal (and
/// therefore one storage slot); the registry never shrinks.
pub struct Attribute<T> {
    index: usize,
    name: String,
    fallback: Fallback<T>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Clone + 'static> Attribute<T> {
    /// Register (or re-open) the attribute `name` with a fixed default value.
    pub fn new(name: &str, default: T) -> Self {
        Self {
            index: register(name),
            name: name.to_string(),
            fallback: Fallback::Value(default),
            _marker: PhantomData,
        }
    }

    /// Register (or re-open) the attribute `name` with a zero-argument
    /// initializer evaluated on first read.
    pub fn with_init(name: &str, init: fn() -> T) -> Self {
        Self {
            index: register(name),
            name: name.to_string(),
            fallback: Fallback::Init(init),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    fn default_value(&self) -> T {
        match &self.fallback {
            Fallback::Value(v) => v.clone(),
            Fallback::Init(f) => f(),
        }
    }

    /// Read the attribute from `node`, materializing the default on first
    /// access. The cache-write makes `is_set` true as a side effect.
    pub fn get(&self, tree: &mut Tree, node: NodeId) -> T {
        let store = tree.attrs_mut(node);
        if let Some(value) = store.lookup(self.index).and_then(|v| v.downcast_ref::<T>()) {
            return value.clone();
        }
        let value = self.default_value();
        store.put(self.index, Rc::new(value.clone()));
        value
    }

    /// Read the attribute only if a value was explicitly stored; never
    /// materializes the default.
    pub fn get_if_set(&self, tree: &Tree, node: NodeId) -> Option<T> {
        tree.attrs(node)
            .lookup(self.index)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    /// Overwrite the attribute on `node`.
    pub fn set(&self, tree: &mut Tree, node: NodeId, value: T) {
        tree.attrs_mut(node).put(self.index, Rc::new(value));
    }

    /// True only if a value was explicitly stored (via `set`, or the
    /// cache-write performed by `get`), including values visible through a
    /// frozen copy delegate.
    pub fn is_set(&self, tree: &Tree, node: NodeId) -> bool {
        tree.attrs(node).lookup(self.index).is_some()
    }
}

/// Source-position metadata callers may attach to any node; surfaced in
/// validation diagnostics when set.
pub static SOURCE_LINE: Lazy<Attribute<u32>> =
    Lazy::new(|| Attribute::new("classforge.sourceLine", 0));

/// JVM local-variable slot, written by the setup pass onto definition
/// statements and catch blocks, read by the bytecode backend.
pub static LOCAL_SLOT: Lazy<Attribute<u32>> =
    Lazy::new(|| Attribute::new("classforge.localSlot", 0));

/// Storage-frame size (max locals), written by the setup pass onto method
/// nodes and initializer blocks as a byproduct of traversal.
pub static FRAME_SIZE: Lazy<Attribute<u32>> =
    Lazy::new(|| Attribute::new("classforge.frameSize", 0));

type Slot = Option<Rc<dyn Any>>;

/// Per-node attribute storage: a sparse local vector plus an optional chain
/// of frozen delegates installed by the copy protocol.
///
/// After a node is copied, both the original and the copy hold empty local
/// vectors backed by the same frozen delegate; a subsequent write on either
/// side goes to its own local vector only, and reads fall through to the
/// delegate chain for ordinals not locally overridden.
#[derive(Debug, Default)]
pub struct AttrStore {
    local: Vec<Slot>,
    delegate: Option<Rc<AttrStore>>,
}

impl AttrStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lookup(&self, index: usize) -> Option<&Rc<dyn Any>> {
        if let Some(Some(value)) = self.local.get(index) {
            return Some(value);
        }
        let mut next = self.delegate.as_deref();
        while let Some(delegate) = next {
            if let Some(Some(value)) = delegate.local.get(index) {
                return Some(value);
            }
            next = delegate.delegate.as_deref();
        }
        None
    }

    pub(crate) fn put(&mut self, index: usize, value: Rc<dyn Any>) {
        if self.local.len() <= index {
            self.local.resize(index + 1, None);
        }
        self.local[index] = Some(value);
    }

    /// The copy-protocol hook: move the live local vector into a newly
    /// interposed frozen delegate (chained onto any pre-existing delegate),
    /// leaving this store empty but backed by the frozen state, and return
    /// the store the copy should carry: empty, backed by the same frozen
    /// delegate.
    pub(crate) fn split_for_copy(&mut self) -> AttrStore {
        let frozen = Rc::new(AttrStore {
            local: std::mem::take(&mut self.local),
            delegate: self.delegate.take(),
        });
        self.delegate = Some(Rc::clone(&frozen));
        AttrStore {
            local: Vec::new(),
            delegate: Some(frozen),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_shares_one_ordinal() {
        let a: Attribute<i32> = Attribute::new("classforge.test.shared", 0);
        let b: Attribute<i32> = Attribute::new("classforge.test.shared", 7);
        assert_eq!(a.index(), b.index());
    }

    #[test]
    fn distinct_names_get_distinct_ordinals() {
        let a: Attribute<i32> = Attribute::new("classforge.test.first", 0);
        let b: Attribute<i32> = Attribute::new("classforge.test.second", 0);
        assert_ne!(a.index(), b.index());
        assert!(registered_count() > a.index().max(b.index()));
    }

    #[test]
    fn split_store_reads_through_frozen_delegate() {
        let mut store = AttrStore::new();
        store.put(3, Rc::new(41_i32));

        let copy_store = store.split_for_copy();
        assert!(store.local.is_empty());
        assert!(copy_store.local.is_empty());
        let through_original = store.lookup(3).and_then(|v| v.downcast_ref::<i32>()).copied();
        let through_copy = copy_store.lookup(3).and_then(|v| v.downcast_ref::<i32>()).copied();
        assert_eq!(through_original, Some(41));
        assert_eq!(through_copy, Some(41));
    }

    #[test]
    fn local_write_after_split_does_not_leak_across() {
        let mut original = AttrStore::new();
        original.put(0, Rc::new(1_i32));
        let mut copy = original.split_for_copy();

        original.put(0, Rc::new(2_i32));
        let seen_by_copy = copy.lookup(0).and_then(|v| v.downcast_ref::<i32>()).copied();
        assert_eq!(seen_by_copy, Some(1));

        copy.put(0, Rc::new(3_i32));
        let seen_by_original = original.lookup(0).and_then(|v| v.downcast_ref::<i32>()).copied();
        assert_eq!(seen_by_original, Some(2));
    }
}
