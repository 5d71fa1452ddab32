//! Attribute documents, dotted paths and the change overlay
//!
//! A record keeps two layers of attributes: the persisted baseline (a plain
//! JSON object) and a [`ChangeSet`] holding the writes made since the last
//! successful store round trip.
//!
//! The overlay is a small tree keyed by path segment:
//!
//! ```text
//! set("options.hey", "a")      set("options", {"hey": "a"})
//!
//!   options ─ Branch              options ─ Value({"hey": "a"})
//!              └ hey ─ Value("a")
//! ```
//!
//! A `Branch` only records which children changed; reads of its other children
//! fall through to the baseline. A `Value` replaces the whole subtree, so every
//! read beneath it resolves inside that value and never reaches the baseline.
//! Writing beneath a `Value` edits the value in place, replacing a scalar found
//! on the way with a fresh object.

use indexmap::IndexMap;
use serde_json::{Map, Value};

/// A stored document: a JSON object keyed by attribute name
pub type Document = Map<String, Value>;

/// The object held by `value`, or an empty document for any other value
pub fn document(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Split a dotted path into its segments
pub fn segments(path: &str) -> Vec<&str> {
    path.split('.').collect()
}

/// Read the value at `segments` below `value`
pub fn value_at<'a>(value: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(value, |current, segment| current.as_object()?.get(*segment))
}

/// Read the value at a dotted path of a document
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let segs = segments(path);
    let (first, rest) = segs.split_first()?;
    value_at(document.get(*first)?, rest)
}

fn write_into(target: &mut Value, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *target = value;
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        let slot = map.entry(first.to_string()).or_insert(Value::Null);
        write_into(slot, rest, value);
    }
}

/// Write `value` at a dotted path, creating (or replacing non-object)
/// intermediate values as needed
pub fn set_path(document: &mut Document, path: &str, value: Value) {
    let segs = segments(path);
    let Some((first, rest)) = segs.split_first() else {
        return;
    };
    let slot = document.entry(first.to_string()).or_insert(Value::Null);
    write_into(slot, rest, value);
}

fn remove_at(value: &mut Value, segments: &[&str]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return false;
    };
    let Some(map) = value.as_object_mut() else {
        return false;
    };
    if rest.is_empty() {
        return map.remove(*first).is_some();
    }
    map.get_mut(*first)
        .is_some_and(|child| remove_at(child, rest))
}

/// Remove the key at a dotted path, returning whether anything was removed
pub fn remove_path(document: &mut Document, path: &str) -> bool {
    let segs = segments(path);
    let Some((first, rest)) = segs.split_first() else {
        return false;
    };
    if rest.is_empty() {
        return document.remove(*first).is_some();
    }
    document
        .get_mut(*first)
        .is_some_and(|child| remove_at(child, rest))
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Value(Value),
    Branch(IndexMap<String, Node>),
}

/// Sparse overlay of uncommitted writes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    root: IndexMap<String, Node>,
}

fn apply_nodes(nodes: &IndexMap<String, Node>, target: &mut Document) {
    for (key, node) in nodes {
        match node {
            Node::Value(value) => {
                target.insert(key.clone(), value.clone());
            }
            Node::Branch(children) => {
                let slot = target
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                if let Value::Object(map) = slot {
                    apply_nodes(children, map);
                }
            }
        }
    }
}

fn flatten_nodes(
    nodes: &IndexMap<String, Node>,
    baseline: Option<&Document>,
    prefix: &str,
    out: &mut Document,
) {
    for (key, node) in nodes {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match node {
            Node::Value(value) => {
                out.insert(path, value.clone());
            }
            Node::Branch(children) => match baseline.and_then(|b| b.get(key)) {
                Some(Value::Object(map)) => flatten_nodes(children, Some(map), &path, out),
                // a dotted write cannot descend into a stored scalar
                Some(_) => {
                    let mut subtree = Map::new();
                    apply_nodes(children, &mut subtree);
                    out.insert(path, Value::Object(subtree));
                }
                None => flatten_nodes(children, None, &path, out),
            },
        }
    }
}

fn resolve(
    overlay: Option<&IndexMap<String, Node>>,
    baseline: Option<&Document>,
    segments: &[&str],
) -> Option<Value> {
    let (first, rest) = segments.split_first()?;
    let base_child = baseline.and_then(|b| b.get(*first));

    match overlay.and_then(|o| o.get(*first)) {
        Some(Node::Value(value)) => value_at(value, rest).cloned(),
        Some(Node::Branch(children)) if rest.is_empty() => {
            let mut merged = match base_child {
                Some(Value::Object(map)) => map.clone(),
                _ => Map::new(),
            };
            apply_nodes(children, &mut merged);
            Some(Value::Object(merged))
        }
        Some(Node::Branch(children)) => {
            resolve(Some(children), base_child.and_then(Value::as_object), rest)
        }
        None => value_at(base_child?, rest).cloned(),
    }
}

fn unset_in(nodes: &mut IndexMap<String, Node>, segments: &[&str]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return false;
    };
    if rest.is_empty() {
        return nodes.shift_remove(*first).is_some();
    }

    let (removed, prune) = match nodes.get_mut(*first) {
        Some(Node::Branch(children)) => {
            let removed = unset_in(children, rest);
            (removed, children.is_empty())
        }
        Some(Node::Value(value)) => (remove_at(value, rest), false),
        None => (false, false),
    };
    if prune {
        nodes.shift_remove(*first);
    }
    removed
}

impl ChangeSet {
    /// Create an empty overlay
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing has been written since the last commit
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Drop every pending write
    pub fn clear(&mut self) {
        self.root.clear();
    }

    /// Record a write of `value` at a dotted path
    pub fn set(&mut self, path: &str, value: Value) {
        let segs = segments(path);
        let Some((last, parents)) = segs.split_last() else {
            return;
        };

        let mut nodes = &mut self.root;
        for (depth, segment) in parents.iter().enumerate() {
            let node = nodes
                .entry(segment.to_string())
                .or_insert_with(|| Node::Branch(IndexMap::new()));
            match node {
                Node::Branch(children) => nodes = children,
                Node::Value(existing) => {
                    write_into(existing, &segs[depth + 1..], value);
                    return;
                }
            }
        }
        nodes.insert(last.to_string(), Node::Value(value));
    }

    /// Forget the pending write at a dotted path
    pub fn unset(&mut self, path: &str) -> bool {
        unset_in(&mut self.root, &segments(path))
    }

    /// The pending value at a dotted path, if the overlay defines it
    pub fn get(&self, path: &str) -> Option<Value> {
        resolve(Some(&self.root), None, &segments(path))
    }

    /// True if the overlay defines a value at `path`, including an explicit null
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Resolve a path against the overlay first, then the baseline, one
    /// segment at a time
    pub fn resolve(&self, baseline: &Document, path: &str) -> Option<Value> {
        resolve(Some(&self.root), Some(baseline), &segments(path))
    }

    /// Merge the overlay into `target`
    pub fn apply_to(&self, target: &mut Document) {
        apply_nodes(&self.root, target);
    }

    /// `baseline` with the overlay merged on top
    pub fn merged(&self, baseline: &Document) -> Document {
        let mut merged = baseline.clone();
        self.apply_to(&mut merged);
        merged
    }

    /// The overlay as a nested document
    pub fn to_document(&self) -> Document {
        let mut document = Map::new();
        self.apply_to(&mut document);
        document
    }

    /// The overlay as dotted paths against the stored `baseline`, suitable for
    /// `$set`-style partial updates. A branch written over a stored non-object
    /// is emitted whole.
    pub fn to_update(&self, baseline: &Document) -> Document {
        let mut update = Map::new();
        flatten_nodes(&self.root, Some(baseline), "", &mut update);
        update
    }
}
