//! Dot-path addressing over `serde_json::Value` trees
//!
//! One set of helpers shared by path reads, path writes, increments and
//! schema defaulting. Paths look like `profile.level` or `inventory.items.0`.
//! Numeric segments index arrays; everything else is an object key.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("empty path")]
    Empty,
    #[error("empty segment in path '{0}'")]
    EmptySegment(String),
    #[error("'{0}' cannot index an array")]
    NotAnIndex(String),
    #[error("array index {0} is too large")]
    IndexTooLarge(usize),
}

/// Largest array index a path write may pad up to.
pub const MAX_ARRAY_INDEX: usize = 4096;

/// Split a dotted path into its segments.
pub fn parse_path(path: &str) -> Result<Vec<&str>, PathError> {
    let path = path.trim();
    if path.is_empty() {
        return Err(PathError::Empty);
    }
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(PathError::EmptySegment(path.to_string()));
    }
    Ok(segments)
}

fn child<'v>(node: &'v Value, segment: &str) -> Option<&'v Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Walk `segments` from `root`. Any missing node yields `None`.
pub fn get_path<'v>(root: &'v Value, segments: &[&str]) -> Option<&'v Value> {
    segments.iter().try_fold(root, |node, seg| child(node, seg))
}

/// Assign `value` at `segments`, creating objects for missing intermediates.
///
/// A scalar intermediate is replaced by an empty object. Existing arrays are
/// never replaced: a numeric segment past the end pads the array with `null`
/// up to that index, and any other segment is an error. On error the tree is
/// left unchanged. An empty segment list replaces the root.
pub fn set_path(root: &mut Value, segments: &[&str], value: Value) -> Result<(), PathError> {
    let Some((leaf, parents)) = segments.split_last() else {
        *root = value;
        return Ok(());
    };

    check_array_segments(root, segments)?;

    let mut node = root;
    for seg in parents {
        node = child_or_create(node, seg)?;
    }
    *child_or_create(node, leaf)? = value;
    Ok(())
}

/// Walk the existing part of the path and reject segments that would have to
/// index an array but cannot, before anything is written.
fn check_array_segments(root: &Value, segments: &[&str]) -> Result<(), PathError> {
    let mut node = Some(root);
    for seg in segments {
        let Some(current) = node else {
            return Ok(());
        };
        if current.is_array() {
            array_index(seg)?;
        }
        node = child(current, seg);
    }
    Ok(())
}

fn array_index(seg: &str) -> Result<usize, PathError> {
    let index = seg
        .parse::<usize>()
        .map_err(|_| PathError::NotAnIndex(seg.to_string()))?;
    if index > MAX_ARRAY_INDEX {
        return Err(PathError::IndexTooLarge(index));
    }
    Ok(index)
}

/// The slot for `seg` under `node`, inserted as `null` when absent.
fn child_or_create<'v>(node: &'v mut Value, seg: &str) -> Result<&'v mut Value, PathError> {
    if !node.is_object() && !node.is_array() {
        *node = Value::Object(Map::new());
    }

    match node {
        Value::Array(items) => {
            let index = array_index(seg)?;
            if index >= items.len() {
                items.resize(index + 1, Value::Null);
            }
            Ok(&mut items[index])
        }
        Value::Object(map) => Ok(map.entry(seg.to_string()).or_insert(Value::Null)),
        _ => unreachable!("non-container nodes are replaced above"),
    }
}

/// Fill missing leaves of `target` from `template`.
///
/// Existing values always win. Objects are merged key by key; arrays and
/// scalars are leaves. A `null` in `target` counts as present.
pub fn deep_merge_defaults(target: &mut Value, template: &Value) {
    let (Value::Object(dst), Value::Object(src)) = (target, template) else {
        return;
    };
    for (key, default) in src {
        match dst.get_mut(key) {
            Some(existing) => deep_merge_defaults(existing, default),
            None => {
                dst.insert(key.clone(), default.clone());
            }
        }
    }
}
