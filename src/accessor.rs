//! Dot-path reads and writes against a slot's payload
//!
//! Every write loads the whole record, edits the tree and saves it back
//! through the store, so each path write gets the same backup-then-overwrite
//! treatment as a full save.
//!
//! `story` and `storyProgress` are aliases: a write under either root is
//! mirrored to the same relative path under the other, at any depth.

use serde_json::{Number, Value};

use crate::persistence::{LoadOutcome, Record, SlotStore};
use crate::platform::{Clock, KeyValueBackend, SystemClock};
use crate::tree::{get_path, parse_path, set_path};

/// Top-level keys that must always hold the same sub-tree.
pub const ALIAS_ROOTS: [(&str, &str); 1] = [("story", "storyProgress")];

/// The aliased twin of `segments`, if its root is an alias.
fn mirror_of<'p>(segments: &[&'p str]) -> Option<Vec<&'p str>> {
    let (root, rest) = segments.split_first()?;
    let twin = ALIAS_ROOTS.iter().find_map(|&(a, b)| {
        if *root == a {
            Some(b)
        } else if *root == b {
            Some(a)
        } else {
            None
        }
    })?;
    let mut mirrored = Vec::with_capacity(segments.len());
    mirrored.push(twin);
    mirrored.extend_from_slice(rest);
    Some(mirrored)
}

pub struct PathAccessor<'s, B: KeyValueBackend, C: Clock = SystemClock> {
    store: &'s mut SlotStore<B, C>,
}

impl<'s, B: KeyValueBackend, C: Clock> PathAccessor<'s, B, C> {
    /// Path access over `store` for the lifetime of the borrow.
    pub fn new(store: &'s mut SlotStore<B, C>) -> Self {
        Self { store }
    }

    /// The wrapped store.
    pub fn store(&self) -> &SlotStore<B, C> {
        &*self.store
    }

    /// Value at `path` in the slot's payload. Missing nodes, empty slots and
    /// malformed paths all read as `None`.
    pub fn get(&self, path: &str, slot: u32) -> Option<Value> {
        let segments = parse_path(path).ok()?;
        let record = self.store.load(slot)?;
        get_path(&record.payload, &segments).cloned()
    }

    /// The record path writes operate on. An empty slot starts from the
    /// default template; a corrupted one is left alone for the caller to
    /// restore.
    fn record_for_write(&self, slot: u32) -> Option<Record> {
        match self.store.load_outcome(slot) {
            LoadOutcome::Loaded(record) | LoadOutcome::Substituted(record) => Some(record),
            LoadOutcome::Missing if self.store.config().slot_in_range(slot) => {
                log::debug!("Provisioning default record for slot {}", slot);
                Some(self.store.default_record(slot))
            }
            LoadOutcome::Missing => None,
            LoadOutcome::Corrupted => {
                log::warn!("Refusing path write to corrupted slot {}", slot);
                None
            }
        }
    }

    /// Assign `value` at `path`, creating intermediate objects, and persist.
    ///
    /// Nothing is saved when the path would have to index an array with a
    /// non-numeric segment.
    pub fn set(&mut self, path: &str, value: Value, slot: u32) -> bool {
        let segments = match parse_path(path) {
            Ok(segments) => segments,
            Err(e) => {
                log::warn!("Rejected path write: {}", e);
                return false;
            }
        };
        let Some(mut record) = self.record_for_write(slot) else {
            return false;
        };

        let mirrored = match mirror_of(&segments) {
            Some(mirror) => set_path(&mut record.payload, &mirror, value.clone()),
            None => Ok(()),
        };
        if let Err(e) = mirrored.and_then(|()| set_path(&mut record.payload, &segments, value)) {
            log::warn!("Rejected path write to {}: {}", path, e);
            return false;
        }

        let compress = self.store.config().compress;
        self.store.save(&record, slot, compress)
    }

    /// Add `amount` to the number at `path` (absent counts as 0) and return
    /// the new value. Non-numeric values are left untouched.
    pub fn increment(&mut self, path: &str, amount: i64, slot: u32) -> Option<Value> {
        let next = match self.get(path, slot) {
            None => Value::from(amount),
            Some(Value::Number(n)) => add(&n, amount)?,
            Some(other) => {
                log::warn!("Cannot increment non-numeric value at {}: {}", path, other);
                return None;
            }
        };
        self.set(path, next.clone(), slot).then_some(next)
    }
}

fn add(current: &Number, amount: i64) -> Option<Value> {
    if let Some(sum) = current.as_i64().and_then(|n| n.checked_add(amount)) {
        return Some(Value::from(sum));
    }
    let sum = current.as_f64()? + amount as f64;
    Number::from_f64(sum).map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::platform::{ManualClock, MemoryBackend};
    use serde_json::json;

    fn store() -> SlotStore<MemoryBackend, ManualClock> {
        SlotStore::with_clock(
            MemoryBackend::new(),
            StoreConfig::default(),
            ManualClock::new(1_000),
        )
        .unwrap()
    }

    #[test]
    fn test_mirror_of() {
        assert_eq!(
            mirror_of(&["story", "chapter"]),
            Some(vec!["storyProgress", "chapter"])
        );
        assert_eq!(mirror_of(&["storyProgress"]), Some(vec!["story"]));
        assert_eq!(mirror_of(&["profile", "story"]), None);
        assert_eq!(mirror_of(&[]), None);
    }

    #[test]
    fn test_set_then_get() {
        let mut store = store();
        let mut paths = PathAccessor::new(&mut store);
        assert!(paths.set("profile.level", json!(7), 1));
        assert_eq!(paths.get("profile.level", 1), Some(json!(7)));
        assert_eq!(paths.get("profile.missing.deeper", 1), None);
        assert_eq!(paths.get("profile..level", 1), None);
    }

    #[test]
    fn test_get_on_empty_slot() {
        let mut store = store();
        let paths = PathAccessor::new(&mut store);
        assert_eq!(paths.get("profile.level", 2), None);
    }

    #[test]
    fn test_set_provisions_default_record() {
        let mut store = store();
        let mut paths = PathAccessor::new(&mut store);
        assert!(paths.set("a.b.c", json!(1), 2));
        assert_eq!(paths.get("a.b", 2), Some(json!({"c": 1})));
        assert_eq!(paths.get("profile.gold", 2), Some(json!(100)));
    }

    #[test]
    fn test_set_rejects_bad_slot_and_path() {
        let mut store = store();
        let mut paths = PathAccessor::new(&mut store);
        assert!(!paths.set("profile.level", json!(1), 0));
        assert!(!paths.set("", json!(1), 1));
        assert!(!paths.store().slot_exists(1));
    }

    #[test]
    fn test_set_refuses_corrupted_slot() {
        let mut store = store();
        let key = store.primary_key(1);
        store.backend_mut().put(&key, "@@@ corrupted @@@").unwrap();

        let mut paths = PathAccessor::new(&mut store);
        assert!(!paths.set("profile.level", json!(3), 1));
        assert_eq!(
            store.backend().get(&key).unwrap().as_deref(),
            Some("@@@ corrupted @@@")
        );
    }

    #[test]
    fn test_alias_mirroring_both_directions_and_depths() {
        let mut store = store();
        let mut paths = PathAccessor::new(&mut store);

        assert!(paths.set("story.completedMissions", json!(["m1"]), 1));
        assert_eq!(
            paths.get("storyProgress.completedMissions", 1),
            Some(json!(["m1"]))
        );

        assert!(paths.set("storyProgress.flags.metKing", json!(true), 1));
        assert_eq!(paths.get("story.flags.metKing", 1), Some(json!(true)));

        assert!(paths.set("story", json!({"currentChapter": 4}), 1));
        assert_eq!(
            paths.get("storyProgress", 1),
            Some(json!({"currentChapter": 4}))
        );
    }

    #[test]
    fn test_set_grows_arrays_without_losing_items() {
        let mut store = store();
        let mut paths = PathAccessor::new(&mut store);
        assert!(paths.set("inventory.items", json!(["sword", "shield"]), 1));
        assert!(paths.set("inventory.items.5", json!("potion"), 1));
        assert_eq!(
            paths.get("inventory.items", 1),
            Some(json!(["sword", "shield", null, null, null, "potion"]))
        );
    }

    #[test]
    fn test_set_refuses_named_segment_on_array() {
        let mut store = store();
        let mut paths = PathAccessor::new(&mut store);
        assert!(paths.set("inventory.items", json!(["sword"]), 1));
        let before = paths.store().list_backups(1).len();

        assert!(!paths.set("unlocks.areas.label", json!("x"), 1));
        assert!(!paths.set("inventory.items.first", json!("x"), 1));
        assert_eq!(paths.get("unlocks.areas", 1), Some(json!(["village"])));
        assert_eq!(paths.get("inventory.items", 1), Some(json!(["sword"])));
        assert_eq!(paths.store().list_backups(1).len(), before);
    }

    #[test]
    fn test_increment() {
        let mut store = store();
        let mut paths = PathAccessor::new(&mut store);

        assert_eq!(paths.increment("stats.newCounter", 1, 1), Some(json!(1)));
        assert_eq!(paths.get("stats.newCounter", 1), Some(json!(1)));

        assert_eq!(paths.increment("profile.gold", 50, 1), Some(json!(150)));
        assert_eq!(paths.get("profile.gold", 1), Some(json!(150)));

        assert_eq!(paths.increment("profile.gold", -200, 1), Some(json!(-50)));

        assert!(paths.set("settings.musicVolume", json!(0.5), 1));
        assert_eq!(paths.increment("settings.musicVolume", 1, 1), Some(json!(1.5)));

        assert_eq!(paths.increment("profile.name", 1, 1), None);
        assert_eq!(paths.get("profile.name", 1), Some(json!("Adventurer")));
    }
}
