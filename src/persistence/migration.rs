//! Schema migration chain
//!
//! Each registered step upgrades a payload to its target milestone. Steps run
//! in ascending order for every target newer than the record's version, and
//! after each step the payload is deep-merged against that milestone's
//! template. A normalization pass runs last on every record, so migrating an
//! already-current record is a no-op.

use serde_json::{Map, Value};
use thiserror::Error;

use super::record::Record;
use super::schema::{
    CURRENT_VERSION, SchemaVersion, V1_0_0, V1_1_0, V1_2_0, VersionParseError, template_for,
};
use crate::tree::deep_merge_defaults;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    #[error(transparent)]
    InvalidVersion(#[from] VersionParseError),

    #[error("migration to {target} failed: {reason}")]
    Step {
        target: SchemaVersion,
        reason: String,
    },

    #[error("a migration to {0} is already registered")]
    DuplicateStep(SchemaVersion),
}

pub type Transform = fn(Value) -> Result<Value, String>;

#[derive(Debug, Clone)]
pub struct MigrationStep {
    pub target: SchemaVersion,
    pub description: &'static str,
    pub transform: Transform,
}

#[derive(Debug, Clone)]
pub struct SchemaMigrator {
    /// Sorted by target, no duplicates
    steps: Vec<MigrationStep>,
    current: SchemaVersion,
}

impl Default for SchemaMigrator {
    fn default() -> Self {
        let mut migrator = Self::empty(CURRENT_VERSION);
        for step in builtin_steps() {
            let registered = migrator.register(step);
            debug_assert!(registered.is_ok(), "duplicate built-in step: {registered:?}");
        }
        migrator
    }
}

impl SchemaMigrator {
    /// Migrator with no steps that stamps records as `current`.
    pub fn empty(current: SchemaVersion) -> Self {
        Self {
            steps: Vec::new(),
            current,
        }
    }

    /// Version every migrated record is stamped with.
    pub fn current_version(&self) -> SchemaVersion {
        self.current
    }

    /// Registered steps, ascending by target.
    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// Add a step, keeping the chain ordered by target version.
    pub fn register(&mut self, step: MigrationStep) -> Result<(), MigrationError> {
        match self.steps.binary_search_by_key(&step.target, |s| s.target) {
            Ok(_) => Err(MigrationError::DuplicateStep(step.target)),
            Err(pos) => {
                self.steps.insert(pos, step);
                Ok(())
            }
        }
    }

    /// Whether `record` is at any version other than the current one.
    pub fn needs_migration(&self, record: &Record) -> bool {
        record.version().map_or(true, |v| v != self.current)
    }

    /// Upgrade `record` to the current version.
    pub fn migrate(&self, mut record: Record) -> Result<Record, MigrationError> {
        let from = record.version()?;
        if from > self.current {
            log::warn!(
                "Save version {from} is newer than supported {}; loading as-is",
                self.current
            );
        }

        let mut payload = std::mem::take(&mut record.payload);
        for step in self
            .steps
            .iter()
            .filter(|s| s.target > from && s.target <= self.current)
        {
            log::info!("Migrating save {from} -> {}: {}", step.target, step.description);
            payload = (step.transform)(payload).map_err(|reason| MigrationError::Step {
                target: step.target,
                reason,
            })?;
            deep_merge_defaults(&mut payload, &template_for(step.target));
        }

        normalize_completed_collections(&mut payload);
        record.payload = payload;
        record.schema_version = self.current.to_string();
        Ok(record)
    }
}

/// Built-in upgrade chain for the milestones in [`super::schema`].
pub fn builtin_steps() -> Vec<MigrationStep> {
    vec![
        MigrationStep {
            target: V1_0_0,
            description: "rename pre-release profile and stat keys",
            transform: migrate_to_1_0,
        },
        MigrationStep {
            target: V1_1_0,
            description: "wrap bare inventory lists, add durability and unlocks",
            transform: migrate_to_1_1,
        },
        MigrationStep {
            target: V1_2_0,
            description: "introduce story alias and marketplace",
            transform: migrate_to_1_2,
        },
    ]
}

fn payload_object(payload: &mut Value) -> Result<&mut Map<String, Value>, String> {
    payload
        .as_object_mut()
        .ok_or_else(|| "payload is not an object".to_string())
}

fn rename_key(map: &mut Map<String, Value>, from: &str, to: &str) {
    if map.contains_key(to) {
        return;
    }
    if let Some(v) = map.remove(from) {
        map.insert(to.to_string(), v);
    }
}

fn migrate_to_1_0(mut payload: Value) -> Result<Value, String> {
    let root = payload_object(&mut payload)?;
    if let Some(Value::Object(profile)) = root.get_mut("profile") {
        rename_key(profile, "xp", "experience");
        rename_key(profile, "playerName", "name");
    }
    if let Some(Value::Object(stats)) = root.get_mut("stats") {
        rename_key(stats, "wins", "battlesWon");
        rename_key(stats, "losses", "battlesLost");
        rename_key(stats, "kills", "enemiesDefeated");
    }
    Ok(payload)
}

fn migrate_to_1_1(mut payload: Value) -> Result<Value, String> {
    let root = payload_object(&mut payload)?;
    if let Some(Value::Array(items)) = root.get("inventory") {
        let items = items.clone();
        let mut inventory = Map::new();
        inventory.insert("items".to_string(), Value::Array(items));
        root.insert("inventory".to_string(), Value::Object(inventory));
    }
    Ok(payload)
}

fn migrate_to_1_2(mut payload: Value) -> Result<Value, String> {
    let root = payload_object(&mut payload)?;
    match (root.get("story").cloned(), root.get("storyProgress").cloned()) {
        (None, Some(progress)) => {
            root.insert("story".to_string(), progress);
        }
        (Some(story), None) => {
            root.insert("storyProgress".to_string(), story);
        }
        _ => {}
    }
    Ok(payload)
}

/// Turn `completed*` maps of `id -> bool` into arrays of the ids that are
/// `true`, anywhere in the tree. Arrays are left alone.
pub fn normalize_completed_collections(node: &mut Value) {
    match node {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if key.starts_with("completed") {
                    if let Some(ids) = completed_ids(child) {
                        *child = Value::Array(ids);
                        continue;
                    }
                }
                normalize_completed_collections(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_completed_collections),
        _ => {}
    }
}

fn completed_ids(value: &Value) -> Option<Vec<Value>> {
    let map = value.as_object()?;
    if !map.values().all(Value::is_boolean) {
        return None;
    }
    Some(
        map.iter()
            .filter(|(_, done)| done.as_bool() == Some(true))
            .map(|(id, _)| Value::String(id.clone()))
            .collect(),
    )
}
