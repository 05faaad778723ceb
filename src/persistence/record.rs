//! Save record envelope
//!
//! A record wraps the opaque game payload with its schema version, timestamps
//! and slot metadata. The payload is a `serde_json::Value` tree; the store
//! only insists that `profile` and `stats` exist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::schema::{CURRENT_VERSION, SchemaVersion, VersionParseError, default_payload};

/// Payload sub-trees every record must carry.
pub const REQUIRED_SUBTREES: [&str; 2] = ["profile", "stats"];

/// Envelope keys that never belong to the payload when lifting legacy saves.
const ENVELOPE_KEYS: [&str; 5] = [
    "schemaVersion",
    "version",
    "createdAt",
    "lastSavedAt",
    "slotMetadata",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SlotMetadata {
    pub slot: u32,
    pub compressed: bool,
    pub backup_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Kept as text so stale or malformed versions survive decoding and reach
    /// the migrator.
    pub schema_version: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_saved_at: DateTime<Utc>,
    #[serde(default)]
    pub slot_metadata: SlotMetadata,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("record has no schema version")]
    MissingVersion,
    #[error("record has no payload object")]
    MissingPayload,
    #[error("payload is missing the '{0}' sub-tree")]
    MissingSubtree(&'static str),
    #[error("record envelope is malformed: {0}")]
    Malformed(String),
}

impl Record {
    /// Fresh record built from the current default template.
    pub fn new_default(slot: u32, now: DateTime<Utc>) -> Self {
        Self {
            schema_version: CURRENT_VERSION.to_string(),
            created_at: now,
            last_saved_at: now,
            slot_metadata: SlotMetadata {
                slot,
                ..Default::default()
            },
            payload: default_payload(),
        }
    }

    /// Parsed `schema_version`.
    pub fn version(&self) -> Result<SchemaVersion, VersionParseError> {
        self.schema_version.parse()
    }

    /// Lift, validate and convert a parsed JSON document into a record.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        let value = lift_legacy_layout(value);
        validate_structure(&value)?;
        serde_json::from_value(value).map_err(|e| ValidationError::Malformed(e.to_string()))
    }
}

/// Accept RFC 3339 strings or epoch milliseconds; anything else becomes the
/// epoch instead of failing the whole record.
fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    let parsed = match &raw {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    };
    if parsed.is_none() {
        log::debug!("Unparseable record timestamp {raw}, using epoch");
    }
    Ok(parsed.unwrap_or_default())
}

/// Rewrite the pre-envelope layout (`{version, profile, stats, ...}` at the
/// top level) into `{schemaVersion, ..., payload}`. Documents that already
/// have a payload are returned untouched.
pub fn lift_legacy_layout(value: Value) -> Value {
    let Value::Object(mut top) = value else {
        return value;
    };
    if top.contains_key("payload") || !top.contains_key("profile") {
        return Value::Object(top);
    }

    log::info!("Lifting legacy flat save layout into envelope");
    let version = top
        .remove("schemaVersion")
        .or_else(|| top.remove("version"))
        .and_then(|v| match v {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

    let mut envelope = Map::new();
    if let Some(version) = version {
        envelope.insert("schemaVersion".to_string(), Value::String(version));
    }
    for key in ENVELOPE_KEYS {
        if let Some(v) = top.remove(key) {
            envelope.insert(key.to_string(), v);
        }
    }
    envelope.insert("payload".to_string(), Value::Object(top));
    Value::Object(envelope)
}

/// Structural presence checks only; leaf types are not inspected.
pub fn validate_structure(value: &Value) -> Result<(), ValidationError> {
    let top = value.as_object().ok_or(ValidationError::NotAnObject)?;
    match top.get("schemaVersion") {
        Some(Value::String(s)) if !s.trim().is_empty() => {}
        _ => return Err(ValidationError::MissingVersion),
    }
    let payload = top
        .get("payload")
        .and_then(Value::as_object)
        .ok_or(ValidationError::MissingPayload)?;
    for key in REQUIRED_SUBTREES {
        if !payload.get(key).is_some_and(Value::is_object) {
            return Err(ValidationError::MissingSubtree(key));
        }
    }
    Ok(())
}

/// Display fields pulled from a record, best effort.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSummary {
    pub player_name: String,
    pub level: Option<u64>,
    pub gold: Option<i64>,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub schema_version: Option<String>,
}

pub const UNKNOWN_PLAYER: &str = "Unknown";

impl RecordSummary {
    /// Summary with every field unknown.
    pub fn unknown() -> Self {
        Self {
            player_name: UNKNOWN_PLAYER.to_string(),
            level: None,
            gold: None,
            last_saved_at: None,
            schema_version: None,
        }
    }

    fn from_payload(payload: &Value) -> Self {
        let profile = payload.get("profile");
        let field = |name: &str| profile.and_then(|p| p.get(name));
        Self {
            player_name: field("name")
                .and_then(Value::as_str)
                .unwrap_or(UNKNOWN_PLAYER)
                .to_string(),
            level: field("level").and_then(Value::as_u64),
            gold: field("gold").and_then(Value::as_i64),
            last_saved_at: None,
            schema_version: None,
        }
    }

    /// Summarise any parsed document, envelope or legacy layout. Never fails.
    pub fn from_document(doc: &Value) -> Self {
        let doc = lift_legacy_layout(doc.clone());
        let mut summary = match doc.get("payload") {
            Some(payload) => Self::from_payload(payload),
            None => Self::unknown(),
        };
        summary.schema_version = doc
            .get("schemaVersion")
            .and_then(Value::as_str)
            .map(str::to_string);
        summary.last_saved_at = doc
            .get("lastSavedAt")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        summary
    }
}
