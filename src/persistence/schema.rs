//! Save schema versions and milestone templates
//!
//! Every schema milestone has a full default payload. Migrations deep-merge a
//! record against the template of the milestone they upgrade to, so new
//! sub-trees appear with their defaults while existing player data is kept.
//!
//! Milestones:
//! - 1.0.0: profile, stats, equipped, inventory, settings, storyProgress
//! - 1.1.0: durability, unlocks
//! - 1.2.0: `story` alias of storyProgress, marketplace

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Value, json};
use thiserror::Error;

/// Ordered `(major, minor, patch)` schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SchemaVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

pub const V1_0_0: SchemaVersion = SchemaVersion::new(1, 0, 0);
pub const V1_1_0: SchemaVersion = SchemaVersion::new(1, 1, 0);
pub const V1_2_0: SchemaVersion = SchemaVersion::new(1, 2, 0);

/// Version written by this build
pub const CURRENT_VERSION: SchemaVersion = V1_2_0;

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid schema version '{0}'")]
pub struct VersionParseError(pub String);

impl FromStr for SchemaVersion {
    type Err = VersionParseError;

    /// Accepts `1.2.3`, `v1.2.3`, and short forms like `1` or `1.1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || VersionParseError(s.to_string());
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(err());
        }

        let mut parts = [0u32; 3];
        let mut count = 0;
        for piece in trimmed.split('.') {
            if count == 3 {
                return Err(err());
            }
            parts[count] = piece.parse().map_err(|_| err())?;
            count += 1;
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl Serialize for SchemaVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SchemaVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Payload template for the 1.0.0 milestone.
fn template_v1_0() -> Value {
    json!({
        "profile": {
            "name": "Adventurer",
            "level": 1,
            "experience": 0,
            "gold": 100,
            "gems": 0
        },
        "stats": {
            "battlesWon": 0,
            "battlesLost": 0,
            "enemiesDefeated": 0,
            "damageDealt": 0,
            "playTimeSeconds": 0
        },
        "equipped": {
            "weapon": null,
            "armor": null,
            "accessory": null
        },
        "inventory": {
            "items": [],
            "capacity": 30
        },
        "settings": {
            "musicVolume": 0.7,
            "sfxVolume": 1.0,
            "autoSave": true,
            "difficulty": "normal"
        },
        "storyProgress": {
            "currentChapter": 1,
            "completedMissions": [],
            "flags": {}
        }
    })
}

fn template_v1_1() -> Value {
    let mut payload = template_v1_0();
    if let Value::Object(map) = &mut payload {
        map.insert("durability".to_string(), json!({}));
        map.insert(
            "unlocks".to_string(),
            json!({
                "achievements": [],
                "equipment": [],
                "areas": ["village"]
            }),
        );
    }
    payload
}

fn template_v1_2() -> Value {
    let mut payload = template_v1_1();
    if let Value::Object(map) = &mut payload {
        let story = map.get("storyProgress").cloned().unwrap_or_else(|| json!({}));
        map.insert("story".to_string(), story);
        map.insert(
            "marketplace".to_string(),
            json!({
                "purchaseHistory": [],
                "lastRefresh": null
            }),
        );
    }
    payload
}

/// Default payload for a milestone. Versions between milestones get the
/// template of the newest milestone not above them.
pub fn template_for(version: SchemaVersion) -> Value {
    if version >= V1_2_0 {
        template_v1_2()
    } else if version >= V1_1_0 {
        template_v1_1()
    } else {
        template_v1_0()
    }
}

/// Canonical default payload at the current version.
pub fn default_payload() -> Value {
    template_for(CURRENT_VERSION)
}
