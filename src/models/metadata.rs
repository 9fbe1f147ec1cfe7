// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Discord role connection metadata derived from ScoutNet data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Discord metadata type: integer equals.
const INTEGER_EQUAL: u8 = 3;
/// Discord metadata type: boolean equals.
const BOOLEAN_EQUAL: u8 = 7;

/// A single attribute in the published metadata schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    /// Registered, non-cancelled ScoutNet participant.
    Participant,
    Leader,
    /// International Service Team.
    Ist,
    Troop,
    Patrol,
}

impl MetadataField {
    pub const ALL: [MetadataField; 5] = [
        MetadataField::Participant,
        MetadataField::Leader,
        MetadataField::Ist,
        MetadataField::Troop,
        MetadataField::Patrol,
    ];

    /// Key used in the Discord metadata object.
    pub fn key(self) -> &'static str {
        match self {
            MetadataField::Participant => "participant",
            MetadataField::Leader => "leader",
            MetadataField::Ist => "ist",
            MetadataField::Troop => "troop",
            MetadataField::Patrol => "patrol",
        }
    }

    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            MetadataField::Participant | MetadataField::Leader | MetadataField::Ist
        )
    }

    fn discord_type(self) -> u8 {
        if self.is_boolean() {
            BOOLEAN_EQUAL
        } else {
            INTEGER_EQUAL
        }
    }

    fn display(self) -> (&'static str, &'static str) {
        match self {
            MetadataField::Participant => ("Participant", "Registered event participant"),
            MetadataField::Leader => ("Leader", "Registered as a leader"),
            MetadataField::Ist => ("IST", "Member of the International Service Team"),
            MetadataField::Troop => ("Troop", "Troop number"),
            MetadataField::Patrol => ("Patrol", "Patrol number"),
        }
    }
}

/// Schema record for `PUT /applications/{id}/role-connections/metadata`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetadataSchemaRecord {
    #[serde(rename = "type")]
    pub kind: u8,
    pub key: String,
    pub name: String,
    pub description: String,
}

/// The full schema registered with Discord, one record per field.
pub fn metadata_schema() -> Vec<MetadataSchemaRecord> {
    MetadataField::ALL
        .iter()
        .map(|field| {
            let (name, description) = field.display();
            MetadataSchemaRecord {
                kind: field.discord_type(),
                key: field.key().to_string(),
                name: name.to_string(),
                description: description.to_string(),
            }
        })
        .collect()
}

/// Attribute values published for one linked user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleMetadata {
    pub participant: bool,
    pub leader: bool,
    pub ist: bool,
    pub troop: Option<u32>,
    pub patrol: Option<u32>,
}

impl RoleMetadata {
    /// Whether a boolean field is set. Numeric fields count as set when present.
    pub fn is_set(&self, field: MetadataField) -> bool {
        match field {
            MetadataField::Participant => self.participant,
            MetadataField::Leader => self.leader,
            MetadataField::Ist => self.ist,
            MetadataField::Troop => self.troop.is_some(),
            MetadataField::Patrol => self.patrol.is_some(),
        }
    }

    /// Discord wire form: booleans as `1`/`0`, missing numbers omitted.
    pub fn to_discord_metadata(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for (field, flag) in [
            (MetadataField::Participant, self.participant),
            (MetadataField::Leader, self.leader),
            (MetadataField::Ist, self.ist),
        ] {
            map.insert(field.key().to_string(), Value::from(u8::from(flag)));
        }
        if let Some(troop) = self.troop {
            map.insert(MetadataField::Troop.key().to_string(), Value::from(troop));
        }
        if let Some(patrol) = self.patrol {
            map.insert(MetadataField::Patrol.key().to_string(), Value::from(patrol));
        }
        map
    }
}

/// What gets pushed to Discord on a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataSnapshot {
    Derived {
        metadata: RoleMetadata,
        username: String,
    },
    /// Upstream data was unavailable; publish an empty object.
    Cleared,
}

impl MetadataSnapshot {
    pub fn metadata_object(&self) -> Map<String, Value> {
        match self {
            MetadataSnapshot::Derived { metadata, .. } => metadata.to_discord_metadata(),
            MetadataSnapshot::Cleared => Map::new(),
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            MetadataSnapshot::Derived { username, .. } => Some(username),
            MetadataSnapshot::Cleared => None,
        }
    }
}
