// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! ScoutNet participant records and the question-id mapping table.
//!
//! ScoutNet encodes registration form answers as `questions: {"<id>": answer}`.
//! Which question id means "leader" or "troop number" is set per event, so
//! the mapping is loaded from a JSON file instead of being hard-coded.

use crate::models::metadata::{MetadataField, RoleMetadata};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Response of the ScoutNet `participants` project endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParticipantsResponse {
    #[serde(default, deserialize_with = "lenient_map")]
    pub participants: HashMap<String, Participant>,
}

/// One participant record, keyed by member number in the response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Participant {
    #[serde(default)]
    pub member_no: Option<Value>,
    #[serde(default)]
    pub cancelled_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_answers")]
    pub questions: HashMap<String, Vec<String>>,
}

impl Participant {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled_date
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty())
    }

    fn answers(&self, question_id: &str) -> &[String] {
        self.questions
            .get(question_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// ScoutNet returns `[]` instead of `{}` for empty maps.
fn lenient_map<'de, D, T>(deserializer: D) -> Result<HashMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| {
                serde_json::from_value(v)
                    .map(|t| (k, t))
                    .map_err(serde::de::Error::custom)
            })
            .collect(),
        _ => Ok(HashMap::new()),
    }
}

/// Answers may be strings, numbers, or arrays of those (multi-choice).
fn lenient_answers<'de, D>(deserializer: D) -> Result<HashMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Object(map) = Value::deserialize(deserializer)? else {
        return Ok(HashMap::new());
    };

    Ok(map
        .into_iter()
        .map(|(id, answer)| {
            let values = match answer {
                Value::Array(items) => items.iter().filter_map(scalar_to_string).collect(),
                other => scalar_to_string(&other).into_iter().collect(),
            };
            (id, values)
        })
        .collect())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// One row of the mapping table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuestionRule {
    pub question_id: String,
    pub field: MetadataField,
    /// Answer id meaning "yes" for boolean fields.
    #[serde(default)]
    pub true_answer: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QuestionMapError {
    #[error("invalid question map JSON: {0}")]
    Parse(String),
    #[error("field {0:?} is derived from the participant record and cannot be mapped")]
    ReservedField(MetadataField),
    #[error("field {0:?} is mapped more than once")]
    DuplicateField(MetadataField),
    #[error("question {0} is mapped more than once")]
    DuplicateQuestion(String),
    #[error("boolean field {0:?} needs a true_answer")]
    MissingTrueAnswer(MetadataField),
    #[error("numeric field {0:?} must not have a true_answer")]
    UnexpectedTrueAnswer(MetadataField),
}

/// Validated question-id → metadata field table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionMap {
    rules: Vec<QuestionRule>,
}

impl QuestionMap {
    pub fn new(rules: Vec<QuestionRule>) -> Result<Self, QuestionMapError> {
        let mut fields = HashSet::new();
        let mut questions = HashSet::new();

        for rule in &rules {
            if rule.field == MetadataField::Participant {
                return Err(QuestionMapError::ReservedField(rule.field));
            }
            if !fields.insert(rule.field) {
                return Err(QuestionMapError::DuplicateField(rule.field));
            }
            if !questions.insert(rule.question_id.as_str()) {
                return Err(QuestionMapError::DuplicateQuestion(rule.question_id.clone()));
            }
            match (rule.field.is_boolean(), &rule.true_answer) {
                (true, None) => return Err(QuestionMapError::MissingTrueAnswer(rule.field)),
                (false, Some(_)) => {
                    return Err(QuestionMapError::UnexpectedTrueAnswer(rule.field))
                }
                _ => {}
            }
        }

        Ok(Self { rules })
    }

    pub fn from_json(json: &str) -> Result<Self, QuestionMapError> {
        let rules: Vec<QuestionRule> =
            serde_json::from_str(json).map_err(|e| QuestionMapError::Parse(e.to_string()))?;
        Self::new(rules)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, QuestionMapError> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            QuestionMapError::Parse(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn rules(&self) -> &[QuestionRule] {
        &self.rules
    }

    /// Compute metadata for a participant; `None` means "not registered".
    pub fn derive(&self, participant: Option<&Participant>) -> RoleMetadata {
        let Some(participant) = participant.filter(|p| !p.is_cancelled()) else {
            return RoleMetadata::default();
        };

        let mut metadata = RoleMetadata {
            participant: true,
            ..RoleMetadata::default()
        };

        for rule in &self.rules {
            let answers = participant.answers(&rule.question_id);
            match rule.field {
                MetadataField::Leader | MetadataField::Ist => {
                    let expected = rule.true_answer.as_deref().unwrap_or_default();
                    let yes = answers.iter().any(|a| a == expected);
                    if rule.field == MetadataField::Leader {
                        metadata.leader = yes;
                    } else {
                        metadata.ist = yes;
                    }
                }
                MetadataField::Troop => metadata.troop = first_number(answers),
                MetadataField::Patrol => metadata.patrol = first_number(answers),
                MetadataField::Participant => {}
            }
        }

        metadata
    }
}

fn first_number(answers: &[String]) -> Option<u32> {
    answers.iter().find_map(|a| a.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"[
        {"question_id": "101", "field": "leader", "true_answer": "1"},
        {"question_id": "102", "field": "ist", "true_answer": "7"},
        {"question_id": "103", "field": "troop"},
        {"question_id": "104", "field": "patrol"}
    ]"#;

    fn participant(json: &str) -> Participant {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn derive_reads_flags_and_numbers() {
        let map = QuestionMap::from_json(TABLE).unwrap();
        let p = participant(
            r#"{"member_no": 3001234, "questions": {"101": "1", "102": ["3", "7"], "103": "12", "104": 4}}"#,
        );

        let metadata = map.derive(Some(&p));
        assert_eq!(
            metadata,
            RoleMetadata {
                participant: true,
                leader: true,
                ist: true,
                troop: Some(12),
                patrol: Some(4),
            }
        );
    }

    #[test]
    fn derive_defaults_missing_answers() {
        let map = QuestionMap::from_json(TABLE).unwrap();
        let p = participant(r#"{"member_no": 1, "questions": []}"#);

        let metadata = map.derive(Some(&p));
        assert!(metadata.participant);
        assert!(!metadata.leader);
        assert!(!metadata.ist);
        assert_eq!(metadata.troop, None);
        assert_eq!(metadata.patrol, None);
    }

    #[test]
    fn derive_for_cancelled_or_absent_participant_is_default() {
        let map = QuestionMap::from_json(TABLE).unwrap();
        let cancelled = participant(
            r#"{"member_no": 1, "cancelled_date": "2026-05-01", "questions": {"101": "1"}}"#,
        );

        assert_eq!(map.derive(Some(&cancelled)), RoleMetadata::default());
        assert_eq!(map.derive(None), RoleMetadata::default());
    }

    #[test]
    fn unparsable_number_is_null() {
        let map = QuestionMap::from_json(TABLE).unwrap();
        let p = participant(r#"{"questions": {"103": "twelve"}}"#);
        assert_eq!(map.derive(Some(&p)).troop, None);
    }

    #[test]
    fn validation_rejects_bad_tables() {
        assert_eq!(
            QuestionMap::from_json(r#"[{"question_id": "1", "field": "leader"}]"#),
            Err(QuestionMapError::MissingTrueAnswer(MetadataField::Leader))
        );
        assert_eq!(
            QuestionMap::from_json(
                r#"[{"question_id": "1", "field": "troop", "true_answer": "2"}]"#
            ),
            Err(QuestionMapError::UnexpectedTrueAnswer(MetadataField::Troop))
        );
        assert_eq!(
            QuestionMap::from_json(
                r#"[{"question_id": "1", "field": "troop"}, {"question_id": "2", "field": "troop"}]"#
            ),
            Err(QuestionMapError::DuplicateField(MetadataField::Troop))
        );
        assert_eq!(
            QuestionMap::from_json(
                r#"[{"question_id": "1", "field": "troop"}, {"question_id": "1", "field": "patrol"}]"#
            ),
            Err(QuestionMapError::DuplicateQuestion("1".to_string()))
        );
        assert_eq!(
            QuestionMap::from_json(
                r#"[{"question_id": "1", "field": "participant", "true_answer": "1"}]"#
            ),
            Err(QuestionMapError::ReservedField(MetadataField::Participant))
        );
        assert!(matches!(
            QuestionMap::from_json("{"),
            Err(QuestionMapError::Parse(_))
        ));
    }

    #[test]
    fn empty_participants_array_parses() {
        let response: ParticipantsResponse = serde_json::from_str(r#"{"participants": []}"#).unwrap();
        assert!(response.participants.is_empty());
    }
}
