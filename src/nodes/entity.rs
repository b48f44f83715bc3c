//! EntityNode: a real-world entity extracted from episodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Salience bounds: importance scores live in `1..=10`.
pub const MIN_SALIENCE: u8 = 1;
pub const MAX_SALIENCE: u8 = 10;

/// Default salience for an extracted entity, by label.
///
/// Failures and reflections are hard-won knowledge and surface first during
/// progressive disclosure; routine facts sit in the middle.
pub fn default_salience(label: &str) -> u8 {
    match label {
        "Decision" => 8,
        "Failure" => 9,
        "Reflection" => 9,
        _ => 5, // Fact and generic Entity
    }
}

/// Clamp a salience score into the valid `1..=10` range.
pub fn clamp_salience(value: u8) -> u8 {
    value.clamp(MIN_SALIENCE, MAX_SALIENCE)
}

/// A real-world entity (person, decision, failure, concept) extracted from
/// episodes.
///
/// Identity within a scope is `(name, label)` up to fuzzy resolution: the
/// dedup engine merges exact duplicates and embedding-similar candidates into
/// one record, so a node accumulates attributes and episode references over
/// its lifetime while keeping a stable uuid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityNode {
    pub uuid: Uuid,
    pub name: String,
    /// Open-ended, extraction-assigned type (e.g. "Person", "Decision",
    /// "Failure", "Reflection", or the generic "Entity").
    pub label: String,
    /// Scope partition key; the hard visibility boundary.
    pub scope: String,
    /// Schema-free attribute map; merged on dedup, validated on read.
    pub attributes: Map<String, Value>,
    /// Importance score in `1..=10`, a ranking/filtering signal only.
    pub salience: u8,
    pub name_embedding: Option<Vec<f32>>,
    /// Episodes that produced or reinforced this entity (non-owning).
    pub episode_refs: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl EntityNode {
    /// Record that `episode` produced or reinforced this entity.
    /// Idempotent: a repeated uuid is not appended twice.
    pub fn add_episode_ref(&mut self, episode: Uuid) {
        if !self.episode_refs.contains(&episode) {
            self.episode_refs.push(episode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(name: &str, label: &str) -> EntityNode {
        EntityNode {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            label: label.to_string(),
            scope: "u1".to_string(),
            attributes: Map::new(),
            salience: default_salience(label),
            name_embedding: None,
            episode_refs: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn default_salience_by_label() {
        assert_eq!(default_salience("Fact"), 5);
        assert_eq!(default_salience("Decision"), 8);
        assert_eq!(default_salience("Failure"), 9);
        assert_eq!(default_salience("Reflection"), 9);
        assert_eq!(default_salience("Entity"), 5);
        assert_eq!(default_salience("Person"), 5);
    }

    #[test]
    fn clamp_salience_bounds() {
        assert_eq!(clamp_salience(0), 1);
        assert_eq!(clamp_salience(5), 5);
        assert_eq!(clamp_salience(10), 10);
        assert_eq!(clamp_salience(200), 10);
    }

    #[test]
    fn episode_refs_are_deduplicated() {
        let mut n = node("Alice", "Person");
        let ep = Uuid::new_v4();
        n.add_episode_ref(ep);
        n.add_episode_ref(ep);
        assert_eq!(n.episode_refs.len(), 1);

        n.add_episode_ref(Uuid::new_v4());
        assert_eq!(n.episode_refs.len(), 2);
    }

    #[test]
    fn serde_roundtrip() {
        let mut n = node("Acme Corp", "Organization");
        n.attributes
            .insert("industry".to_string(), json!("technology"));
        n.name_embedding = Some(vec![0.5_f32, 0.5]);

        let serialized = serde_json::to_string(&n).expect("serialization failed");
        let deserialized: EntityNode =
            serde_json::from_str(&serialized).expect("deserialization failed");

        assert_eq!(deserialized.uuid, n.uuid);
        assert_eq!(deserialized.name, n.name);
        assert_eq!(deserialized.label, n.label);
        assert_eq!(deserialized.scope, n.scope);
        assert_eq!(deserialized.attributes, n.attributes);
        assert_eq!(deserialized.name_embedding, n.name_embedding);
    }

    #[test]
    fn deserializes_from_raw_json() {
        let raw = json!({
            "uuid": "00000000-0000-0000-0000-000000000001",
            "name": "Eve",
            "label": "Person",
            "scope": "u1",
            "attributes": {},
            "salience": 5,
            "name_embedding": null,
            "episode_refs": [],
            "created_at": "2024-01-01T00:00:00Z"
        });

        let n: EntityNode = serde_json::from_value(raw).expect("deserialization failed");
        assert_eq!(n.name, "Eve");
        assert!(n.name_embedding.is_none());
    }
}
