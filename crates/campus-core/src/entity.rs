//! Resolved campus entities and the in-memory store that owns them.

use crate::noise::NoiseSource;
use crate::projection::{project, ViewFilterState};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Lowest synthetic match confidence.
pub const MIN_CONFIDENCE: u8 = 75;

/// Highest synthetic match confidence.
pub const MAX_CONFIDENCE: u8 = 95;

/// Probability that a seeded entity starts active.
pub const ACTIVE_PROBABILITY: f64 = 0.7;

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Population an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Student,
    Staff,
    Visitor,
}

impl EntityType {
    /// Every type, in display order.
    pub const ALL: [Self; 3] = [Self::Student, Self::Staff, Self::Visitor];

    /// Lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Staff => "staff",
            Self::Visitor => "visitor",
        }
    }

    /// Type assigned to the seed record at zero-based `index`.
    #[must_use]
    pub const fn for_index(index: usize) -> Self {
        if index % 3 == 0 {
            Self::Visitor
        } else if index % 2 == 0 {
            Self::Staff
        } else {
            Self::Student
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One resolved identity across campus systems.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    /// Stable unique id (1-based)
    pub id: u32,
    /// Population
    #[serde(rename = "type")]
    pub kind: EntityType,
    /// Student number; always `None` for visitors
    pub student_id: Option<String>,
    /// Campus email
    pub email: String,
    /// Access card number
    pub card_id: String,
    /// Hashed device fingerprint
    pub device_hash: String,
    /// Match confidence percentage
    pub confidence: u8,
    /// Whether the identity is active
    pub active: bool,
}

impl EntityRecord {
    /// Copy of this record with a new `active` flag.
    #[must_use]
    pub fn with_active(&self, active: bool) -> Self {
        Self {
            active,
            ..self.clone()
        }
    }
}

fn device_hash(noise: &mut dyn NoiseSource) -> String {
    let mut hash = String::with_capacity(11);
    hash.push_str("DEV");
    for _ in 0..8 {
        let idx = (noise.next_unit() * 36.0) as usize;
        hash.push(char::from(BASE36[idx.min(35)]));
    }
    hash
}

/// Build `n` synthetic records with ids `1..=n`.
///
/// Types follow the zero-based index (`i % 3 == 0` visitor, else even
/// staff, else student). Confidence is uniform in `[75, 95]` and each
/// record is active with probability 0.7.
pub fn initialize(n: usize, noise: &mut dyn NoiseSource) -> Vec<EntityRecord> {
    (0..n)
        .map(|i| {
            let id = (i + 1) as u32;
            let kind = EntityType::for_index(i);
            let student_id = match kind {
                EntityType::Visitor => None,
                EntityType::Student | EntityType::Staff => Some(format!("STU{i:04}")),
            };
            let device_hash = device_hash(noise);
            let span = f64::from(MAX_CONFIDENCE - MIN_CONFIDENCE);
            let confidence = noise
                .range(f64::from(MIN_CONFIDENCE), f64::from(MIN_CONFIDENCE) + span)
                .round() as u8;
            let active = noise.next_unit() > 1.0 - ACTIVE_PROBABILITY;
            EntityRecord {
                id,
                kind,
                student_id,
                email: format!("user{id}@campus.edu"),
                card_id: format!("CARD{id:06}"),
                device_hash,
                confidence: confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE),
                active,
            }
        })
        .collect()
}

/// Return a new collection where the record with `id` has `active = value`.
///
/// Every other record is an unchanged copy. An unknown id yields an
/// identical collection.
#[must_use]
pub fn set_active(records: &[EntityRecord], id: u32, value: bool) -> Vec<EntityRecord> {
    records
        .iter()
        .map(|r| if r.id == id { r.with_active(value) } else { r.clone() })
        .collect()
}

/// Owner of the entity collection.
///
/// `version` increases on every committed change so derived views can be
/// cached on `(filter, version)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStore {
    records: Vec<EntityRecord>,
    version: u64,
}

impl EntityStore {
    /// Seed a store with `n` synthetic records.
    pub fn initialize(n: usize, noise: &mut dyn NoiseSource) -> Self {
        Self::from_records(initialize(n, noise))
    }

    /// Wrap an existing collection.
    #[must_use]
    pub const fn from_records(records: Vec<EntityRecord>) -> Self {
        Self {
            records,
            version: 0,
        }
    }

    /// All records in insertion order.
    #[must_use]
    pub fn records(&self) -> &[EntityRecord] {
        &self.records
    }

    /// Look up a record.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<&EntityRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Change counter.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Set one record's `active` flag. Unknown ids are ignored.
    ///
    /// Returns `true` if a record was found.
    pub fn set_active(&mut self, id: u32, value: bool) -> bool {
        let Some(record) = self.records.iter_mut().find(|r| r.id == id) else {
            debug!(id, "set_active on unknown entity ignored");
            return false;
        };
        if record.active != value {
            record.active = value;
            self.version += 1;
        }
        true
    }

    /// Flip one record's `active` flag, returning the new value.
    pub fn toggle(&mut self, id: u32) -> Option<bool> {
        let next = !self.get(id)?.active;
        self.set_active(id, next);
        Some(next)
    }

    /// Filtered and sorted copy of the collection.
    #[must_use]
    pub fn project(&self, filter: &ViewFilterState) -> Vec<EntityRecord> {
        project(&self.records, filter)
    }

    /// Count of active records.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.records.iter().filter(|r| r.active).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::{SeededNoise, SequenceNoise};
    use std::collections::HashSet;

    fn seeded(n: usize) -> Vec<EntityRecord> {
        initialize(n, &mut SeededNoise::new(42))
    }

    #[test]
    fn test_type_assignment() {
        let kinds: Vec<EntityType> = seeded(7).iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EntityType::Visitor,
                EntityType::Student,
                EntityType::Staff,
                EntityType::Visitor,
                EntityType::Staff,
                EntityType::Student,
                EntityType::Visitor,
            ]
        );
    }

    #[test]
    fn test_visitors_have_no_student_id() {
        for r in seeded(32) {
            match r.kind {
                EntityType::Visitor => assert!(r.student_id.is_none()),
                _ => assert!(r.student_id.is_some()),
            }
        }
    }

    #[test]
    fn test_synthetic_identifiers() {
        let records = seeded(16);
        let r = &records[1];
        assert_eq!(r.id, 2);
        assert_eq!(r.student_id.as_deref(), Some("STU0001"));
        assert_eq!(r.email, "user2@campus.edu");
        assert_eq!(r.card_id, "CARD000002");
        assert_eq!(r.device_hash.len(), 11);
        assert!(r.device_hash.starts_with("DEV"));
        assert!(r.device_hash[3..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_ids_unique_and_sequential() {
        let records = seeded(50);
        let ids: HashSet<u32> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 50);
        assert_eq!(records.first().map(|r| r.id), Some(1));
        assert_eq!(records.last().map(|r| r.id), Some(50));
    }

    #[test]
    fn test_confidence_range() {
        for r in seeded(500) {
            assert!((MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&r.confidence));
        }
    }

    #[test]
    fn test_active_threshold() {
        // 8 hash draws, confidence draw, then active draw
        let mut below = SequenceNoise::new(vec![0.0; 9].into_iter().chain([0.3]).collect());
        assert!(!initialize(1, &mut below)[0].active);
        let mut above = SequenceNoise::new(vec![0.0; 9].into_iter().chain([0.31]).collect());
        assert!(initialize(1, &mut above)[0].active);
    }

    #[test]
    fn test_active_ratio_roughly_seventy_percent() {
        let records = seeded(2000);
        let active = records.iter().filter(|r| r.active).count() as f64 / 2000.0;
        assert!((0.6..0.8).contains(&active), "ratio {active}");
    }

    #[test]
    fn test_set_active_pure() {
        let records = seeded(8);
        let original = records.clone();
        let target = records[4].active;
        let updated = set_active(&records, 5, !target);
        assert_eq!(records, original);
        assert_eq!(updated[4].active, !target);
        for (a, b) in records.iter().zip(&updated).filter(|(a, _)| a.id != 5) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_set_active_unknown_id_noop() {
        let records = seeded(4);
        assert_eq!(set_active(&records, 99, true), records);
    }

    #[test]
    fn test_store_version_bumps_on_change_only() {
        let mut store = EntityStore::from_records(seeded(4));
        let current = store.get(1).map(|r| r.active).unwrap_or_default();
        assert!(store.set_active(1, current));
        assert_eq!(store.version(), 0);
        assert!(store.set_active(1, !current));
        assert_eq!(store.version(), 1);
        assert!(!store.set_active(42, true));
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn test_store_toggle() {
        let mut store = EntityStore::from_records(seeded(3));
        let before = store.get(2).map(|r| r.active);
        let after = store.toggle(2);
        assert_eq!(after, before.map(|b| !b));
        assert_eq!(store.toggle(77), None);
    }

    #[test]
    fn test_record_json_shape() {
        let r = &seeded(1)[0];
        let json = serde_json::to_value(r).unwrap_or_default();
        assert_eq!(json["type"], "visitor");
        assert!(json["studentId"].is_null());
        assert!(json.get("cardId").is_some());
    }
}
