//! Filter and sort projection over entity records.
//!
//! A projection is a pure function of the source collection and a
//! [`ViewFilterState`]: the source is never mutated and the result is a new
//! owned vector. Filter values coming from user input fail open, so an
//! unrecognized status or type means "all" and an unrecognized sort key
//! means "id".

use crate::entity::{EntityRecord, EntityStore, EntityType};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;
use tracing::warn;

/// Which records to keep by `active` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Inactive,
}

impl StatusFilter {
    /// Whether a record passes this filter.
    #[must_use]
    pub const fn matches(self, record: &EntityRecord) -> bool {
        match self {
            Self::All => true,
            Self::Active => record.active,
            Self::Inactive => !record.active,
        }
    }
}

/// Which records to keep by entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum TypeFilter {
    #[default]
    All,
    Student,
    Staff,
    Visitor,
}

impl TypeFilter {
    /// Whether a record passes this filter.
    #[must_use]
    pub fn matches(self, record: &EntityRecord) -> bool {
        match self {
            Self::All => true,
            Self::Student => record.kind == EntityType::Student,
            Self::Staff => record.kind == EntityType::Staff,
            Self::Visitor => record.kind == EntityType::Visitor,
        }
    }
}

/// Output ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum SortKey {
    /// Ascending id
    #[default]
    Id,
    /// Descending confidence
    Confidence,
}

fn normalized(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}

fn fail_open(field: &'static str, raw: &str) {
    if !raw.trim().is_empty() {
        warn!(field, value = raw, "unrecognized filter value, using default");
    }
}

impl FromStr for StatusFilter {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match normalized(s).as_str() {
            "active" => Self::Active,
            "inactive" => Self::Inactive,
            "all" => Self::All,
            _ => {
                fail_open("status", s);
                Self::All
            }
        })
    }
}

impl FromStr for TypeFilter {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match normalized(s).as_str() {
            "student" => Self::Student,
            "staff" => Self::Staff,
            "visitor" => Self::Visitor,
            "all" => Self::All,
            _ => {
                fail_open("type", s);
                Self::All
            }
        })
    }
}

impl FromStr for SortKey {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match normalized(s).as_str() {
            "confidence" => Self::Confidence,
            "id" => Self::Id,
            _ => {
                fail_open("sort", s);
                Self::Id
            }
        })
    }
}

macro_rules! lenient_from_string {
    ($($ty:ty),*) => {
        $(
            impl From<&str> for $ty {
                fn from(s: &str) -> Self {
                    match s.parse::<$ty>() {
                        Ok(v) => v,
                        Err(never) => match never {},
                    }
                }
            }

            impl From<String> for $ty {
                fn from(s: String) -> Self {
                    Self::from(s.as_str())
                }
            }
        )*
    };
}

lenient_from_string!(StatusFilter, TypeFilter, SortKey);

/// Filter and sort selection owned by the entities view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ViewFilterState {
    /// Active/inactive filter
    #[serde(default)]
    pub status: StatusFilter,
    /// Entity type filter
    #[serde(default, rename = "type")]
    pub kind: TypeFilter,
    /// Sort key
    #[serde(default)]
    pub sort: SortKey,
}

impl ViewFilterState {
    /// Create a filter state.
    #[must_use]
    pub const fn new(status: StatusFilter, kind: TypeFilter, sort: SortKey) -> Self {
        Self { status, kind, sort }
    }

    /// Build from raw user strings, failing open on anything unrecognized.
    #[must_use]
    pub fn from_strs(status: &str, kind: &str, sort: &str) -> Self {
        Self::new(status.into(), kind.into(), sort.into())
    }
}

/// Project `records` through `filter`.
///
/// Applies the status filter, then the type filter, then sorts: by id
/// ascending or by confidence descending. The confidence sort is stable,
/// so ties keep source order.
#[must_use]
pub fn project(records: &[EntityRecord], filter: &ViewFilterState) -> Vec<EntityRecord> {
    let mut rows: Vec<EntityRecord> = records
        .iter()
        .filter(|r| filter.status.matches(r))
        .filter(|r| filter.kind.matches(r))
        .cloned()
        .collect();

    match filter.sort {
        SortKey::Id => rows.sort_by_key(|r| r.id),
        SortKey::Confidence => rows.sort_by(|a, b| b.confidence.cmp(&a.confidence)),
    }
    rows
}

/// Hit/miss counters for [`ProjectionCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionStats {
    pub hits: u64,
    pub misses: u64,
}

impl ProjectionStats {
    /// Fraction of lookups served from cache.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Single-entry memo of the last projection, keyed on `(filter, version)`.
///
/// Only a performance aid; results equal [`project`] at all times.
#[derive(Debug, Clone, Default)]
pub struct ProjectionCache {
    key: Option<(ViewFilterState, u64)>,
    rows: Vec<EntityRecord>,
    stats: ProjectionStats,
}

impl ProjectionCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Projection of `store` through `filter`, recomputed only when either
    /// changed since the last call.
    pub fn get_or_project(&mut self, store: &EntityStore, filter: &ViewFilterState) -> &[EntityRecord] {
        let key = (*filter, store.version());
        if self.key == Some(key) {
            self.stats.hits += 1;
        } else {
            self.rows = store.project(filter);
            self.key = Some(key);
            self.stats.misses += 1;
        }
        &self.rows
    }

    /// Drop the cached rows.
    pub fn invalidate(&mut self) {
        self.key = None;
        self.rows.clear();
    }

    /// Cache statistics.
    #[must_use]
    pub const fn stats(&self) -> ProjectionStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{initialize, set_active};
    use crate::noise::SeededNoise;
    use proptest::prelude::*;

    fn records(n: usize, seed: u64) -> Vec<EntityRecord> {
        initialize(n, &mut SeededNoise::new(seed))
    }

    #[test]
    fn test_default_filter_is_all_by_id() {
        let f = ViewFilterState::default();
        assert_eq!(f.status, StatusFilter::All);
        assert_eq!(f.kind, TypeFilter::All);
        assert_eq!(f.sort, SortKey::Id);
    }

    #[test]
    fn test_parse_fail_open() {
        let f = ViewFilterState::from_strs("bogus", "alien", "name");
        assert_eq!(f, ViewFilterState::default());
        let f = ViewFilterState::from_strs(" Active ", "STAFF", "Confidence");
        assert_eq!(
            f,
            ViewFilterState::new(StatusFilter::Active, TypeFilter::Staff, SortKey::Confidence)
        );
    }

    #[test]
    fn test_deserialize_fail_open() {
        let f: ViewFilterState =
            serde_json::from_str(r#"{"status":"weird","type":"visitor","sort":"?"}"#)
                .unwrap_or_default();
        assert_eq!(f.status, StatusFilter::All);
        assert_eq!(f.kind, TypeFilter::Visitor);
        assert_eq!(f.sort, SortKey::Id);
    }

    #[test]
    fn test_serialize_lowercase() {
        let f = ViewFilterState::new(StatusFilter::Inactive, TypeFilter::Student, SortKey::Confidence);
        let json = serde_json::to_string(&f).unwrap_or_default();
        assert_eq!(json, r#"{"status":"inactive","type":"student","sort":"confidence"}"#);
    }

    #[test]
    fn test_active_only_ascending() {
        let src = records(16, 1);
        let filter = ViewFilterState::new(StatusFilter::Active, TypeFilter::All, SortKey::Id);
        let out = project(&src, &filter);
        assert!(out.iter().all(|r| r.active));
        assert_eq!(out.len(), src.iter().filter(|r| r.active).count());
        assert!(out.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn test_set_active_then_inactive_view_includes_record() {
        let src = set_active(&records(16, 2), 5, false);
        let filter = ViewFilterState::from_strs("inactive", "all", "id");
        let out = project(&src, &filter);
        assert!(out.iter().any(|r| r.id == 5));
    }

    #[test]
    fn test_type_filter() {
        let src = records(30, 3);
        let filter = ViewFilterState::new(StatusFilter::All, TypeFilter::Visitor, SortKey::Id);
        let out = project(&src, &filter);
        assert_eq!(out.len(), 10);
        assert!(out.iter().all(|r| r.kind == EntityType::Visitor));
    }

    #[test]
    fn test_confidence_descending() {
        let src = records(40, 4);
        let filter = ViewFilterState::new(StatusFilter::All, TypeFilter::All, SortKey::Confidence);
        let out = project(&src, &filter);
        assert_eq!(out.len(), 40);
        assert!(out.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn test_id_sort_restores_order_from_shuffled() {
        let mut src = records(10, 5);
        src.reverse();
        let out = project(&src, &ViewFilterState::default());
        let ids: Vec<u32> = out.iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=10).collect::<Vec<u32>>());
    }

    #[test]
    fn test_empty_collection() {
        assert!(project(&[], &ViewFilterState::default()).is_empty());
    }

    #[test]
    fn test_cache_hits_until_version_changes() {
        let mut store = EntityStore::from_records(records(12, 6));
        let mut cache = ProjectionCache::new();
        let filter = ViewFilterState::from_strs("active", "all", "id");

        let first = cache.get_or_project(&store, &filter).to_vec();
        let second = cache.get_or_project(&store, &filter).to_vec();
        assert_eq!(first, second);
        assert_eq!(cache.stats(), ProjectionStats { hits: 1, misses: 1 });

        let id = store.records()[0].id;
        store.toggle(id);
        let third = cache.get_or_project(&store, &filter).to_vec();
        assert_eq!(third, store.project(&filter));
        assert_eq!(cache.stats().misses, 2);
        assert!((cache.stats().hit_rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_cache_invalidate() {
        let store = EntityStore::from_records(records(4, 7));
        let mut cache = ProjectionCache::new();
        let filter = ViewFilterState::default();
        cache.get_or_project(&store, &filter);
        cache.invalidate();
        cache.get_or_project(&store, &filter);
        assert_eq!(cache.stats().misses, 2);
    }

    fn filter_strategy() -> impl Strategy<Value = ViewFilterState> {
        (
            prop_oneof![Just("all"), Just("active"), Just("inactive"), Just("junk")],
            prop_oneof![Just("all"), Just("student"), Just("staff"), Just("visitor"), Just("")],
            prop_oneof![Just("id"), Just("confidence"), Just("nope")],
        )
            .prop_map(|(s, t, k)| ViewFilterState::from_strs(s, t, k))
    }

    proptest! {
        #[test]
        fn prop_project_never_mutates_source(n in 0usize..60, seed in any::<u64>(), filter in filter_strategy()) {
            let src = records(n, seed);
            let snapshot = src.clone();
            let a = project(&src, &filter);
            let b = project(&src, &filter);
            prop_assert_eq!(&src, &snapshot);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_sort_order_holds(n in 0usize..60, seed in any::<u64>(), filter in filter_strategy()) {
            let out = project(&records(n, seed), &filter);
            match filter.sort {
                SortKey::Id => prop_assert!(out.windows(2).all(|w| w[0].id <= w[1].id)),
                SortKey::Confidence => prop_assert!(out.windows(2).all(|w| w[0].confidence >= w[1].confidence)),
            }
        }

        #[test]
        fn prop_projection_is_subset(n in 0usize..60, seed in any::<u64>(), filter in filter_strategy()) {
            let src = records(n, seed);
            let out = project(&src, &filter);
            prop_assert!(out.len() <= src.len());
            prop_assert!(out.iter().all(|r| src.contains(r)));
            prop_assert!(out.iter().all(|r| filter.status.matches(r) && filter.kind.matches(r)));
        }

        #[test]
        fn prop_set_active_isolated(n in 1usize..60, seed in any::<u64>(), pick in any::<prop::sample::Index>(), value in any::<bool>()) {
            let src = records(n, seed);
            let id = src[pick.index(n)].id;
            let out = set_active(&src, id, value);
            prop_assert_eq!(out.len(), src.len());
            for (before, after) in src.iter().zip(&out) {
                if before.id == id {
                    prop_assert_eq!(after.active, value);
                    prop_assert_eq!(&before.with_active(value), after);
                } else {
                    prop_assert_eq!(before, after);
                }
            }
        }
    }
}
