//! Property tests over reconciliation and parts parsing.

use catmirror_engine::{content_hash, reconcile_projects, CatalogStore, MemoryStore};
use catmirror_model::{RemoteId, RemoteProject};
use catmirror_testkit::{remote_project_strategy, valid_parts_strategy};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashSet;

fn unique_projects() -> impl Strategy<Value = Vec<RemoteProject>> {
    prop::collection::vec(remote_project_strategy(), 0..12).prop_map(|records| {
        let mut seen = HashSet::new();
        records
            .into_iter()
            .filter(|r| seen.insert(r.id.clone()))
            .collect()
    })
}

proptest! {
    #[test]
    fn reconcile_mirrors_exactly_the_fetched_set(records in unique_projects()) {
        let store = MemoryStore::new();
        let directory = RemoteId::new("d1");
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let outcome = reconcile_projects(&store, &directory, &records, now).unwrap();
        prop_assert_eq!(outcome.created as usize, records.len());
        prop_assert_eq!(outcome.removed, 0);

        let mirrored: HashSet<RemoteId> = store
            .list_projects(&directory)
            .unwrap()
            .into_iter()
            .map(|p| p.remote_id)
            .collect();
        let fetched: HashSet<RemoteId> = records.iter().map(|r| r.id.clone()).collect();
        prop_assert_eq!(mirrored, fetched);
    }

    #[test]
    fn repeated_reconcile_is_a_fixpoint(records in unique_projects()) {
        let store = MemoryStore::new();
        let directory = RemoteId::new("d1");
        // Sync times past every generated change marker, so staleness
        // comes only from the records themselves.
        let now = Utc.with_ymd_and_hms(2027, 1, 1, 12, 0, 0).unwrap();
        reconcile_projects(&store, &directory, &records, now).unwrap();
        let before = store.list_projects(&directory).unwrap();

        let later = Utc.with_ymd_and_hms(2027, 1, 1, 13, 0, 0).unwrap();
        let outcome = reconcile_projects(&store, &directory, &records, later).unwrap();
        prop_assert_eq!(outcome.created, 0);
        prop_assert_eq!(outcome.updated, 0);
        prop_assert_eq!(outcome.removed, 0);

        // Only the generation stamp moved.
        let mut after = store.list_projects(&directory).unwrap();
        for row in &mut after {
            if let Some(previous) = before.iter().find(|p| p.remote_id == row.remote_id) {
                row.generation = previous.generation;
            }
        }
        prop_assert_eq!(after, before);
    }

    #[test]
    fn well_formed_payloads_always_parse_cleanly(payload in valid_parts_strategy()) {
        let rows = payload.as_array().unwrap().len();
        let parsed = catmirror_engine::parse_parts(Some(&payload))
            .expect("valid payloads never get rejected");
        prop_assert_eq!(parsed.failed_rows, 0);
        prop_assert_eq!(parsed.parts.len(), rows);
    }

    #[test]
    fn hash_is_deterministic_and_collision_averse(a in valid_parts_strategy(),
                                                  b in valid_parts_strategy()) {
        prop_assert_eq!(content_hash(Some(&a)), content_hash(Some(&a)));
        if a != b {
            prop_assert_ne!(content_hash(Some(&a)), content_hash(Some(&b)));
        }
    }
}
