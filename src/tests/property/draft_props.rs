//! Property-based tests for debounced draft persistence

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;

use crate::wizard::{DraftPersistence, DraftRecord, KeyValueStore, ManualClock, MemoryStore, StepPayload};

fn payload(name: &str) -> StepPayload {
    let mut payload = StepPayload::new();
    payload.insert("basics".to_string(), Some(json!({ "name": name })));
    payload.insert("details".to_string(), None);
    payload
}

proptest! {
    #[test]
    fn burst_within_window_writes_last_payload_once(
        names in prop::collection::vec("[a-zA-Z]{1,12}", 1..20),
        gaps in prop::collection::vec(0i64..1_000, 20),
    ) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        let mut drafts = DraftPersistence::new("culprit-profile", store.clone(), clock.clone());

        for (name, gap) in names.iter().zip(gaps) {
            drafts.auto_save(&payload(name));
            clock.advance_ms(gap.min(999));
            prop_assert!(!drafts.tick());
            prop_assert!(store.is_empty());
        }

        clock.advance_ms(1_000);
        prop_assert!(drafts.tick());
        prop_assert!(!drafts.tick());

        let raw = store.get(drafts.key()).unwrap().unwrap();
        let record: DraftRecord = serde_json::from_str(&raw).unwrap();
        prop_assert_eq!(record.payload, payload(names.last().unwrap()));
    }
}
