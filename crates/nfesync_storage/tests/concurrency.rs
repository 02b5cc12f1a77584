//! Cross-writer behaviour of the state file and the pending-summary scan.

use nfesync_protocol::{Environment, TaxpayerId};
use nfesync_storage::{DocumentStore, StateFile, SyncState};
use proptest::prelude::*;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;

fn id() -> TaxpayerId {
    TaxpayerId::parse("99999999000191").unwrap()
}

/// A state with enough entries that an interleaved write would be detectable.
fn bulky_state(seed: u64) -> SyncState {
    let mut state = SyncState::new();
    state.advance_last_sequence(&id(), Environment::Production, seed);
    for series in 0..200 {
        state.set_last_document_number(&id(), &series.to_string(), Environment::Production, seed);
    }
    state
}

#[test]
fn concurrent_saves_never_interleave() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("state.json");

    for round in 0..10 {
        let a = bulky_state(1_000 + round);
        let b = bulky_state(2_000_000 + round);
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [a.clone(), b.clone()]
            .into_iter()
            .map(|state| {
                let file = StateFile::new(&path);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    file.save(&state).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let text = std::fs::read_to_string(&path).unwrap();
        let expected_a = format!("{}\n", serde_json::to_string_pretty(&a).unwrap());
        let expected_b = format!("{}\n", serde_json::to_string_pretty(&b).unwrap());
        assert!(text == expected_a || text == expected_b, "round {round} interleaved");
    }
}

#[test]
fn readers_see_complete_states() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("state.json");
    StateFile::new(&path).save(&bulky_state(1)).unwrap();

    let writer = {
        let file = StateFile::new(&path);
        thread::spawn(move || {
            for seed in 2..40 {
                file.save(&bulky_state(seed)).unwrap();
            }
        })
    };

    let file = StateFile::new(&path);
    for _ in 0..40 {
        let state = file.load().unwrap();
        let seq = state.last_sequence(&id(), Environment::Production);
        assert_eq!(state.last_document_number(&id(), "199", Environment::Production), seq);
    }
    writer.join().unwrap();
}

#[derive(Debug, Clone)]
enum StoreOp {
    Summary(usize),
    Complete(usize),
    Remove(usize),
}

fn store_op() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        (0usize..4).prop_map(StoreOp::Summary),
        (0usize..4).prop_map(StoreOp::Complete),
        (0usize..4).prop_map(StoreOp::Remove),
    ]
}

fn key(index: usize) -> String {
    format!("3524061122233300018155001000000{index:03}1000000010")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn pending_iff_only_summary_stored(ops in prop::collection::vec(store_op(), 1..30)) {
        let temp = tempdir().unwrap();
        let store = DocumentStore::new(temp.path());
        let mut model: [Option<bool>; 4] = [None; 4];

        for op in &ops {
            match *op {
                StoreOp::Summary(i) => {
                    store.save(&id(), &format!("{}.xml", key(i)), "<resNFe/>").unwrap();
                    model[i] = Some(true);
                }
                StoreOp::Complete(i) => {
                    store.save(&id(), &format!("{}.xml", key(i)), "<nfeProc/>").unwrap();
                    model[i] = Some(false);
                }
                StoreOp::Remove(i) => {
                    store.remove(&id(), &format!("{}.xml", key(i))).unwrap();
                    model[i] = None;
                }
            }
        }

        let pending = store.list_pending_summaries(&id()).unwrap();
        for (i, state) in model.iter().enumerate() {
            prop_assert_eq!(pending.contains(&key(i)), *state == Some(true));
        }
    }
}
