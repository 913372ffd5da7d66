#![cfg(test)]

// Property tests for SlotTable kept inside the crate so they can reach the
// full-table expunge pass.

use crate::config::TableConfig;
use crate::key::SlotKey;
use crate::slot_table::SlotTable;
use proptest::prelude::*;
use std::collections::HashMap;

// Pool-indexed operations: each pool position holds at most one live key at a
// time. `Drop` releases the key (its entry goes stale); the next `Set` on
// that position mints a fresh key with the pool's hash.
#[derive(Clone, Debug)]
enum Op {
    Set(usize, i32),
    Get(usize),
    Remove(usize),
    Drop(usize),
    Bump(usize),
}

fn arb_scenario() -> impl Strategy<Value = (Vec<u32>, Vec<Op>)> {
    // Hashes from a small range pile keys onto a few ideal slots, which
    // makes long runs and cross-run relocation common.
    proptest::collection::vec(0u32..48, 1..=40).prop_flat_map(|hashes| {
        let n = hashes.len();
        let op = prop_oneof![
            4 => (0..n, any::<i32>()).prop_map(|(i, v)| Op::Set(i, v)),
            3 => (0..n).prop_map(Op::Get),
            1 => (0..n).prop_map(Op::Remove),
            2 => (0..n).prop_map(Op::Drop),
            1 => (0..n).prop_map(Op::Bump),
        ];
        proptest::collection::vec(op, 1..200).prop_map(move |ops| (hashes.clone(), ops))
    })
}

// Property: State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - `get` of a live key returns the last value set; removed keys read absent.
// - Overwrites return the previous value and never grow `len`.
// - Dropped keys never resurface and do not hide live keys in the same run.
// - `validate()` (probe contiguity, count, free slot) holds after every step.
// - After a full expunge pass `len` equals the number of live bindings.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((hashes, ops) in arb_scenario()) {
        let anchor = SlotKey::with_hash(0);
        let mut sut = SlotTable::new(&anchor, i32::MIN);
        let mut pool: Vec<Option<SlotKey>> = vec![None; hashes.len()];
        let mut model: HashMap<usize, i32> = HashMap::new();

        for op in ops {
            match op {
                Op::Set(i, v) => {
                    let key = pool[i].get_or_insert_with(|| SlotKey::with_hash(hashes[i])).clone();
                    let before = sut.len();
                    let prev = sut.set(&key, v).expect("default config never exhausts here");
                    prop_assert_eq!(prev, model.insert(i, v));
                    if prev.is_some() {
                        prop_assert!(sut.len() <= before, "overwrite must not grow len");
                    }
                }
                Op::Get(i) => {
                    if let Some(key) = &pool[i] {
                        prop_assert_eq!(sut.get(key).copied(), model.get(&i).copied());
                    }
                }
                Op::Remove(i) => {
                    if let Some(key) = &pool[i] {
                        prop_assert_eq!(sut.remove(key), model.remove(&i));
                        prop_assert!(sut.get(key).is_none());
                    }
                }
                Op::Drop(i) => {
                    pool[i] = None;
                    model.remove(&i);
                }
                Op::Bump(i) => {
                    if let Some(key) = &pool[i] {
                        let got = sut.get_mut(key).map(|v| {
                            *v = v.wrapping_add(1);
                            *v
                        });
                        let want = model.get_mut(&i).map(|v| {
                            *v = v.wrapping_add(1);
                            *v
                        });
                        prop_assert_eq!(got, want);
                    }
                }
            }
            prop_assert!(sut.validate().is_ok(), "{:?}", sut.validate());
            // Stale entries may linger, so len only bounds the live count.
            prop_assert!(sut.len() >= model.len() + 1);
        }

        for (i, key) in pool.iter().enumerate() {
            if let Some(key) = key {
                prop_assert_eq!(sut.get(key).copied(), model.get(&i).copied());
            }
        }
        prop_assert_eq!(sut.get(&anchor).copied(), Some(i32::MIN));

        drop(pool);
        sut.expunge_stale_entries();
        prop_assert_eq!(sut.len(), 1);
        prop_assert!(sut.validate().is_ok());
    }
}

// Property: inherit copies exactly the live entries the transform accepts,
// and the child never observes later parent writes.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_inherit_snapshot(
        entries in proptest::collection::vec((0u32..64, any::<i16>()), 1..30),
    ) {
        let config = TableConfig::default();
        let keys: Vec<SlotKey> = entries.iter().map(|(h, _)| SlotKey::with_hash(*h)).collect();
        let mut parent = SlotTable::with_config(config, &keys[0], i32::from(entries[0].1));
        for (k, (_, v)) in keys.iter().zip(&entries).skip(1) {
            parent.set(k, i32::from(*v)).unwrap();
        }
        // Every odd-positioned key is released before the copy.
        let (live, released): (Vec<_>, Vec<_>) =
            keys.into_iter().enumerate().partition(|(i, _)| i % 2 == 0);
        let released: Vec<_> = released.into_iter().map(|(_, k)| k.downgrade()).collect();

        let mut child = parent.inherit(|_, v| Some(v * 2));
        prop_assert_eq!(child.capacity(), parent.capacity());
        prop_assert!(child.validate().is_ok());
        prop_assert_eq!(child.len(), live.len());
        prop_assert!(released.iter().all(|w| !w.is_live()));

        for (i, k) in &live {
            let v = i32::from(entries[*i].1);
            prop_assert_eq!(child.get(k).copied(), Some(v * 2));
            parent.set(k, v + 1).unwrap();
            prop_assert_eq!(child.get(k).copied(), Some(v * 2));
        }

        // Accept-nothing transform yields an empty, valid child.
        let empty = parent.inherit(|_, _| None);
        prop_assert!(empty.is_empty());
        prop_assert!(empty.validate().is_ok());
    }
}
