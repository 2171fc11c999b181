use std::collections::BTreeSet;

use kindred::keys::{DeleteSet, KeyAllocator, KeyError};
use kindred::record::RecordKind;

#[derive(Debug, Clone, Copy)]
enum Op {
    Allocate,
    Release(u32),
}

const OPS: [Op; 5] = [Op::Allocate, Op::Release(1), Op::Release(2), Op::Release(3), Op::Release(4)];

/// Every sequence of `length` operations drawn from `OPS`.
fn sequences(length: usize) -> Vec<Vec<Op>> {
    let mut all = vec![Vec::new()];
    for _ in 0..length {
        all = all
            .into_iter()
            .flat_map(|prefix| {
                OPS.iter().map(move |&op| {
                    let mut next = prefix.clone();
                    next.push(op);
                    next
                })
            })
            .collect();
    }
    all
}

#[test]
fn three_allocations_then_recycle() {
    let mut keys = KeyAllocator::new();
    let issued: Vec<String> = (0..3).map(|_| keys.allocate(RecordKind::Person)).collect();
    assert_eq!(issued, ["I1", "I2", "I3"]);
    keys.release("I2").expect("I2 is live");
    assert_eq!(keys.allocate(RecordKind::Person), "I2", "released key should be reissued before I4");
    assert_eq!(keys.allocate(RecordKind::Person), "I4");
}

#[test]
fn kinds_have_separate_key_spaces() {
    let mut keys = KeyAllocator::new();
    assert_eq!(keys.allocate(RecordKind::Person), "I1");
    assert_eq!(keys.allocate(RecordKind::Family), "F1");
    assert_eq!(keys.allocate(RecordKind::Source), "S1");
    keys.release("F1").expect("F1 is live");
    assert!(keys.is_in_use("I1"));
    assert!(!keys.is_in_use("F1"));
}

#[test]
fn releasing_twice_is_rejected() {
    let mut keys = KeyAllocator::new();
    for _ in 0..3 {
        keys.allocate(RecordKind::Family);
    }
    keys.release("F2").expect("first release");
    assert!(matches!(keys.release("F2"), Err(KeyError::AlreadyReleased(_))));
    assert!(matches!(keys.release("F9"), Err(KeyError::NotInUse(_))));
}

#[test]
fn releasing_at_the_high_water_mark_lowers_it() {
    let mut set = DeleteSet::new(RecordKind::Person);
    for _ in 0..4 {
        set.allocate();
    }
    set.release(2).expect("2 is live");
    set.release(3).expect("3 is live");
    assert_eq!(set.recycled(), &[2, 3]);
    set.release(4).expect("4 is live");
    assert_eq!(set.high_water(), 2, "2 and 3 should be absorbed when 4 goes");
    assert!(set.recycled().is_empty());
    assert_eq!(set.live_count(), 1);
}

#[test]
fn retained_keys_open_recyclable_gaps() {
    let mut keys = KeyAllocator::new();
    keys.retain("I3").expect("I3 is in range");
    keys.retain("I5").expect("I5 is in range");
    assert_eq!(keys.set(RecordKind::Person).recycled(), &[1, 2, 4]);
    assert_eq!(keys.allocate(RecordKind::Person), "I1");
    assert_eq!(keys.allocate(RecordKind::Person), "I2");
    assert_eq!(keys.allocate(RecordKind::Person), "I4");
    assert_eq!(keys.allocate(RecordKind::Person), "I6");
}

#[test]
fn oversized_loaded_keys_are_refused() {
    let mut keys = KeyAllocator::new();
    assert!(matches!(keys.retain("I4000000000"), Err(KeyError::OutOfRange(_))));
    assert!(matches!(keys.retain("F10000000"), Err(KeyError::OutOfRange(_))));
    keys.retain("F9999999").expect("largest key number is allowed");
    assert_eq!(keys.set(RecordKind::Person).high_water(), 1, "a refused key leaves no gaps behind");
    let families = keys.set(RecordKind::Family);
    assert_eq!(families.high_water(), 10_000_000);
    assert_eq!(families.live_count(), 1);
    assert!(families.is_in_use(9_999_999));
    assert!(!families.is_in_use(5_000_000));
}

#[test]
fn wide_gaps_are_reissued_from_the_bottom() {
    let mut set = DeleteSet::new(RecordKind::Event);
    set.retain(9_999_999).expect("in range");
    set.retain(2).expect("in range");
    assert_eq!(set.allocate(), 1);
    assert_eq!(set.allocate(), 3);
    set.release(9_999_999).expect("live key");
    assert_eq!(set.high_water(), 4, "trailing gap folds into the high-water mark");
    assert!(set.recycled().is_empty());
}

/// Checks every interleaving of allocations and releases against a plain
/// set of live suffixes: a live suffix is never issued again, and the
/// smallest free suffix is always the next one issued.
#[test]
fn interleavings_match_a_live_set() {
    for length in 1..=6 {
        for ops in sequences(length) {
            let mut set = DeleteSet::new(RecordKind::Person);
            let mut live: BTreeSet<u32> = BTreeSet::new();
            for op in &ops {
                match *op {
                    Op::Allocate => {
                        let expected = (1..).find(|n| !live.contains(n)).expect("free suffix");
                        let number = set.allocate();
                        assert_eq!(number, expected, "allocation after {:?}", ops);
                        assert!(live.insert(number), "{} issued twice in {:?}", number, ops);
                    }
                    Op::Release(number) => {
                        let result = set.release(number);
                        assert_eq!(result.is_ok(), live.remove(&number), "release {} in {:?}", number, ops);
                    }
                }
                for n in 1..=6 {
                    assert_eq!(set.is_in_use(n), live.contains(&n), "in-use of {} after {:?}", n, ops);
                }
                assert_eq!(set.live_count(), live.len(), "live count after {:?}", ops);
            }
        }
    }
}
