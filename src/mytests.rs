use crate::*;

use std::cmp::Ordering;

fn rand_next(state: &mut u64) -> u64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    *state >> 33
}

#[test]
fn basic_test() {
    let mut m = AvlMap::new();
    assert!(m.is_empty());
    assert_eq!(m.len(), 0);
    for i in 0..100 {
        let (c, added) = m.insert(i, i * 2);
        assert!(added);
        assert_eq!(c.key_value(), Some((&i, &(i * 2))));
    }
    m.check();
    assert_eq!(m.len(), 100);
    assert!(!m.is_empty());
    for i in 0..100 {
        assert_eq!(m.get(&i), Some(&(i * 2)));
        assert!(m.contains_key(&i));
    }
    assert_eq!(m.get(&100), None);
    assert!(!m.contains_key(&100));
    assert_eq!(m.first_key_value(), Some((&0, &0)));
    assert_eq!(m.last_key_value(), Some((&99, &198)));
    *m.get_mut(&7).unwrap() = 1000;
    assert_eq!(m[&7], 1000);
}

#[test]
fn insert_scenario_test() {
    let mut m = AvlMap::new();
    for k in [5, 3, 8, 1, 4, 7, 9, 2, 6, 0] {
        m.insert(k, k * 10);
    }
    m.check();
    assert_eq!(m.len(), 10);
    let keys: Vec<i32> = m.keys().copied().collect();
    assert_eq!(keys, (0..10).collect::<Vec<i32>>());
    // Height stays within the 1.44 * log2(n + 1) balance bound.
    assert!(m.tree_height() <= 5);
}

#[test]
fn height_bound_test() {
    let mut m = AvlMap::new();
    for i in 0..1000 {
        m.insert(i, i);
    }
    m.check();
    assert!(m.tree_height() <= 14);
    for i in (0..1000).rev() {
        m.insert(i + 1000, i);
    }
    m.check();
    assert!(m.tree_height() <= 16);
}

#[test]
fn duplicate_insert_test() {
    let mut m = AvlMap::new();
    let (_, added) = m.insert(1, "first");
    assert!(added);
    let (c, added) = m.insert(1, "second");
    assert!(!added);
    assert_eq!(c.value(), Some(&"first"));
    assert_eq!(m.len(), 1);
    assert_eq!(m.get(&1), Some(&"first"));
}

#[test]
fn remove_two_children_test() {
    let mut m = AvlMap::new();
    for k in 1..=7 {
        m.insert(k, ());
    }
    m.check();
    assert_eq!(m.remove(&4), Some(()));
    m.check();
    let keys: Vec<i32> = m.keys().copied().collect();
    assert_eq!(keys, vec![1, 2, 3, 5, 6, 7]);
}

#[test]
fn remove_all_test() {
    let mut m = AvlMap::new();
    let n = 1000;
    for i in 0..n {
        m.insert(i, i);
    }
    for i in 0..n {
        assert_eq!(m.remove(&i), Some(i));
        if i % 97 == 0 {
            m.check();
        }
    }
    assert!(m.is_empty());
    assert_eq!(m.remove(&0), None);
    m.check();
}

#[test]
fn random_mix_test() {
    let mut state = 0x243f6a8885a308d3u64;
    for _rep in 0..10 {
        let mut m = AvlMap::new();
        let mut oracle = std::collections::BTreeMap::new();
        for _op in 0..1000 {
            let k = rand_next(&mut state) % 200;
            if rand_next(&mut state) % 3 == 0 {
                assert_eq!(m.remove(&k), oracle.remove(&k));
            } else {
                let (_, added) = m.insert(k, k);
                assert_eq!(added, oracle.insert(k, k).is_none());
            }
        }
        m.check();
        assert_eq!(m.len(), oracle.len());
        assert!(m
            .iter()
            .map(|(k, v)| (*k, *v))
            .eq(oracle.iter().map(|(k, v)| (*k, *v))));
    }
}

#[test]
fn erase_then_find_test() {
    let mut m = AvlMap::new();
    for i in 0..50 {
        m.insert(i, i);
    }
    for k in [0, 17, 23, 49, 31] {
        let pos = m.find(&k).position();
        assert_eq!(m.remove_at(pos).unwrap(), (k, k));
        assert!(m.find(&k).is_end());
        m.check();
    }
    assert_eq!(m.len(), 45);
}

#[test]
fn foreign_position_test() {
    let mut a = AvlMap::new();
    let mut b = AvlMap::new();
    for i in 0..10 {
        a.insert(i, i);
        b.insert(i, i);
    }
    let pos = b.find(&3).position();
    assert!(a.remove_at(pos).is_err());
    assert_eq!(a.len(), 10);
    assert_eq!(b.len(), 10);
    a.check();
    b.check();
    let pos = b.find(&3).position();
    assert_eq!(b.remove_at(pos).unwrap(), (3, 3));
    assert_eq!(b.len(), 9);
}

#[test]
fn stale_position_test() {
    let mut m = AvlMap::new();
    for i in 0..10 {
        m.insert(i, i);
    }
    let pos = m.find(&5).position();
    assert_eq!(m.remove(&5), Some(5));
    // The handle no longer denotes a live node and must be rejected.
    assert!(m.remove_at(pos).is_err());
    assert_eq!(m.len(), 9);
    m.check();

    let end = m.cursor_end().position();
    assert!(m.remove_at(end).is_err());
}

#[test]
fn cursor_walk_test() {
    let mut m = AvlMap::new();
    for i in 0..50 {
        m.insert(i, i * 2);
    }
    let mut c = m.cursor_front();
    for i in 0..50 {
        assert_eq!(c.key_value(), Some((&i, &(i * 2))));
        c.move_next().unwrap();
    }
    assert!(c.is_end());
    assert!(c.move_next().is_err());
    // A sentinel reached by walking past the maximum steps back to the maximum.
    c.move_prev().unwrap();
    assert_eq!(c.key(), Some(&49));
    for i in (0..49).rev() {
        c.move_prev().unwrap();
        assert_eq!(c.key(), Some(&i));
    }
    // Walking below the minimum parks the cursor on a dead sentinel.
    c.move_prev().unwrap();
    assert!(c.move_prev().is_err());
    assert!(c.move_next().is_err());
    // A fresh end sentinel cannot be stepped backwards.
    let mut e = m.cursor_end();
    assert!(e.move_prev().is_err());
}

#[test]
fn cursor_identity_test() {
    let mut m = AvlMap::new();
    let mut other = AvlMap::new();
    for i in 0..20 {
        m.insert(i, i);
        other.insert(i, i);
    }
    assert!(m.find(&10) == m.find(&10));
    assert!(m.find(&10) != m.find(&11));
    // Equal keys in different map instances still compare unequal.
    assert!(m.find(&10) != other.find(&10));
    assert!(m.find(&10).position() != other.find(&10).position());
    // All end sentinels of one map are the same position.
    let mut walked = m.cursor_back();
    walked.move_next().unwrap();
    assert!(walked == m.cursor_end());
    assert!(m.find(&999) == m.cursor_end());
}

#[test]
fn cursor_mut_test() {
    let mut m = AvlMap::new();
    for i in 0..10 {
        m.insert(i, i);
    }
    let mut c = m.find_mut(&4);
    *c.value_mut().unwrap() = 40;
    c.move_next().unwrap();
    assert_eq!(c.key(), Some(&5));
    assert_eq!(c.remove_current().unwrap(), (5, 5));
    m.check();
    assert_eq!(m.len(), 9);
    assert_eq!(m.get(&4), Some(&40));
    assert_eq!(m.get(&5), None);
    // The cursor for an absent key is the sentinel, removal is rejected.
    assert!(m.find_mut(&5).remove_current().is_err());
    assert_eq!(m.len(), 9);

    let mut b = m.cursor_back_mut();
    assert_eq!(b.key(), Some(&9));
    b.move_next().unwrap();
    assert!(b.is_end());
    b.move_prev().unwrap();
    assert_eq!(b.remove_current().unwrap(), (9, 9));
    m.check();
}

#[test]
fn at_test() {
    let mut m = AvlMap::new();
    m.insert("a", 1);
    assert_eq!(*m.at(&"a").unwrap(), 1);
    assert!(m.at(&"b").is_err());
    *m.at_mut(&"a").unwrap() += 1;
    assert_eq!(m[&"a"], 2);
    assert!(m.at_mut(&"b").is_err());
}

#[test]
#[should_panic]
fn index_missing_test() {
    let m: AvlMap<i32, i32> = AvlMap::new();
    let _ = m[&1];
}

#[test]
fn entry_test() {
    let mut m: AvlMap<&str, i32> = AvlMap::new();
    // A bare lookup through or_default creates the entry.
    assert_eq!(*m.entry("x").or_default(), 0);
    assert_eq!(m.len(), 1);
    *m.entry("x").or_default() += 7;
    assert_eq!(m[&"x"], 7);
    *m.entry("y").or_insert(5) += 1;
    assert_eq!(m[&"y"], 6);
    assert_eq!(*m.entry("z").or_insert_with(|| 3), 3);
    match m.entry("x") {
        Occupied(e) => assert_eq!(*e.get(), 7),
        Vacant(_) => panic!(),
    }
    let e = m.entry("w");
    assert_eq!(*e.key(), "w");
    drop(e);
    assert_eq!(m.len(), 3);
    m.check();
}

#[test]
fn clone_independence_test() {
    let mut a = AvlMap::new();
    for i in 0..100 {
        a.insert(i, i);
    }
    let mut b = a.clone();
    b.check();
    assert_eq!(a.len(), b.len());
    assert!(a.iter().eq(b.iter()));

    b.remove(&50);
    b.insert(1000, 1000);
    *b.get_mut(&10).unwrap() += 5;
    assert_eq!(a.get(&50), Some(&50));
    assert_eq!(a.get(&10), Some(&10));
    assert_eq!(a.get(&1000), None);

    a.remove(&20);
    assert_eq!(b.get(&20), Some(&20));
    a.check();
    b.check();
}

#[test]
fn iter_test() {
    let mut m = AvlMap::new();
    for i in 0..100 {
        m.insert(i, i);
    }
    assert_eq!(m.iter().len(), 100);
    assert_eq!(m.iter().count(), 100);
    let fwd: Vec<i32> = m.keys().copied().collect();
    let mut rev: Vec<i32> = m.keys().rev().copied().collect();
    rev.reverse();
    assert_eq!(fwd, rev);

    let mut it = m.iter();
    assert_eq!(it.next(), Some((&0, &0)));
    assert_eq!(it.next_back(), Some((&99, &99)));
    assert_eq!(it.len(), 98);

    for v in m.values_mut() {
        *v += 1;
    }
    assert_eq!(m[&0], 1);
    assert_eq!(m.values().copied().sum::<i32>(), (1..=100).sum::<i32>());

    for (k, v) in &mut m {
        if *k % 2 == 0 {
            *v = 0;
        }
    }
    assert_eq!(m[&2], 0);
    assert_eq!(m[&3], 4);
}

#[test]
fn into_iter_test() {
    let m = AvlMap::from([(3, 'c'), (1, 'a'), (2, 'b')]);
    let pairs: Vec<(i32, char)> = m.into_iter().collect();
    assert_eq!(pairs, vec![(1, 'a'), (2, 'b'), (3, 'c')]);

    let m = AvlMap::from([(3, 'c'), (1, 'a'), (2, 'b')]);
    let rev: Vec<(i32, char)> = m.into_iter().rev().collect();
    assert_eq!(rev, vec![(3, 'c'), (2, 'b'), (1, 'a')]);

    let m: AvlMap<i32, i32> = (0..10).map(|i| (i, i)).collect();
    assert_eq!(m.len(), 10);
    let mut it = m.into_iter();
    assert_eq!(it.len(), 10);
    assert_eq!(it.next(), Some((0, 0)));
    assert_eq!(it.len(), 9);
    // Dropping a part-consumed iterator frees the rest of the tree.
    drop(it);
}

#[test]
fn pop_test() {
    let mut m = AvlMap::new();
    for i in 0..100 {
        m.insert(i, i);
    }
    assert_eq!(m.pop_first(), Some((0, 0)));
    assert_eq!(m.pop_last(), Some((99, 99)));
    m.check();
    let mut expect = 1;
    while let Some((k, _)) = m.pop_first() {
        assert_eq!(k, expect);
        expect += 1;
    }
    assert_eq!(expect, 99);
    assert!(m.is_empty());
    assert_eq!(m.pop_first(), None);
    assert_eq!(m.pop_last(), None);
}

#[test]
fn clear_test() {
    let mut m = AvlMap::new();
    for i in 0..100 {
        m.insert(i, i);
    }
    m.clear();
    assert!(m.is_empty());
    assert_eq!(m.len(), 0);
    assert!(m.find(&1).is_end());
    m.insert(1, 1);
    m.check();
    assert_eq!(m.len(), 1);
}

#[test]
fn extend_test() {
    let mut m = AvlMap::new();
    m.extend((0..10).map(|i| (i, i)));
    assert_eq!(m.len(), 10);
    // Extend keeps existing values for duplicate keys.
    m.extend(vec![(5, 100), (10, 10)]);
    assert_eq!(m.len(), 11);
    assert_eq!(m[&5], 5);
    m.check();
}

#[test]
fn debug_test() {
    let mut m = AvlMap::new();
    m.insert(2, "two");
    m.insert(1, "one");
    assert_eq!(format!("{m:?}"), "{1: \"one\", 2: \"two\"}");
}

struct Descending;

impl Comparator<i32> for Descending {
    fn cmp(&self, a: &i32, b: &i32) -> Ordering {
        b.cmp(a)
    }
}

#[test]
fn comparator_test() {
    let mut m: AvlMap<i32, i32, Descending> = AvlMap::with_comparator(Descending);
    for i in 0..20 {
        m.insert(i, i);
    }
    m.check();
    let keys: Vec<i32> = m.keys().copied().collect();
    let expect: Vec<i32> = (0..20).rev().collect();
    assert_eq!(keys, expect);
    assert_eq!(m.first_key_value(), Some((&19, &19)));
    assert_eq!(m.pop_first(), Some((19, 19)));
    assert_eq!(m.remove(&0), Some(0));
    m.check();
}

#[cfg(feature = "serde")]
#[test]
fn serde_test() {
    let mut m = AvlMap::new();
    for i in 0..50 {
        m.insert(i, i * 3);
    }
    let json = serde_json::to_string(&m).unwrap();
    let back: AvlMap<i32, i32> = serde_json::from_str(&json).unwrap();
    back.check();
    assert!(m.iter().eq(back.iter()));
}
