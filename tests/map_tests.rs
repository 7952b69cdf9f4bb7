use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use weakmap::{MapError, WeakKeyMap};

fn key(s: &str) -> Arc<String> {
    Arc::new(s.to_string())
}

#[test]
fn concurrent_sets_on_distinct_keys_lose_nothing() {
    let map: WeakKeyMap<String, usize> = WeakKeyMap::new();
    let keys: Vec<Arc<String>> = (0..64).map(|i| key(&format!("key-{i}"))).collect();

    thread::scope(|scope| {
        for chunk in keys.chunks(8) {
            let map = &map;
            scope.spawn(move || {
                for k in chunk {
                    map.set(k, k.len());
                }
            });
        }
    });

    assert_eq!(map.len(), keys.len());
    for k in &keys {
        assert_eq!(map.get(k), Some(k.len()));
    }
}

#[test]
fn concurrent_mixed_operations_stay_consistent() {
    let map: WeakKeyMap<String, usize> = WeakKeyMap::new();
    let shared_keys: Vec<Arc<String>> = (0..16).map(|i| key(&format!("shared-{i}"))).collect();

    thread::scope(|scope| {
        for t in 0..4 {
            let map = &map;
            let shared_keys = &shared_keys;
            scope.spawn(move || {
                for round in 0..50 {
                    for k in shared_keys {
                        map.set(k, t * 1000 + round);
                        let _ = map.get(k);
                        let _ = map.contains_key(k);
                    }
                    map.scavenge();
                }
            });
        }
    });

    // Every shared key survived the churn with some last-written value.
    assert_eq!(map.len(), shared_keys.len());
    for k in &shared_keys {
        assert!(map.get(k).is_some());
    }
}

#[test]
fn reaper_runs_alongside_concurrent_callers() {
    let mut map: WeakKeyMap<String, usize> = WeakKeyMap::new();
    map.start_reaper(Duration::from_millis(1)).unwrap();

    let survivors: Vec<Arc<String>> = (0..8).map(|i| key(&format!("keep-{i}"))).collect();

    thread::scope(|scope| {
        let map = &map;
        let survivors = &survivors;
        scope.spawn(move || {
            for (i, k) in survivors.iter().enumerate() {
                map.set(k, i);
            }
        });
        scope.spawn(move || {
            // Transient keys dropped as soon as they are written.
            for i in 0..200 {
                let k = key(&format!("transient-{i}"));
                map.set(&k, i);
            }
        });
    });

    // Transient entries are all expired; give the reaper time to find them.
    let deadline = Instant::now() + Duration::from_secs(2);
    while map.values().len() > survivors.len() {
        assert!(Instant::now() < deadline, "reaper fell behind");
        thread::sleep(Duration::from_millis(5));
    }
    for (i, k) in survivors.iter().enumerate() {
        assert_eq!(map.get(k), Some(i));
    }
}

#[test]
fn expired_keys_disappear_from_every_view() {
    let map: WeakKeyMap<String, i32> = WeakKeyMap::new();
    let keep = key("keep");
    map.set(&keep, 1);
    {
        let gone = key("gone");
        map.set(&gone, 2);
    }

    // Probe with an equal-valued but distinct instance.
    assert!(!map.contains_key(&key("gone")));
    assert!(matches!(map.fetch(&key("gone")), Err(MapError::KeyNotFound)));

    assert_eq!(map.len(), 1);
    let keys = map.keys();
    assert_eq!(keys.len(), 1);
    assert_eq!(*keys[0], "keep");
    let pairs: Vec<_> = map.iter().collect();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].1, 1);
}

#[test]
fn iteration_snapshot_ignores_later_inserts() {
    let map: WeakKeyMap<String, i32> = WeakKeyMap::new();
    let a = key("a");
    map.set(&a, 1);

    let snapshot = map.iter();
    let b = key("b");
    map.set(&b, 2);

    // The iterator was snapped before `b` arrived.
    assert_eq!(snapshot.count(), 1);
    assert_eq!(map.len(), 2);
}

#[test]
fn values_are_copies() {
    let map: WeakKeyMap<String, Vec<i32>> = WeakKeyMap::new();
    let k = key("k");
    map.set(&k, vec![1, 2, 3]);

    let mut values = map.values();
    values[0].push(4);
    assert_eq!(map.get(&k), Some(vec![1, 2, 3]));
}

#[test]
fn stats_survive_contention() {
    let map: WeakKeyMap<String, usize> = WeakKeyMap::new();
    let keys: Vec<Arc<String>> = (0..32).map(|i| key(&format!("key-{i}"))).collect();

    thread::scope(|scope| {
        for chunk in keys.chunks(8) {
            let map = &map;
            scope.spawn(move || {
                for k in chunk {
                    map.set(k, 0);
                    map.remove(k);
                }
            });
        }
    });

    let stats = map.stats();
    assert_eq!(stats.inserts, keys.len() as u64);
    assert_eq!(stats.removals, keys.len() as u64);
    assert!(map.is_empty());
}
