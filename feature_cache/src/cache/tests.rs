use std::sync::Barrier;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use rstest::{fixture, rstest};

use super::*;

const HOUR: Duration = Duration::from_secs(3_600);

#[fixture]
fn cache() -> FeatureCache<u64, Vec<f64>> {
    FeatureCache::new(CacheConfig {
        max_size: 4,
        items_to_prune: 2,
        ttl_secs: 3_600,
    })
}

#[rstest]
fn concurrent_fetches_compute_once(cache: FeatureCache<u64, Vec<f64>>) {
    let calls = AtomicUsize::new(0);
    let barrier = Barrier::new(8);

    let values: Vec<Arc<Vec<f64>>> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    cache
                        .fetch(&7, HOUR, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(50));
                            Ok::<_, ()>(vec![1.0, 2.0])
                        })
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
}

#[rstest]
fn failed_compute_is_not_cached(cache: FeatureCache<u64, Vec<f64>>) {
    let err = cache.fetch(&1, HOUR, || Err("backend down")).unwrap_err();
    assert_eq!(err, "backend down");
    assert!(cache.get(&1).is_none());

    let value = cache.fetch(&1, HOUR, || Ok::<_, &str>(vec![3.0])).unwrap();
    assert_eq!(*value, vec![3.0]);
}

#[rstest]
fn hit_skips_compute(cache: FeatureCache<u64, Vec<f64>>) {
    cache.set(5, vec![0.5], HOUR);
    let value = cache
        .fetch(&5, HOUR, || -> Result<Vec<f64>, ()> { panic!("must not compute") })
        .unwrap();
    assert_eq!(*value, vec![0.5]);
}

#[rstest]
fn expired_entries_are_recomputed(cache: FeatureCache<u64, Vec<f64>>) {
    cache.set(9, vec![1.0], Duration::ZERO);
    assert!(cache.get(&9).is_none());
    let value = cache.fetch(&9, HOUR, || Ok::<_, ()>(vec![2.0])).unwrap();
    assert_eq!(*value, vec![2.0]);
}

#[rstest]
fn overflow_prunes_least_recently_used(cache: FeatureCache<u64, Vec<f64>>) {
    cache.batch_set((0..4).map(|k| (k, vec![k as f64])), HOUR);
    assert!(cache.get(&0).is_some());
    assert!(cache.get(&1).is_some());

    cache.set(4, vec![4.0], HOUR);

    assert_eq!(cache.len(), 3);
    assert!(cache.get(&0).is_some());
    assert!(cache.get(&1).is_some());
    assert!(cache.get(&2).is_none());
    assert!(cache.get(&3).is_none());
    assert!(cache.get(&4).is_some());
}

#[test]
fn zero_prune_quota_still_bounds_capacity() {
    let cache: FeatureCache<u64, Vec<f64>> = FeatureCache::new(CacheConfig {
        max_size: 2,
        items_to_prune: 0,
        ttl_secs: 3_600,
    });
    assert_eq!(cache.config().items_to_prune, 1);

    for key in 0..50 {
        cache.set(key, vec![key as f64], HOUR);
        assert!(cache.len() <= 2);
    }
    assert!(cache.get(&49).is_some());
}

#[rstest]
fn delete_and_clear(cache: FeatureCache<u64, Vec<f64>>) {
    cache.set(1, vec![1.0], HOUR);
    cache.set(2, vec![2.0], HOUR);
    assert!(cache.delete(&1));
    assert!(!cache.delete(&1));
    assert_eq!(cache.len(), 1);
    cache.clear();
    assert!(cache.is_empty());
}
