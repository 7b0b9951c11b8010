//! Property-based tests for preload selection and deduplication

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use proptest::prelude::*;
use warmstart_preload::{
    loader, module, scheduler::select_by_priority, Category, ComponentRegistry, LoadCache,
    RegistryEntry,
};

fn noop_entry(name: String, priority: i32) -> RegistryEntry {
    RegistryEntry::new(name, Category::Ui, loader(|| async { Ok(module(())) })).with_priority(priority)
}

/// Property: priority selection keeps exactly the eligible entries, sorted
/// descending, with ties in registration order.
#[test]
fn prop_priority_selection_is_stable_and_complete() {
    proptest!(|(priorities in prop::collection::vec(-3i32..12, 0..40), min in -3i32..12)| {
        let registry = ComponentRegistry::new();
        for (i, p) in priorities.iter().enumerate() {
            registry.register(noop_entry(format!("unit-{i}"), *p));
        }

        let selected = select_by_priority(&registry.get_all(), min);

        let expected = priorities.iter().filter(|p| **p >= min).count();
        prop_assert_eq!(selected.len(), expected);

        for pair in selected.windows(2) {
            prop_assert!(pair[0].priority >= pair[1].priority);
            if pair[0].priority == pair[1].priority {
                let a: usize = pair[0].name["unit-".len()..].parse().unwrap();
                let b: usize = pair[1].name["unit-".len()..].parse().unwrap();
                prop_assert!(a < b, "ties must keep registration order");
            }
        }
    });
}

/// Property: any number of concurrent callers for one key trigger one
/// loader invocation and all observe the same value.
#[test]
fn prop_concurrent_preloads_invoke_once() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap();

    proptest!(ProptestConfig::with_cases(32), |(callers in 1usize..64, value in any::<u64>())| {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let l = loader(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::task::yield_now().await;
                Ok(module(value))
            }
        });

        let results = runtime.block_on(async {
            let cache = LoadCache::new();
            let handles: Vec<_> = (0..callers)
                .map(|_| {
                    let cache = cache.clone();
                    let l = Arc::clone(&l);
                    tokio::spawn(async move { cache.preload("shared", &l).await })
                })
                .collect();
            futures::future::join_all(handles).await
        });

        prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            let loaded = result.unwrap().unwrap();
            prop_assert_eq!(loaded.downcast_ref::<u64>(), Some(&value));
        }
    });
}
