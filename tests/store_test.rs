use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use kvs::engines::engine::Documents;
use kvs::{
    DocumentEngine, EngineError, KeyValuePair, KeyValueStore, KvError, MemoryEngine, Operation,
    StoreConfig,
};

fn memory_store(namespace: &str) -> KeyValueStore<MemoryEngine> {
    KeyValueStore::with_engine(MemoryEngine::new(namespace), StoreConfig::default())
}

/// An engine whose cursor fails after `good` pairs, and whose calls can be
/// made to time out.
struct FlakyEngine {
    pairs: Vec<KeyValuePair>,
    good: usize,
    timeout: bool,
    writes: AtomicUsize,
}

impl FlakyEngine {
    fn new(pairs: Vec<KeyValuePair>, good: usize) -> Self {
        FlakyEngine {
            pairs,
            good,
            timeout: false,
            writes: AtomicUsize::new(0),
        }
    }

    fn timing_out() -> Self {
        FlakyEngine {
            timeout: true,
            ..FlakyEngine::new(vec![], 0)
        }
    }

    fn check(&self) -> kvs::engines::errors::Result<()> {
        if self.timeout {
            return Err(EngineError::Timeout {
                reason: "server selection timed out".to_owned(),
            });
        }
        Ok(())
    }
}

impl DocumentEngine for FlakyEngine {
    fn namespace(&self) -> String {
        "flaky.pairs".to_owned()
    }

    fn upsert(&self, _key: &str, _value: &str) -> kvs::engines::errors::Result<()> {
        self.check()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn find(&self, _key: &str) -> kvs::engines::errors::Result<Option<String>> {
        self.check()?;
        Ok(None)
    }

    fn delete(&self, _key: &str) -> kvs::engines::errors::Result<u64> {
        self.check()?;
        Ok(0)
    }

    fn scan(&self) -> kvs::engines::errors::Result<Documents<'_>> {
        self.check()?;
        let good = self.good;
        Ok(Box::new(self.pairs.iter().enumerate().map(move |(i, pair)| {
            if i < good {
                Ok(pair.clone())
            } else {
                Err(EngineError::Decode {
                    reason: "missing field `value`".to_owned(),
                })
            }
        })))
    }
}

/// An engine whose cursor reads the collection as it goes,
/// so it observes pairs upserted after the scan began.
#[derive(Clone, Default)]
struct LiveEngine {
    pairs: Arc<Mutex<Vec<KeyValuePair>>>,
}

impl DocumentEngine for LiveEngine {
    fn namespace(&self) -> String {
        "live.pairs".to_owned()
    }

    fn upsert(&self, key: &str, value: &str) -> kvs::engines::errors::Result<()> {
        let mut pairs = self.pairs.lock().unwrap();
        match pairs.iter_mut().find(|pair| pair.key == key) {
            Some(pair) => pair.value = value.to_owned(),
            None => pairs.push(KeyValuePair::new(key, value)),
        }
        Ok(())
    }

    fn find(&self, key: &str) -> kvs::engines::errors::Result<Option<String>> {
        let pairs = self.pairs.lock().unwrap();
        Ok(pairs
            .iter()
            .find(|pair| pair.key == key)
            .map(|pair| pair.value.clone()))
    }

    fn delete(&self, key: &str) -> kvs::engines::errors::Result<u64> {
        let mut pairs = self.pairs.lock().unwrap();
        let before = pairs.len();
        pairs.retain(|pair| pair.key != key);
        Ok((before - pairs.len()) as u64)
    }

    fn scan(&self) -> kvs::engines::errors::Result<Documents<'_>> {
        let pairs = Arc::clone(&self.pairs);
        let mut next = 0;
        Ok(Box::new(std::iter::from_fn(move || {
            let pair = pairs.lock().unwrap().get(next).cloned();
            next += 1;
            pair.map(Ok::<_, EngineError>)
        })))
    }
}

#[test]
fn put_and_get() {
    let store = memory_store("put_and_get");
    store.put("key1", "value1").unwrap();
    assert_eq!(store.get("key1").unwrap(), "value1");
}

#[test]
fn last_write_wins() {
    let store = memory_store("last_write_wins");
    store.put("key1", "value1").unwrap();
    store.put("key1", "value2").unwrap();
    assert_eq!(store.get("key1").unwrap(), "value2");
    assert_eq!(store.engine().scan().unwrap().count(), 1);
}

#[test]
fn get_missing_key_is_not_found() {
    let store = memory_store("get_missing_key_is_not_found");
    let err = store.get("nope").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "key 'nope' not found");
}

#[test]
fn delete_then_get_is_not_found() {
    let store = memory_store("delete_then_get_is_not_found");
    store.put("key1", "value1").unwrap();
    store.delete("key1").unwrap();
    match store.get("key1") {
        Err(KvError::KeyNotFound { operation, key }) => {
            assert_eq!(operation, Operation::Get);
            assert_eq!(key, "key1");
        }
        other => panic!("expected KeyNotFound, got {:?}", other),
    }
}

#[test]
fn delete_missing_key_is_not_found() {
    let store = memory_store("delete_missing_key_is_not_found");
    match store.delete("ghost") {
        Err(KvError::KeyNotFound { operation, .. }) => assert_eq!(operation, Operation::Delete),
        other => panic!("expected KeyNotFound, got {:?}", other),
    }
}

#[test]
fn replicate_copies_with_suffix() {
    let a = memory_store("replicate_copies_with_suffix.a");
    let b = memory_store("replicate_copies_with_suffix.b");
    a.put("key1", "value1").unwrap();
    a.put("key2", "value2").unwrap();

    assert_eq!(a.replicate(&b).unwrap(), 2);

    assert_eq!(b.get("key1_new").unwrap(), "value1");
    assert_eq!(b.get("key2_new").unwrap(), "value2");
    assert!(b.get("key1").unwrap_err().is_not_found());
    // the source is left alone
    assert_eq!(a.get("key1").unwrap(), "value1");
    assert!(a.get("key1_new").unwrap_err().is_not_found());
}

#[test]
fn replicate_keeps_other_pairs_and_overwrites_collisions() {
    let a = memory_store("replicate_collisions.a");
    let b = memory_store("replicate_collisions.b");
    a.put("key1", "fresh").unwrap();
    b.put("key1_new", "stale").unwrap();
    b.put("untouched", "still here").unwrap();

    a.replicate(&b).unwrap();

    assert_eq!(b.get("key1_new").unwrap(), "fresh");
    assert_eq!(b.get("untouched").unwrap(), "still here");
}

#[test]
fn replicate_twice_is_harmless() {
    let a = memory_store("replicate_twice.a");
    let b = memory_store("replicate_twice.b");
    a.put("k", "v").unwrap();
    a.replicate(&b).unwrap();
    a.replicate(&b).unwrap();
    assert_eq!(b.engine().scan().unwrap().count(), 1);
    assert_eq!(b.get("k_new").unwrap(), "v");
}

#[test]
fn replicate_empty_source_leaves_target_alone() {
    let a = memory_store("replicate_empty.a");
    let b = memory_store("replicate_empty.b");
    b.put("existing", "1").unwrap();

    assert_eq!(a.replicate(&b).unwrap(), 0);

    let pairs: Vec<KeyValuePair> = b.engine().scan().unwrap().map(Result::unwrap).collect();
    assert_eq!(pairs, vec![KeyValuePair::new("existing", "1")]);
}

#[test]
fn replicate_into_the_same_namespace() {
    let config = StoreConfig {
        collection: "replicate_into_the_same_namespace".to_owned(),
        ..StoreConfig::default()
    };
    let a = KeyValueStore::with_engine(MemoryEngine::open(&config).unwrap(), config.clone());
    let b = KeyValueStore::with_engine(MemoryEngine::open(&config.replica()).unwrap(), config.clone());
    a.put("key1", "value1").unwrap();

    assert_eq!(a.replicate(&b).unwrap(), 1);

    // both handles see one collection
    assert_eq!(a.get("key1_new").unwrap(), "value1");
    assert_eq!(b.get("key1").unwrap(), "value1");
}

#[test]
fn replicate_uses_configured_suffix() {
    let config = StoreConfig {
        replica_suffix: "@copy".to_owned(),
        ..StoreConfig::default()
    };
    let a = KeyValueStore::with_engine(MemoryEngine::new("suffix.a"), config);
    let b = memory_store("suffix.b");
    a.put("k", "v").unwrap();
    a.replicate(&b).unwrap();
    assert_eq!(b.get("k@copy").unwrap(), "v");
}

#[test]
fn replicate_stops_at_first_bad_document() {
    let pairs = vec![
        KeyValuePair::new("a", "1"),
        KeyValuePair::new("b", "2"),
        KeyValuePair::new("c", "3"),
        KeyValuePair::new("d", "4"),
    ];
    let source = KeyValueStore::with_engine(FlakyEngine::new(pairs, 2), StoreConfig::default());
    let target = memory_store("replicate_stops_at_first_bad_document");

    match source.replicate(&target) {
        Err(KvError::Decode { operation, target, .. }) => {
            assert_eq!(operation, Operation::Replicate);
            assert_eq!(target, "flaky.pairs");
        }
        other => panic!("expected Decode, got {:?}", other),
    }
    // no rollback of what was already copied
    assert_eq!(target.get("a_new").unwrap(), "1");
    assert_eq!(target.get("b_new").unwrap(), "2");
    assert!(target.get("c_new").unwrap_err().is_not_found());
}

#[test]
fn replicate_with_expired_deadline_times_out() {
    let config = StoreConfig {
        replicate_timeout_ms: 0,
        ..StoreConfig::default()
    };
    let a = KeyValueStore::with_engine(MemoryEngine::new("deadline.a"), config);
    let b = memory_store("deadline.b");
    a.put("k", "v").unwrap();

    let err = a.replicate(&b).unwrap_err();
    assert!(err.is_timeout());
    assert!(b.get("k_new").unwrap_err().is_not_found());
}

#[test]
fn replicate_reports_target_failure() {
    let a = memory_store("target_failure.a");
    a.put("k", "v").unwrap();
    let b = KeyValueStore::with_engine(FlakyEngine::timing_out(), StoreConfig::default());

    let err = a.replicate(&b).unwrap_err();
    assert!(err.is_timeout());
    assert!(err
        .to_string()
        .starts_with("failed to replicate 'k' from target_failure.a: put of 'k_new' timed out"));
    match err {
        KvError::Replication { source, key, error } => {
            assert_eq!(source, "target_failure.a");
            assert_eq!(key, "k");
            match *error {
                KvError::Timeout {
                    operation, target, ..
                } => {
                    assert_eq!(operation, Operation::Put);
                    assert_eq!(target, "k_new");
                }
                other => panic!("expected Timeout, got {:?}", other),
            }
        }
        other => panic!("expected Replication, got {:?}", other),
    }
}

#[test]
fn replicate_in_place_skips_its_own_copies() {
    let engine = LiveEngine::default();
    let source = KeyValueStore::with_engine(engine.clone(), StoreConfig::default());
    let target = KeyValueStore::with_engine(engine, StoreConfig::default());
    source.put("a", "1").unwrap();
    source.put("b", "2").unwrap();

    assert_eq!(source.replicate(&target).unwrap(), 2);

    assert_eq!(target.get("a_new").unwrap(), "1");
    assert_eq!(target.get("b_new").unwrap(), "2");
    assert!(target.get("a_new_new").unwrap_err().is_not_found());
    assert!(target.get("b_new_new").unwrap_err().is_not_found());
    assert_eq!(source.get("a").unwrap(), "1");
}

#[test]
fn replicate_across_namespaces_copies_everything_seen() {
    let source = KeyValueStore::with_engine(LiveEngine::default(), StoreConfig::default());
    let target = memory_store("live_source.target");
    source.put("a", "1").unwrap();
    source.put("a_new", "old").unwrap();

    assert_eq!(source.replicate(&target).unwrap(), 2);

    assert_eq!(target.get("a_new").unwrap(), "1");
    assert_eq!(target.get("a_new_new").unwrap(), "old");
}

#[test]
fn engine_timeouts_carry_operation_and_key() {
    let store = KeyValueStore::with_engine(FlakyEngine::timing_out(), StoreConfig::default());

    let err = store.get("key1").unwrap_err();
    assert!(err.is_timeout());
    assert!(!err.is_not_found());
    assert!(err.to_string().starts_with("get of 'key1' timed out"));

    let err = store.put("key2", "v").unwrap_err();
    assert!(err.to_string().starts_with("put of 'key2' timed out"));

    let err = store.delete("key3").unwrap_err();
    assert!(err.is_timeout());
}

#[test]
fn failed_write_releases_the_lock() {
    let store = KeyValueStore::with_engine(FlakyEngine::timing_out(), StoreConfig::default());
    assert!(store.put("k", "v").is_err());
    // would block forever if the guard leaked
    assert!(store.delete("k").is_err());
    assert!(store.put("k", "v").is_err());
}

#[test]
fn concurrent_puts_all_land() {
    let store = Arc::new(memory_store("concurrent_puts_all_land"));
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    store
                        .put(&format!("key-{}-{}", t, i), &format!("{}", i))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(store.engine().scan().unwrap().count(), 400);
    assert_eq!(store.get("key-7-49").unwrap(), "49");
}

#[test]
fn closed_store_data_survives_reopen() {
    let config = StoreConfig {
        collection: "closed_store_data_survives_reopen".to_owned(),
        ..StoreConfig::default()
    };
    let store = KeyValueStore::with_engine(MemoryEngine::open(&config).unwrap(), config.clone());
    store.put("k", "v").unwrap();
    store.close();

    let reopened = KeyValueStore::with_engine(MemoryEngine::open(&config).unwrap(), config);
    assert_eq!(reopened.get("k").unwrap(), "v");
}
