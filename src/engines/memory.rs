use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use lazy_static::lazy_static;

use crate::config::StoreConfig;
use crate::kv::KeyValuePair;

use super::engine::{DocumentEngine, Documents};
use super::errors::{EngineError, Result};

type Collection = Arc<DashMap<String, String>>;

lazy_static! {
    static ref COLLECTIONS: Mutex<HashMap<String, Collection>> = Mutex::new(HashMap::new());
}

#[derive(Clone)]
/// An engine that keeps the collection in the process.
///
/// Engines opened by `MemoryEngine::open` with the same namespace see the same
/// pairs, the way two clients of one server see one collection.
/// It's cheap to `Clone`, clones share the pairs.
pub struct MemoryEngine {
    pairs: Collection,
    namespace: String,
}

impl MemoryEngine {
    /// create an engine with a fresh collection nobody else can see.
    pub fn new(namespace: impl Into<String>) -> Self {
        MemoryEngine {
            pairs: Arc::new(DashMap::new()),
            namespace: namespace.into(),
        }
    }

    /// open the process-wide collection of `config.namespace()`.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let namespace = config.namespace();
        let mut collections = COLLECTIONS.lock().map_err(|_| EngineError::Connection {
            address: namespace.clone(),
            reason: "the collection registry is poisoned".to_owned(),
        })?;
        let pairs = collections
            .entry(namespace.clone())
            .or_insert_with(|| Arc::new(DashMap::new()))
            .clone();
        Ok(MemoryEngine { pairs, namespace })
    }
}

impl DocumentEngine for MemoryEngine {
    fn namespace(&self) -> String {
        self.namespace.clone()
    }

    fn upsert(&self, key: &str, value: &str) -> Result<()> {
        self.pairs.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn find(&self, key: &str) -> Result<Option<String>> {
        Ok(self.pairs.get(key).map(|entry| entry.value().clone()))
    }

    fn delete(&self, key: &str) -> Result<u64> {
        Ok(self.pairs.remove(key).map_or(0, |_| 1))
    }

    /// The cursor walks a snapshot sorted by key,
    /// writes made while iterating are not observed.
    fn scan(&self) -> Result<Documents<'_>> {
        let mut snapshot: Vec<KeyValuePair> = self
            .pairs
            .iter()
            .map(|entry| KeyValuePair::new(entry.key().clone(), entry.value().clone()))
            .collect();
        snapshot.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(Box::new(snapshot.into_iter().map(Ok::<_, EngineError>)))
    }
}
