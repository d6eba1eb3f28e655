use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Instant;

use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;
use crate::engines::engine::DocumentEngine;
use crate::engines::errors::EngineError;
use crate::engines::mongo::MongoEngine;
use crate::errors::{KvError, Operation, Result};

/// One stored document.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
}

impl KeyValuePair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        KeyValuePair {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A key-value store backed by one collection of a document database.
///
/// `put` and `delete` hold the write lock for the whole database call,
/// so at most one of them runs against a store at a time.
/// `get` takes no lock.
/// Atomicity of a single write is left to the engine's upsert.
///
/// The store is `Sync` when the engine is, share it with `Arc` between threads.
pub struct KeyValueStore<E: DocumentEngine = MongoEngine> {
    engine: E,
    writer: Mutex<()>,
    config: StoreConfig,
}

impl KeyValueStore<MongoEngine> {
    /// connect to the MongoDB server described by `config`.
    ///
    /// # Error
    ///
    /// When no server answers within `config.connect_timeout()`,
    /// or the address is malformed, throw `Connection`.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let engine = MongoEngine::connect(&config).map_err(|error| {
            error!(target: "app::error", "failed to connect to {}: {}", config.address, error);
            KvError::Connection {
                address: config.address.clone(),
                error,
            }
        })?;
        Ok(KeyValueStore::with_engine(engine, config))
    }
}

impl<E: DocumentEngine> KeyValueStore<E> {
    /// make a store over an already connected engine.
    pub fn with_engine(engine: E, config: StoreConfig) -> Self {
        KeyValueStore {
            engine,
            writer: Mutex::new(()),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Put a value into the store, inserting the pair if the key is new.
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.writer.lock()?;
        self.engine
            .upsert(key, value)
            .map_err(|e| self.failure(Operation::Put, key, e))?;
        debug!("put '{}' into {}.", key, self.engine.namespace());
        Ok(())
    }

    /// get a value from the store.
    ///
    /// # Error
    ///
    /// when the key isn't present, will throw `KeyNotFound`;
    /// a failed lookup is a `Timeout`, `Transport` or `Decode` instead.
    pub fn get(&self, key: &str) -> Result<String> {
        match self.engine.find(key) {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(KvError::KeyNotFound {
                operation: Operation::Get,
                key: key.to_owned(),
            }),
            Err(e) => Err(self.failure(Operation::Get, key, e)),
        }
    }

    /// Remove a pair from the store.
    ///
    /// # Error
    ///
    /// when no document matched the key, will throw `KeyNotFound`.
    pub fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.writer.lock()?;
        let deleted = self
            .engine
            .delete(key)
            .map_err(|e| self.failure(Operation::Delete, key, e))?;
        if deleted == 0 {
            return Err(KvError::KeyNotFound {
                operation: Operation::Delete,
                key: key.to_owned(),
            });
        }
        debug!("deleted '{}' from {}.", key, self.engine.namespace());
        Ok(())
    }

    /// Copy every pair of this store into `target`, renaming each key by
    /// appending `replica_suffix`. Returns how many pairs were copied.
    ///
    /// This is a one-shot copy: the first failure stops it, and pairs copied
    /// before that stay in `target`. Running it again overwrites them.
    ///
    /// Opening the cursor is bounded by the operation timeout, each copy is a
    /// regular `put` with its own bound, and the whole pass must finish within
    /// `replicate_timeout`.
    ///
    /// When `target` is the same collection, copies written by this pass are
    /// never copied again even if the cursor comes across them.
    pub fn replicate<T: DocumentEngine>(&self, target: &KeyValueStore<T>) -> Result<usize> {
        let source = self.engine.namespace();
        let deadline = Instant::now() + self.config.replicate_timeout();
        let in_place = source == target.engine.namespace();
        let mut written = HashSet::new();
        info!("replicating {} into {}.", source, target.engine.namespace());

        let documents = self
            .engine
            .scan()
            .map_err(|e| self.failure(Operation::Replicate, &source, e))?;
        let mut copied = 0;
        for document in documents {
            if Instant::now() >= deadline {
                return Err(KvError::Timeout {
                    operation: Operation::Replicate,
                    target: source,
                    reason: format!(
                        "replication exceeded {:?} after copying {} pairs",
                        self.config.replicate_timeout(),
                        copied
                    ),
                });
            }
            let pair = document.map_err(|e| self.failure(Operation::Replicate, &source, e))?;
            if in_place && written.contains(&pair.key) {
                continue;
            }
            let new_key = format!("{}{}", pair.key, self.config.replica_suffix);
            target
                .put(&new_key, &pair.value)
                .map_err(|error| KvError::Replication {
                    source: source.clone(),
                    key: pair.key.clone(),
                    error: Box::new(error),
                })?;
            if in_place {
                written.insert(new_key);
            }
            copied += 1;
        }
        info!("replicated {} pairs from {}.", copied, source);
        Ok(copied)
    }

    /// close the connection of the store.
    pub fn close(self) {
        self.engine.shutdown();
    }

    fn failure(&self, operation: Operation, target: &str, error: EngineError) -> KvError {
        error!(target: "app::error", "{} of '{}' on {} failed: {}", operation, target, self.engine.namespace(), error);
        KvError::from_engine(operation, target, error)
    }
}
