use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{KvError, Result};

/// the log4rs configuration.
pub mod log4rs;

/// Where a `KeyValueStore` connects to, and how long it waits.
///
/// The defaults are the values the client always used:
/// `localhost:27017`, database `distributed_kv_store`,
/// collection `key_value_pairs`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `host:port` of the MongoDB server.
    pub address: String,
    /// the database holding the pairs.
    pub database: String,
    /// the collection holding the pairs, one document per key.
    pub collection: String,
    /// the collection a REPLICATE target opens, `None` for the same one.
    pub replica_collection: Option<String>,
    /// appended to every key copied by REPLICATE.
    pub replica_suffix: String,
    /// bound on reaching the server, both at startup and when picking a
    /// server for each call.
    pub connect_timeout_ms: u64,
    /// server-side bound on each Put, Get and Delete, and on the replicate cursor.
    pub operation_timeout_ms: u64,
    /// deadline of a whole REPLICATE pass.
    pub replicate_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            address: "localhost:27017".to_owned(),
            database: "distributed_kv_store".to_owned(),
            collection: "key_value_pairs".to_owned(),
            replica_collection: None,
            replica_suffix: "_new".to_owned(),
            connect_timeout_ms: 10_000,
            operation_timeout_ms: 5_000,
            replicate_timeout_ms: 60_000,
        }
    }
}

impl StoreConfig {
    /// load a config from a JSON file. Absent fields keep their defaults.
    ///
    /// # Error
    ///
    /// When the file can't be opened or isn't a valid config, throw `InvalidConfig`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let invalid = |reason: String| KvError::InvalidConfig {
            path: path.display().to_string(),
            reason,
        };
        let file = File::open(path).map_err(|e| invalid(e.to_string()))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| invalid(e.to_string()))
    }

    /// `"<database>.<collection>"`.
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }

    /// the config a REPLICATE target is opened with.
    pub fn replica(&self) -> StoreConfig {
        let mut replica = self.clone();
        if let Some(collection) = &self.replica_collection {
            replica.collection = collection.clone();
        }
        replica
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn replicate_timeout(&self) -> Duration {
        Duration::from_millis(self.replicate_timeout_ms)
    }
}
