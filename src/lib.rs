pub use config::StoreConfig;
pub use engines::engine::DocumentEngine;
pub use engines::errors::EngineError;
pub use engines::memory::MemoryEngine;
pub use engines::mongo::MongoEngine;
pub use errors::{KvError, Operation, Result};
pub use kv::{KeyValuePair, KeyValueStore};

/// Command-line options of `kvs-client`.
pub mod client_common;
/// Store configuration and logging.
pub mod config;
/// About the document database abstract.
pub mod engines;
/// the error type.
pub mod errors;
/// the store.
pub mod kv;
/// The interactive shell.
pub mod shell;
