use std::fmt;
use std::sync::PoisonError;

use failure::Fail;

use crate::engines::errors::EngineError;

/// The result type used in the `KeyValueStore` context.
pub type Result<T> = std::result::Result<T, KvError>;

/// The store operation an error happened in.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum Operation {
    Put,
    Get,
    Delete,
    Replicate,
}

impl AsRef<str> for Operation {
    fn as_ref(&self) -> &str {
        match self {
            Operation::Put => "put",
            Operation::Get => "get",
            Operation::Delete => "delete",
            Operation::Replicate => "replicate",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// The Error type of the `KeyValueStore` context.
///
/// Every variant raised by an operation carries the operation and the key
/// (or, for the replicate cursor, the source namespace) it was working on.
#[derive(Debug, Fail)]
pub enum KvError {
    /// The store could not be constructed.
    #[fail(display = "cannot open store on {}: {}", address, error)]
    Connection {
        /// the `host:port` we tried.
        address: String,
        #[cause]
        /// the engine failure.
        error: EngineError,
    },
    /// A bounded call ran past its deadline.
    #[fail(display = "{} of '{}' timed out: {}", operation, target, reason)]
    Timeout {
        /// which operation.
        operation: Operation,
        /// the key, or the namespace being scanned.
        target: String,
        /// what the driver said.
        reason: String,
    },
    /// Get or Delete found no document for the key.
    #[fail(display = "key '{}' not found", key)]
    KeyNotFound {
        /// which operation.
        operation: Operation,
        /// the missing key.
        key: String,
    },
    /// Any other failure of the database call.
    #[fail(display = "{} of '{}' failed: {}", operation, target, reason)]
    Transport {
        /// which operation.
        operation: Operation,
        /// the key, or the namespace being scanned.
        target: String,
        /// what the driver said.
        reason: String,
    },
    /// A stored document is not a key-value pair.
    #[fail(display = "{} of '{}' met a malformed document: {}", operation, target, reason)]
    Decode {
        /// which operation.
        operation: Operation,
        /// the key, or the namespace being scanned.
        target: String,
        /// why decoding failed.
        reason: String,
    },
    /// A copy made by Replicate failed, `error` says how.
    #[fail(display = "failed to replicate '{}' from {}: {}", key, source, error)]
    Replication {
        /// the namespace being replicated.
        source: String,
        /// the source key whose copy failed.
        key: String,
        error: Box<KvError>,
    },
    /// The configuration file cannot be used.
    #[fail(display = "invalid config file {}: {}", path, reason)]
    InvalidConfig { path: String, reason: String },
    #[fail(display = "when operate with lock, something bad happens.")]
    ConcurrentError,
}

impl KvError {
    /// attach the operation context to an engine failure.
    pub(crate) fn from_engine(operation: Operation, target: &str, error: EngineError) -> Self {
        let target = target.to_owned();
        match error {
            EngineError::Timeout { reason } => KvError::Timeout {
                operation,
                target,
                reason,
            },
            EngineError::Decode { reason } => KvError::Decode {
                operation,
                target,
                reason,
            },
            EngineError::Transport { reason } => KvError::Transport {
                operation,
                target,
                reason,
            },
            // the driver lost the server between calls.
            error @ EngineError::Connection { .. } => KvError::Transport {
                operation,
                target,
                reason: error.to_string(),
            },
        }
    }

    /// whether the key was absent, as opposed to the call failing.
    pub fn is_not_found(&self) -> bool {
        match self {
            KvError::KeyNotFound { .. } => true,
            KvError::Replication { error, .. } => error.is_not_found(),
            _ => false,
        }
    }

    /// whether the call ran past its deadline.
    pub fn is_timeout(&self) -> bool {
        match self {
            KvError::Timeout { .. } => true,
            KvError::Replication { error, .. } => error.is_timeout(),
            _ => false,
        }
    }
}

impl<T> From<PoisonError<T>> for KvError {
    fn from(_: PoisonError<T>) -> Self {
        KvError::ConcurrentError
    }
}
