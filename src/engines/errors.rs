use failure::Fail;

/// The result type used by `DocumentEngine` implementations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// A failure reported by the external database, without knowing which
/// store operation triggered it. `KeyValueStore` adds that context.
#[derive(Debug, Fail)]
pub enum EngineError {
    #[fail(display = "failed to connect to {}: {}", address, reason)]
    Connection { address: String, reason: String },
    #[fail(display = "deadline exceeded: {}", reason)]
    Timeout { reason: String },
    #[fail(display = "database call failed: {}", reason)]
    Transport { reason: String },
    #[fail(display = "malformed document: {}", reason)]
    Decode { reason: String },
}
