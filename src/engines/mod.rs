/// the engine abstraction.
pub mod engine;
/// the error type.
pub mod errors;
/// the in-process engine.
pub mod memory;
/// the MongoDB engine implementation (default).
pub mod mongo;
