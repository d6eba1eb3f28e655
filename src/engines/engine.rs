use crate::kv::KeyValuePair;

use super::errors::Result;

/// A sequential cursor over every pair of a collection.
pub type Documents<'a> = Box<dyn Iterator<Item = Result<KeyValuePair>> + 'a>;

/// The external document database behind a `KeyValueStore`.
///
/// It's the four capabilities the store needs and nothing more:
/// an atomic upsert, a lookup that tells absence apart from failure,
/// a delete that reports how many documents it hit, and a cursor.
///
/// Implementations must be safe to call from several threads at once,
/// the store only serializes its own writes.
pub trait DocumentEngine: Send + Sync + 'static {
    /// `"<database>.<collection>"`, for logs and error messages.
    fn namespace(&self) -> String;

    /// set the value of `key`, inserting the pair if absent.
    /// This must be a single atomic call on the database side.
    fn upsert(&self, key: &str, value: &str) -> Result<()>;

    /// get the value of `key`.
    /// when the key not exists, return `None`.
    fn find(&self, key: &str) -> Result<Option<String>>;

    /// delete the document of `key`, returning the count of deleted documents.
    fn delete(&self, key: &str) -> Result<u64>;

    /// open a cursor over all pairs.
    /// Only opening is bounded by the engine, iterating is up to the caller.
    fn scan(&self) -> Result<Documents<'_>>;

    /// release the connection.
    fn shutdown(self)
    where
        Self: Sized,
    {
    }
}
