use std::time::Duration;

use log::{debug, info};
use mongodb::bson::{self, doc, Document};
use mongodb::error::{Error, ErrorKind, WriteFailure};
use mongodb::options::{
    ClientOptions, FindOneAndDeleteOptions, FindOneAndUpdateOptions, FindOneOptions, FindOptions,
    IndexOptions, ServerAddress,
};
use mongodb::sync::{Client, Collection};
use mongodb::IndexModel;

use crate::config::StoreConfig;
use crate::kv::KeyValuePair;

use super::engine::{DocumentEngine, Documents};
use super::errors::{EngineError, Result};

/// server error code of `MaxTimeMSExpired`.
const MAX_TIME_EXPIRED: i32 = 50;
/// server error code of `WriteConcernFailed`, raised when `wtimeout` expires.
const WRITE_CONCERN_FAILED: i32 = 64;

/// The engine over a MongoDB collection, using the blocking driver.
///
/// Every call carries the operation timeout as a server-side limit (`maxTimeMS`),
/// and the client gives up selecting a server after the connect timeout.
/// `key` is backed by a unique index, so concurrent upserts of a new key
/// from several clients can't create two documents.
pub struct MongoEngine {
    client: Client,
    collection: Collection<Document>,
    namespace: String,
    operation_timeout: Duration,
}

impl From<Error> for EngineError {
    fn from(error: Error) -> Self {
        let reason = error.to_string();
        match error.kind.as_ref() {
            ErrorKind::ServerSelection { .. } => EngineError::Timeout { reason },
            ErrorKind::Io(io_error) if io_error.kind() == std::io::ErrorKind::TimedOut => {
                EngineError::Timeout { reason }
            }
            ErrorKind::Command(command) if command.code == MAX_TIME_EXPIRED => {
                EngineError::Timeout { reason }
            }
            ErrorKind::Write(WriteFailure::WriteConcernError(concern))
                if concern.code == WRITE_CONCERN_FAILED =>
            {
                EngineError::Timeout { reason }
            }
            ErrorKind::BsonDeserialization(_) => EngineError::Decode { reason },
            _ => EngineError::Transport { reason },
        }
    }
}

fn decode(document: Document) -> Result<KeyValuePair> {
    bson::from_document(document).map_err(|error| EngineError::Decode {
        reason: error.to_string(),
    })
}

impl MongoEngine {
    /// connect to the server in `config` and select its collection.
    ///
    /// The driver connects lazily, so this pings the server to make sure
    /// it's there, then makes sure the unique index on `key` exists.
    ///
    /// # Error
    ///
    /// If the address is malformed, no server answers within the connect
    /// timeout, or the index can't be built (e.g. the collection already holds
    /// duplicated keys), a `Connection` error will be thrown.
    pub fn connect(config: &StoreConfig) -> Result<Self> {
        let connection_error = |error: Error| EngineError::Connection {
            address: config.address.clone(),
            reason: error.to_string(),
        };
        let address = ServerAddress::parse(&config.address).map_err(connection_error)?;
        let options = ClientOptions::builder()
            .hosts(vec![address])
            .app_name(env!("CARGO_PKG_NAME").to_owned())
            .connect_timeout(config.connect_timeout())
            .server_selection_timeout(config.connect_timeout())
            .build();
        let client = Client::with_options(options).map_err(connection_error)?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .map_err(connection_error)?;
        let collection = client
            .database(&config.database)
            .collection::<Document>(&config.collection);
        let unique_key = IndexModel::builder()
            .keys(doc! { "key": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        collection
            .create_index(unique_key, None)
            .map_err(connection_error)?;
        info!("connected to {}, using {}.", config.address, config.namespace());
        Ok(MongoEngine {
            client,
            collection,
            namespace: config.namespace(),
            operation_timeout: config.operation_timeout(),
        })
    }
}

impl DocumentEngine for MongoEngine {
    fn namespace(&self) -> String {
        self.namespace.clone()
    }

    fn upsert(&self, key: &str, value: &str) -> Result<()> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .max_time(self.operation_timeout)
            .build();
        self.collection.find_one_and_update(
            doc! { "key": key },
            doc! { "$set": { "value": value } },
            options,
        )?;
        Ok(())
    }

    fn find(&self, key: &str) -> Result<Option<String>> {
        let options = FindOneOptions::builder()
            .max_time(self.operation_timeout)
            .build();
        match self.collection.find_one(doc! { "key": key }, options)? {
            Some(document) => Ok(Some(decode(document)?.value)),
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> Result<u64> {
        let options = FindOneAndDeleteOptions::builder()
            .max_time(self.operation_timeout)
            .projection(doc! { "_id": 1 })
            .build();
        let deleted = self
            .collection
            .find_one_and_delete(doc! { "key": key }, options)?;
        Ok(deleted.map_or(0, |_| 1))
    }

    /// The cursor stops at the newest `_id` seen when it's opened, in `_id`
    /// order, so documents inserted while iterating (e.g. by a replication
    /// into this same collection) are not returned.
    fn scan(&self) -> Result<Documents<'_>> {
        let newest = FindOneOptions::builder()
            .sort(doc! { "_id": -1 })
            .projection(doc! { "_id": 1 })
            .max_time(self.operation_timeout)
            .build();
        let last_id = match self
            .collection
            .find_one(None, newest)?
            .and_then(|document| document.get("_id").cloned())
        {
            Some(id) => id,
            None => return Ok(Box::new(std::iter::empty::<Result<KeyValuePair>>())),
        };
        let options = FindOptions::builder()
            .sort(doc! { "_id": 1 })
            .max_time(self.operation_timeout)
            .build();
        let cursor = self
            .collection
            .find(doc! { "_id": { "$lte": last_id } }, options)?;
        Ok(Box::new(cursor.map(|document| {
            document.map_err(EngineError::from).and_then(decode)
        })))
    }

    fn shutdown(self) {
        debug!("closing the connection to {}.", self.namespace);
        self.client.shutdown();
    }
}
