use std::path::PathBuf;
use std::str::FromStr;

use failure::Fail;
use log::LevelFilter;
use structopt::StructOpt;

use crate::config::StoreConfig;
use crate::errors::Result;

/// Without any flag, the client talks to the MongoDB on `localhost:27017`.
#[derive(Debug, StructOpt, Clone)]
#[structopt(name = "kvs-client",
about = env ! ("CARGO_PKG_DESCRIPTION"),
author = env ! ("CARGO_PKG_AUTHORS"),
version = env ! ("CARGO_PKG_VERSION"))]
pub struct ClientOpt {
    /// a JSON file holding the store config.
    #[structopt(long = "--config", parse(from_os_str))]
    pub config: Option<PathBuf>,
    /// `host:port` of the MongoDB server, overrides the config file.
    #[structopt(long = "--addr")]
    pub addr: Option<String>,
    /// the database name, overrides the config file.
    #[structopt(long = "--database")]
    pub database: Option<String>,
    /// the collection name, overrides the config file.
    #[structopt(long = "--collection")]
    pub collection: Option<String>,
    #[structopt(
    default_value = "mongo",
    parse(try_from_str = str::parse),
    long = "--engine"
    )]
    pub engine: Engine,
    #[structopt(
    default_value = "warn",
    parse(try_from_str = str::parse),
    long = "--log-level"
    )]
    pub log_level: LevelFilter,
}

impl ClientOpt {
    /// the config file (or the defaults) with the flags applied on top.
    pub fn store_config(&self) -> Result<StoreConfig> {
        let mut config = match &self.config {
            Some(path) => StoreConfig::from_file(path)?,
            None => StoreConfig::default(),
        };
        if let Some(addr) = &self.addr {
            config.address = addr.clone();
        }
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        if let Some(collection) = &self.collection {
            config.collection = collection.clone();
        }
        Ok(config)
    }
}

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum Engine {
    Mongo,
    Memory,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::Mongo
    }
}

#[derive(Debug, Eq, PartialEq, Clone, Fail)]
#[fail(display = "No such engine: {}", _0)]
pub struct NoSuchEngine(String);

impl FromStr for Engine {
    type Err = NoSuchEngine;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(Self::Mongo),
            "memory" => Ok(Self::Memory),
            _ => Err(NoSuchEngine(s.to_owned()))
        }
    }
}

impl AsRef<str> for Engine {
    fn as_ref(&self) -> &str {
        match self {
            Engine::Mongo => "mongo",
            Engine::Memory => "memory"
        }
    }
}
