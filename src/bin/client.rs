use std::io;
use std::process::exit;

use log::{error, info};
use structopt::StructOpt;

use kvs::client_common::{ClientOpt, Engine};
use kvs::shell::Shell;
use kvs::{DocumentEngine, KeyValueStore, MemoryEngine, StoreConfig};

fn open_memory(config: &StoreConfig) -> kvs::Result<KeyValueStore<MemoryEngine>> {
    let engine = MemoryEngine::open(config).map_err(|error| kvs::KvError::Connection {
        address: config.namespace(),
        error,
    })?;
    Ok(KeyValueStore::with_engine(engine, config.clone()))
}

fn open_mongo(config: &StoreConfig) -> kvs::Result<KeyValueStore> {
    KeyValueStore::open(config.clone())
}

fn serve<E, F>(store: kvs::Result<KeyValueStore<E>>, open_replica: F) -> io::Result<()>
where
    E: DocumentEngine,
    F: FnMut(&StoreConfig) -> kvs::Result<KeyValueStore<E>>,
{
    let store = match store {
        Ok(store) => store,
        Err(err) => {
            println!("Failed to create KeyValueStore: {}", err);
            exit(1);
        }
    };
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut shell = Shell::new(store, stdin.lock(), stdout.lock());
    let result = shell.run(open_replica);
    shell.into_store().close();
    result
}

fn main() {
    let opt = ClientOpt::from_args();
    match kvs::config::log4rs::config(opt.log_level) {
        Ok(config) => {
            if let Err(err) = log4rs::init_config(config) {
                eprintln!("unable to init logger: {}", err);
            }
        }
        Err(err) => eprintln!("unable to configure logger: {}", err),
    }
    info!("config: {:?}", opt);

    let config = match opt.store_config() {
        Ok(config) => config,
        Err(err) => {
            println!("Failed to create KeyValueStore: {}", err);
            exit(1);
        }
    };
    let result = match opt.engine {
        Engine::Mongo => serve(open_mongo(&config), open_mongo),
        Engine::Memory => serve(open_memory(&config), open_memory),
    };
    if let Err(err) = result {
        error!(target: "app::error", "the shell stopped: {}", err);
        exit(1);
    }
}
