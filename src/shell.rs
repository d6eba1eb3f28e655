use std::io::{self, BufRead, Write};
use std::str::FromStr;

use failure::Fail;
use log::{error, info};

use crate::config::StoreConfig;
use crate::engines::engine::DocumentEngine;
use crate::kv::KeyValueStore;

const PROMPT: &str = "Enter command (PUT/GET/DELETE/REPLICATE/EXIT): ";

/// A command typed at the prompt.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum Command {
    Put,
    Get,
    Delete,
    Replicate,
    Exit,
}

#[derive(Debug, Eq, PartialEq, Clone, Fail)]
#[fail(display = "No such command: {}", _0)]
pub struct NoSuchCommand(String);

/// Commands are case-insensitive and may be padded with whitespace.
///
/// ```rust
/// # use kvs::shell::Command;
/// assert_eq!(" rePlicate\n".parse::<Command>(), Ok(Command::Replicate));
/// assert!("LIST".parse::<Command>().is_err());
/// ```
impl FromStr for Command {
    type Err = NoSuchCommand;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PUT" => Ok(Command::Put),
            "GET" => Ok(Command::Get),
            "DELETE" => Ok(Command::Delete),
            "REPLICATE" => Ok(Command::Replicate),
            "EXIT" => Ok(Command::Exit),
            _ => Err(NoSuchCommand(s.trim().to_owned())),
        }
    }
}

impl AsRef<str> for Command {
    fn as_ref(&self) -> &str {
        match self {
            Command::Put => "PUT",
            Command::Get => "GET",
            Command::Delete => "DELETE",
            Command::Replicate => "REPLICATE",
            Command::Exit => "EXIT",
        }
    }
}

enum Flow {
    Continue,
    Exit,
}

/// The read-eval loop of `kvs-client`.
///
/// It reads one line at a time from `input` and writes prompts and results
/// to `output`. Failed operations are printed and the loop goes on;
/// only I/O errors on the streams themselves end it early.
pub struct Shell<E: DocumentEngine, R, W> {
    store: KeyValueStore<E>,
    input: R,
    output: W,
}

impl<E, R, W> Shell<E, R, W>
where
    E: DocumentEngine,
    R: BufRead,
    W: Write,
{
    pub fn new(store: KeyValueStore<E>, input: R, output: W) -> Self {
        Shell {
            store,
            input,
            output,
        }
    }

    /// give the store back, e.g. to close it.
    pub fn into_store(self) -> KeyValueStore<E> {
        self.store
    }

    /// Run until `EXIT` or the end of input.
    ///
    /// `open_replica` opens the target store of `REPLICATE`, it's called with
    /// `config.replica()` of the shell's store every time the command runs,
    /// and the target is closed once the copy is done.
    pub fn run<T, F>(&mut self, mut open_replica: F) -> io::Result<()>
    where
        T: DocumentEngine,
        F: FnMut(&StoreConfig) -> crate::Result<KeyValueStore<T>>,
    {
        writeln!(self.output, "Key-Value Distributed Store using MongoDB")?;
        writeln!(self.output, "---------------------------------------")?;
        loop {
            let line = match self.prompt(PROMPT)? {
                Some(line) => line,
                None => return self.leave(),
            };
            let command = match line.parse::<Command>() {
                Ok(command) => command,
                Err(err) => {
                    info!(target: "app::request", "{}", err);
                    writeln!(self.output, "Invalid command. Please try again.")?;
                    writeln!(self.output)?;
                    continue;
                }
            };
            let _mdc = log_mdc::insert_scoped("command", command.as_ref());
            info!(target: "app::request", "handling {}.", command.as_ref());
            match self.execute(command, &mut open_replica)? {
                Flow::Continue => writeln!(self.output)?,
                Flow::Exit => return Ok(()),
            }
        }
    }

    fn execute<T, F>(&mut self, command: Command, open_replica: &mut F) -> io::Result<Flow>
    where
        T: DocumentEngine,
        F: FnMut(&StoreConfig) -> crate::Result<KeyValueStore<T>>,
    {
        match command {
            Command::Put => {
                let key = match self.prompt("Enter key: ")? {
                    Some(key) => key,
                    None => return self.leave().map(|_| Flow::Exit),
                };
                let value = match self.prompt("Enter value: ")? {
                    Some(value) => value,
                    None => return self.leave().map(|_| Flow::Exit),
                };
                match self.store.put(&key, &value) {
                    Ok(()) => writeln!(self.output, "Key-value pair added successfully!")?,
                    Err(err) => writeln!(self.output, "Failed to put key-value pair: {}", err)?,
                }
            }
            Command::Get => {
                let key = match self.prompt("Enter key: ")? {
                    Some(key) => key,
                    None => return self.leave().map(|_| Flow::Exit),
                };
                match self.store.get(&key) {
                    Ok(value) => writeln!(self.output, "Value for key '{}': {}", key, value)?,
                    Err(err) => writeln!(self.output, "Failed to get value for key: {}", err)?,
                }
            }
            Command::Delete => {
                let key = match self.prompt("Enter key: ")? {
                    Some(key) => key,
                    None => return self.leave().map(|_| Flow::Exit),
                };
                match self.store.delete(&key) {
                    Ok(()) => writeln!(self.output, "Key-value pair deleted successfully!")?,
                    Err(err) => writeln!(self.output, "Failed to delete key-value pair: {}", err)?,
                }
            }
            Command::Replicate => {
                let replica = match open_replica(&self.store.config().replica()) {
                    Ok(replica) => replica,
                    Err(err) => {
                        error!(target: "app::error", "cannot open the replica: {}", err);
                        writeln!(self.output, "Failed to create new KeyValueStore: {}", err)?;
                        return Ok(Flow::Continue);
                    }
                };
                match self.store.replicate(&replica) {
                    Ok(copied) => writeln!(
                        self.output,
                        "Key-value pairs replicated successfully! ({} copied)",
                        copied
                    )?,
                    Err(err) => writeln!(self.output, "Failed to replicate key-value pairs: {}", err)?,
                }
                replica.close();
            }
            Command::Exit => {
                writeln!(self.output, "Exiting...")?;
                return Ok(Flow::Exit);
            }
        }
        Ok(Flow::Continue)
    }

    /// print `prompt` and read one line, trimmed. `None` at the end of input.
    fn prompt(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_owned()))
    }

    fn leave(&mut self) -> io::Result<()> {
        info!(target: "app::request", "input closed, leaving.");
        writeln!(self.output)?;
        writeln!(self.output, "Exiting...")?;
        self.output.flush()
    }
}
