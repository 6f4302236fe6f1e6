//! Settings store: owns the persisted binding table and broadcasts changes.

use log::{info, warn};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, Sender},
};
use thiserror::Error;

use crate::actions::Action;
use crate::bindings::{BindingError, BindingTable, SharedBindings, Slot};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("settings are not a JSON integer array: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Binding(#[from] BindingError),
}

#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    shared: SharedBindings,
    subscribers: Vec<Sender<BindingTable>>,
}

impl SettingsStore {
    /// Loads the table at `path`, writing the default table first if the
    /// file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if !path.exists() {
            write_atomic(&path, &BindingTable::default())?;
            info!("installed default bindings at {}", path.display());
        }
        let table = read_table(&path)?;
        Ok(Self {
            path,
            shared: SharedBindings::new(table),
            subscribers: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> BindingTable {
        self.shared.get()
    }

    /// Handle for readers such as the resolver.
    pub fn handle(&self) -> SharedBindings {
        self.shared.clone()
    }

    pub fn subscribe(&mut self) -> Receiver<BindingTable> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Persists `table` as a whole, then publishes it.
    pub fn replace(&mut self, table: BindingTable) -> Result<(), StoreError> {
        write_atomic(&self.path, &table)?;
        self.publish(table);
        Ok(())
    }

    pub fn set_slot(&mut self, slot: Slot, action: Option<Action>) -> Result<BindingTable, StoreError> {
        let next = self.current().with(slot, action);
        self.replace(next)?;
        Ok(next)
    }

    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.replace(BindingTable::default())
    }

    /// Current settings are left untouched when `text` is rejected.
    pub fn import_json(&mut self, text: &str) -> Result<BindingTable, StoreError> {
        let table = parse_table(text)?;
        self.replace(table)?;
        Ok(table)
    }

    pub fn export_json(&self) -> String {
        self.current().to_json()
    }

    /// Picks up edits made to the file by someone else. Returns whether the
    /// table changed; on a bad file the last good table stays active.
    pub fn reload(&mut self) -> Result<bool, StoreError> {
        let table = match read_table(&self.path) {
            Ok(t) => t,
            Err(e) => {
                warn!("keeping previous bindings: {e}");
                return Err(e);
            }
        };
        if table == self.current() {
            return Ok(false);
        }
        self.publish(table);
        Ok(true)
    }

    fn publish(&mut self, table: BindingTable) {
        self.shared.replace(table);
        self.subscribers.retain(|tx| tx.send(table).is_ok());
        info!("bindings updated: {}", table.to_json());
    }
}

pub fn parse_table(text: &str) -> Result<BindingTable, StoreError> {
    let values: Vec<i64> = serde_json::from_str(text.trim())?;
    Ok(BindingTable::from_values(&values)?)
}

fn read_table(path: &Path) -> Result<BindingTable, StoreError> {
    let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_table(&text)
}

fn write_atomic(path: &Path, table: &BindingTable) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(io_err)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, table.to_json() + "\n").map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)
}
