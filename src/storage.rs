use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::models::Entities;

/// Loads and saves the whole entity snapshot.
pub trait Persistence {
    fn load(&self) -> Result<Entities, StorageError>;
    fn save(&mut self, entities: &Entities) -> Result<(), StorageError>;
}

/// Pretty-printed JSON file holding all four collections.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStorage { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io { path: self.path.clone(), source }
    }
}

impl Persistence for JsonFileStorage {
    /// A missing file is an empty snapshot, not an error.
    fn load(&self) -> Result<Entities, StorageError> {
        let mut f = match OpenOptions::new().read(true).open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entities::default()),
            Err(e) => return Err(self.io_error(e)),
        };
        let mut s = String::new();
        f.read_to_string(&mut s).map_err(|e| self.io_error(e))?;
        if s.trim().is_empty() {
            return Ok(Entities::default());
        }
        Ok(serde_json::from_str(&s)?)
    }

    /// Overwrites the file, creating parent directories as needed.
    fn save(&mut self, entities: &Entities) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }
        let s = serde_json::to_string_pretty(entities)?;
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        f.write_all(s.as_bytes()).map_err(|e| self.io_error(e))?;
        Ok(())
    }
}

/// Keeps the last saved snapshot in memory and counts writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    initial: Entities,
    last_saved: Option<Entities>,
    writes: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage::default()
    }

    /// Storage whose first `load` returns `entities`.
    pub fn with_entities(entities: Entities) -> Self {
        MemoryStorage { initial: entities, ..MemoryStorage::default() }
    }

    pub fn last_saved(&self) -> Option<&Entities> {
        self.last_saved.as_ref()
    }

    /// Number of successful `save` calls.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl Persistence for MemoryStorage {
    fn load(&self) -> Result<Entities, StorageError> {
        Ok(self.last_saved.clone().unwrap_or_else(|| self.initial.clone()))
    }

    fn save(&mut self, entities: &Entities) -> Result<(), StorageError> {
        self.last_saved = Some(entities.clone());
        self.writes += 1;
        Ok(())
    }
}
