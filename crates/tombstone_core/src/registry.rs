//! Record type registry.
//!
//! Record types are registered once during setup and looked up by name
//! afterwards. Entries are shared as `Arc<RecordType<R>>` and never mutated.

use crate::model::record_type::RecordType;
use log::info;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Registration/lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateRecordType(String),
    RecordTypeNotFound(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateRecordType(name) => {
                write!(f, "record type already registered: {name}")
            }
            Self::RecordTypeNotFound(name) => write!(f, "record type not found: {name}"),
        }
    }
}

impl Error for RegistryError {}

/// In-process registry of record types sharing one record representation.
#[derive(Debug)]
pub struct RecordTypeRegistry<R> {
    entries: BTreeMap<String, Arc<RecordType<R>>>,
}

impl<R> Default for RecordTypeRegistry<R> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<R> RecordTypeRegistry<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one record type and returns the shared handle.
    pub fn register(
        &mut self,
        record_type: RecordType<R>,
    ) -> Result<Arc<RecordType<R>>, RegistryError> {
        let name = record_type.name().to_string();
        if self.entries.contains_key(name.as_str()) {
            return Err(RegistryError::DuplicateRecordType(name));
        }

        let config = record_type.config();
        info!(
            "event=record_type_register module=registry status=ok record_type={} marker_column={} visibility={:?} hooked_writes={}",
            name,
            config.marker_column(),
            config.default_visibility(),
            config.hooked_writes()
        );

        let entry = Arc::new(record_type);
        self.entries.insert(name, Arc::clone(&entry));
        Ok(entry)
    }

    pub fn get(&self, name: &str) -> Option<Arc<RecordType<R>>> {
        self.entries.get(name.trim()).cloned()
    }

    /// Like [`get`](Self::get) but reports unknown names as an error.
    pub fn require(&self, name: &str) -> Result<Arc<RecordType<R>>, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::RecordTypeNotFound(name.trim().to_string()))
    }

    /// Returns sorted record type names.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
