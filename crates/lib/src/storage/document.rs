//! The store document and its on-disk envelope.
//!
//! On disk a document is a JSON object:
//!
//! ```json
//! { "schema_version": 3, "checksum": "<blake3 hex>", "collections": { "users": { "<id>": {...} } } }
//! ```
//!
//! Files without `schema_version` are legacy version-0 documents: either an
//! object whose keys are collections (lists or maps of records) or a bare list
//! of projects. [`decode`] checks structure and normalizes both shapes into a
//! [`RawDocument`] that the migration runner can upgrade.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::errors::StorageError;
use super::migration::CURRENT_SCHEMA_VERSION;
use crate::constants;

/// Records of one collection keyed by record id.
pub type Collection = BTreeMap<String, Value>;

/// The whole persisted state, in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub schema_version: u32,
    #[serde(default)]
    pub collections: BTreeMap<String, Collection>,
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

impl Document {
    /// An empty document at the current schema version.
    pub fn empty() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            collections: BTreeMap::new(),
        }
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    /// Mutable access to a collection, creating it when absent.
    pub fn collection_mut(&mut self, name: &str) -> &mut Collection {
        self.collections.entry(name.to_string()).or_default()
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<&Value> {
        self.collections.get(collection)?.get(id)
    }

    /// Deserialize a record into a typed view.
    pub fn get_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>, serde_json::Error> {
        self.get(collection, id)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
    }

    /// Insert or replace a record, returning the previous one.
    pub fn insert(&mut self, collection: &str, id: impl Into<String>, record: Value) -> Option<Value> {
        self.collection_mut(collection).insert(id.into(), record)
    }

    pub fn remove(&mut self, collection: &str, id: &str) -> Option<Value> {
        self.collections.get_mut(collection)?.remove(id)
    }

    /// Total number of records across all collections.
    pub fn record_count(&self) -> usize {
        self.collections.values().map(BTreeMap::len).sum()
    }

    /// Blake3 hex digest of the canonical collections JSON.
    pub fn checksum(&self) -> Result<String, serde_json::Error> {
        checksum_of(&self.collections)
    }
}

fn checksum_of<T: Serialize + ?Sized>(collections: &T) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(collections)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

#[derive(Serialize)]
struct Envelope<'a> {
    schema_version: u32,
    checksum: String,
    collections: &'a BTreeMap<String, Collection>,
}

/// Serialize a document with its checksum, ready to be written.
pub(crate) fn encode(document: &Document) -> Result<Vec<u8>, StorageError> {
    let envelope = Envelope {
        schema_version: document.schema_version,
        checksum: document
            .checksum()
            .map_err(|source| StorageError::Serialization { source })?,
        collections: &document.collections,
    };
    serde_json::to_vec_pretty(&envelope).map_err(|source| StorageError::Serialization { source })
}

/// Structural integrity failure of a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct IntegrityFailure {
    pub reason: String,
}

impl IntegrityFailure {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A structurally sound document that may still need migration.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub schema_version: u32,
    /// Object of collections; list-shaped collections only appear at version 0.
    pub collections: Value,
}

impl RawDocument {
    /// Convert migrated collections into a typed document.
    pub(crate) fn into_document(self) -> Result<Document, IntegrityFailure> {
        let collections = serde_json::from_value(self.collections)
            .map_err(|e| IntegrityFailure::new(format!("collections do not form record maps: {e}")))?;
        Ok(Document {
            schema_version: self.schema_version,
            collections,
        })
    }
}

/// Parse and structurally check a stored file.
pub fn decode(bytes: &[u8]) -> Result<RawDocument, IntegrityFailure> {
    let root: Value = serde_json::from_slice(bytes)
        .map_err(|e| IntegrityFailure::new(format!("not valid JSON: {e}")))?;

    match root {
        Value::Array(items) => {
            let mut collections = Map::new();
            collections.insert(constants::PROJECTS.to_string(), Value::Array(items));
            let collections = Value::Object(collections);
            check_collections(&collections, 0)?;
            Ok(RawDocument {
                schema_version: 0,
                collections,
            })
        }
        Value::Object(mut map) if map.contains_key("schema_version") => {
            let schema_version = map
                .get("schema_version")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| {
                    IntegrityFailure::new("schema marker is not a non-negative integer")
                })?;
            let collections = map
                .remove("collections")
                .unwrap_or_else(|| Value::Object(Map::new()));
            check_collections(&collections, schema_version)?;

            match map.get("checksum") {
                None | Some(Value::Null) => {}
                Some(Value::String(expected)) => {
                    let actual = checksum_of(&collections)
                        .map_err(|e| IntegrityFailure::new(format!("cannot hash collections: {e}")))?;
                    if &actual != expected {
                        return Err(IntegrityFailure::new("checksum mismatch"));
                    }
                }
                Some(_) => return Err(IntegrityFailure::new("checksum is not a string")),
            }

            Ok(RawDocument {
                schema_version,
                collections,
            })
        }
        Value::Object(map) => {
            let collections = Value::Object(map);
            check_collections(&collections, 0)?;
            Ok(RawDocument {
                schema_version: 0,
                collections,
            })
        }
        _ => Err(IntegrityFailure::new("root is not an object")),
    }
}

fn check_collections(collections: &Value, schema_version: u32) -> Result<(), IntegrityFailure> {
    let Some(collections) = collections.as_object() else {
        return Err(IntegrityFailure::new("collections is not a mapping"));
    };
    for (name, collection) in collections {
        let records: Box<dyn Iterator<Item = &Value>> = match collection {
            Value::Object(records) => Box::new(records.values()),
            Value::Array(records) if schema_version == 0 => Box::new(records.iter()),
            _ => {
                return Err(IntegrityFailure::new(format!(
                    "collection '{name}' is not a mapping"
                )));
            }
        };
        for record in records {
            if !record.is_object() {
                return Err(IntegrityFailure::new(format!(
                    "collection '{name}' holds a record that is not an object"
                )));
            }
        }
    }
    Ok(())
}
