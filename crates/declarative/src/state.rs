//! State store contract and in-memory implementation
//!
//! The store maps resource identifiers to their last-known provisioned
//! attributes. It is passed explicitly to the planner and executor; every
//! write replaces a whole record under a lock, so readers never observe a
//! partially-written attribute mapping.

use crate::error::{Error, Result};
use crate::resource::ResourceKind;
use crate::types::ResourceStatus;
use crate::value::{Attributes, Reference, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Persisted outcome for one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub id: String,
    pub kind: ResourceKind,
    /// Attributes as declared when last applied (references unresolved)
    #[serde(default)]
    pub config: Attributes,
    /// Resolved inputs merged with provider-assigned outputs
    #[serde(default)]
    pub attributes: Attributes,
    /// Dependencies at the time of the last apply, used to order destroys
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub status: ResourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl StateRecord {
    pub fn new(id: impl Into<String>, kind: ResourceKind, status: ResourceStatus) -> Self {
        Self {
            id: id.into(),
            kind,
            config: Attributes::new(),
            attributes: Attributes::new(),
            depends_on: Vec::new(),
            status,
            error: None,
            updated_at: Utc::now(),
        }
    }

    /// Look up a resolved attribute
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// Storage for state records
pub trait StateStore: Send + Sync {
    /// Get the record for a resource, if any
    fn get(&self, id: &str) -> Result<Option<StateRecord>>;

    /// Insert or replace the record for a resource
    fn put(&self, id: &str, record: StateRecord) -> Result<()>;

    /// Forget a resource
    fn remove(&self, id: &str) -> Result<()>;

    /// Full mapping, ordered by identifier
    fn snapshot(&self) -> Result<BTreeMap<String, StateRecord>>;

    /// Resolve a reference against recorded attributes
    fn lookup(&self, reference: &Reference) -> Result<Option<Value>> {
        Ok(self
            .get(&reference.resource)?
            .and_then(|record| record.attributes.get(&reference.attribute).cloned()))
    }
}

/// In-memory state store
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    records: RwLock<BTreeMap<String, StateRecord>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from existing records
    pub fn from_records(records: BTreeMap<String, StateRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, StateRecord>> {
        match self.records.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, StateRecord>> {
        match self.records.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, id: &str) -> Result<Option<StateRecord>> {
        Ok(self.read().get(id).cloned())
    }

    fn put(&self, id: &str, record: StateRecord) -> Result<()> {
        if record.id != id {
            return Err(Error::State(format!(
                "record for `{}` stored under `{id}`",
                record.id
            )));
        }
        self.write().insert(id.to_string(), record);
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<()> {
        self.write().remove(id);
        Ok(())
    }

    fn snapshot(&self) -> Result<BTreeMap<String, StateRecord>> {
        Ok(self.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_remove() {
        let store = MemoryStateStore::new();
        let mut record = StateRecord::new("bucket", ResourceKind::Bucket, ResourceStatus::Applied);
        record.attributes.insert("arn".into(), Value::from("arn:local:bucket:::records"));

        store.put("bucket", record.clone()).unwrap();
        assert_eq!(store.get("bucket").unwrap(), Some(record));
        assert_eq!(store.len(), 1);

        store.remove("bucket").unwrap();
        assert!(store.get("bucket").unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_put_rejects_mismatched_id() {
        let store = MemoryStateStore::new();
        let record = StateRecord::new("bucket", ResourceKind::Bucket, ResourceStatus::Applied);
        assert!(matches!(store.put("role", record), Err(Error::State(_))));
    }

    #[test]
    fn test_lookup_reads_recorded_attribute() {
        let store = MemoryStateStore::new();
        let mut record = StateRecord::new("role", ResourceKind::Role, ResourceStatus::Applied);
        record.attributes.insert("arn".into(), Value::from("arn:local:role:::exec"));
        store.put("role", record).unwrap();

        assert_eq!(
            store.lookup(&Reference::new("role", "arn")).unwrap(),
            Some(Value::from("arn:local:role:::exec"))
        );
        assert_eq!(store.lookup(&Reference::new("role", "id")).unwrap(), None);
        assert_eq!(store.lookup(&Reference::new("bucket", "arn")).unwrap(), None);
    }

    #[test]
    fn test_snapshot_is_ordered_by_id() {
        let store = MemoryStateStore::new();
        for id in ["role", "bucket", "function"] {
            store
                .put(id, StateRecord::new(id, ResourceKind::Role, ResourceStatus::Applied))
                .unwrap();
        }
        let ids: Vec<String> = store.snapshot().unwrap().into_keys().collect();
        assert_eq!(ids, vec!["bucket", "function", "role"]);
    }
}
