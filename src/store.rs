//! Entity store and the per-event session giving handlers idempotent
//! get-or-create / save semantics.
//!
//! A [`Session`] buffers every write of one event and commits them as a single
//! [`sled::Batch`], so an abandoned event leaves no partial mutation behind.
//! Reads inside a session observe the session's own pending writes, which is
//! what makes two get-or-create calls for the same id within one event agree.

use crate::entity::Entity;
use crate::error::StoreError;
use std::collections::BTreeMap;
use std::sync::Arc;

fn entity_key<E: Entity>(id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(E::KIND.len() + 1 + id.len());
    key.extend_from_slice(E::KIND.as_bytes());
    key.push(b'/');
    key.extend_from_slice(id.as_bytes());
    key
}

fn encode_entity<E: Entity>(entity: &E) -> Result<Vec<u8>, StoreError> {
    minicbor::to_vec(entity).map_err(|e| StoreError::Encode {
        kind: E::KIND,
        reason: e.to_string(),
    })
}

fn decode_entity<E: Entity>(bytes: &[u8]) -> Result<E, StoreError> {
    minicbor::decode(bytes).map_err(|e| StoreError::Decode {
        kind: E::KIND,
        reason: e.to_string(),
    })
}

/// Keyed entity store over a sled database. Only the single processing thread
/// ever touches it; no internal locking is required.
pub struct MetricsStore {
    instance: Arc<sled::Db>,
}

impl MetricsStore {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }

    /// Load a committed entity directly, bypassing any session.
    pub fn load<E: Entity>(&self, id: &str) -> Result<Option<E>, StoreError> {
        match self.instance.get(entity_key::<E>(id))? {
            Some(bytes) => Ok(Some(decode_entity(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Open a unit of work for one event.
    pub fn session(&self) -> Session<'_> {
        Session {
            store: self,
            pending: BTreeMap::new(),
        }
    }

    /// Every committed key/value pair in key order. Replaying the same event
    /// prefix into a fresh store must export identical bytes.
    pub fn export(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let mut out = Vec::new();
        for pair in self.instance.iter() {
            let (k, v) = pair?;
            out.push((k.to_vec(), v.to_vec()));
        }
        Ok(out)
    }
}

/// Buffered writes for one event. Dropping the session without committing
/// discards everything, which is exactly the abandon-event semantics.
pub struct Session<'a> {
    store: &'a MetricsStore,
    /// key -> encoded entity, or `None` for a pending delete.
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl Session<'_> {
    pub fn get<E: Entity>(&self, id: &str) -> Result<Option<E>, StoreError> {
        let key = entity_key::<E>(id);
        if let Some(slot) = self.pending.get(&key) {
            return match slot {
                Some(bytes) => Ok(Some(decode_entity(bytes)?)),
                None => Ok(None),
            };
        }
        self.store.load(id)
    }

    pub fn contains<E: Entity>(&self, id: &str) -> Result<bool, StoreError> {
        let key = entity_key::<E>(id);
        if let Some(slot) = self.pending.get(&key) {
            return Ok(slot.is_some());
        }
        Ok(self.store.instance.contains_key(key)?)
    }

    /// Load the entity or construct a zeroed one via `factory`. The fresh
    /// instance is not persisted until it is explicitly `put`.
    pub fn get_or_create<E: Entity>(
        &self,
        id: &str,
        factory: impl FnOnce() -> E,
    ) -> Result<E, StoreError> {
        Ok(self.get(id)?.unwrap_or_else(factory))
    }

    /// Idempotent full overwrite of the record at the entity's id.
    pub fn put<E: Entity>(&mut self, entity: &E) -> Result<(), StoreError> {
        let bytes = encode_entity(entity)?;
        self.pending.insert(entity_key::<E>(entity.id()), Some(bytes));
        Ok(())
    }

    pub fn delete<E: Entity>(&mut self, id: &str) {
        self.pending.insert(entity_key::<E>(id), None);
    }

    /// Apply every pending write and delete atomically.
    pub fn commit(self) -> Result<(), StoreError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut batch = sled::Batch::default();
        for (key, slot) in self.pending {
            match slot {
                Some(bytes) => batch.insert(key, bytes),
                None => batch.remove(key),
            }
        }
        self.store.instance.apply_batch(batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Metadata;

    fn temp_store() -> (tempfile::TempDir, MetricsStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        (dir, MetricsStore::new(Arc::new(db)))
    }

    #[test]
    fn uncommitted_sessions_leave_no_trace() {
        let (_dir, store) = temp_store();

        {
            let mut session = store.session();
            session.put(&Metadata::new()).unwrap();
            // dropped without commit
        }
        assert!(store.load::<Metadata>(Metadata::ID).unwrap().is_none());
    }

    #[test]
    fn session_reads_observe_pending_writes() {
        let (_dir, store) = temp_store();
        let mut session = store.session();

        let mut meta = session.get_or_create(Metadata::ID, Metadata::new).unwrap();
        meta.issuers = 3;
        session.put(&meta).unwrap();

        let again: Metadata = session.get(Metadata::ID).unwrap().unwrap();
        assert_eq!(again.issuers, 3);
        assert!(session.contains::<Metadata>(Metadata::ID).unwrap());
    }

    #[test]
    fn commit_applies_writes_and_deletes_atomically() {
        let (_dir, store) = temp_store();

        let mut session = store.session();
        session.put(&Metadata::new()).unwrap();
        session.commit().unwrap();
        assert!(store.load::<Metadata>(Metadata::ID).unwrap().is_some());

        let mut session = store.session();
        session.delete::<Metadata>(Metadata::ID);
        assert!(!session.contains::<Metadata>(Metadata::ID).unwrap());
        session.commit().unwrap();
        assert!(store.load::<Metadata>(Metadata::ID).unwrap().is_none());
    }

    #[test]
    fn kind_prefixes_namespace_ids() {
        let (_dir, store) = temp_store();
        let mut session = store.session();
        session.put(&Metadata::new()).unwrap();
        session.commit().unwrap();

        // same id under a different kind is a different record
        assert!(store.load::<crate::entity::Issuer>(Metadata::ID).unwrap().is_none());
    }
}
