//! Replicated state machine behind the atomic multimap.

use super::{
    ChangeKind, EncodedValues, MultimapBatch, MultimapChange, MultimapEntry, MultimapSnapshot, CHANGE_EVENT, ops,
};
use crate::error::CommandError;
use crate::primitive::{Commit, EventType, PrimitiveEvent, ReplicatedService, ServiceConfig, Versioned};
use bytes::Bytes;
use replikit_cluster::{Namespace, Serializer};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use tracing::trace;

/// Multimap state: encoded key to the ordered set of encoded values.
pub struct AtomicMultimapService {
    name: String,
    serializer: Serializer,
    entries: BTreeMap<Vec<u8>, EncodedValues>,
}

impl AtomicMultimapService {
    pub fn new(config: &ServiceConfig, namespace: Namespace) -> Self {
        Self {
            name: config.name().to_string(),
            serializer: Serializer::new(namespace),
            entries: BTreeMap::new(),
        }
    }

    fn decode<T: DeserializeOwned + 'static>(&self, commit: &Commit) -> Result<T, CommandError> {
        Ok(self.serializer.decode(commit.operation().args())?)
    }

    fn encode<T: Serialize + 'static>(&self, value: &T) -> Result<Bytes, CommandError> {
        Ok(self.serializer.encode(value)?)
    }

    fn publish(&self, commit: &mut Commit, kind: ChangeKind, key: &[u8], value: &[u8]) -> Result<(), CommandError> {
        let change = MultimapChange {
            kind,
            key: key.to_vec(),
            value: value.to_vec(),
        };
        commit.publish(PrimitiveEvent::new(EventType::new(CHANGE_EVENT), self.encode(&change)?));
        Ok(())
    }

    /// Insert values under `key`, publishing one INSERT per new value.
    fn insert(&mut self, commit: &mut Commit, key: Vec<u8>, values: Vec<Vec<u8>>) -> Result<bool, CommandError> {
        let mut inserted = Vec::new();
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Versioned::new(Vec::new(), commit.index(), commit.timestamp()));
        for value in values {
            if !entry.value.contains(&value) {
                entry.value.push(value.clone());
                inserted.push(value);
            }
        }
        if inserted.is_empty() {
            if entry.value.is_empty() {
                self.entries.remove(&key);
            }
            return Ok(false);
        }
        entry.version = commit.index();
        entry.creation_time = commit.timestamp();
        for value in &inserted {
            self.publish(commit, ChangeKind::Insert, &key, value)?;
        }
        Ok(true)
    }

    fn remove_value(&mut self, commit: &mut Commit, entry: MultimapEntry) -> Result<bool, CommandError> {
        let Some(values) = self.entries.get_mut(&entry.key) else {
            return Ok(false);
        };
        let Some(position) = values.value.iter().position(|v| *v == entry.value) else {
            return Ok(false);
        };
        values.value.remove(position);
        values.version = commit.index();
        values.creation_time = commit.timestamp();
        if values.value.is_empty() {
            self.entries.remove(&entry.key);
        }
        self.publish(commit, ChangeKind::Remove, &entry.key, &entry.value)?;
        Ok(true)
    }

    fn remove_key(&mut self, commit: &mut Commit, key: &[u8]) -> Result<EncodedValues, CommandError> {
        let Some(removed) = self.entries.remove(key) else {
            return Ok(Versioned::new(Vec::new(), 0, 0));
        };
        for value in &removed.value {
            self.publish(commit, ChangeKind::Remove, key, value)?;
        }
        Ok(removed)
    }

    fn size(&self) -> u64 {
        self.entries.values().map(|values| values.value.len() as u64).sum()
    }
}

impl ReplicatedService for AtomicMultimapService {
    fn apply(&mut self, commit: &mut Commit) -> Result<Bytes, CommandError> {
        trace!(
            primitive = %self.name,
            index = commit.index(),
            operation = %commit.operation().id(),
            "applying commit"
        );
        match commit.operation().id().as_str() {
            ops::PUT => {
                let entry: MultimapEntry = self.decode(commit)?;
                let changed = self.insert(commit, entry.key, vec![entry.value])?;
                self.encode(&changed)
            }
            ops::PUT_ALL => {
                let batch: MultimapBatch = self.decode(commit)?;
                let changed = self.insert(commit, batch.key, batch.values)?;
                self.encode(&changed)
            }
            ops::GET => {
                let key: Vec<u8> = self.decode(commit)?;
                let values = self
                    .entries
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| Versioned::new(Vec::new(), 0, 0));
                self.encode(&values)
            }
            ops::REMOVE => {
                let entry: MultimapEntry = self.decode(commit)?;
                let changed = self.remove_value(commit, entry)?;
                self.encode(&changed)
            }
            ops::REMOVE_ALL => {
                let key: Vec<u8> = self.decode(commit)?;
                let removed = self.remove_key(commit, &key)?;
                self.encode(&removed)
            }
            ops::CONTAINS_KEY => {
                let key: Vec<u8> = self.decode(commit)?;
                self.encode(&self.entries.contains_key(&key))
            }
            ops::SIZE => self.encode(&self.size()),
            ops::CLEAR => {
                let keys: Vec<Vec<u8>> = self.entries.keys().cloned().collect();
                for key in keys {
                    self.remove_key(commit, &key)?;
                }
                self.encode(&())
            }
            other => Err(CommandError(format!("unknown operation: {other}"))),
        }
    }

    fn snapshot(&self) -> Result<Bytes, CommandError> {
        let snapshot = MultimapSnapshot {
            entries: self
                .entries
                .iter()
                .map(|(key, values)| (key.clone(), values.clone()))
                .collect(),
        };
        self.encode(&snapshot)
    }

    fn restore(&mut self, snapshot: &[u8]) -> Result<(), CommandError> {
        let snapshot: MultimapSnapshot = self.serializer.decode(snapshot)?;
        self.entries = snapshot.entries.into_iter().collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multimap::AtomicMultimapType;
    use crate::primitive::{OperationId, PrimitiveOperation, PrimitiveType, SessionId};

    struct Harness {
        service: AtomicMultimapService,
        serializer: Serializer,
        index: u64,
    }

    impl Harness {
        fn new() -> Self {
            let namespace = AtomicMultimapType.namespace();
            Self {
                service: AtomicMultimapService::new(&ServiceConfig::new("test"), namespace.clone()),
                serializer: Serializer::new(namespace),
                index: 0,
            }
        }

        fn apply<A: Serialize + 'static, R: DeserializeOwned + 'static>(
            &mut self,
            op: &str,
            args: &A,
        ) -> (R, Vec<MultimapChange>) {
            self.index += 1;
            let operation = PrimitiveOperation::new(OperationId::new(op), self.serializer.encode(args).unwrap());
            let mut commit = Commit::new(self.index, SessionId::new(1), operation, 1_000 + self.index);
            let result = self.service.apply(&mut commit).unwrap();
            let events = commit
                .into_events()
                .iter()
                .map(|event| self.serializer.decode::<MultimapChange>(event.payload()).unwrap())
                .collect();
            (self.serializer.decode(&result).unwrap(), events)
        }

        fn put(&mut self, key: &str, value: &str) -> (bool, Vec<MultimapChange>) {
            let entry = MultimapEntry {
                key: key.as_bytes().to_vec(),
                value: value.as_bytes().to_vec(),
            };
            self.apply(ops::PUT, &entry)
        }

        fn get(&mut self, key: &str) -> EncodedValues {
            self.apply(ops::GET, &key.as_bytes().to_vec()).0
        }
    }

    #[test]
    fn put_is_set_like_and_versioned() {
        let mut harness = Harness::new();
        let (added, events) = harness.put("k", "v1");
        assert!(added);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeKind::Insert);

        let (added, events) = harness.put("k", "v1");
        assert!(!added);
        assert!(events.is_empty());

        harness.put("k", "v2");
        let values = harness.get("k");
        assert_eq!(values.value, vec![b"v1".to_vec(), b"v2".to_vec()]);
        assert_eq!(values.version, 3);
        assert_eq!(values.creation_time, 1_003);
    }

    #[test]
    fn absent_key_reads_as_empty_version_zero() {
        let mut harness = Harness::new();
        let values = harness.get("missing");
        assert!(values.value.is_empty());
        assert_eq!(values.version, 0);
    }

    #[test]
    fn remove_and_remove_all_publish_removals() {
        let mut harness = Harness::new();
        let batch = MultimapBatch {
            key: b"k".to_vec(),
            values: vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()],
        };
        let (added, events): (bool, _) = harness.apply(ops::PUT_ALL, &batch);
        assert!(added);
        assert_eq!(events.len(), 3);

        let entry = MultimapEntry {
            key: b"k".to_vec(),
            value: b"b".to_vec(),
        };
        let (removed, events): (bool, _) = harness.apply(ops::REMOVE, &entry);
        assert!(removed);
        assert_eq!(events[0].kind, ChangeKind::Remove);

        let (size, _): (u64, _) = harness.apply(ops::SIZE, &());
        assert_eq!(size, 2);

        let (previous, events): (EncodedValues, _) = harness.apply(ops::REMOVE_ALL, &b"k".to_vec());
        assert_eq!(previous.value, vec![b"a".to_vec(), b"c".to_vec()]);
        assert_eq!(events.len(), 2);

        let (contains, _): (bool, _) = harness.apply(ops::CONTAINS_KEY, &b"k".to_vec());
        assert!(!contains);
    }

    #[test]
    fn snapshot_restores_state() {
        let mut harness = Harness::new();
        harness.put("a", "1");
        harness.put("b", "2");
        let snapshot = harness.service.snapshot().unwrap();

        let mut restored = Harness::new();
        restored.service.restore(&snapshot).unwrap();
        assert_eq!(restored.get("a").value, vec![b"1".to_vec()]);
        assert_eq!(restored.get("b").version, 2);
    }

    #[test]
    fn unknown_operation_is_a_command_failure() {
        let mut harness = Harness::new();
        let operation = PrimitiveOperation::empty(OperationId::new("bogus"));
        let mut commit = Commit::new(1, SessionId::new(1), operation, 0);
        assert!(harness.service.apply(&mut commit).is_err());
    }
}
