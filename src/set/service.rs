//! Replicated state machine behind the atomic set.

use super::{CHANGE_EVENT, ChangeKind, SetChange, SetEntry, SetSnapshot, ops};
use crate::error::CommandError;
use crate::primitive::{Commit, EventType, PrimitiveEvent, ReplicatedService, ServiceConfig};
use bytes::Bytes;
use replikit_cluster::{Namespace, Serializer};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::ops::Bound;
use tracing::trace;

/// Set state: sort key to the element's encoding.
pub struct AtomicSetService {
    name: String,
    serializer: Serializer,
    elements: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl AtomicSetService {
    pub fn new(config: &ServiceConfig, namespace: Namespace) -> Self {
        Self {
            name: config.name().to_string(),
            serializer: Serializer::new(namespace),
            elements: BTreeMap::new(),
        }
    }

    fn decode<T: DeserializeOwned + 'static>(&self, commit: &Commit) -> Result<T, CommandError> {
        Ok(self.serializer.decode(commit.operation().args())?)
    }

    fn encode<T: Serialize + 'static>(&self, value: &T) -> Result<Bytes, CommandError> {
        Ok(self.serializer.encode(value)?)
    }

    fn publish(&self, commit: &mut Commit, kind: ChangeKind, value: &[u8]) -> Result<(), CommandError> {
        let change = SetChange {
            kind,
            value: value.to_vec(),
        };
        commit.publish(PrimitiveEvent::new(EventType::new(CHANGE_EVENT), self.encode(&change)?));
        Ok(())
    }

    fn insert(&mut self, commit: &mut Commit, entry: SetEntry) -> Result<bool, CommandError> {
        if self.elements.contains_key(&entry.key) {
            return Ok(false);
        }
        self.publish(commit, ChangeKind::Insert, &entry.value)?;
        self.elements.insert(entry.key, entry.value);
        Ok(true)
    }

    fn remove(&mut self, commit: &mut Commit, key: &[u8]) -> Result<Option<Vec<u8>>, CommandError> {
        let Some(value) = self.elements.remove(key) else {
            return Ok(None);
        };
        self.publish(commit, ChangeKind::Remove, &value)?;
        Ok(Some(value))
    }

    /// Encoding of the nearest element on one side of `key`.
    fn navigate(&self, key: &[u8], below: bool, inclusive: bool) -> Option<Vec<u8>> {
        let bound = if inclusive {
            Bound::Included(key)
        } else {
            Bound::Excluded(key)
        };
        let found = if below {
            self.elements.range::<[u8], _>((Bound::Unbounded, bound)).next_back()
        } else {
            self.elements.range::<[u8], _>((bound, Bound::Unbounded)).next()
        };
        found.map(|(_, value)| value.clone())
    }

    fn poll(&mut self, commit: &mut Commit, last: bool) -> Result<Option<Vec<u8>>, CommandError> {
        let entry = if last {
            self.elements.pop_last()
        } else {
            self.elements.pop_first()
        };
        let Some((_, value)) = entry else {
            return Ok(None);
        };
        self.publish(commit, ChangeKind::Remove, &value)?;
        Ok(Some(value))
    }
}

impl ReplicatedService for AtomicSetService {
    fn apply(&mut self, commit: &mut Commit) -> Result<Bytes, CommandError> {
        trace!(
            primitive = %self.name,
            index = commit.index(),
            operation = %commit.operation().id(),
            "applying commit"
        );
        match commit.operation().id().as_str() {
            ops::ADD => {
                let entry: SetEntry = self.decode(commit)?;
                let added = self.insert(commit, entry)?;
                self.encode(&added)
            }
            ops::ADD_ALL => {
                let entries: Vec<SetEntry> = self.decode(commit)?;
                let mut added = false;
                for entry in entries {
                    added |= self.insert(commit, entry)?;
                }
                self.encode(&added)
            }
            ops::REMOVE => {
                let key: Vec<u8> = self.decode(commit)?;
                let removed = self.remove(commit, &key)?;
                self.encode(&removed.is_some())
            }
            ops::CONTAINS => {
                let key: Vec<u8> = self.decode(commit)?;
                self.encode(&self.elements.contains_key(&key))
            }
            ops::SIZE => self.encode(&(self.elements.len() as u64)),
            ops::CLEAR => {
                let keys: Vec<Vec<u8>> = self.elements.keys().cloned().collect();
                for key in keys {
                    self.remove(commit, &key)?;
                }
                self.encode(&())
            }
            ops::ELEMENTS => {
                let values: Vec<Vec<u8>> = self.elements.values().cloned().collect();
                self.encode(&values)
            }
            ops::FIRST => self.encode(&self.elements.first_key_value().map(|(_, value)| value.clone())),
            ops::LAST => self.encode(&self.elements.last_key_value().map(|(_, value)| value.clone())),
            ops::FLOOR | ops::CEILING | ops::LOWER | ops::HIGHER => {
                let key: Vec<u8> = self.decode(commit)?;
                let id = commit.operation().id().as_str();
                let below = id == ops::FLOOR || id == ops::LOWER;
                let inclusive = id == ops::FLOOR || id == ops::CEILING;
                self.encode(&self.navigate(&key, below, inclusive))
            }
            ops::POLL_FIRST => {
                let polled = self.poll(commit, false)?;
                self.encode(&polled)
            }
            ops::POLL_LAST => {
                let polled = self.poll(commit, true)?;
                self.encode(&polled)
            }
            other => Err(CommandError(format!("unknown operation: {other}"))),
        }
    }

    fn snapshot(&self) -> Result<Bytes, CommandError> {
        let snapshot = SetSnapshot {
            entries: self
                .elements
                .iter()
                .map(|(key, value)| SetEntry {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        };
        self.encode(&snapshot)
    }

    fn restore(&mut self, snapshot: &[u8]) -> Result<(), CommandError> {
        let snapshot: SetSnapshot = self.serializer.decode(snapshot)?;
        self.elements = snapshot
            .entries
            .into_iter()
            .map(|entry| (entry.key, entry.value))
            .collect();
        Ok(())
    }
}
