//! Replicated state machine behind the atomic counter.

use super::{CompareAndSet, ops};
use crate::error::CommandError;
use crate::primitive::{Commit, ReplicatedService, ServiceConfig};
use bytes::Bytes;
use replikit_cluster::{Namespace, Serializer};

pub struct AtomicCounterService {
    name: String,
    serializer: Serializer,
    value: i64,
}

impl AtomicCounterService {
    pub fn new(config: &ServiceConfig, namespace: Namespace) -> Self {
        Self {
            name: config.name().to_string(),
            serializer: Serializer::new(namespace),
            value: 0,
        }
    }
}

impl ReplicatedService for AtomicCounterService {
    fn apply(&mut self, commit: &mut Commit) -> Result<Bytes, CommandError> {
        let args = commit.operation().args();
        match commit.operation().id().as_str() {
            ops::GET => Ok(self.serializer.encode(&self.value)?),
            ops::SET => {
                self.value = self.serializer.decode(args)?;
                Ok(self.serializer.encode(&())?)
            }
            ops::ADD_AND_GET => {
                let delta: i64 = self.serializer.decode(args)?;
                self.value = self.value.wrapping_add(delta);
                Ok(self.serializer.encode(&self.value)?)
            }
            ops::INCREMENT_AND_GET => {
                self.value = self.value.wrapping_add(1);
                Ok(self.serializer.encode(&self.value)?)
            }
            ops::COMPARE_AND_SET => {
                let cas: CompareAndSet = self.serializer.decode(args)?;
                let swapped = self.value == cas.expect;
                if swapped {
                    self.value = cas.update;
                }
                Ok(self.serializer.encode(&swapped)?)
            }
            other => Err(CommandError(format!("{}: unknown operation {other}", self.name))),
        }
    }

    fn snapshot(&self) -> Result<Bytes, CommandError> {
        Ok(self.serializer.encode(&self.value)?)
    }

    fn restore(&mut self, snapshot: &[u8]) -> Result<(), CommandError> {
        self.value = self.serializer.decode(snapshot)?;
        Ok(())
    }
}
