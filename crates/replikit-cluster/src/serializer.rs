//! Namespaced serialization.
//!
//! A [`Namespace`] declares the concrete types a primitive may put on the
//! wire and gives each a stable numeric id. Ids are part of the wire format:
//! once a type has been published under an id, that assignment must not
//! change. Encoded payloads are the 2-byte big-endian type id followed by the
//! MessagePack body.

use crate::error::SerializerError;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// First id available to user and primitive-specific registrations.
pub const BEGIN_USER_CUSTOM_ID: u16 = 500;

const TYPE_ID_LEN: usize = 2;

#[derive(Debug, Clone, Copy)]
struct Registration {
    id: u16,
    type_id: TypeId,
    name: &'static str,
}

/// An immutable set of registered types.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    registrations: Vec<Registration>,
    by_type: HashMap<TypeId, u16>,
}

impl Namespace {
    pub fn builder() -> NamespaceBuilder {
        NamespaceBuilder::new()
    }

    /// Types every primitive can encode without further registration.
    pub fn basic() -> Self {
        Self::builder()
            .register::<()>()
            .register::<bool>()
            .register::<u32>()
            .register::<u64>()
            .register::<i64>()
            .register::<String>()
            .register::<Vec<u8>>()
            .register::<Option<Vec<u8>>>()
            .register::<Vec<String>>()
            .register::<Vec<Vec<u8>>>()
            .build()
    }

    #[must_use]
    pub fn id_of<T: 'static>(&self) -> Option<u16> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    #[must_use]
    pub fn contains<T: 'static>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Registered type names with their ids, in registration order.
    pub fn entries(&self) -> impl Iterator<Item = (u16, &'static str)> + '_ {
        self.registrations.iter().map(|r| (r.id, r.name))
    }
}

/// Builder for [`Namespace`].
#[derive(Debug)]
pub struct NamespaceBuilder {
    next_id: u16,
    registrations: Vec<Registration>,
    by_type: HashMap<TypeId, u16>,
}

impl NamespaceBuilder {
    fn new() -> Self {
        Self {
            next_id: 1,
            registrations: Vec::new(),
            by_type: HashMap::new(),
        }
    }

    /// Register a type under the next free id. Re-registering keeps the first id.
    pub fn register<T>(mut self) -> Self
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let type_id = TypeId::of::<T>();
        if !self.by_type.contains_key(&type_id) {
            let id = self.take_id();
            self.push(Registration {
                id,
                type_id,
                name: type_name::<T>(),
            });
        }
        self
    }

    /// Skip ahead so following registrations start at `id`. Never moves backwards.
    pub fn next_id(mut self, id: u16) -> Self {
        self.next_id = self.next_id.max(id);
        self
    }

    /// Import every registration of `other`, keeping its ids where they are free.
    pub fn register_all(mut self, other: &Namespace) -> Self {
        for registration in &other.registrations {
            if self.by_type.contains_key(&registration.type_id) {
                continue;
            }
            let id_taken = self.registrations.iter().any(|r| r.id == registration.id);
            let id = if id_taken { self.take_id() } else { registration.id };
            self.next_id = self.next_id.max(id.saturating_add(1));
            self.push(Registration { id, ..*registration });
        }
        self
    }

    pub fn build(self) -> Namespace {
        Namespace {
            registrations: self.registrations,
            by_type: self.by_type,
        }
    }

    fn take_id(&mut self) -> u16 {
        while self.registrations.iter().any(|r| r.id == self.next_id) {
            self.next_id = self.next_id.saturating_add(1);
        }
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    fn push(&mut self, registration: Registration) {
        self.by_type.insert(registration.type_id, registration.id);
        self.registrations.push(registration);
    }
}

/// Encodes and decodes values of the types registered in a namespace.
#[derive(Debug, Clone)]
pub struct Serializer {
    namespace: Arc<Namespace>,
}

impl Serializer {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace: Arc::new(namespace),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn encode<T>(&self, value: &T) -> Result<Bytes, SerializerError>
    where
        T: Serialize + 'static,
    {
        let id = self
            .namespace
            .id_of::<T>()
            .ok_or(SerializerError::Unregistered(type_name::<T>()))?;
        let mut buf = Vec::with_capacity(32);
        buf.extend_from_slice(&id.to_be_bytes());
        rmp_serde::encode::write(&mut buf, value)?;
        Ok(Bytes::from(buf))
    }

    pub fn decode<T>(&self, bytes: &[u8]) -> Result<T, SerializerError>
    where
        T: DeserializeOwned + 'static,
    {
        let expected = self
            .namespace
            .id_of::<T>()
            .ok_or(SerializerError::Unregistered(type_name::<T>()))?;
        if bytes.len() < TYPE_ID_LEN {
            return Err(SerializerError::Truncated);
        }
        let found = u16::from_be_bytes([bytes[0], bytes[1]]);
        if found != expected {
            return Err(SerializerError::TypeMismatch {
                expected: type_name::<T>(),
                found,
            });
        }
        Ok(rmp_serde::from_slice(&bytes[TYPE_ID_LEN..])?)
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new(Namespace::basic())
    }
}
