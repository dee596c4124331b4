//! Typed invocation over a session client.

use super::types::{OperationId, PrimitiveOperation, PrimitiveState};
use crate::error::PrimitiveResult;
use crate::metrics;
use crate::session::SessionClient;
use bytes::Bytes;
use replikit_cluster::{BEGIN_USER_CUSTOM_ID, Listener, Namespace, Serializer, SerializerError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;

/// Value types usable as primitive keys, values and arguments.
pub trait PrimitiveValue: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> PrimitiveValue for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Serializer for a client of a primitive whose wire types are `namespace`,
/// extended with the caller's own types starting at the user id range.
pub fn client_serializer(namespace: &Namespace, user: Option<&Namespace>) -> Serializer {
    let mut builder = Namespace::builder().register_all(namespace).next_id(BEGIN_USER_CUSTOM_ID);
    if let Some(user) = user {
        builder = builder.register_all(user);
    }
    Serializer::new(builder.build())
}

/// Fails unless `T` can be encoded by `serializer`.
pub fn ensure_registered<T: 'static>(serializer: &Serializer) -> Result<(), SerializerError> {
    if serializer.namespace().contains::<T>() {
        Ok(())
    } else {
        Err(SerializerError::Unregistered(std::any::type_name::<T>()))
    }
}

/// Encodes arguments, submits operations and decodes results for a typed
/// primitive client.
#[derive(Clone)]
pub struct PrimitiveProxy {
    client: Arc<dyn SessionClient>,
    serializer: Serializer,
}

impl PrimitiveProxy {
    pub fn new(client: Arc<dyn SessionClient>, serializer: Serializer) -> Self {
        Self { client, serializer }
    }

    #[must_use]
    pub fn client(&self) -> &Arc<dyn SessionClient> {
        &self.client
    }

    #[must_use]
    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.client.name()
    }

    /// Submit `operation` with encoded `args` and decode the result.
    ///
    /// The operation is submitted before this returns; awaiting only waits
    /// for the result.
    pub fn invoke<A, R>(&self, operation: &str, args: &A) -> impl Future<Output = PrimitiveResult<R>> + Send + use<A, R>
    where
        A: Serialize + 'static,
        R: DeserializeOwned + Send + 'static,
    {
        let encoded = self.serializer.encode(args);
        let submitted = encoded.map(|args| self.invoke_raw(operation, args));
        let serializer = self.serializer.clone();
        async move {
            let result = submitted?.await?;
            Ok(serializer.decode::<R>(&result)?)
        }
    }

    /// Submit an operation without arguments.
    pub fn invoke_empty<R>(&self, operation: &str) -> impl Future<Output = PrimitiveResult<R>> + Send + use<R>
    where
        R: DeserializeOwned + Send + 'static,
    {
        let submitted = self.invoke_raw(operation, Bytes::new());
        let serializer = self.serializer.clone();
        async move {
            let result = submitted.await?;
            Ok(serializer.decode::<R>(&result)?)
        }
    }

    pub fn invoke_raw(&self, operation: &str, args: Bytes) -> impl Future<Output = PrimitiveResult<Bytes>> + Send + use<> {
        let pending = self
            .client
            .execute(PrimitiveOperation::new(OperationId::new(operation), args));
        let primitive_type = self.client.primitive_type().to_string();
        async move {
            let result = pending.await;
            let outcome = match &result {
                Ok(_) => "success",
                Err(err) => err.error_code(),
            };
            metrics::record_operation(&primitive_type, outcome);
            Ok(result?)
        }
    }

    pub fn add_state_change_listener(&self, listener: Listener<PrimitiveState>) {
        self.client.add_state_change_listener(listener);
    }

    pub fn remove_state_change_listener(&self, listener: &Listener<PrimitiveState>) {
        self.client.remove_state_change_listener(listener);
    }

    pub async fn close(&self) -> PrimitiveResult<()> {
        Ok(self.client.close().await?)
    }
}

impl std::fmt::Debug for PrimitiveProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimitiveProxy")
            .field("name", &self.client.name())
            .field("primitive_type", &self.client.primitive_type())
            .finish()
    }
}
