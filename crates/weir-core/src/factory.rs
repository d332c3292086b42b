//! Type-indexed registry of connection constructors

use std::any::{self, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::connection::Connection;
use crate::error::{ConnectionError, Result};

type Constructor = Arc<dyn Fn() -> Result<Box<dyn Connection>> + Send + Sync>;

/// Registry mapping connection types to their constructors.
///
/// Heterogeneous driver types share one registry: each entry is keyed by the
/// concrete connection type's [`TypeId`], and registration and lookup go
/// through the same generic parameter. That shared key is what makes the
/// downcast in [`create`](Self::create) sound - the registry never hands
/// back a constructor under a key it was not registered under.
///
/// Registration takes the writer lock and is expected to be rare; lookups
/// share the reader lock.
pub struct ConnectionFactory {
    factories: RwLock<HashMap<TypeId, Constructor>>,
}

impl ConnectionFactory {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Install `ctor` as the constructor for connections of type `T`,
    /// replacing any previous entry for `T`.
    pub fn register<T, F>(&self, ctor: F)
    where
        T: Connection,
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        tracing::debug!(
            connection_type = any::type_name::<T>(),
            "registering connection factory"
        );
        let ctor: Constructor = Arc::new(move || Ok(Box::new(ctor()?) as Box<dyn Connection>));
        self.factories.write().insert(TypeId::of::<T>(), ctor);
    }

    /// Invoke the constructor registered for `T`.
    ///
    /// The constructor runs outside the registry lock, so a slow connect
    /// does not block registration or other lookups.
    pub fn create<T: Connection>(&self) -> Result<Box<T>> {
        let ctor = self
            .factories
            .read()
            .get(&TypeId::of::<T>())
            .cloned()
            .ok_or_else(|| {
                ConnectionError::FactoryNotRegistered(format!(
                    "no factory registered for {}",
                    any::type_name::<T>()
                ))
            })?;

        let connection: Box<dyn Any> = ctor()?;
        connection.downcast::<T>().map_err(|_| {
            ConnectionError::FactoryNotRegistered(format!(
                "factory for {} produced a different connection type",
                any::type_name::<T>()
            ))
        })
    }
}

impl Default for ConnectionFactory {
    fn default() -> Self {
        Self::new()
    }
}
