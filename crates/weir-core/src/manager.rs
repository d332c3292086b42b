//! Scoped checkout handle

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::connection::Connection;

type Releaser<T> = Box<dyn FnOnce(Box<T>) + Send>;

/// Exclusive owner of one checked-out connection.
///
/// While the manager is alive, the connection is reachable through `Deref`.
/// Dropping it - on the normal path, an error path, or during unwinding -
/// hands the connection to the releaser the pool installed, which either
/// re-queues it or lets it die with the pool. The releaser fires at most
/// once.
pub struct Manager<T: Connection> {
    connection: Option<Box<T>>,
    releaser: Option<Releaser<T>>,
}

impl<T: Connection> Manager<T> {
    pub(crate) fn new(connection: Box<T>, releaser: impl FnOnce(Box<T>) + Send + 'static) -> Self {
        Self {
            connection: Some(connection),
            releaser: Some(Box::new(releaser)),
        }
    }
}

impl<T: Connection> fmt::Debug for Manager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("connection", &self.connection.is_some())
            .finish()
    }
}

impl<T: Connection> Deref for Manager<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.connection.as_ref().expect("connection present until drop")
    }
}

impl<T: Connection> DerefMut for Manager<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.connection.as_mut().expect("connection present until drop")
    }
}

impl<T: Connection> Drop for Manager<T> {
    fn drop(&mut self) {
        if let (Some(connection), Some(releaser)) = (self.connection.take(), self.releaser.take()) {
            releaser(connection);
        }
    }
}
