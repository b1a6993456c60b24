//! Shared Connection
//!
//! RESP has no request IDs, so replies pair with requests purely by order.
//! Threads that share one connection must therefore hold it exclusively for
//! a whole exchange; this handle does that with a mutex.

use std::sync::Arc;

use parking_lot::Mutex;

use super::Connection;
use crate::error::CallError;
use crate::protocol::{Command, RespValue};

/// Cloneable handle serializing calls onto one `Connection`
#[derive(Clone)]
pub struct SharedConnection {
    inner: Arc<Mutex<Connection>>,
}

impl SharedConnection {
    pub fn new(connection: Connection) -> Self {
        Self {
            inner: Arc::new(Mutex::new(connection)),
        }
    }

    /// Perform one exchange while holding the connection lock
    pub fn call(&self, command: &Command) -> Result<RespValue, CallError> {
        self.inner.lock().call(command)
    }

    /// Close the underlying connection for every clone
    pub fn close(&self) {
        self.inner.lock().close();
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().is_open()
    }
}

impl From<Connection> for SharedConnection {
    fn from(connection: Connection) -> Self {
        Self::new(connection)
    }
}
