//! Reachability of the remote store.

use crate::connection::RemoteConnection;
use parking_lot::RwLock;
use replog_protocol::Method;
use std::sync::Arc;
use tracing::debug;

/// Tracks whether the remote store can be reached.
///
/// The state starts unknown. It is set by [`probe`](Self::probe) or by an
/// external monitor through [`set_offline`](Self::set_offline) and trusted
/// until then.
pub trait Connectivity: Send + Sync {
    /// Returns the last known state, `None` when never probed.
    fn is_offline(&self) -> Option<bool>;

    /// Probes the remote, records the result and returns `true` when it
    /// answered.
    fn probe(&self) -> bool;

    /// Overrides the recorded state.
    fn set_offline(&self, offline: Option<bool>);
}

/// Probes the remote store with `GET ping`.
#[derive(Debug)]
pub struct PingConnectivity {
    connection: Arc<RemoteConnection>,
    offline: RwLock<Option<bool>>,
}

impl PingConnectivity {
    /// Creates a prober over `connection`, in the unknown state.
    pub fn new(connection: Arc<RemoteConnection>) -> Self {
        Self {
            connection,
            offline: RwLock::new(None),
        }
    }
}

impl Connectivity for PingConnectivity {
    fn is_offline(&self) -> Option<bool> {
        *self.offline.read()
    }

    fn probe(&self) -> bool {
        let reachable = match self.connection.send(Method::Get, "ping", &[], None) {
            Ok(_) => true,
            Err(err) => {
                debug!(url = %self.connection.base_url(), error = %err, "Ping failed");
                false
            }
        };
        *self.offline.write() = Some(!reachable);
        reachable
    }

    fn set_offline(&self, offline: Option<bool>) {
        *self.offline.write() = offline;
    }
}
