use std::borrow::Cow;
use std::net::IpAddr;
use std::sync::Arc;

use axum::extract::ws::{close_code, CloseFrame, Message};
use dashmap::DashMap;
use metrics::{counter, gauge};
use tokio::sync::mpsc;
use uuid::Uuid;

use clicker_proto::ServerMessage;

/// Write half of a registered controller connection.
#[derive(Clone)]
pub struct ControllerHandle {
    pub connection_id: Uuid,
    tx: mpsc::UnboundedSender<Message>,
}

impl ControllerHandle {
    pub fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            tx,
        }
    }

    /// Queue a frame for this controller. Returns false once the writer task
    /// has gone away.
    pub fn send(&self, message: &ServerMessage) -> bool {
        match serde_json::to_string(message) {
            Ok(json) => self.tx.send(Message::Text(json)).is_ok(),
            Err(_) => false,
        }
    }

    pub fn close(&self, reason: &'static str) {
        let _ = self.tx.send(Message::Close(Some(CloseFrame {
            code: close_code::POLICY,
            reason: Cow::Borrowed(reason),
        })));
    }
}

/// Connected controllers keyed by originating address.
///
/// One live connection per address: registering a newcomer displaces the
/// previous holder, whose handle is returned so its socket can be closed.
#[derive(Clone, Default)]
pub struct ControllerRegistry {
    inner: Arc<DashMap<IpAddr, ControllerHandle>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, identity: IpAddr, handle: ControllerHandle) -> Option<ControllerHandle> {
        let displaced = self.inner.insert(identity, handle);
        counter!("clicker_controllers_connected_total", 1);
        if displaced.is_some() {
            counter!("clicker_controllers_evicted_total", 1);
        }
        gauge!("clicker_controllers_active", self.inner.len() as f64);
        displaced
    }

    /// Drop the registration only if it still belongs to `connection_id`, so
    /// a displaced connection cleaning up after itself cannot remove its
    /// replacement.
    pub fn unregister(&self, identity: IpAddr, connection_id: Uuid) -> bool {
        let removed = self
            .inner
            .remove_if(&identity, |_, handle| handle.connection_id == connection_id)
            .is_some();
        if removed {
            counter!("clicker_controllers_disconnected_total", 1);
        }
        gauge!("clicker_controllers_active", self.inner.len() as f64);
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
