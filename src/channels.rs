//! Application-owned publish/subscribe channel directory (spec.md §4.7).
//!
//! `dashmap` is not part of the teacher's own dependency table, but it is
//! declared by the sibling crate in the same workspace for exactly this
//! kind of registry; adopted here rather than wrapping a `Mutex<HashMap>`.

use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use tokio::sync::mpsc;
use tracing::warn;

/// Opaque handle identifying a connection for channel membership.
pub type ConnectionId = u64;

/// Implicit channel every connection joins on handshake success.
pub const ALL_CHANNEL: &str = "__all__";

/// A connection's outbound mailbox; full/closed mailboxes are skipped
/// rather than blocking the broadcaster (spec.md §4.7 "best-effort").
#[derive(Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub outbox: mpsc::Sender<Bytes>,
}

/// `channel_name -> set of connections`, plus the connection handles
/// needed to actually deliver a broadcast.
#[derive(Default)]
pub struct ChannelRegistry {
    members: DashMap<String, DashSet<ConnectionId>>,
    handles: DashMap<ConnectionId, ConnectionHandle>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and joins it to the implicit `__all__`
    /// channel.
    pub fn register(&self, handle: ConnectionHandle) {
        let id = handle.id;
        self.handles.insert(id, handle);
        self.attach(id, ALL_CHANNEL);
    }

    /// Detaches from every channel and drops the connection's handle
    /// (spec.md §4.7 "removed on close").
    pub fn deregister(&self, id: ConnectionId) {
        for entry in self.members.iter() {
            entry.value().remove(&id);
        }
        self.handles.remove(&id);
    }

    pub fn attach(&self, id: ConnectionId, name: &str) {
        self.members
            .entry(name.to_string())
            .or_default()
            .insert(id);
    }

    pub fn detach(&self, id: ConnectionId, name: &str) {
        if let Some(set) = self.members.get(name) {
            set.remove(&id);
        }
    }

    /// Snapshots membership before delivering so a concurrent attach/detach
    /// cannot invalidate an in-progress broadcast (spec.md §4.7).
    pub fn broadcast(&self, name: &str, message: Bytes) {
        let Some(members) = self.members.get(name) else {
            return;
        };
        let snapshot: Vec<ConnectionId> = members.iter().map(|id| *id).collect();
        drop(members);

        for id in snapshot {
            let Some(handle) = self.handles.get(&id) else {
                continue;
            };
            if handle.outbox.try_send(message.clone()).is_err() {
                warn!(connection = id, channel = name, "dropping broadcast: mailbox full or closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle_with_capacity(id: ConnectionId, cap: usize) -> (ConnectionHandle, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(cap);
        (ConnectionHandle { id, outbox: tx }, rx)
    }

    #[tokio::test]
    async fn register_joins_all_channel() {
        let registry = ChannelRegistry::new();
        let (handle, mut rx) = handle_with_capacity(1, 4);
        registry.register(handle);

        registry.broadcast(ALL_CHANNEL, Bytes::from_static(b"hi"));
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"hi"));
    }

    #[tokio::test]
    async fn deregister_removes_from_all_channels() {
        let registry = ChannelRegistry::new();
        let (handle, mut rx) = handle_with_capacity(1, 4);
        registry.register(handle);
        registry.attach(1, "room-42");
        registry.deregister(1);

        registry.broadcast("room-42", Bytes::from_static(b"x"));
        registry.broadcast(ALL_CHANNEL, Bytes::from_static(b"x"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_mailbox_does_not_block_other_recipients() {
        let registry = ChannelRegistry::new();
        let (handle_a, rx_a) = handle_with_capacity(1, 1);
        let (handle_b, mut rx_b) = handle_with_capacity(2, 4);
        registry.register(handle_a);
        registry.register(handle_b);

        // Fill connection 1's mailbox so the next broadcast must be dropped
        // for it, not block delivery to connection 2.
        registry.broadcast(ALL_CHANNEL, Bytes::from_static(b"fill"));
        registry.broadcast(ALL_CHANNEL, Bytes::from_static(b"overflow"));

        assert_eq!(rx_b.recv().await.unwrap(), Bytes::from_static(b"fill"));
        assert_eq!(rx_b.recv().await.unwrap(), Bytes::from_static(b"overflow"));
        drop(rx_a);
    }
}
