//! TCP accept loop: binds a listener, spawns a [`Connection`] per peer,
//! and drains on shutdown (spec.md §4.3, §4.8 "SERVER_START"/"SERVER_CLOSE").

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::channels::{ChannelRegistry, ConnectionId};
use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::events::{Event, EventBus, EventPayload};
use crate::router::Router;

/// Owns the listener plus everything shared across connections: the
/// router, the event bus, and the channel registry.
pub struct Server {
    router: Arc<Router>,
    events: Arc<EventBus>,
    channels: Arc<ChannelRegistry>,
    config: ServerConfig,
    next_connection_id: AtomicU64,
}

impl Server {
    pub fn new(router: Router, events: EventBus, config: ServerConfig) -> Self {
        Self {
            router: Arc::new(router),
            events: Arc::new(events),
            channels: Arc::new(ChannelRegistry::new()),
            config,
            next_connection_id: AtomicU64::new(1),
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn channels(&self) -> &Arc<ChannelRegistry> {
        &self.channels
    }

    fn next_id(&self) -> ConnectionId {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Binds `addr` and serves connections until `shutdown_rx` fires.
    pub async fn run(self: Arc<Self>, addr: SocketAddr, mut shutdown_rx: watch::Receiver<bool>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %addr, "cats server listening");
        self.events.fire(Event::ServerStart, &EventPayload::default());

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(v) => v,
                        Err(e) => {
                            warn!(error = %e, "failed to accept connection");
                            continue;
                        }
                    };
                    self.spawn_connection(stream, peer);
                }
                _ = shutdown_rx.changed() => {
                    info!("cats server shutting down");
                    break;
                }
            }
        }

        self.events.fire(Event::ServerClose, &EventPayload::default());
        Ok(())
    }

    fn spawn_connection(self: &Arc<Self>, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let id = self.next_id();
        let router = self.router.clone();
        let events = self.events.clone();
        let channels = self.channels.clone();
        let config = self.config.clone();

        debug!(connection = id, peer = %peer, "accepted connection");
        tokio::spawn(async move {
            match Connection::accept(stream, peer, id, router, events, channels, config).await {
                Ok(connection) => connection.run().await,
                Err(e) => debug!(connection = id, peer = %peer, error = %e, "connection rejected during setup"),
            }
        });
    }
}
