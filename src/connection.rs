//! The per-socket state machine: `ACCEPTED → HANDSHAKING → READY → CLOSED`
//! (spec.md §4.3). Owns the reader loop, write mutex, pending-inputs
//! table, free message-id pool, idle timer, and rate limiter.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::channels::{ChannelRegistry, ConnectionHandle, ConnectionId};
use crate::codec::{self, files};
use crate::config::{ConnReader, ConnWriter, ServerConfig};
use crate::error::{CatsError, ProtocolError};
use crate::events::{Event, EventBus, EventPayload};
use crate::frame::{
    write_fixed_frame, write_input_request_frame, write_ping, Compression, DataType, FrameReader,
    FrameType, FrameWriter, InboundFrame, MessageHeaders, RequestFrame,
};
use crate::handler::{InputPort, InputRejected, Request, Response};
use crate::message_id::MessageIdPool;
use crate::router::Router;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as u64
}

type PendingInputTable = Mutex<HashMap<u16, oneshot::Sender<Result<Bytes, InputRejected>>>>;

/// State shared between the reader loop and spawned handler tasks.
struct ConnShared {
    id: ConnectionId,
    peer: SocketAddr,
    api_version: u32,
    writer: Mutex<FrameWriter<ConnWriter>>,
    pending_inputs: PendingInputTable,
    router: Arc<Router>,
    events: Arc<EventBus>,
    channels: Arc<ChannelRegistry>,
    config: ServerConfig,
    top_level_busy: AtomicBool,
}

/// Handed to handler tasks so `request.input(...)` can reach the
/// connection's writer and pending-inputs table without exposing them.
struct ConnectionInputPort {
    shared: Arc<ConnShared>,
}

#[async_trait::async_trait]
impl InputPort for ConnectionInputPort {
    async fn request_input(
        &self,
        message_id: u16,
        prompt: Bytes,
    ) -> Result<Bytes, InputRejected> {
        let (tx, rx) = oneshot::channel();
        self.shared.pending_inputs.lock().await.insert(message_id, tx);

        let write_ok = {
            let mut writer = self.shared.writer.lock().await;
            write_input_request_frame(
                &mut writer,
                message_id,
                DataType::Binary,
                Compression::None,
                &MessageHeaders::new(),
                &prompt,
            )
            .await
            .is_ok()
        };
        if !write_ok {
            self.shared.pending_inputs.lock().await.remove(&message_id);
            return Err(InputRejected::Cancelled);
        }

        let outcome = match self.shared.config.input_timeout {
            Some(dur) => match timeout(dur, rx).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(InputRejected::Cancelled),
                Err(_) => Err(InputRejected::Timeout),
            },
            None => rx.await.unwrap_or(Err(InputRejected::Cancelled)),
        };
        self.shared.pending_inputs.lock().await.remove(&message_id);
        outcome
    }
}

/// An accepted connection, ready to run its read loop.
pub struct Connection {
    shared: Arc<ConnShared>,
    reader: FrameReader<ConnReader>,
    message_ids: MessageIdPool,
    ping_shutdown: Option<watch::Sender<bool>>,
}

impl Connection {
    /// Runs the `ACCEPTED` connect phase and, if configured, the
    /// `HANDSHAKING` stage (spec.md §4.3). Returns a connection ready for
    /// [`Connection::run`], or the terminal error that closed it first.
    pub async fn accept(
        stream: TcpStream,
        peer: SocketAddr,
        id: ConnectionId,
        router: Arc<Router>,
        events: Arc<EventBus>,
        channels: Arc<ChannelRegistry>,
        config: ServerConfig,
    ) -> Result<Self, CatsError> {
        stream.set_nodelay(true).ok();
        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = FrameReader::new(read_half);
        let mut writer = FrameWriter::new(write_half);
        writer.set_download_speed(config.default_download_speed);

        let api_version = reader.read_u32().await.map_err(|_| {
            CatsError::Protocol(ProtocolError::ConnectionClosed)
        })?;
        writer
            .write_u64(now_ms())
            .await
            .map_err(CatsError::Io)?;
        writer.flush().await.map_err(CatsError::Io)?;

        events.fire(
            Event::ConnStart,
            &EventPayload {
                peer: Some(peer),
                ..Default::default()
            },
        );

        if let Some(handshake) = config.handshake.clone() {
            match handshake.perform(&mut reader, &mut writer).await {
                Ok(()) => events.fire(
                    Event::HandshakePass,
                    &EventPayload {
                        peer: Some(peer),
                        ..Default::default()
                    },
                ),
                Err(e) => {
                    events.fire(
                        Event::HandshakeFail,
                        &EventPayload {
                            peer: Some(peer),
                            reason: Some(e.to_string()),
                            ..Default::default()
                        },
                    );
                    events.fire(
                        Event::ConnClose,
                        &EventPayload {
                            peer: Some(peer),
                            reason: Some(e.to_string()),
                            ..Default::default()
                        },
                    );
                    return Err(CatsError::Handshake(e));
                }
            }
        }

        let shared = Arc::new(ConnShared {
            id,
            peer,
            api_version,
            writer: Mutex::new(writer),
            pending_inputs: Mutex::new(HashMap::new()),
            router,
            events,
            channels: channels.clone(),
            config,
            top_level_busy: AtomicBool::new(false),
        });

        let (outbox_tx, mut outbox_rx) = tokio::sync::mpsc::channel::<Bytes>(64);
        channels.register(ConnectionHandle {
            id,
            outbox: outbox_tx,
        });
        let broadcast_shared = shared.clone();
        tokio::spawn(async move {
            while let Some(payload) = outbox_rx.recv().await {
                let mut writer = broadcast_shared.writer.lock().await;
                if writer.write_all(&payload).await.is_err() {
                    break;
                }
                let _ = writer.flush().await;
            }
        });

        let ping_shutdown = shared.config.ping_interval.map(|interval| {
            let (tx, mut rx) = watch::channel(false);
            let ping_shared = shared.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {
                            let mut writer = ping_shared.writer.lock().await;
                            if write_ping(&mut writer, now_ms()).await.is_err() {
                                break;
                            }
                        }
                        _ = rx.changed() => break,
                    }
                }
            });
            tx
        });

        Ok(Self {
            shared,
            reader,
            message_ids: MessageIdPool::new(),
            ping_shutdown,
        })
    }

    /// Reserves an id for a server-initiated exchange (spec.md §4.3
    /// "Message-id allocation"). Unused by `request.input(...)`, which
    /// reuses the parent request's own message id instead.
    pub fn allocate_message_id(&mut self) -> Option<u16> {
        self.message_ids.allocate()
    }

    pub fn release_message_id(&mut self, id: u16) {
        self.message_ids.release(id);
    }

    /// Runs the `READY` read loop until the connection closes.
    pub async fn run(mut self) {
        loop {
            let max_plain_data_size = self.shared.config.max_plain_data_size;
            let read = match self.shared.config.idle_timeout {
                Some(dur) => match timeout(
                    dur,
                    InboundFrame::read(&mut self.reader, max_plain_data_size),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        self.close(Some(ProtocolError::IdleTimeout.to_string())).await;
                        return;
                    }
                },
                None => InboundFrame::read(&mut self.reader, max_plain_data_size).await,
            };

            let frame = match read {
                Ok(frame) => frame,
                Err(e) => {
                    self.close(Some(e.to_string())).await;
                    return;
                }
            };

            if let Err(e) = self.dispatch(frame).await {
                self.close(Some(e.to_string())).await;
                return;
            }
        }
    }

    async fn dispatch(&mut self, frame: InboundFrame) -> Result<(), ProtocolError> {
        match frame {
            InboundFrame::Request(req) | InboundFrame::StreamRequest(req) => {
                if self.shared.top_level_busy.swap(true, Ordering::SeqCst) {
                    return Err(ProtocolError::ConcurrentRequest);
                }
                let shared = self.shared.clone();
                tokio::spawn(async move {
                    Self::handle_request(shared.clone(), req).await;
                    shared.top_level_busy.store(false, Ordering::SeqCst);
                });
                Ok(())
            }
            InboundFrame::InputRequest(input) => {
                let sender = self
                    .shared
                    .pending_inputs
                    .lock()
                    .await
                    .remove(&input.message_id);
                match sender {
                    Some(sender) => {
                        let _ = sender.send(Ok(input.payload));
                        Ok(())
                    }
                    None => Err(ProtocolError::UnexpectedInputRequest(input.message_id)),
                }
            }
            InboundFrame::DownloadSpeed(speed) => {
                self.shared.writer.lock().await.set_download_speed(speed);
                Ok(())
            }
            InboundFrame::CancelInput(message_id) => {
                if let Some(sender) = self.shared.pending_inputs.lock().await.remove(&message_id) {
                    let _ = sender.send(Err(InputRejected::Cancelled));
                }
                Ok(())
            }
            InboundFrame::Ping(timestamp) => {
                let mut writer = self.shared.writer.lock().await;
                let _ = write_ping(&mut writer, timestamp).await;
                Ok(())
            }
        }
    }

    async fn handle_request(shared: Arc<ConnShared>, frame: RequestFrame) {
        let RequestFrame {
            handler_id,
            message_id,
            data_type,
            compression,
            mut headers,
            payload,
            ..
        } = frame;

        let handler_fn = shared.router.lookup(handler_id, shared.api_version).cloned();
        let Some(handler_fn) = handler_fn else {
            Self::write_response(&shared, handler_id, message_id, &Response::not_found()).await;
            return;
        };

        let content = match codec::decompress(&payload, compression) {
            Ok(c) => c,
            Err(e) => {
                let response = Response::from_error(400, &e.into());
                Self::write_response(&shared, handler_id, message_id, &response).await;
                return;
            }
        };
        let content = apply_offset(data_type, &mut headers, content);

        let request = Request {
            handler_id,
            message_id,
            api_version: shared.api_version,
            data_type,
            compression: Compression::None,
            headers,
            payload: content,
            input_port: Arc::new(ConnectionInputPort {
                shared: shared.clone(),
            }),
        };

        shared.events.fire(
            Event::BeforeRequest,
            &EventPayload {
                peer: Some(shared.peer),
                handler_id: Some(handler_id),
                message_id: Some(message_id),
                ..Default::default()
            },
        );
        let request = shared.events.fire_before_request(request).await;

        let response = match handler_fn(request).await {
            Ok(response) => response,
            Err(err) => {
                let err = shared.events.fire_handle_error(err).await;
                warn!(
                    connection = shared.id,
                    peer = %shared.peer,
                    message_id,
                    error = %err,
                    "handler returned error"
                );
                Response::from_error(500, &err)
            }
        };

        shared.events.fire(
            Event::AfterRequest,
            &EventPayload {
                peer: Some(shared.peer),
                message_id: Some(message_id),
                ..Default::default()
            },
        );

        let response = shared.events.fire_before_response(response).await;
        Self::write_response(&shared, handler_id, message_id, &response).await;

        shared.events.fire(
            Event::AfterResponse,
            &EventPayload {
                peer: Some(shared.peer),
                message_id: Some(message_id),
                status: Some(response.status),
                ..Default::default()
            },
        );
    }

    async fn write_response(
        shared: &Arc<ConnShared>,
        handler_id: u16,
        message_id: u16,
        response: &Response,
    ) {
        let mut headers = response.headers.clone();
        headers.set_status(response.status);
        let mut writer = shared.writer.lock().await;
        if let Err(e) = write_fixed_frame(
            &mut writer,
            FrameType::Request,
            handler_id,
            message_id,
            now_ms(),
            response.data_type,
            response.compression,
            &headers,
            &response.payload,
        )
        .await
        {
            warn!(connection = shared.id, error = %e, "failed to write response");
        }
    }

    /// Resolves every pending input with a connection-closed error,
    /// deregisters from all channels, and closes the socket exactly once
    /// (spec.md §4.3 "close(exc?)").
    async fn close(self, reason: Option<String>) {
        info!(connection = self.shared.id, peer = %self.shared.peer, ?reason, "closing connection");
        if let Some(tx) = &self.ping_shutdown {
            let _ = tx.send(true);
        }
        let mut pending = self.shared.pending_inputs.lock().await;
        for (_, sender) in pending.drain() {
            let _ = sender.send(Err(InputRejected::Cancelled));
        }
        drop(pending);
        self.shared.channels.deregister(self.shared.id);
        self.shared.events.fire(
            Event::ConnClose,
            &EventPayload {
                peer: Some(self.shared.peer),
                reason,
                ..Default::default()
            },
        );
        debug!(connection = self.shared.id, "connection resources released");
    }
}

/// Applies the `Offset` header (spec.md §3, §4.2, GLOSSARY note (c)).
fn apply_offset(data_type: DataType, headers: &mut MessageHeaders, payload: Bytes) -> Bytes {
    let Some(offset) = headers.offset() else {
        return payload;
    };
    if offset <= 0 {
        return payload;
    }
    let offset = offset as u64;

    if data_type == DataType::Files {
        if let Ok(Some(entries)) = headers.files() {
            let (trimmed_payload, trimmed_entries) = files::apply_offset(&payload, &entries, offset);
            headers.set_files(&trimmed_entries);
            return trimmed_payload;
        }
        return payload;
    }

    payload.slice((offset.min(payload.len() as u64) as usize)..)
}
