//! Synchronous event fan-out (spec.md §4.4, §5): `BEFORE_*` listeners may
//! substitute the value they observe; all others are notify-only. Listener
//! panics/errors are caught and logged, never propagated to the caller.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};

use tracing::error;

use crate::handler::{Request, Response};

/// A listener that may replace the request before dispatch.
pub type BeforeRequestListener =
    Arc<dyn Fn(Request) -> crate::handler::BoxFuture<'static, Request> + Send + Sync>;
/// A listener that may replace the response before it is written.
pub type BeforeResponseListener =
    Arc<dyn Fn(Response) -> crate::handler::BoxFuture<'static, Response> + Send + Sync>;
/// A notify-only listener over an opaque event payload.
pub type NotifyListener = Arc<dyn Fn(&EventPayload) + Send + Sync>;
/// A `HANDLE_ERROR` listener: may re-raise a different error, re-entering
/// the error path with the replacement (spec.md §4.8).
pub type HandleErrorListener =
    Arc<dyn Fn(anyhow::Error) -> crate::handler::BoxFuture<'static, anyhow::Error> + Send + Sync>;

/// Context passed to notify-only listeners; fields are populated per event.
#[derive(Debug, Clone, Default)]
pub struct EventPayload {
    pub peer: Option<std::net::SocketAddr>,
    pub handler_id: Option<u16>,
    pub message_id: Option<u16>,
    pub status: Option<u16>,
    pub reason: Option<String>,
}

/// The fixed event names the connection/server lifecycle fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    ServerStart,
    ServerClose,
    ConnStart,
    ConnClose,
    HandshakePass,
    HandshakeFail,
    BeforeRequest,
    AfterRequest,
    BeforeResponse,
    AfterResponse,
}

/// Registry of listeners, keyed per event, with safe fan-out.
#[derive(Default)]
pub struct EventBus {
    before_request: RwLock<Vec<BeforeRequestListener>>,
    before_response: RwLock<Vec<BeforeResponseListener>>,
    handle_error: RwLock<Vec<HandleErrorListener>>,
    notify: RwLock<std::collections::HashMap<Event, Vec<NotifyListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_before_request(&self, listener: BeforeRequestListener) {
        self.before_request.write().unwrap().push(listener);
    }

    pub fn on_before_response(&self, listener: BeforeResponseListener) {
        self.before_response.write().unwrap().push(listener);
    }

    pub fn on_handle_error(&self, listener: HandleErrorListener) {
        self.handle_error.write().unwrap().push(listener);
    }

    pub fn on(&self, event: Event, listener: NotifyListener) {
        self.notify
            .write()
            .unwrap()
            .entry(event)
            .or_default()
            .push(listener);
    }

    /// Runs `BEFORE_REQUEST` listeners in registration order, each allowed
    /// to replace the request passed to the next.
    pub async fn fire_before_request(&self, mut request: Request) -> Request {
        let listeners = self.before_request.read().unwrap().clone();
        for listener in listeners {
            request = listener(request).await;
        }
        request
    }

    /// Runs `BEFORE_RESPONSE` listeners in registration order, each allowed
    /// to replace the response passed to the next.
    pub async fn fire_before_response(&self, mut response: Response) -> Response {
        let listeners = self.before_response.read().unwrap().clone();
        for listener in listeners {
            response = listener(response).await;
        }
        response
    }

    /// Runs `HANDLE_ERROR` listeners in registration order, each allowed to
    /// re-raise a different error and re-enter the error path with it.
    pub async fn fire_handle_error(&self, mut error: anyhow::Error) -> anyhow::Error {
        let listeners = self.handle_error.read().unwrap().clone();
        for listener in listeners {
            error = listener(error).await;
        }
        error
    }

    /// Fires a notify-only event. Listener panics are caught and logged so
    /// one misbehaving listener cannot take down the connection.
    pub fn fire(&self, event: Event, payload: &EventPayload) {
        let listeners = self.notify.read().unwrap().get(&event).cloned();
        let Some(listeners) = listeners else { return };
        for listener in listeners {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| listener(payload)));
            if let Err(panic) = result {
                error!(?event, ?panic, "event listener panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fire_with_no_listeners_is_a_noop() {
        let bus = EventBus::new();
        bus.fire(Event::ConnStart, &EventPayload::default());
    }

    #[test]
    fn notify_listener_panic_is_caught() {
        let bus = EventBus::new();
        bus.on(
            Event::ConnClose,
            Arc::new(|_payload| panic!("boom")),
        );
        // Must not propagate the panic out of `fire`.
        bus.fire(Event::ConnClose, &EventPayload::default());
    }

    #[tokio::test]
    async fn before_request_listener_can_replace_request() {
        let bus = EventBus::new();
        bus.on_before_request(Arc::new(|mut req: Request| {
            Box::pin(async move {
                req.handler_id = 42;
                req
            })
        }));

        let request = Request {
            handler_id: 0,
            message_id: 1,
            api_version: 1,
            data_type: crate::frame::DataType::Binary,
            compression: crate::frame::Compression::None,
            headers: crate::frame::MessageHeaders::new(),
            payload: bytes::Bytes::new(),
            input_port: Arc::new(NoopInputPort),
        };
        let replaced = bus.fire_before_request(request).await;
        assert_eq!(replaced.handler_id, 42);
    }

    #[tokio::test]
    async fn handle_error_listener_can_substitute_error() {
        let bus = EventBus::new();
        bus.on_handle_error(Arc::new(|_err: anyhow::Error| {
            Box::pin(async move { anyhow::anyhow!("replaced") })
        }));

        let replaced = bus.fire_handle_error(anyhow::anyhow!("original")).await;
        assert_eq!(replaced.to_string(), "replaced");
    }

    struct NoopInputPort;

    #[async_trait::async_trait]
    impl crate::handler::InputPort for NoopInputPort {
        async fn request_input(
            &self,
            _message_id: u16,
            _prompt: bytes::Bytes,
        ) -> Result<bytes::Bytes, crate::handler::InputRejected> {
            Err(crate::handler::InputRejected::Cancelled)
        }
    }
}
