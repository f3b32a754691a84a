//! Диспетчер запросов: сопоставляет ответы сервера с ожидающими запросами
//! по correlation ID, повторяет запросы по таймауту и переживает разрывы
//! соединения.

use crate::config::Config;
use crate::protocol::messages::{ClientRequest, ServerFrame, ServerPush};
use crate::protocol::request::{Request, RequestError, RequestResult, RequestState, RetryDecision};
use crate::protocol::wire;
use crate::utils::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Непрозрачный канал до сервера.
///
/// `send` не должен синхронно вызывать методы диспетчера: ответы
/// доставляются через `handle_frame` из цикла чтения транспорта.
pub trait Transport: Send + Sync {
    fn is_connected(&self) -> bool;

    fn send(&self, frame: Vec<u8>) -> std::result::Result<(), RequestError>;
}

/// Один round-trip к серверу
#[async_trait]
pub trait RequestSender: Send + Sync {
    async fn request(&self, request: ClientRequest) -> RequestResult;
}

pub struct RequestDispatcher {
    transport: Arc<dyn Transport>,
    in_flight: Mutex<HashMap<Uuid, Request>>,
    config: Config,
}

impl RequestDispatcher {
    pub fn new(transport: Arc<dyn Transport>, config: Config) -> Self {
        Self {
            transport,
            in_flight: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    fn send_request(&self, request: &mut Request) {
        if let Err(e) = request.send(self.transport.as_ref()) {
            // Попытка считается неотвеченной, повтор сделает таймаут
            warn!(
                target: "protocol::dispatcher",
                id = %request.id(),
                error = %e,
                "Transport rejected request"
            );
        }
    }

    /// Зарегистрировать запрос и отправить, если есть соединение
    pub fn enqueue(&self, mut request: Request) {
        let id = request.id();

        if !self.transport.is_connected() {
            if self.config.fail_fast_when_offline {
                request.fail_on_no_connection();
                return;
            }
            debug!(target: "protocol::dispatcher", id = %id, "Offline, request queued");
            self.in_flight.lock().insert(id, request);
            return;
        }

        let mut in_flight = self.in_flight.lock();
        self.send_request(&mut request);
        in_flight.insert(id, request);
    }

    /// Обработать входящий фрейм. Push-уведомления возвращаются вызывающему.
    pub fn handle_frame(&self, data: &[u8]) -> Result<Option<ServerPush>> {
        match wire::unpack_server_frame(data)? {
            ServerFrame::Response { id, response } => {
                let mut in_flight = self.in_flight.lock();
                let Some(request) = in_flight.get_mut(&id) else {
                    debug!(target: "protocol::dispatcher", id = %id, "Response for unknown request");
                    return Ok(None);
                };

                match request.process(response) {
                    Ok(()) => {
                        in_flight.remove(&id);
                    }
                    Err(e) => {
                        // Опоздавший ответ на попытку, которую уже отменили
                        debug!(target: "protocol::dispatcher", id = %id, error = %e, "Dropped late response");
                    }
                }
                Ok(None)
            }
            ServerFrame::Push(push) => Ok(Some(push)),
        }
    }

    /// Ответ на запрос не пришёл вовремя
    pub fn handle_timeout(&self, id: Uuid) {
        let mut in_flight = self.in_flight.lock();
        let Some(request) = in_flight.get_mut(&id) else {
            return;
        };

        match request.cancel_and_prepare_for_retry(true) {
            RetryDecision::Retry => {
                if self.transport.is_connected() {
                    self.send_request(request);
                }
            }
            RetryDecision::DoNotRetry => {
                in_flight.remove(&id);
            }
        }
    }

    /// Соединение потеряно
    pub fn on_disconnect(&self) {
        let mut in_flight = self.in_flight.lock();
        let fail_fast = self.config.fail_fast_when_offline;

        in_flight.retain(|_, request| {
            if fail_fast {
                request.fail_on_no_connection();
                return false;
            }
            request.cancel_and_prepare_for_retry(true) == RetryDecision::Retry
        });

        info!(
            target: "protocol::dispatcher",
            pending = in_flight.len(),
            fail_fast,
            "Transport disconnected"
        );
    }

    /// Соединение восстановлено: отправить всё, что ждёт в `Ready`
    pub fn on_connect(&self) {
        let mut in_flight = self.in_flight.lock();
        let mut resent = 0usize;
        for request in in_flight.values_mut() {
            if request.state() == RequestState::Ready {
                self.send_request(request);
                resent += 1;
            }
        }
        info!(target: "protocol::dispatcher", resent, "Transport connected");
    }
}

/// Снимает запрос с учёта, когда `request()` завершился или его future
/// был отброшен вызывающим
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashMap<Uuid, Request>>,
    id: Uuid,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(request) = self.in_flight.lock().remove(&self.id) {
            debug!(
                target: "protocol::dispatcher",
                id = %self.id,
                state = ?request.state(),
                "Caller went away, request abandoned"
            );
        }
    }
}

#[async_trait]
impl RequestSender for RequestDispatcher {
    async fn request(&self, payload: ClientRequest) -> RequestResult {
        let (request, mut rx) = Request::new(payload, self.config.request_retries);
        let id = request.id();
        let _guard = InFlightGuard {
            in_flight: &self.in_flight,
            id,
        };
        self.enqueue(request);

        loop {
            match tokio::time::timeout(self.config.request_timeout(), &mut rx).await {
                Ok(Ok(outcome)) => return outcome,
                Ok(Err(_)) => return Err(RequestError::ChannelClosed),
                Err(_) => {
                    debug!(target: "protocol::dispatcher", id = %id, "Request timed out");
                    self.handle_timeout(id);
                }
            }
        }
    }
}

/// Переслать запрос через `Arc`
#[async_trait]
impl<T: RequestSender + ?Sized> RequestSender for Arc<T> {
    async fn request(&self, request: ClientRequest) -> RequestResult {
        (**self).request(request).await
    }
}
