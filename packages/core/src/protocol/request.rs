//! Request: один round-trip к серверу с correlation ID и бюджетом повторов.
//!
//! ```text
//! Ready ──send──▶ Sending ──process──▶ Finished
//!   ▲                │
//!   └──cancel(retry)─┤
//!                    └──cancel(no retry) / fail_on_no_connection──▶ Cancelled
//! ```
//!
//! Из `Finished` и `Cancelled` переходов нет. Результат доставляется через
//! `oneshot` канал, который забирается при первом использовании, поэтому
//! вызывающий код получает ровно один исход.

use crate::protocol::dispatcher::Transport;
use crate::protocol::messages::{ClientRequest, RequestFrame, ResultPayload, ServerResponse};
use crate::protocol::wire;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Not connected")]
    NotConnected,

    #[error("Request aborted")]
    Aborted,

    #[error("Server error (code: {code:?}): {text:?}")]
    Server {
        code: Option<String>,
        text: Option<String>,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Invalid request state: {0}")]
    InvalidState(String),

    #[error("Completion channel closed")]
    ChannelClosed,
}

pub type RequestResult = Result<ResultPayload, RequestError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Ready,
    Sending,
    Finished,
    Cancelled,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Finished | RequestState::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    DoNotRetry,
}

pub struct Request {
    id: Uuid,
    state: RequestState,
    retries_remaining: u32,
    payload: ClientRequest,
    completion: Option<oneshot::Sender<RequestResult>>,
}

impl Request {
    /// Создать запрос и канал, по которому придёт результат
    pub fn new(payload: ClientRequest, retries: u32) -> (Self, oneshot::Receiver<RequestResult>) {
        let (tx, rx) = oneshot::channel();
        (Self::with_completion(payload, retries, tx), rx)
    }

    pub fn with_completion(
        payload: ClientRequest,
        retries: u32,
        completion: oneshot::Sender<RequestResult>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: RequestState::Ready,
            retries_remaining: retries,
            payload,
            completion: Some(completion),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn retries_remaining(&self) -> u32 {
        self.retries_remaining
    }

    pub fn payload(&self) -> &ClientRequest {
        &self.payload
    }

    /// Отправить запрос. Допустимо только из `Ready`.
    pub fn send(&mut self, transport: &dyn Transport) -> Result<(), RequestError> {
        if self.state != RequestState::Ready {
            return Err(RequestError::InvalidState(format!(
                "send from {:?}",
                self.state
            )));
        }

        let frame = RequestFrame {
            id: self.id,
            request: self.payload.clone(),
        };
        let bytes = wire::pack_request_frame(&frame)
            .map_err(|e| RequestError::InvalidState(format!("encode: {}", e)))?;

        self.state = RequestState::Sending;
        debug!(
            target: "protocol::request",
            id = %self.id,
            kind = self.payload.kind(),
            retries_remaining = self.retries_remaining,
            "Sending request"
        );
        transport.send(bytes)
    }

    /// Транспорт недоступен: завершить запрос ошибкой `NotConnected`
    pub fn fail_on_no_connection(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = RequestState::Cancelled;
        warn!(target: "protocol::request", id = %self.id, "Request failed: not connected");
        self.complete(Err(RequestError::NotConnected));
    }

    /// Ответ просрочен или транспорт сообщил об ошибке.
    ///
    /// Возвращает `Retry`, если запрос возвращён в `Ready` и его можно
    /// отправить снова.
    pub fn cancel_and_prepare_for_retry(&mut self, allow_retry: bool) -> RetryDecision {
        if self.state.is_terminal() {
            return RetryDecision::DoNotRetry;
        }

        if !allow_retry || self.retries_remaining == 0 {
            self.state = RequestState::Cancelled;
            warn!(
                target: "protocol::request",
                id = %self.id,
                kind = self.payload.kind(),
                allow_retry,
                "Request aborted"
            );
            self.complete(Err(RequestError::Aborted));
            return RetryDecision::DoNotRetry;
        }

        self.retries_remaining -= 1;
        self.state = RequestState::Ready;
        debug!(
            target: "protocol::request",
            id = %self.id,
            retries_remaining = self.retries_remaining,
            "Request prepared for retry"
        );
        RetryDecision::Retry
    }

    /// Обработать ответ сервера. Допустимо только из `Sending`.
    pub fn process(&mut self, response: ServerResponse) -> Result<(), RequestError> {
        if self.state != RequestState::Sending {
            return Err(RequestError::InvalidState(format!(
                "process from {:?}",
                self.state
            )));
        }
        self.state = RequestState::Finished;

        let outcome = match response {
            ServerResponse::Result(payload) => Ok(payload),
            ServerResponse::Error(error) => {
                warn!(
                    target: "protocol::request",
                    id = %self.id,
                    code = ?error.code,
                    text = ?error.text,
                    "Server returned error"
                );
                Err(RequestError::Server {
                    code: error.code,
                    text: error.text,
                })
            }
        };
        self.complete(outcome);
        Ok(())
    }

    fn complete(&mut self, outcome: RequestResult) {
        if let Some(tx) = self.completion.take() {
            // Получатель мог уже уйти (timeout на стороне вызывающего)
            let _ = tx.send(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{ErrorData, OneTimeKeyCountData};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<Vec<u8>>>,
    }

    impl Transport for RecordingTransport {
        fn is_connected(&self) -> bool {
            true
        }

        fn send(&self, frame: Vec<u8>) -> Result<(), RequestError> {
            self.sent.lock().push(frame);
            Ok(())
        }
    }

    #[test]
    fn test_send_then_process_success() {
        let transport = RecordingTransport::default();
        let (mut request, mut rx) = Request::new(ClientRequest::GetOneTimeKeyCount, 3);

        request.send(&transport).unwrap();
        assert_eq!(request.state(), RequestState::Sending);

        let frame = wire::unpack_request_frame(&transport.sent.lock()[0]).unwrap();
        assert_eq!(frame.id, request.id());

        let payload = ResultPayload::OneTimeKeyCount(OneTimeKeyCountData { count: 4 });
        request.process(ServerResponse::Result(payload.clone())).unwrap();
        assert_eq!(request.state(), RequestState::Finished);
        assert_eq!(rx.try_recv().unwrap(), Ok(payload));
    }

    #[test]
    fn test_send_only_from_ready() {
        let transport = RecordingTransport::default();
        let (mut request, _rx) = Request::new(ClientRequest::GetOneTimeKeyCount, 0);
        request.send(&transport).unwrap();
        assert!(matches!(request.send(&transport), Err(RequestError::InvalidState(_))));
    }

    #[test]
    fn test_process_only_from_sending() {
        let (mut request, _rx) = Request::new(ClientRequest::GetOneTimeKeyCount, 0);
        let result = request.process(ServerResponse::Result(ResultPayload::Ack));
        assert!(matches!(result, Err(RequestError::InvalidState(_))));
        assert_eq!(request.state(), RequestState::Ready);
    }

    #[test]
    fn test_server_error_is_structured() {
        let transport = RecordingTransport::default();
        let (mut request, mut rx) = Request::new(ClientRequest::GetOneTimeKeyCount, 0);
        request.send(&transport).unwrap();
        request
            .process(ServerResponse::Error(ErrorData {
                code: Some("item-not-found".to_string()),
                text: None,
            }))
            .unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            Err(RequestError::Server {
                code: Some("item-not-found".to_string()),
                text: None
            })
        );
    }

    #[test]
    fn test_retry_budget_aborts_on_last_failure() {
        let transport = RecordingTransport::default();
        let retries = 3;
        let (mut request, mut rx) = Request::new(ClientRequest::GetOneTimeKeyCount, retries);

        for _ in 0..retries {
            request.send(&transport).unwrap();
            assert_eq!(request.cancel_and_prepare_for_retry(true), RetryDecision::Retry);
            assert_eq!(request.state(), RequestState::Ready);
            assert!(rx.try_recv().is_err());
        }

        request.send(&transport).unwrap();
        assert_eq!(request.cancel_and_prepare_for_retry(true), RetryDecision::DoNotRetry);
        assert_eq!(request.state(), RequestState::Cancelled);
        assert_eq!(rx.try_recv().unwrap(), Err(RequestError::Aborted));
        assert_eq!(transport.sent.lock().len(), retries as usize + 1);
    }

    #[test]
    fn test_cancel_without_retry() {
        let (mut request, mut rx) = Request::new(ClientRequest::GetOneTimeKeyCount, 5);
        assert_eq!(request.cancel_and_prepare_for_retry(false), RetryDecision::DoNotRetry);
        assert_eq!(rx.try_recv().unwrap(), Err(RequestError::Aborted));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let transport = RecordingTransport::default();
        let (mut request, mut rx) = Request::new(ClientRequest::GetOneTimeKeyCount, 5);
        request.send(&transport).unwrap();
        request.fail_on_no_connection();
        assert_eq!(request.state(), RequestState::Cancelled);

        assert_eq!(request.cancel_and_prepare_for_retry(true), RetryDecision::DoNotRetry);
        request.fail_on_no_connection();
        assert!(request.process(ServerResponse::Result(ResultPayload::Ack)).is_err());
        assert_eq!(request.state(), RequestState::Cancelled);

        assert_eq!(rx.try_recv().unwrap(), Err(RequestError::NotConnected));
    }
}
