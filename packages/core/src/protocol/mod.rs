// Протокол: сообщения, wire format, запросы и диспетчер

pub mod dispatcher;
pub mod messages;
pub mod request;
pub mod wire;

pub use dispatcher::{RequestDispatcher, RequestSender, Transport};
pub use messages::{ClientRequest, ResultPayload, ServerPush};
pub use request::{Request, RequestError, RequestState, RetryDecision};
