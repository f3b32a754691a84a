// Wire format (MessagePack сериализация)
// Структуры пишутся как map (имена полей), чтобы работали serde-теги enum'ов

use crate::crypto::messaging::double_ratchet::WhisperEnvelope;
use crate::protocol::messages::{RequestFrame, ServerFrame};
use crate::utils::error::{Result, WhisperError};
use rmp_serde::{Deserializer, Serializer};
use serde::{Deserialize, Serialize};

/// Упаковать запрос (клиент -> сервер)
pub fn pack_request_frame(frame: &RequestFrame) -> Result<Vec<u8>> {
    pack_raw(frame)
}

/// Распаковать запрос (сторона сервера, тесты)
pub fn unpack_request_frame(data: &[u8]) -> Result<RequestFrame> {
    unpack_raw(data)
}

/// Упаковать ответ или push (сторона сервера, тесты)
pub fn pack_server_frame(frame: &ServerFrame) -> Result<Vec<u8>> {
    pack_raw(frame)
}

/// Распаковать ответ или push (сервер -> клиент)
pub fn unpack_server_frame(data: &[u8]) -> Result<ServerFrame> {
    unpack_raw(data)
}

/// Упаковать зашифрованное сообщение для передачи собеседнику
pub fn pack_envelope(envelope: &WhisperEnvelope) -> Result<Vec<u8>> {
    pack_raw(envelope)
}

/// Распаковать сообщение собеседника.
///
/// Ошибка формата возвращается как `MalformedEnvelope`.
pub fn unpack_envelope(data: &[u8]) -> Result<WhisperEnvelope> {
    unpack_raw(data).map_err(|e| WhisperError::MalformedEnvelope(e.to_string()))
}

/// Упаковать произвольные данные в MessagePack
pub fn pack_raw<T: Serialize>(data: &T) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    data.serialize(&mut Serializer::new(&mut buffer).with_struct_map())
        .map_err(|e| WhisperError::SerializationError(format!("MessagePack pack error: {}", e)))?;
    Ok(buffer)
}

/// Распаковать MessagePack в произвольный тип
pub fn unpack_raw<'a, T: Deserialize<'a>>(data: &'a [u8]) -> Result<T> {
    let mut deserializer = Deserializer::new(data);
    T::deserialize(&mut deserializer)
        .map_err(|e| WhisperError::SerializationError(format!("MessagePack unpack error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{ClientRequest, GetPeerBundleData, ServerPush};
    use uuid::Uuid;

    #[test]
    fn test_request_frame_keeps_correlation_id() {
        let frame = RequestFrame {
            id: Uuid::new_v4(),
            request: ClientRequest::GetPeerBundle(GetPeerBundleData {
                user_id: "bob".to_string(),
            }),
        };
        let packed = pack_request_frame(&frame).unwrap();
        assert_eq!(unpack_request_frame(&packed).unwrap(), frame);
    }

    #[test]
    fn test_push_frame() {
        let frame = ServerFrame::Push(ServerPush::Normal { count: 2 });
        let packed = pack_server_frame(&frame).unwrap();
        assert_eq!(unpack_server_frame(&packed).unwrap(), frame);
    }

    #[test]
    fn test_garbage_envelope_is_malformed() {
        let result = unpack_envelope(&[0xc1, 0x00, 0x13]);
        assert!(matches!(result, Err(WhisperError::MalformedEnvelope(_))));
    }
}
