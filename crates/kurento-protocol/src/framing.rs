//! Length-prefixed framing for stream connections.
//!
//! Each envelope is sent as a 4-byte big-endian length followed by the JSON
//! payload:
//!
//! ```text
//! +----------------+------------------+
//! | length (4 BE)  |  JSON payload    |
//! +----------------+------------------+
//! ```

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, ProtocolResult};

/// Encodes a message to bytes with length prefix.
///
/// ```rust
/// use kurento_protocol::{encode_message, Envelope, PingParams, Request};
///
/// let envelope = Envelope::request("req-1", Request::Ping(PingParams::default()));
/// let bytes = encode_message(&envelope).unwrap();
/// assert!(bytes.len() > 4);
/// ```
pub fn encode_message<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    let json = serde_json::to_vec(message)?;
    let len = checked_len(json.len())?;

    let mut buffer = Vec::with_capacity(4 + json.len());
    buffer.extend_from_slice(&len.to_be_bytes());
    buffer.extend_from_slice(&json);
    Ok(buffer)
}

/// Decodes one complete framed message (length prefix + payload).
pub fn decode_message<T: DeserializeOwned>(data: &[u8]) -> ProtocolResult<T> {
    let Some(prefix) = data.get(..4) else {
        return Err(ProtocolError::IncompleteMessage {
            expected: 4,
            received: data.len(),
        });
    };

    let len = frame_len([prefix[0], prefix[1], prefix[2], prefix[3]])?;

    let Some(json) = data.get(4..4 + len) else {
        return Err(ProtocolError::IncompleteMessage {
            expected: 4 + len,
            received: data.len(),
        });
    };

    Ok(serde_json::from_slice(json)?)
}

/// Reads the payload of the next frame.
///
/// Returns `Ok(None)` when the stream ends cleanly before a new frame starts.
pub async fn read_frame<R>(reader: &mut R) -> ProtocolResult<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = frame_len(len_buf)?;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Reads and decodes the next framed message.
pub async fn read_message<R, T>(reader: &mut R) -> ProtocolResult<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    match read_frame(reader).await? {
        Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
        None => Ok(None),
    }
}

/// Encodes and writes one framed message, then flushes.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> ProtocolResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let data = encode_message(message)?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

fn checked_len(len: usize) -> ProtocolResult<u32> {
    match u32::try_from(len) {
        Ok(len) if len <= MAX_MESSAGE_SIZE => Ok(len),
        _ => Err(ProtocolError::MessageTooLarge {
            size: u32::try_from(len).unwrap_or(u32::MAX),
            max: MAX_MESSAGE_SIZE,
        }),
    }
}

fn frame_len(prefix: [u8; 4]) -> ProtocolResult<usize> {
    let len = u32::from_be_bytes(prefix);
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    if len == 0 {
        return Err(ProtocolError::EmptyMessage);
    }
    Ok(len as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Envelope, InvokeParams, PingParams, Request, Response};

    fn record_request(id: &str) -> Envelope<Request> {
        Envelope::request(id, Request::Invoke(InvokeParams::new("rec-1", "record")))
    }

    #[test]
    fn length_prefix_matches_payload() {
        let envelope = record_request("req-123");
        let bytes = encode_message(&envelope).unwrap();

        let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(len as usize, bytes.len() - 4);

        let decoded: Envelope<Request> = decode_message(&bytes).unwrap();
        assert_eq!(envelope, decoded);
    }

    #[test]
    fn decode_incomplete_length() {
        let result: ProtocolResult<Envelope<Request>> = decode_message(&[0, 0]);
        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteMessage { expected: 4, .. })
        ));
    }

    #[test]
    fn decode_incomplete_payload() {
        let mut data = vec![0, 0, 0, 100];
        data.extend_from_slice(&[0u8; 10]);

        let result: ProtocolResult<Envelope<Request>> = decode_message(&data);
        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteMessage { expected: 104, received: 14 })
        ));
    }

    #[test]
    fn message_too_large() {
        let data = (MAX_MESSAGE_SIZE + 1).to_be_bytes();
        let result: ProtocolResult<Envelope<Request>> = decode_message(&data);
        assert!(matches!(result, Err(ProtocolError::MessageTooLarge { .. })));
    }

    #[tokio::test]
    async fn read_frame_clean_eof() {
        let mut reader: &[u8] = &[];
        let frame = read_frame(&mut reader).await.unwrap();
        assert!(frame.is_none());
    }

    #[tokio::test]
    async fn read_frame_rejects_empty_frame() {
        let data = 0u32.to_be_bytes();
        let mut reader: &[u8] = &data;
        let result = read_frame(&mut reader).await;
        assert!(matches!(result, Err(ProtocolError::EmptyMessage)));
    }

    #[tokio::test]
    async fn read_frame_truncated_payload_is_io_error() {
        let mut data = 20u32.to_be_bytes().to_vec();
        data.extend_from_slice(b"{\"jsonrpc\"");
        let mut reader: &[u8] = &data;
        let result = read_frame(&mut reader).await;
        assert!(matches!(result, Err(ProtocolError::Io(_))));
    }

    #[tokio::test]
    async fn messages_written_back_to_back_are_read_in_order() {
        let first = record_request("1");
        let second = Envelope::request("2", Request::Ping(PingParams::default()));

        let mut buffer = Vec::new();
        write_message(&mut buffer, &first).await.unwrap();
        write_message(&mut buffer, &second).await.unwrap();

        let mut reader: &[u8] = &buffer;
        let a: Envelope<Request> = read_message(&mut reader).await.unwrap().unwrap();
        let b: Envelope<Request> = read_message(&mut reader).await.unwrap().unwrap();
        let eof: Option<Envelope<Request>> = read_message(&mut reader).await.unwrap();

        assert_eq!(a, first);
        assert_eq!(b, second);
        assert!(eof.is_none());
    }

    #[tokio::test]
    async fn response_frame_decodes() {
        let response = Envelope::response("req-9", Response::success(serde_json::Value::Null));
        let mut buffer = Vec::new();
        write_message(&mut buffer, &response).await.unwrap();

        let mut reader: &[u8] = &buffer;
        let decoded: Envelope<Response> = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(decoded.id.as_str(), "req-9");
        assert_eq!(decoded.payload.result, Some(serde_json::Value::Null));
    }
}
