//! Wire format for message framing.
//!
//! Messages are length-prefixed: [4 bytes big-endian u32][JSON payload]

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::error::{DaemonError, ProtocolErrorKind};

use super::{Request, Response};

/// Default ceiling for one frame; `limits.max_message_size` overrides it.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1_048_576;

/// Read a length-prefixed frame and return its payload.
///
/// EOF before the length prefix is `ConnectionClosed`; a prefix above
/// `max_size` is `MessageTooLarge` and nothing else is read.
pub async fn read_message<R>(reader: &mut R, max_size: usize) -> Result<Vec<u8>, DaemonError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(DaemonError::Protocol {
                kind: ProtocolErrorKind::ConnectionClosed,
            });
        }
        Err(e) => return Err(DaemonError::Io(e)),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_size {
        return Err(DaemonError::Protocol {
            kind: ProtocolErrorKind::MessageTooLarge {
                size: len,
                max: max_size,
            },
        });
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            DaemonError::Protocol {
                kind: ProtocolErrorKind::InvalidMessageFormat {
                    message: format!("frame truncated, expected {} bytes", len),
                },
            }
        } else {
            DaemonError::Io(e)
        }
    })?;

    Ok(buf)
}

/// Write `data` as one length-prefixed frame.
pub async fn write_message<W>(writer: &mut W, data: &[u8]) -> Result<(), DaemonError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(data.len()).map_err(|_| DaemonError::Protocol {
        kind: ProtocolErrorKind::MessageTooLarge {
            size: data.len(),
            max: u32::MAX as usize,
        },
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// [`read_message`] bounded by `timeout_duration` (`ConnectionTimeout`).
pub async fn read_message_with_timeout<R>(
    reader: &mut R,
    max_size: usize,
    timeout_duration: Duration,
) -> Result<Vec<u8>, DaemonError>
where
    R: AsyncRead + Unpin,
{
    timeout(timeout_duration, read_message(reader, max_size))
        .await
        .map_err(|_| DaemonError::Protocol {
            kind: ProtocolErrorKind::ConnectionTimeout,
        })?
}

/// [`write_message`] bounded by `timeout_duration` (`ConnectionTimeout`).
pub async fn write_message_with_timeout<W>(
    writer: &mut W,
    data: &[u8],
    timeout_duration: Duration,
) -> Result<(), DaemonError>
where
    W: AsyncWrite + Unpin,
{
    timeout(timeout_duration, write_message(writer, data))
        .await
        .map_err(|_| DaemonError::Protocol {
            kind: ProtocolErrorKind::ConnectionTimeout,
        })?
}

/// Serialize `value` and write it as one frame.
pub async fn write_json<W, T>(writer: &mut W, value: &T) -> Result<(), DaemonError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = serde_json::to_vec(value)?;
    write_message(writer, &bytes).await
}

/// Read one frame and deserialize it.
pub async fn read_json<R, T>(reader: &mut R, max_size: usize) -> Result<T, DaemonError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let bytes = read_message(reader, max_size).await?;
    serde_json::from_slice(&bytes).map_err(|e| DaemonError::Protocol {
        kind: ProtocolErrorKind::InvalidMessageFormat {
            message: format!("Invalid JSON: {}", e),
        },
    })
}

/// Client side of one exchange: send `request`, wait for its response.
pub async fn call<S>(stream: &mut S, request: &Request) -> Result<Response, DaemonError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_json(stream, request).await?;
    read_json(stream, DEFAULT_MAX_MESSAGE_SIZE).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_frame_layout() {
        let mut buffer = Vec::new();
        write_message(&mut buffer, b"hello world").await.unwrap();

        assert_eq!(&buffer[0..4], &[0, 0, 0, 11]);
        assert_eq!(&buffer[4..], b"hello world");
    }

    #[tokio::test]
    async fn test_message_too_large() {
        let data = vec![0u8; 100];
        let mut cursor = Cursor::new(data);

        let len_bytes = 2_000_000u32.to_be_bytes();
        cursor.get_mut()[0..4].copy_from_slice(&len_bytes);

        let result = read_message(&mut cursor, DEFAULT_MAX_MESSAGE_SIZE).await;
        assert!(matches!(
            result,
            Err(DaemonError::Protocol {
                kind: ProtocolErrorKind::MessageTooLarge { .. }
            })
        ));
    }

    #[tokio::test]
    async fn test_eof_and_truncation() {
        let mut empty = Cursor::new(Vec::new());
        assert!(matches!(
            read_message(&mut empty, DEFAULT_MAX_MESSAGE_SIZE).await,
            Err(DaemonError::Protocol {
                kind: ProtocolErrorKind::ConnectionClosed
            })
        ));

        let mut truncated = Cursor::new(vec![0, 0, 0, 10, b'{']);
        assert!(matches!(
            read_message(&mut truncated, DEFAULT_MAX_MESSAGE_SIZE).await,
            Err(DaemonError::Protocol {
                kind: ProtocolErrorKind::InvalidMessageFormat { .. }
            })
        ));
    }

    #[tokio::test]
    async fn test_json_frames() {
        let mut buffer = Vec::new();
        let request = Request::new("service.status").with_param("service", "smb");
        write_json(&mut buffer, &request).await.unwrap();

        let mut cursor = Cursor::new(buffer);
        let parsed: Request = read_json(&mut cursor, DEFAULT_MAX_MESSAGE_SIZE)
            .await
            .unwrap();
        assert_eq!(parsed.command, "service.status");
        assert_eq!(parsed.params["service"], "smb");
    }

    #[tokio::test]
    async fn test_call_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        let server_task = tokio::spawn(async move {
            let request: Request = read_json(&mut server, DEFAULT_MAX_MESSAGE_SIZE)
                .await
                .unwrap();
            let response = Response::success(serde_json::json!({"echo": request.command}));
            write_json(&mut server, &response).await.unwrap();
        });

        let response = call(&mut client, &Request::new("system.ping")).await.unwrap();
        assert!(response.success);
        assert_eq!(response.data.unwrap()["echo"], "system.ping");
        server_task.await.unwrap();
    }
}
