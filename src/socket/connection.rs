//! Per-connection request loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::commands::{CommandParams, CommandRegistry, CommandResult, ExecutionContext};
use crate::config::LimitsConfig;
use crate::error::{DaemonError, ProtocolErrorKind};
use crate::protocol::{read_message_with_timeout, write_message_with_timeout, Request, Response};

/// Serve requests on `stream` until the client hangs up or goes idle.
///
/// A client may send any number of requests; each gets exactly one response,
/// in order.
pub async fn handle_connection(
    stream: UnixStream,
    limits: LimitsConfig,
    command_registry: Arc<CommandRegistry>,
) -> Result<(), DaemonError> {
    let (mut reader, mut writer) = stream.into_split();
    serve(&mut reader, &mut writer, &limits, &command_registry).await
}

async fn serve<R, W>(
    reader: &mut R,
    writer: &mut W,
    limits: &LimitsConfig,
    command_registry: &Arc<CommandRegistry>,
) -> Result<(), DaemonError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let socket_timeout = Duration::from_secs(limits.socket_timeout_seconds);

    loop {
        let frame =
            match read_message_with_timeout(reader, limits.max_message_size, socket_timeout).await {
                Ok(frame) => frame,
                Err(DaemonError::Protocol {
                    kind: ProtocolErrorKind::ConnectionClosed,
                }) => {
                    debug!("Client disconnected");
                    return Ok(());
                }
                Err(DaemonError::Protocol {
                    kind: ProtocolErrorKind::ConnectionTimeout,
                }) => {
                    debug!(idle_seconds = limits.socket_timeout_seconds, "Idle connection closed");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

        let request_id = Uuid::new_v4();
        let response = match serde_json::from_slice::<Request>(&frame) {
            Ok(request) => dispatch(request_id, request, command_registry).await,
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "Malformed request");
                Response::error_with_id(request_id, "PROTOCOL_ERROR", format!("Invalid request: {}", e))
            }
        };

        let encoded = serde_json::to_vec(&response)?;
        write_message_with_timeout(writer, &encoded, socket_timeout).await?;
    }
}

/// Run one request on a blocking worker and turn its outcome into a response.
async fn dispatch(request_id: Uuid, request: Request, command_registry: &Arc<CommandRegistry>) -> Response {
    let started = Instant::now();
    let Request { command, params } = request;

    let mutating = command_registry
        .get(&command)
        .map_or(false, |handler| handler.mutating());
    if mutating {
        info!(request_id = %request_id, command = %command, "Received request");
    } else {
        debug!(request_id = %request_id, command = %command, "Received request");
    }

    let ctx = ExecutionContext::new(request_id, command.as_str());
    let registry = Arc::clone(command_registry);
    let name = command.clone();
    let joined = tokio::task::spawn_blocking(move || {
        registry.dispatch(&ctx, &name, CommandParams::new(params))
    })
    .await;

    let duration_ms = started.elapsed().as_millis() as u64;

    match joined {
        Ok(Ok(result)) => {
            if mutating || !result.success {
                info!(
                    request_id = %request_id,
                    command = %command,
                    success = result.success,
                    code = ?result.error_code,
                    duration_ms,
                    "Command executed"
                );
            } else {
                debug!(request_id = %request_id, command = %command, duration_ms, "Command executed");
            }
            into_response(request_id, result)
        }
        Ok(Err(e)) => {
            warn!(
                request_id = %request_id,
                command = %command,
                code = e.code(),
                error = %e,
                duration_ms,
                "Request rejected"
            );
            Response::error_with_id(request_id, e.code(), e.to_string())
        }
        Err(e) => {
            error!(request_id = %request_id, command = %command, error = %e, "Command worker panicked");
            Response::error_with_id(request_id, "INTERNAL_ERROR", "Command execution failed")
        }
    }
}

fn into_response(request_id: Uuid, result: CommandResult) -> Response {
    if result.success {
        return Response::success_with_id(
            request_id,
            result.data.unwrap_or_else(|| serde_json::json!({})),
        );
    }

    let response = Response::error_with_id(
        request_id,
        result.error_code.unwrap_or_else(|| "COMMAND_ERROR".to_string()),
        result.error_message.unwrap_or_else(|| "Command failed".to_string()),
    );
    match result.error_details {
        Some(details) => response.with_details(details),
        None => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::TestBackend;
    use crate::protocol::{read_json, write_json, write_message, DEFAULT_MAX_MESSAGE_SIZE};

    fn limits() -> LimitsConfig {
        LimitsConfig {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_concurrent_requests: 4,
            socket_timeout_seconds: 5,
        }
    }

    #[test]
    fn test_requests_answered_in_order() {
        let harness = TestBackend::new();
        let registry = Arc::new(CommandRegistry::new(harness.backend()));

        harness.block_on(async move {
            let (client, server) = tokio::io::duplex(64 * 1024);
            let (mut server_read, mut server_write) = tokio::io::split(server);
            let server_task = tokio::spawn(async move {
                serve(&mut server_read, &mut server_write, &limits(), &registry).await
            });

            let (mut client_read, mut client_write) = tokio::io::split(client);

            write_message(&mut client_write, b"[1, 2").await.unwrap();
            write_json(&mut client_write, &Request::new("system.nope")).await.unwrap();
            write_json(&mut client_write, &Request::new("system.ping")).await.unwrap();

            let malformed: Response = read_json(&mut client_read, DEFAULT_MAX_MESSAGE_SIZE).await.unwrap();
            assert_eq!(malformed.error.unwrap().code, "PROTOCOL_ERROR");

            let unknown: Response = read_json(&mut client_read, DEFAULT_MAX_MESSAGE_SIZE).await.unwrap();
            assert_eq!(unknown.error.unwrap().code, "UNKNOWN_COMMAND");

            let pong: Response = read_json(&mut client_read, DEFAULT_MAX_MESSAGE_SIZE).await.unwrap();
            assert!(pong.success);
            assert_eq!(pong.data.unwrap()["request_id"], pong.request_id.to_string());

            drop(client_write);
            drop(client_read);
            assert!(server_task.await.unwrap().is_ok());
        });
    }

    #[test]
    fn test_failed_result_keeps_details() {
        let id = Uuid::new_v4();
        let result = CommandResult::failure_with_details(
            "SYNTAX_ERROR",
            "Configuration rejected by syntax check",
            serde_json::json!({"outcome": "failed_no_rollback"}),
        );

        let response = into_response(id, result);
        assert!(!response.success);
        assert_eq!(response.request_id, id);
        let error = response.error.unwrap();
        assert_eq!(error.code, "SYNTAX_ERROR");
        assert_eq!(error.details.unwrap()["outcome"], "failed_no_rollback");
    }
}
