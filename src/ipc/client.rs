//! IPC client for sending requests to a running server.

use crate::error::{Result, VoxturnError};
use crate::ipc::protocol::{Request, Response};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Send a request and read responses until the final one.
///
/// `on_event` is called for every intermediate `event` response, in order.
///
/// # Errors
/// Returns `VoxturnError::IpcConnection` if the connection fails or the
/// server hangs up before sending a final response.
/// Returns `VoxturnError::IpcProtocol` if serialization/deserialization fails
pub async fn send_request<F>(socket_path: &Path, request: &Request, mut on_event: F) -> Result<Response>
where
    F: FnMut(&Response),
{
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| VoxturnError::IpcConnection {
            message: format!("Failed to connect to server: {}", e),
        })?;

    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let mut request_json = request.to_json().map_err(|e| VoxturnError::IpcProtocol {
        message: format!("Failed to serialize request: {}", e),
    })?;
    request_json.push('\n');

    writer
        .write_all(request_json.as_bytes())
        .await
        .map_err(|e| VoxturnError::IpcConnection {
            message: format!("Failed to write request: {}", e),
        })?;

    writer
        .flush()
        .await
        .map_err(|e| VoxturnError::IpcConnection {
            message: format!("Failed to flush writer: {}", e),
        })?;

    let mut line = String::new();
    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| VoxturnError::IpcConnection {
                message: format!("Failed to read response: {}", e),
            })?;
        if read == 0 {
            return Err(VoxturnError::IpcConnection {
                message: "Server closed the connection without a final response".to_string(),
            });
        }

        let response = Response::from_json(line.trim()).map_err(|e| VoxturnError::IpcProtocol {
            message: format!("Failed to deserialize response: {}", e),
        })?;
        if response.is_final() {
            return Ok(response);
        }
        on_event(&response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::server::{IpcServer, RequestHandler};
    use crate::pipeline::events::TurnEvent;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    struct MockHandler;

    #[async_trait::async_trait]
    impl RequestHandler for MockHandler {
        async fn handle(&self, request: Request, replies: mpsc::UnboundedSender<Response>) {
            match request {
                Request::Say { text, .. } => {
                    for status in ["Synthesizing...", "Playing..."] {
                        let event = Response::Event {
                            event: TurnEvent::status(status),
                        };
                        if replies.send(event).is_err() {
                            return;
                        }
                    }
                    if replies
                        .send(Response::Error {
                            message: format!("cannot say {}", text),
                        })
                        .is_err()
                    {
                        tracing::trace!("client left");
                    }
                }
                // Hang up without a final response
                Request::Interrupt => {}
                _ => {
                    if replies.send(Response::Pong).is_err() {
                        tracing::trace!("client left");
                    }
                }
            }
        }
    }

    async fn start_server(socket_path: std::path::PathBuf) -> tokio::task::JoinHandle<Result<()>> {
        let handle = tokio::spawn(async move { IpcServer::new(socket_path).start(MockHandler).await });
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        handle
    }

    #[tokio::test]
    async fn test_send_request_ping() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        let server = start_server(socket_path.clone()).await;

        let response = send_request(&socket_path, &Request::Ping, |_| {})
            .await
            .unwrap();

        assert_eq!(response, Response::Pong);
        server.abort();
    }

    #[tokio::test]
    async fn test_send_request_collects_events() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        let server = start_server(socket_path.clone()).await;

        let mut events = Vec::new();
        let request = Request::Say {
            text: "hi".to_string(),
            session: None,
        };
        let response = send_request(&socket_path, &request, |r| events.push(r.clone()))
            .await
            .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(
            response,
            Response::Error {
                message: "cannot say hi".to_string()
            }
        );
        server.abort();
    }

    #[tokio::test]
    async fn test_missing_final_response_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        let server = start_server(socket_path.clone()).await;

        let result = send_request(&socket_path, &Request::Interrupt, |_| {}).await;

        assert!(matches!(result, Err(VoxturnError::IpcConnection { .. })));
        server.abort();
    }

    #[tokio::test]
    async fn test_send_request_connection_failed() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("nonexistent.sock");

        let result = send_request(&socket_path, &Request::Status, |_| {}).await;

        match result {
            Err(VoxturnError::IpcConnection { message }) => {
                assert!(message.contains("Failed to connect to server"));
            }
            other => panic!("Expected IpcConnection error, got: {:?}", other),
        }
    }
}
