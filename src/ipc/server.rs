//! Async Unix socket server streaming turn progress to clients.

use crate::error::{Result, VoxturnError};
use crate::ipc::protocol::{Request, Response};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Mutex, mpsc};

/// Handler trait for processing IPC requests.
///
/// The handler sends any number of responses through `replies`; the last one
/// must be final (see [`Response::is_final`]). The connection is closed once
/// the handler returns.
#[async_trait::async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request: Request, replies: mpsc::UnboundedSender<Response>);
}

/// State for managing server shutdown.
#[derive(Debug, Clone)]
struct ServerState {
    shutdown: Arc<Mutex<bool>>,
}

impl ServerState {
    fn new() -> Self {
        Self {
            shutdown: Arc::new(Mutex::new(false)),
        }
    }

    async fn is_shutdown(&self) -> bool {
        *self.shutdown.lock().await
    }

    async fn set_shutdown(&self) {
        *self.shutdown.lock().await = true;
    }
}

/// IPC server accepting one request per connection.
pub struct IpcServer {
    socket_path: PathBuf,
    state: ServerState,
}

impl IpcServer {
    /// Create a new IPC server bound to the specified socket path.
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            state: ServerState::new(),
        }
    }

    /// Get the socket path this server is using.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Get the default socket path based on XDG_RUNTIME_DIR or fallback.
    pub fn default_socket_path() -> PathBuf {
        if let Ok(xdg_runtime) = std::env::var("XDG_RUNTIME_DIR")
            && !xdg_runtime.is_empty()
        {
            PathBuf::from(xdg_runtime).join("voxturn.sock")
        } else {
            // SAFETY: getuid has no preconditions and cannot fail
            let uid = unsafe { libc::getuid() };
            PathBuf::from(format!("/tmp/voxturn-{}.sock", uid))
        }
    }

    /// Start the IPC server and handle incoming connections until stopped.
    pub async fn start<H>(&self, handler: H) -> Result<()>
    where
        H: RequestHandler + 'static,
    {
        // Clean up any existing socket file
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| VoxturnError::IpcSocket {
                message: format!("Failed to remove existing socket: {}", e),
            })?;
        }

        let listener =
            UnixListener::bind(&self.socket_path).map_err(|e| VoxturnError::IpcSocket {
                message: format!("Failed to bind to socket: {}", e),
            })?;
        tracing::info!("listening on {}", self.socket_path.display());

        let handler = Arc::new(handler);

        loop {
            if self.state.is_shutdown().await {
                break;
            }

            // Accept connection with timeout to check for shutdown
            let accept_result =
                tokio::time::timeout(tokio::time::Duration::from_millis(100), listener.accept())
                    .await;

            match accept_result {
                Ok(Ok((stream, _))) => {
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, handler).await {
                            tracing::warn!("client connection failed: {}", e);
                        }
                    });
                }
                Ok(Err(e)) => {
                    return Err(VoxturnError::IpcConnection {
                        message: format!("Failed to accept connection: {}", e),
                    });
                }
                Err(_) => continue,
            }
        }

        Ok(())
    }

    /// Stop the IPC server and clean up the socket file.
    pub async fn stop(&self) -> Result<()> {
        self.state.set_shutdown().await;

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| VoxturnError::IpcSocket {
                message: format!("Failed to remove socket file: {}", e),
            })?;
        }

        Ok(())
    }
}

/// Handle a single client connection.
async fn handle_client<H>(stream: UnixStream, handler: Arc<H>) -> Result<()>
where
    H: RequestHandler + 'static,
{
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    reader
        .read_line(&mut line)
        .await
        .map_err(|e| VoxturnError::IpcConnection {
            message: format!("Failed to read from client: {}", e),
        })?;

    let request = match Request::from_json(line.trim()) {
        Ok(request) => request,
        Err(e) => {
            let message = format!("Failed to parse request: {}", e);
            write_response(&mut writer, &Response::Error {
                message: message.clone(),
            })
            .await?;
            return Err(VoxturnError::IpcProtocol { message });
        }
    };
    tracing::debug!(?request, "request received");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move { handler.handle(request, tx).await });

    while let Some(response) = rx.recv().await {
        write_response(&mut writer, &response).await?;
    }

    if let Err(e) = task.await {
        let message = format!("request handler failed: {}", e);
        write_response(&mut writer, &Response::Error {
            message: message.clone(),
        })
        .await?;
        return Err(VoxturnError::Other(message));
    }

    Ok(())
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &Response) -> Result<()> {
    let mut json = response.to_json().map_err(|e| VoxturnError::IpcProtocol {
        message: format!("Failed to serialize response: {}", e),
    })?;
    json.push('\n');

    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| VoxturnError::IpcConnection {
            message: format!("Failed to write to client: {}", e),
        })?;

    writer
        .flush()
        .await
        .map_err(|e| VoxturnError::IpcConnection {
            message: format!("Failed to flush writer: {}", e),
        })
}
