//! Status socket: JSON-lines requests in, responses and engine events out

use crate::event::MonitorEvent;
use crate::protocol::{Request, Response};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[async_trait::async_trait]
pub trait RequestHandler {
    async fn handle(&self, request: Request) -> Response;
}

pub struct StatusServer {
    path: PathBuf,
    listener: UnixListener,
}

impl StatusServer {
    /// `/run/user/<uid>/idle-guard.sock`
    pub fn default_path() -> PathBuf {
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/run/user/{}/idle-guard.sock", uid))
    }

    /// Binds `path`, replacing a socket left behind by an earlier run.
    pub async fn bind(path: &Path) -> io::Result<Self> {
        match std::fs::remove_file(path) {
            Ok(()) => debug!("Removed stale socket {:?}", path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let listener = UnixListener::bind(path)?;
        info!("Status socket listening on {:?}", path);
        Ok(Self { path: path.to_path_buf(), listener })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serves clients until the task is dropped. Every client gets its own
    /// event subscription from `subscribe`, taken when it connects.
    pub async fn serve<H, F>(self, handler: Arc<H>, subscribe: F)
    where
        H: RequestHandler + Send + Sync + 'static,
        F: Fn() -> broadcast::Receiver<MonitorEvent> + Send + 'static,
    {
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    debug!("Status client connected");
                    tokio::spawn(serve_client(stream, subscribe(), Arc::clone(&handler)));
                }
                Err(e) => {
                    error!("Failed to accept status client: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}

impl Drop for StatusServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn send<W: AsyncWrite + Unpin>(writer: &mut W, response: &Response) -> io::Result<()> {
    let mut line = serde_json::to_vec(response)?;
    line.push(b'\n');
    writer.write_all(&line).await
}

async fn answer<H: RequestHandler>(handler: &H, line: &str) -> Response {
    match serde_json::from_str::<Request>(line) {
        Ok(request) => handler.handle(request).await,
        Err(e) => {
            warn!("Invalid status request: {}", e);
            Response::error(format!("invalid request: {}", e))
        }
    }
}

/// One client: answers each request line and forwards engine events as
/// `{"type":"event",...}` lines until either side closes.
pub async fn serve_client<H>(stream: UnixStream, mut events: broadcast::Receiver<MonitorEvent>, handler: Arc<H>)
where
    H: RequestHandler + Send + Sync + 'static,
{
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let outgoing = tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => answer(handler.as_ref(), line.trim()).await,
                Ok(None) => break,
                Err(e) => {
                    debug!("Status client read failed: {}", e);
                    break;
                }
            },
            event = events.recv() => match event {
                Ok(event) => Response::Event { data: event },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Status client missed {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        if let Err(e) = send(&mut writer, &outgoing).await {
            debug!("Status client went away: {}", e);
            break;
        }
    }
    debug!("Status client disconnected");
}
