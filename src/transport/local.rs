//! Local IPC transport over Unix Domain Sockets.
//!
//! Every accepted connection gets its own [`RpcSession`] sharing one
//! [`ActionTable`], so each connection has an independent pending-call
//! registry.

#[cfg(unix)]
use std::path::Path;
#[cfg(unix)]
use std::sync::atomic::{AtomicU32, Ordering};
#[cfg(unix)]
use std::sync::Arc;
#[cfg(unix)]
use std::time::Duration;
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};
#[cfg(unix)]
use tokio::sync::mpsc;
#[cfg(unix)]
use tokio::task::JoinHandle;
#[cfg(unix)]
use tracing::{debug, error, info, instrument, warn};

#[cfg(unix)]
use crate::config::SessionConfig;
#[cfg(unix)]
use crate::core::serialization::Serializer;
#[cfg(unix)]
use crate::error::Result;
#[cfg(unix)]
use crate::protocol::dispatcher::ActionTable;
#[cfg(unix)]
use crate::transport::session::{check_serializer, RpcSession};

/// How long shutdown waits for open connections to finish.
#[cfg(unix)]
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Start a Unix domain socket server that stops on CTRL+C.
#[cfg(unix)]
#[instrument(skip(path, config, actions), fields(socket_path = %path.as_ref().display()))]
pub async fn start_server<P, S>(
    path: P,
    config: SessionConfig,
    actions: Arc<ActionTable<S>>,
) -> Result<()>
where
    P: AsRef<Path>,
    S: Serializer,
{
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL+C signal, shutting down");
            let _ = shutdown_tx.send(()).await;
        }
    });

    start_server_with_shutdown(path, config, actions, shutdown_rx).await
}

/// Start a Unix domain socket server with an external shutdown channel.
///
/// Serves `actions` on every accepted connection. On shutdown, waits up to
/// ten seconds for open sessions to end, then removes the socket file.
#[cfg(unix)]
#[instrument(skip(path, config, actions, shutdown_rx), fields(socket_path = %path.as_ref().display()))]
pub async fn start_server_with_shutdown<P, S>(
    path: P,
    config: SessionConfig,
    actions: Arc<ActionTable<S>>,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()>
where
    P: AsRef<Path>,
    S: Serializer,
{
    check_serializer(&config, actions.serializer().as_ref())?;

    if path.as_ref().exists() {
        tokio::fs::remove_file(&path).await.ok();
    }

    let path_string = path.as_ref().to_string_lossy().to_string();
    let listener = UnixListener::bind(&path)?;
    info!(path = %path_string, "Listening on unix socket");

    let active = Arc::new(AtomicU32::new(0));
    let mut sessions: Vec<RpcSession<S>> = Vec::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutting down server. Closing sessions...");
                for session in &sessions {
                    session.close();
                }

                let deadline = tokio::time::sleep(SHUTDOWN_GRACE);
                tokio::pin!(deadline);

                loop {
                    tokio::select! {
                        _ = &mut deadline => {
                            warn!("Shutdown timeout reached, forcing exit");
                            break;
                        }
                        _ = tokio::time::sleep(Duration::from_millis(50)) => {
                            let connections = active.load(Ordering::Acquire);
                            if connections == 0 {
                                info!("All connections closed, shutting down");
                                break;
                            }
                            debug!(connections, "Waiting for connections to close");
                        }
                    }
                }

                if Path::new(&path_string).exists() {
                    if let Err(e) = tokio::fs::remove_file(&path_string).await {
                        error!(error = %e, path = %path_string, "Failed to remove socket file");
                    } else {
                        info!(path = %path_string, "Removed socket file");
                    }
                }

                return Ok(());
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _)) => {
                        let (session, queue) = match RpcSession::new(config.clone(), Arc::clone(&actions)) {
                            Ok(created) => created,
                            Err(e) => {
                                error!(error = %e, "Failed to create session");
                                continue;
                            }
                        };
                        active.fetch_add(1, Ordering::AcqRel);
                        sessions.retain(|s| !s.is_closed());
                        sessions.push(session.clone());

                        let active = Arc::clone(&active);
                        tokio::spawn(async move {
                            if let Err(e) = session.run(stream, queue).await {
                                debug!(error = %e, "Session ended with error");
                            }
                            active.fetch_sub(1, Ordering::AcqRel);
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                    }
                }
            }
        }
    }
}

/// Connect to a local socket and drive the session on a spawned task.
#[cfg(unix)]
#[instrument(skip(path, config, actions), fields(socket_path = %path.as_ref().display()))]
pub async fn connect<P, S>(
    path: P,
    config: SessionConfig,
    actions: Arc<ActionTable<S>>,
) -> Result<(RpcSession<S>, JoinHandle<Result<()>>)>
where
    P: AsRef<Path>,
    S: Serializer,
{
    let stream = UnixStream::connect(path).await?;
    RpcSession::spawn(stream, config, actions)
}
