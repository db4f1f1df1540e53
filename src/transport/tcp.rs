//! TCP client and server plumbing for sessions.

use std::net::SocketAddr;

use futures::future::join_all;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::config::TransportConfig;
use crate::error::{ProtocolError, Result};
use crate::session::{Session, SessionStatus};
use crate::utils::timeout::{non_zero, with_deadline};

/// Disconnect reason given to live sessions when a server stops
pub const SERVER_SHUTDOWN: &str = "Server shutting down.";

/// Bind a listener on the configured address
#[instrument(skip(config), fields(address = %config.address))]
pub async fn bind(config: &TransportConfig) -> Result<TcpListener> {
    let listener = TcpListener::bind(&config.address).await?;
    info!(address = %listener.local_addr()?, "Listening");
    Ok(listener)
}

/// Connect `session` to `addr`.
///
/// A failed or timed-out connect is routed through the session's failure path, so the
/// session ends up disconnected with a classified reason, and the error is returned.
#[instrument(skip(session, config), fields(session = session.id()))]
pub async fn connect(addr: &str, session: &Session, config: &TransportConfig) -> Result<()> {
    let connected = with_deadline(
        non_zero(config.connect_timeout),
        ProtocolError::ConnectTimeout,
        async {
            let stream = TcpStream::connect(addr).await?;
            Ok::<TcpStream, ProtocolError>(stream)
        },
    )
    .await;

    match connected {
        Ok(stream) => bind_stream(stream, session, config),
        Err(e) => {
            session.exception_caught(&e);
            Err(e)
        }
    }
}

/// Attach an established stream to `session`
pub fn bind_stream(stream: TcpStream, session: &Session, config: &TransportConfig) -> Result<()> {
    if config.tcp_nodelay {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to disable Nagle's algorithm");
        }
    }
    if session.status() == SessionStatus::Idle {
        if let Ok(peer) = stream.peer_addr() {
            session.context().set_peer_addr(peer);
        }
    }

    if session.attach(stream) {
        Ok(())
    } else {
        Err(ProtocolError::ChannelRejected)
    }
}

/// Accept connections until `shutdown_rx` fires or its sender is dropped.
///
/// `new_session` builds the session for each accepted peer. On shutdown every live session
/// is disconnected with [`SERVER_SHUTDOWN`] and the server waits up to the configured
/// shutdown timeout for their channels to close.
#[instrument(skip_all, fields(address = %config.address))]
pub async fn serve<F>(
    listener: TcpListener,
    config: TransportConfig,
    mut new_session: F,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()>
where
    F: FnMut(SocketAddr) -> Session,
{
    let mut sessions: Vec<Session> = Vec::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!(sessions = sessions.len(), "Shutting down server. Waiting for sessions to close...");
                for session in &sessions {
                    session.disconnect(SERVER_SHUTDOWN);
                }

                let closing = join_all(sessions.iter().map(|session| session.closed()));
                match non_zero(config.shutdown_timeout) {
                    Some(limit) => {
                        if tokio::time::timeout(limit, closing).await.is_err() {
                            warn!("Shutdown timeout reached, forcing exit");
                        }
                    }
                    None => {
                        closing.await;
                    }
                }
                info!("All sessions closed, shutting down");
                return Ok(());
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "Accepted connection");
                        sessions.retain(|session| !session.is_disconnected());

                        let session = new_session(peer);
                        match bind_stream(stream, &session, &config) {
                            Ok(()) => sessions.push(session),
                            Err(e) => warn!(peer = %peer, error = %e, "Failed to bind accepted connection"),
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                    }
                }
            }
        }
    }
}
