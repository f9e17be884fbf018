//! The inbound accept loop (§4.5, §5): binds `127.0.0.1:{port}`, spawns one task per
//! accepted connection, and selects over the shared shutdown broadcast so new connections
//! stop being accepted on `Signal::Shutdown` while in-flight sessions finish on their own
//! (each `ConnectionDriver::run` subscribes independently).

use std::net::SocketAddr;
use std::sync::Arc;

use fwdr_common::error::ListenerError;
use fwdr_common::Signal;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::driver::{ConnectionDriver, DriverConfig};
use crate::handler::{BodyHandler, RecipientHandler};

pub struct Listener {
    addr: SocketAddr,
    recipient_handler: Arc<dyn RecipientHandler>,
    body_handler: Arc<dyn BodyHandler>,
    hostname: String,
}

impl Listener {
    #[must_use]
    pub fn new(addr: SocketAddr, hostname: String, recipient_handler: Arc<dyn RecipientHandler>, body_handler: Arc<dyn BodyHandler>) -> Self {
        Self { addr, recipient_handler, body_handler, hostname }
    }

    /// Runs the accept loop until `shutdown` fires.
    ///
    /// # Errors
    /// Returns [`ListenerError::Bind`] if the port cannot be bound.
    pub async fn serve(&self, shutdown: broadcast::Sender<Signal>) -> Result<(), ListenerError> {
        let listener = TcpListener::bind(self.addr).await.map_err(|source| ListenerError::Bind { addr: self.addr, source })?;
        info!(addr = %self.addr, "smtp listener bound");

        let mut sessions = Vec::new();
        let mut shutdown_rx = shutdown.subscribe();

        loop {
            tokio::select! {
                biased;
                signal = shutdown_rx.recv() => {
                    if matches!(signal, Ok(Signal::Shutdown) | Err(broadcast::error::RecvError::Closed)) {
                        info!(addr = %self.addr, "listener shutting down, draining in-flight sessions");
                        break;
                    }
                }
                accepted = listener.accept() => {
                    let (stream, peer) = accepted.map_err(ListenerError::Accept)?;
                    debug!(%peer, "connection accepted");

                    let config = DriverConfig { hostname: self.hostname.clone(), ..DriverConfig::default() };
                    let driver = ConnectionDriver::new(stream, config, self.recipient_handler.clone(), self.body_handler.clone());
                    let session_shutdown = shutdown.subscribe();

                    sessions.push(tokio::spawn(async move {
                        if let Err(err) = driver.run(session_shutdown).await {
                            warn!(%peer, %err, "connection ended with a protocol error");
                        }
                    }));
                }
            }
        }

        for session in sessions {
            let _ = session.await;
        }
        Ok(())
    }
}
