// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! A running TLS accept loop that can be stopped and awaited.

use async_trait::async_trait;
use rustls::ServerConfig;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use tokio::net::{TcpSocket, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use crate::error::{CourierError, Result};

/// Serves one established TLS connection
#[async_trait]
pub trait ConnectionHandler: Send + Sync + 'static {
    async fn serve(&self, stream: TlsStream<TcpStream>, peer: SocketAddr);
}

const BACKLOG: u32 = 1024;

pub struct TlsListener {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl TlsListener {
    /// Bind `addr` and start accepting. Handshakes run on their own tasks.
    pub async fn bind(
        addr: SocketAddr,
        config: Arc<ServerConfig>,
        handler: Weak<dyn ConnectionHandler>,
    ) -> Result<Self> {
        let listener = bind_reusable(addr)
            .map_err(|e| CourierError::Listener(format!("Failed to bind {}: {}", addr, e)))?;
        let local_addr = listener.local_addr()?;
        let acceptor = TlsAcceptor::from(config);
        let (shutdown, mut stop) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop => break,
                    accepted = listener.accept() => {
                        let (stream, peer) = match accepted {
                            Ok(conn) => conn,
                            Err(e) => {
                                warn!("Failed to accept TLS connection: {}", e);
                                continue;
                            }
                        };
                        let acceptor = acceptor.clone();
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            match acceptor.accept(stream).await {
                                Ok(tls) => {
                                    if let Some(handler) = handler.upgrade() {
                                        handler.serve(tls, peer).await;
                                    }
                                }
                                Err(e) => debug!("TLS handshake with {} failed: {}", peer, e),
                            }
                        });
                    }
                }
            }
            debug!("TLS accept loop on {} stopped", local_addr);
        });

        info!("HTTPS listening on {}", local_addr);
        Ok(Self {
            local_addr,
            shutdown,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and wait until the listening socket is closed.
    /// Connections already accepted keep running to completion.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            warn!("TLS accept loop on {} ended abnormally: {}", self.local_addr, e);
        }
        info!("HTTPS listener on {} closed", self.local_addr);
    }
}

fn bind_reusable(addr: SocketAddr) -> std::io::Result<tokio::net::TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(BACKLOG)
}
