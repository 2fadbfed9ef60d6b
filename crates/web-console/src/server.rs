//! Listener and graceful shutdown

use std::net::SocketAddr;

use rtpmon_core::WindowReader;
use rtpmon_infra_common::CancellationToken;
use tokio::net::TcpListener;
use tracing::info;

use crate::error::{Error, Result};
use crate::routes::router;

/// Bound status server, not yet serving
pub struct StatusServer {
    listener: TcpListener,
    reader: WindowReader,
}

impl StatusServer {
    /// Bind the listening socket
    pub async fn bind(addr: SocketAddr, reader: WindowReader) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        Ok(Self { listener, reader })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve requests until `shutdown` is cancelled
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let addr = self.local_addr()?;
        info!(%addr, "status server listening");

        axum::serve(self.listener, router(self.reader))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!(%addr, "status server stopped");
        Ok(())
    }
}
