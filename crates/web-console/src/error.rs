//! Status console errors

use std::net::SocketAddr;

use thiserror::Error;

/// Error type for the status console
#[derive(Error, Debug)]
pub enum Error {
    /// The listening socket could not be bound
    #[error("Failed to bind status server on {addr}: {source}")]
    Bind {
        /// Requested listen address
        addr: SocketAddr,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The server stopped with an I/O error
    #[error("Status server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Result type for the status console
pub type Result<T> = std::result::Result<T, Error>;
