use std::{io, net::SocketAddr, time::Duration};

use scope_protocol::error::{FormatError, HeaderError};
use thiserror::Error;

/// Errors that abort a capture.
///
/// A block that ends before its declared length is not an error; see
/// [`crate::block::BlockTransfer::is_truncated`].
#[derive(Debug, Error)]
pub enum Error {
    /// The reachability probe could not open a connection.
    #[error("Instrument at {target} is unreachable: {source}")]
    Unreachable { target: String, source: io::Error },
    #[error("Failed to connect to {addr}: {source}")]
    Connect { addr: SocketAddr, source: io::Error },
    /// A read or write other than a read timeout failed while polling `*OPC?`.
    #[error("Readiness handshake failed: {0}")]
    Handshake(#[source] io::Error),
    #[error("Instrument not ready after {waited:?} ({polls} polls)")]
    NotReady { waited: Duration, polls: u32 },
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("Invalid block header: {0}")]
    Protocol(#[from] HeaderError),
    #[error("Block of {got} bytes exceeds the maximum of {max} bytes")]
    BlockTooLarge { max: usize, got: usize },
    #[error("Buffer is too short: received {received} bytes, but at least {needed} are required")]
    BufferTooShort { received: usize, needed: usize },
    #[error("Malformed PNG: {0}")]
    Format(#[from] FormatError),
    #[error("Failed to store capture: {0}")]
    Sink(#[source] Box<dyn std::error::Error + Send + Sync>),
}
