//! # Scope Client
//!
//! A blocking client that grabs the screen of a SCPI controlled oscilloscope over
//! its TCP control channel.
//!
//! ## Overview
//!
//! The client performs exactly one capture per connection:
//!
//! 1. probe the instrument and connect ([`session::Session::connect`])
//! 2. wait until the instrument is ready ([`ready::ReadinessGate`])
//! 3. identify the instrument with `*IDN?` ([`ScopeClient::identify`])
//! 4. fetch the screen as a binary block ([`ScopeClient::screen_data`])
//! 5. repair the PNG checksums ([`scope_protocol::png::repair`])
//! 6. hand the image to a [`capture::CaptureSink`] for decoding, annotation and storage
//!
//! Every read and write runs under a deadline that is set freshly before the call.
//! Before each command the instrument is polled with `*OPC?` until it reports ready.
//!
//! ## Basic Usage
//!
//! ```ignore
//! use scope_client::{ScopeClient, config::Config};
//!
//! let mut client = ScopeClient::connect("169.254.247.73", 5555, Config::default())?;
//! let identity = client.identify()?;
//! println!("Connected to {}", identity);
//! let block = client.screen_data()?;
//! if block.is_truncated() {
//!     println!("Only received {} of {} bytes", block.received(), block.declared());
//! }
//! ```
//!
//! For a complete capture including file output see [`capture::capture`].
//!
//! ## Logging
//!
//! This crate uses the `log` crate. Milestones are logged at `info`, individual
//! reads and polls at `debug`, raw lines at `trace`. Truncated blocks are logged
//! at `warn`.
use std::net::TcpStream;

use scope_protocol::{Identity, Query};

pub mod block;
pub mod capture;
pub mod config;
pub mod error;
pub mod ready;
pub mod session;

#[cfg(test)]
mod mock;

use block::BlockTransfer;
use config::Config;
use error::Error;
use ready::ReadinessGate;
use session::{Session, Transport};

/// SCPI client for a single instrument.
///
/// Owns the connection for its lifetime; the connection is closed when the
/// client is dropped.
pub struct ScopeClient<T: Transport = TcpStream> {
    session: Session<T>,
    config: Config,
}

impl ScopeClient<TcpStream> {
    /// Probes `host:port` and connects to it.
    pub fn connect(host: &str, port: u16, config: Config) -> Result<Self, Error> {
        let session = Session::connect(host, port, config.probe_timeout)?;
        Ok(ScopeClient { session, config })
    }
}

impl<T: Transport> ScopeClient<T> {
    pub fn new(transport: T, config: Config) -> ScopeClient<T> {
        ScopeClient {
            session: Session::new(transport),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    /// Polls `*OPC?` until the instrument is ready. Returns the number of polls.
    pub fn wait_ready(&mut self) -> Result<u32, Error> {
        ReadinessGate::new(&self.config).wait(&mut self.session)
    }

    /// Sends `command` once the instrument is ready.
    fn send(&mut self, command: &str) -> Result<(), Error> {
        self.wait_ready()?;
        log::info!("Sending {:?}", command);
        self.session.set_write_deadline(self.config.write_timeout)?;
        self.session.send_line(command)?;
        Ok(())
    }

    /// Sends `command` and returns its single line reply without trailing whitespace.
    pub fn query(&mut self, command: &str) -> Result<String, Error> {
        self.send(command)?;
        self.session.set_read_deadline(self.config.read_timeout)?;
        let reply = self.session.read_line()?;
        log::info!("Received reply {:?}", reply);
        Ok(reply)
    }

    /// Queries the identity of the instrument.
    pub fn identify(&mut self) -> Result<Identity, Error> {
        let reply = self.query(Query::Identify.as_str())?;
        Ok(Identity::new(reply))
    }

    /// Sends `command` and reads the binary block it is answered with.
    pub fn fetch_block(&mut self, command: &str) -> Result<BlockTransfer, Error> {
        self.send(command)?;
        block::read_block(&mut self.session, &self.config)
    }

    /// Fetches the display contents as a PNG image.
    pub fn screen_data(&mut self) -> Result<BlockTransfer, Error> {
        self.fetch_block(Query::ScreenData.as_str())
    }

    /// Closes the connection. Equivalent to dropping the client.
    pub fn close(self) {
        self.session.close()
    }
}
