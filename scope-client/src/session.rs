//! Byte stream to the instrument with per call deadlines.
use std::{
    io::{self, BufRead, BufReader, ErrorKind, Read, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use crate::error::Error;

/// A duplex byte stream whose reads and writes block until a configurable deadline.
///
/// Implemented for [`TcpStream`]. Other implementations allow driving the
/// protocol without a network connection.
pub trait Transport: Read + Write {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Closes both directions of the stream.
    fn shutdown(&self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_write_timeout(self, timeout)
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// Whether `err` was caused by an expired deadline.
///
/// Depending on the platform an expired socket timeout surfaces as
/// [`ErrorKind::WouldBlock`] or [`ErrorKind::TimedOut`].
pub fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// Result of a single successful read.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReadOutcome {
    Data(usize),
    /// The peer closed its side of the connection.
    EndOfStream,
}

/// Checks that `host:port` accepts connections within `timeout`.
///
/// The probe connection is closed right away. Returns the address that answered.
pub fn probe(host: &str, port: u16, timeout: Duration) -> Result<SocketAddr, Error> {
    let target = format!("{}:{}", host, port);
    log::info!("Probing instrument at {}", target);
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| Error::Unreachable {
            target: target.clone(),
            source,
        })?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(tcp) => {
                drop(tcp);
                log::info!("Probe of {} successful", addr);
                return Ok(addr);
            }
            Err(err) => {
                log::debug!("Probe of {} failed: {}", addr, err);
                last_error = Some(err);
            }
        }
    }
    Err(Error::Unreachable {
        target,
        source: last_error.unwrap_or_else(|| {
            io::Error::new(ErrorKind::NotFound, "host did not resolve to any address")
        }),
    })
}

/// The connection to one instrument for the duration of one capture.
///
/// Reads are buffered so that bytes received together with a reply line are
/// available to the next read. The stream is shut down when the session is dropped.
pub struct Session<T: Transport = TcpStream> {
    reader: BufReader<T>,
}

impl Session<TcpStream> {
    /// Probes the instrument and opens the control connection.
    pub fn connect(host: &str, port: u16, probe_timeout: Duration) -> Result<Self, Error> {
        let addr = probe(host, port, probe_timeout)?;
        let tcp = TcpStream::connect(addr).map_err(|source| Error::Connect { addr, source })?;
        if let Err(err) = tcp.set_nodelay(true) {
            log::debug!("Could not disable Nagle's algorithm: {}", err);
        }
        log::info!("Connected to {}", addr);
        Ok(Session::new(tcp))
    }
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Session<T> {
        Session {
            reader: BufReader::new(transport),
        }
    }

    pub fn get_ref(&self) -> &T {
        self.reader.get_ref()
    }

    pub fn set_read_deadline(&mut self, timeout: Duration) -> io::Result<()> {
        self.reader.get_ref().set_read_timeout(Some(timeout))
    }

    pub fn set_write_deadline(&mut self, timeout: Duration) -> io::Result<()> {
        self.reader.get_ref().set_write_timeout(Some(timeout))
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let writer = self.reader.get_mut();
        writer.write_all(bytes)?;
        writer.flush()
    }

    /// Sends `command` terminated by a newline.
    pub fn send_line(&mut self, command: &str) -> io::Result<()> {
        log::trace!("Sending {:?}", command);
        let mut line = Vec::with_capacity(command.len() + 1);
        line.extend_from_slice(command.as_bytes());
        line.push(b'\n');
        self.write_all(&line)
    }

    /// Reads at most `buf.len()` bytes.
    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        match self.reader.read(buf)? {
            0 if !buf.is_empty() => Ok(ReadOutcome::EndOfStream),
            n => Ok(ReadOutcome::Data(n)),
        }
    }

    /// Reads up to and including the next newline and returns the line without
    /// trailing whitespace.
    ///
    /// A stream that ends before any byte was received yields [`ErrorKind::UnexpectedEof`].
    pub fn read_line(&mut self) -> io::Result<String> {
        let mut line = Vec::with_capacity(64);
        if self.reader.read_until(b'\n', &mut line)? == 0 {
            return Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                "connection closed while waiting for a reply",
            ));
        }
        let line = String::from_utf8_lossy(line.trim_ascii_end()).to_string();
        log::trace!("Received {:?}", line);
        Ok(line)
    }

    /// Buffered reader for consumers that parse directly from the stream.
    pub fn reader(&mut self) -> &mut impl Read {
        &mut self.reader
    }

    /// Closes the connection. Equivalent to dropping the session.
    pub fn close(self) {}
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        match self.reader.get_ref().shutdown() {
            Ok(()) => log::debug!("Connection closed"),
            Err(err) => log::debug!("Error while closing connection: {}", err),
        }
    }
}
