//! Scripted transport for driving the protocol in unit tests.
use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    io::{self, ErrorKind, Read, Write},
    rc::Rc,
    time::Duration,
};

use crate::session::Transport;

#[derive(Debug)]
pub enum Reply {
    Data(Vec<u8>),
    /// The read deadline expires before any data arrives.
    TimedOut,
    Error(ErrorKind),
    EndOfStream,
}

impl Reply {
    pub fn data(bytes: impl AsRef<[u8]>) -> Reply {
        Reply::Data(bytes.as_ref().to_vec())
    }
}

/// Serves one scripted reply per read and records everything written to it.
/// Once the script is exhausted every read reports end of stream.
pub struct ScriptedTransport {
    replies: VecDeque<Reply>,
    reads: usize,
    written: Vec<u8>,
    write_error: Option<ErrorKind>,
    read_timeouts: RefCell<Vec<Duration>>,
    write_timeouts: RefCell<Vec<Duration>>,
    closed: Rc<Cell<bool>>,
}

impl ScriptedTransport {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> ScriptedTransport {
        ScriptedTransport {
            replies: replies.into_iter().collect(),
            reads: 0,
            written: Vec::new(),
            write_error: None,
            read_timeouts: RefCell::default(),
            write_timeouts: RefCell::default(),
            closed: Rc::default(),
        }
    }

    /// Makes every write fail with `kind`.
    pub fn failing_writes(mut self, kind: ErrorKind) -> ScriptedTransport {
        self.write_error = Some(kind);
        self
    }

    /// Number of reads that reached the transport.
    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn remaining(&self) -> usize {
        self.replies.len()
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.clone()
    }

    /// How often `line` followed by a newline was written.
    pub fn count_sent(&self, line: &str) -> usize {
        let line = format!("{}\n", line);
        String::from_utf8_lossy(&self.written).matches(&line).count()
    }

    pub fn read_timeouts(&self) -> Vec<Duration> {
        self.read_timeouts.borrow().clone()
    }

    pub fn write_timeouts(&self) -> Vec<Duration> {
        self.write_timeouts.borrow().clone()
    }

    pub fn closed_flag(&self) -> Rc<Cell<bool>> {
        self.closed.clone()
    }
}

impl Read for ScriptedTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads += 1;
        match self.replies.pop_front() {
            Some(Reply::Data(mut bytes)) => {
                let n = buf.len().min(bytes.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    self.replies.push_front(Reply::Data(bytes.split_off(n)));
                }
                Ok(n)
            }
            Some(Reply::TimedOut) => Err(io::Error::from(ErrorKind::WouldBlock)),
            Some(Reply::Error(kind)) => Err(io::Error::from(kind)),
            Some(Reply::EndOfStream) | None => Ok(0),
        }
    }
}

impl Write for ScriptedTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(kind) = self.write_error {
            return Err(io::Error::from(kind));
        }
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for ScriptedTransport {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.read_timeouts.borrow_mut().extend(timeout);
        Ok(())
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.write_timeouts.borrow_mut().extend(timeout);
        Ok(())
    }

    fn shutdown(&self) -> io::Result<()> {
        self.closed.set(true);
        Ok(())
    }
}
