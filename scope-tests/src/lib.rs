//! An in-process stand-in for a SCPI oscilloscope, used by the integration tests.
//!
//! The instrument listens on `127.0.0.1` on a free port and serves connections one
//! after another from a background thread, so the reachability probe and the actual
//! session both find it.
use std::{
    io::{self, BufRead, BufReader, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use bytes::{BufMut, BytesMut};
use scope_protocol::{BlockHeader, Query, png};

pub const IDENTITY: &str = "RIGOL,MSO5074,LX000000,00.00";

/// How the fake instrument answers.
#[derive(Clone, Debug)]
pub struct Behavior {
    pub identity: String,
    /// Number of `*OPC?` polls answered with `0` before the instrument becomes ready.
    pub busy_polls: u32,
    /// The image sent in reply to a screen data query.
    pub screen: Vec<u8>,
    /// Close the connection after this many bytes of the block reply.
    pub cut_block_at: Option<usize>,
    /// Size of the pieces the block reply is written in.
    pub chunk_size: usize,
}

impl Default for Behavior {
    fn default() -> Self {
        Behavior {
            identity: IDENTITY.to_string(),
            busy_polls: 0,
            screen: corrupt_png(),
            cut_block_at: None,
            chunk_size: 7,
        }
    }
}

/// A running fake instrument.
pub struct FakeInstrument {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<String>>>,
}

impl FakeInstrument {
    pub fn spawn(behavior: Behavior) -> io::Result<FakeInstrument> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let received = Arc::new(Mutex::new(Vec::new()));
        let commands = received.clone();
        thread::spawn(move || {
            let mut busy_polls = behavior.busy_polls;
            for stream in listener.incoming() {
                let result = stream.and_then(|stream| {
                    serve(stream, &behavior, &mut busy_polls, &commands)
                });
                if let Err(err) = result {
                    log::debug!("Fake instrument connection failed: {}", err);
                }
            }
        });
        Ok(FakeInstrument { addr, received })
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Every command line received so far, across all connections.
    pub fn received(&self) -> Vec<String> {
        self.received
            .lock()
            .map(|received| received.clone())
            .unwrap_or_default()
    }
}

fn serve(
    stream: TcpStream,
    behavior: &Behavior,
    busy_polls: &mut u32,
    received: &Mutex<Vec<String>>,
) -> io::Result<()> {
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let command = line.trim_end().to_string();
        log::trace!("Fake instrument received {:?}", command);
        if let Ok(mut received) = received.lock() {
            received.push(command.clone());
        }

        if command == Query::OperationComplete.as_str() {
            if *busy_polls > 0 {
                *busy_polls -= 1;
                writer.write_all(b"0\n")?;
            } else {
                writer.write_all(b"1\n")?;
            }
        } else if command == Query::Identify.as_str() {
            writeln!(writer, "{}", behavior.identity)?;
        } else if command == Query::ScreenData.as_str() {
            let reply = block(&behavior.screen)?;
            let reply = match behavior.cut_block_at {
                Some(cut) => &reply[..cut.min(reply.len())],
                None => &reply[..],
            };
            for piece in reply.chunks(behavior.chunk_size.max(1)) {
                writer.write_all(piece)?;
                writer.flush()?;
                thread::sleep(Duration::from_millis(1));
            }
            if behavior.cut_block_at.is_some() {
                return Ok(());
            }
        }
    }
}

/// Frames `payload` as a definite length block with a trailing newline.
pub fn block(payload: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    BlockHeader::for_payload(payload.len()).write_to(&mut out)?;
    out.extend_from_slice(payload);
    out.push(b'\n');
    Ok(out)
}

fn chunk(out: &mut BytesMut, chunk_type: &[u8; 4], data: &[u8], crc: u32) {
    out.put_u32(data.len() as u32);
    out.put_slice(chunk_type);
    out.put_slice(data);
    out.put_u32(crc);
}

fn crc(chunk_type: &[u8; 4], data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    hasher.finalize()
}

/// A 1x1 PNG whose chunks carry the checksums returned by `crcs`.
fn png_with(crcs: impl Fn(&[u8; 4], &[u8]) -> u32) -> Vec<u8> {
    let ihdr: [u8; 13] = [0, 0, 0, 1, 0, 0, 0, 1, 8, 6, 0, 0, 0];
    let idat = b"\x78\x9c\x63\x60\x60\x60\x60\x00\x00\x00\x05\x00\x01";
    let mut out = BytesMut::new();
    out.put_slice(&png::SIGNATURE);
    chunk(&mut out, b"IHDR", &ihdr, crcs(b"IHDR", &ihdr));
    chunk(&mut out, b"IDAT", idat, crcs(b"IDAT", idat));
    chunk(&mut out, &png::IEND, b"", crcs(&png::IEND, b""));
    out.to_vec()
}

/// A small PNG with valid checksums.
pub fn valid_png() -> Vec<u8> {
    png_with(crc)
}

/// The same PNG as [`valid_png`], with every checksum zeroed.
pub fn corrupt_png() -> Vec<u8> {
    png_with(|_, _| 0)
}
