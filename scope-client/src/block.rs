//! Reassembly of binary block replies.
//!
//! The declared length of a block is not fully reliable: some firmware closes the
//! stream shortly before the block is complete. The reader therefore returns
//! everything that arrived, minus the final terminator byte, and reports the
//! shortfall instead of failing.
use scope_protocol::{BlockHeader, error::HeaderError};

use crate::{
    config::Config,
    error::Error,
    session::{ReadOutcome, Session, Transport},
};

/// A block reply with its header and terminator removed.
#[derive(Clone, Debug)]
pub struct BlockTransfer {
    header: BlockHeader,
    payload: Vec<u8>,
    received: usize,
}

impl BlockTransfer {
    pub fn header(&self) -> BlockHeader {
        self.header
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Total bytes the header announced, including header and terminator.
    pub fn declared(&self) -> usize {
        self.header.total_len()
    }

    /// Total bytes actually received, including header and terminator.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Whether the stream ended before the announced length was reached.
    pub fn is_truncated(&self) -> bool {
        self.received < self.declared()
    }
}

/// Reads one block from `session`. The command requesting it must already be sent.
pub(crate) fn read_block<T: Transport>(
    session: &mut Session<T>,
    config: &Config,
) -> Result<BlockTransfer, Error> {
    session.set_read_deadline(config.read_timeout)?;
    let header = match BlockHeader::from_reader(session.reader()) {
        Ok(header) => header,
        Err(HeaderError::IoError(err)) => return Err(Error::Io(err)),
        Err(HeaderError::Incomplete { needed, got }) => {
            return Err(Error::BufferTooShort {
                received: got,
                needed: needed + BlockHeader::TERMINATOR_LEN,
            });
        }
        Err(err) => return Err(Error::Protocol(err)),
    };
    let header_len = header.header_len();
    let expected = header.total_len();
    log::info!(
        "Block announces {} payload bytes ({} bytes in total)",
        header.payload_len(),
        expected
    );
    if header.payload_len() > config.max_block_len {
        return Err(Error::BlockTooLarge {
            max: config.max_block_len,
            got: header.payload_len(),
        });
    }

    let mut buffer = Vec::with_capacity(expected);
    header.write_to(&mut buffer)?;
    buffer.resize(expected, 0);
    let offset = fill(session, config, &mut buffer, header_len)?;

    if offset < header_len + BlockHeader::TERMINATOR_LEN {
        return Err(Error::BufferTooShort {
            received: offset,
            needed: header_len + BlockHeader::TERMINATOR_LEN,
        });
    }
    if offset < expected {
        log::warn!(
            "Block truncated: received {} of {} bytes, capture may be corrupt",
            offset,
            expected
        );
    }

    // drop the terminator, or the last byte received if the block ended early
    buffer.truncate(offset - BlockHeader::TERMINATOR_LEN);
    buffer.drain(..header_len);
    Ok(BlockTransfer {
        header,
        payload: buffer,
        received: offset,
    })
}

/// Reads into `buffer` from `offset` until it is full, the stream ends, or a read fails.
/// Returns the final offset.
fn fill<T: Transport>(
    session: &mut Session<T>,
    config: &Config,
    buffer: &mut [u8],
    mut offset: usize,
) -> Result<usize, Error> {
    let expected = buffer.len();
    while offset < expected {
        session.set_read_deadline(config.read_timeout)?;
        log::debug!("Requesting {} bytes", expected - offset);
        match session.read(&mut buffer[offset..]) {
            Ok(ReadOutcome::Data(n)) => {
                offset += n;
                log::debug!(
                    "Read {} bytes ({}/{} total, {} remaining)",
                    n,
                    offset,
                    expected,
                    expected - offset
                );
            }
            Ok(ReadOutcome::EndOfStream) => {
                log::info!("Reached end of stream after {}/{} bytes", offset, expected);
                break;
            }
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                log::warn!(
                    "Aborting block read after {}/{} bytes: {}",
                    offset,
                    expected,
                    err
                );
                break;
            }
        }
    }
    Ok(offset)
}
