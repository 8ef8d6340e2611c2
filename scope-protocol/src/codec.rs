/// Read and write implementations for the wire formats
use std::io::{self, Read, Write};

use crate::{
    error::HeaderError,
    protocol::{BlockHeader, Query},
};

impl Query {
    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        writeln!(writer, "{}", self.as_str())
    }
}

#[test]
fn write_queries() {
    let mut out = Vec::new();
    Query::OperationComplete.write_to(&mut out).unwrap();
    Query::ScreenData.write_to(&mut out).unwrap();
    assert_eq!(out, b"*OPC?\n:DISP:DATA? ON,OFF,PNG\n".to_vec());
}

impl BlockHeader {
    /// Parses a header from the start of `buf`. Bytes after the header are ignored.
    pub fn parse(buf: &[u8]) -> Result<BlockHeader, HeaderError> {
        if buf.len() < Self::PREFIX_LEN {
            return Err(HeaderError::Incomplete {
                needed: Self::PREFIX_LEN,
                got: buf.len(),
            });
        }
        let digit_count = Self::parse_prefix([buf[0], buf[1]])?;
        let header_len = Self::PREFIX_LEN + digit_count as usize;
        if buf.len() < header_len {
            return Err(HeaderError::Incomplete {
                needed: header_len,
                got: buf.len(),
            });
        }
        let payload_len = Self::parse_length(&buf[Self::PREFIX_LEN..header_len])?;
        Ok(BlockHeader {
            digit_count,
            payload_len,
        })
    }

    /// Reads exactly the header bytes from `reader`, leaving the payload unread.
    ///
    /// A stream that ends inside the header yields [`HeaderError::Incomplete`]
    /// with the number of header bytes that did arrive.
    pub fn from_reader(reader: &mut impl Read) -> Result<BlockHeader, HeaderError> {
        let mut prefix = [0u8; Self::PREFIX_LEN];
        let got = read_full(reader, &mut prefix)?;
        if got < Self::PREFIX_LEN {
            return Err(HeaderError::Incomplete {
                needed: Self::PREFIX_LEN,
                got,
            });
        }
        let digit_count = Self::parse_prefix(prefix)?;

        let mut digits = [0u8; 9];
        let digits = &mut digits[..digit_count as usize];
        let got = read_full(reader, digits)?;
        if got < digits.len() {
            return Err(HeaderError::Incomplete {
                needed: Self::PREFIX_LEN + digits.len(),
                got: Self::PREFIX_LEN + got,
            });
        }
        let payload_len = Self::parse_length(digits)?;
        Ok(BlockHeader {
            digit_count,
            payload_len,
        })
    }

    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        write!(
            writer,
            "#{}{:0width$}",
            self.digit_count,
            self.payload_len,
            width = self.digit_count as usize
        )
    }

    fn parse_prefix(prefix: [u8; 2]) -> Result<u8, HeaderError> {
        if prefix[0] != Self::MARKER {
            return Err(HeaderError::InvalidMarker(prefix[0]));
        }
        match prefix[1] {
            b'0' => Err(HeaderError::IndefiniteLength),
            digit @ b'1'..=b'9' => Ok(digit - b'0'),
            other => Err(HeaderError::InvalidDigitCount(other)),
        }
    }

    fn parse_length(digits: &[u8]) -> Result<usize, HeaderError> {
        let invalid = || HeaderError::InvalidLength(String::from_utf8_lossy(digits).to_string());
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(invalid());
        }
        // all ASCII digits, so this is valid UTF8
        let text = str::from_utf8(digits).map_err(|_| invalid())?;
        text.parse::<usize>().map_err(|_| invalid())
    }
}

/// Reads until `buf` is full or the stream ends. Returns the number of bytes read.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
