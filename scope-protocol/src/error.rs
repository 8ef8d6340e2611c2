use std::io;

use thiserror::Error;

/// Errors that may occur when reading a binary block header.
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("{0}")]
    IoError(#[from] io::Error),
    #[error("Block must start with '#', got 0x{0:02x}")]
    InvalidMarker(u8),
    #[error("Invalid digit count 0x{0:02x} in block header")]
    InvalidDigitCount(u8),
    #[error("Indefinite length blocks ('#0') are not supported")]
    IndefiniteLength,
    #[error("Invalid length field {0:?} in block header")]
    InvalidLength(String),
    #[error("Block header needs {needed} bytes, but only {got} are available")]
    Incomplete { needed: usize, got: usize },
}

/// Errors that may occur when walking the chunks of a PNG image.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum FormatError {
    #[error("Invalid PNG signature")]
    InvalidSignature,
    #[error("Unexpected end of PNG data at offset {offset}")]
    UnexpectedEnd { offset: usize },
    #[error("Chunk {chunk_type} at offset {offset} is {len} bytes, but only {available} remain")]
    ChunkTooLong {
        chunk_type: String,
        offset: usize,
        len: usize,
        available: usize,
    },
}
