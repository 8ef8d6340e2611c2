//! # Scope Protocol Library
//!
//! Wire formats used when grabbing the screen of a SCPI controlled oscilloscope
//! over a TCP control channel. The crate performs no I/O of its own; everything
//! operates on byte slices or on [`std::io::Read`]/[`std::io::Write`] implementations.
//!
//! ## Overview
//!
//! - [`Query`]: the SCPI queries issued during a capture (`*OPC?`, `*IDN?`,
//!   `:DISP:DATA? ON,OFF,PNG`)
//! - [`Identity`]: the parsed reply to `*IDN?`
//! - [`BlockHeader`]: the `#<n><length>` header preceding binary block replies
//! - [`png`]: chunk walking and checksum repair for the PNG images the instrument returns
//!
//! ## Binary Blocks
//!
//! A binary block reply has the following structure:
//!
//! ```text
//! #<digit count><digit count ASCII digits of length><payload><terminator>
//! ```
//!
//! ```
//! use scope_protocol::BlockHeader;
//!
//! let header = BlockHeader::parse(b"#800000123").expect("Header should parse");
//! assert_eq!(header.header_len(), 10);
//! assert_eq!(header.payload_len(), 123);
//! // header, payload and the trailing terminator
//! assert_eq!(header.total_len(), 134);
//! ```
//!
//! ## Repairing Screenshots
//!
//! ```
//! use scope_protocol::png::{self, SIGNATURE};
//!
//! let mut image = SIGNATURE.to_vec();
//! // an IEND chunk with a wrong checksum
//! image.extend_from_slice(b"\0\0\0\0IEND\0\0\0\0");
//! let repaired = png::repair(&image).expect("Image should be repairable");
//! assert_eq!(repaired.corrected(), 1);
//! assert_eq!(&repaired.data()[8..], b"\0\0\0\0IEND\xAE\x42\x60\x82");
//! ```
//!
//! ## Error Handling
//!
//! Header parsing reports [`error::HeaderError`], PNG processing reports [`error::FormatError`].

pub mod protocol;
pub use protocol::*;
pub mod codec;
pub mod error;
pub mod png;
