//! A complete screen capture, from connecting to handing the image over for storage.
use std::path::PathBuf;

use bytes::Bytes;
use chrono::{Local, NaiveDateTime};
use scope_protocol::{Identity, png};

use crate::{
    ScopeClient,
    config::Config,
    error::Error,
    session::Transport,
};

/// Number of analog channels that can be labelled.
pub const CHANNELS: usize = 4;

/// Format of the timestamp in generated filenames.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// What to capture and how to label it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CaptureRequest {
    pub host: String,
    pub port: u16,
    /// Name of the output file. Derived from the note or the instrument identity if absent.
    pub filename: Option<String>,
    pub note: Option<String>,
    /// Labels of channels 1 to 4.
    pub labels: [Option<String>; CHANNELS],
}

impl CaptureRequest {
    pub fn new(host: impl Into<String>, port: u16) -> CaptureRequest {
        CaptureRequest {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Sets the output filename. Empty names are ignored.
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = non_empty(filename.into());
        self
    }

    /// Sets the note drawn onto the capture. Empty notes are ignored.
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = non_empty(note.into());
        self
    }

    /// Labels `channel` (1 to 4). Empty labels and other channels are ignored.
    pub fn label(mut self, channel: usize, label: impl Into<String>) -> Self {
        match channel.checked_sub(1).and_then(|i| self.labels.get_mut(i)) {
            Some(slot) => *slot = non_empty(label.into()),
            None => log::warn!("Ignoring label for unknown channel {}", channel),
        }
        self
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

/// Whether the screen data arrived completely.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TransferStatus {
    Complete,
    /// The stream ended before the announced length. The image may be corrupt.
    Truncated { declared: usize, received: usize },
}

/// A repaired screenshot ready for decoding.
#[derive(Clone, Debug)]
pub struct Screen {
    pub identity: Identity,
    pub filename: String,
    /// The PNG image with valid chunk checksums.
    pub png: Bytes,
    pub transfer: TransferStatus,
    pub taken_at: NaiveDateTime,
}

/// Receives the repaired screenshot and stores it, returning where it was stored.
pub trait CaptureSink {
    type Error: std::error::Error + Send + Sync + 'static;

    fn store(&mut self, screen: &Screen, request: &CaptureRequest) -> Result<PathBuf, Self::Error>;
}

/// Outcome of a successful capture.
#[derive(Clone, Debug)]
pub struct CaptureReport {
    pub path: PathBuf,
    pub identity: Identity,
    pub transfer: TransferStatus,
    /// Number of PNG chunks whose checksum had to be corrected.
    pub corrected_chunks: usize,
}

/// Connects to the instrument in `request`, captures its screen and hands it to `sink`.
///
/// The connection is closed before returning, whether the capture succeeded or not.
pub fn capture<S: CaptureSink>(
    config: Config,
    request: &CaptureRequest,
    sink: &mut S,
) -> Result<CaptureReport, Error> {
    let mut client = ScopeClient::connect(&request.host, request.port, config)?;
    capture_with(&mut client, request, sink)
}

/// Captures the screen over an already connected client.
pub fn capture_with<T: Transport, S: CaptureSink>(
    client: &mut ScopeClient<T>,
    request: &CaptureRequest,
    sink: &mut S,
) -> Result<CaptureReport, Error> {
    let identity = client.identify()?;
    log::info!("Instrument ID: {}", identity);

    let taken_at = Local::now().naive_local();
    let filename = capture_filename(request, &identity, &taken_at);
    log::debug!("Capture will be saved as {:?}", filename);

    log::info!("Capturing scope screen");
    let block = client.screen_data()?;
    let transfer = if block.is_truncated() {
        TransferStatus::Truncated {
            declared: block.declared(),
            received: block.received(),
        }
    } else {
        TransferStatus::Complete
    };

    log::info!("Correcting PNG checksums");
    let repaired = png::repair(block.payload())?;
    log::info!(
        "Checked {} chunks, corrected {}",
        repaired.chunks(),
        repaired.corrected()
    );
    if repaired.discarded() > 0 {
        log::debug!("Dropped {} bytes after IEND", repaired.discarded());
    }
    let corrected_chunks = repaired.corrected();

    let screen = Screen {
        identity,
        filename,
        png: repaired.into_bytes(),
        transfer,
        taken_at,
    };
    let path = sink
        .store(&screen, request)
        .map_err(|err| Error::Sink(Box::new(err)))?;
    log::info!("Saved capture to {}", path.display());

    Ok(CaptureReport {
        path,
        identity: screen.identity,
        transfer,
        corrected_chunks,
    })
}

/// Replaces characters that are not allowed in filenames on common platforms.
pub fn make_filename_safe(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            ' ' => '_',
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            other => other,
        })
        .collect()
}

/// Name of the capture file: the requested name, else the note, else the
/// instrument identity followed by `taken_at`.
pub fn capture_filename(
    request: &CaptureRequest,
    identity: &Identity,
    taken_at: &NaiveDateTime,
) -> String {
    if let Some(filename) = &request.filename {
        return filename.clone();
    }
    if let Some(note) = &request.note {
        return format!("{}.png", make_filename_safe(note));
    }
    format!(
        "{}_{}.png",
        identity.file_stem(),
        taken_at.format(TIMESTAMP_FORMAT)
    )
}

#[cfg(test)]
mod test {
    use super::{
        CaptureRequest, CaptureSink, Screen, TransferStatus, capture_filename, capture_with,
        make_filename_safe,
    };
    use crate::ScopeClient;
    use crate::config::Builder;
    use crate::error::Error;
    use crate::mock::{Reply, ScriptedTransport};
    use chrono::NaiveDate;
    use scope_protocol::{BlockHeader, Identity, png};
    use std::path::PathBuf;
    use std::time::Duration;

    #[derive(Default)]
    struct MemorySink {
        stored: Vec<Screen>,
    }

    impl CaptureSink for MemorySink {
        type Error = std::io::Error;

        fn store(&mut self, screen: &Screen, _: &CaptureRequest) -> Result<PathBuf, Self::Error> {
            self.stored.push(screen.clone());
            Ok(PathBuf::from(&screen.filename))
        }
    }

    fn corrupt_png() -> Vec<u8> {
        let mut image = png::SIGNATURE.to_vec();
        image.extend_from_slice(b"\0\0\0\x02IDATab\0\0\0\0");
        image.extend_from_slice(b"\0\0\0\0IEND\0\0\0\0");
        image
    }

    fn block(payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        BlockHeader::for_payload(payload.len())
            .write_to(&mut out)
            .unwrap();
        out.extend_from_slice(payload);
        out.push(b'\n');
        out
    }

    fn client(replies: Vec<Reply>) -> ScopeClient<ScriptedTransport> {
        let config = Builder::new().poll_interval(Duration::from_millis(1)).build();
        ScopeClient::new(ScriptedTransport::new(replies), config)
    }

    #[test]
    fn filename_from_identity() {
        let identity = Identity::new("RIGOL,MSO5074,LX000000,00.00");
        let taken_at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap();
        let request = CaptureRequest::new("scope", 5555);
        assert_eq!(
            capture_filename(&request, &identity, &taken_at),
            "RIGOL_MSO5074_LX000000_00.00_2024-03-09_14-05-07.png"
        );
    }

    #[test]
    fn filename_from_note() {
        let identity = Identity::new("RIGOL,MSO5074,LX000000,00.00");
        let taken_at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let request = CaptureRequest::new("scope", 5555).note("ripple at 5V: <10mV?");
        assert_eq!(
            capture_filename(&request, &identity, &taken_at),
            "ripple_at_5V-_-10mV-.png"
        );
        let request = request.filename("explicit.png");
        assert_eq!(
            capture_filename(&request, &identity, &taken_at),
            "explicit.png"
        );
    }

    #[test]
    fn safe_filenames() {
        assert_eq!(make_filename_safe(r#"a/b\c:d*e?f"g<h>i|j k"#), "a-b-c-d-e-f-g-h-i-j_k");
    }

    #[test]
    fn empty_request_fields_are_ignored() {
        let request = CaptureRequest::new("scope", 5555)
            .note("")
            .filename("")
            .label(2, "")
            .label(5, "nope");
        assert_eq!(request, CaptureRequest::new("scope", 5555));
    }

    #[test]
    fn labels_by_channel() {
        let request = CaptureRequest::new("scope", 5555)
            .label(1, "clock")
            .label(4, "data");
        assert_eq!(
            request.labels,
            [Some("clock".to_string()), None, None, Some("data".to_string())]
        );
    }

    #[test]
    fn capture_repairs_and_stores() {
        let mut client = client(vec![
            Reply::data("1\n"),
            Reply::data("RIGOL,MSO5074,LX000000,00.00\n"),
            Reply::data("1\n"),
            Reply::Data(block(&corrupt_png())),
        ]);
        let request = CaptureRequest::new("scope", 5555).note("boot");
        let mut sink = MemorySink::default();
        let report = capture_with(&mut client, &request, &mut sink).unwrap();

        assert_eq!(report.path, PathBuf::from("boot.png"));
        assert_eq!(report.transfer, TransferStatus::Complete);
        assert_eq!(report.corrected_chunks, 2);
        let screen = &sink.stored[0];
        assert_eq!(screen.identity.serial(), "LX000000");
        for chunk in png::Chunks::new(&screen.png).unwrap() {
            assert!(chunk.unwrap().is_valid());
        }
    }

    #[test]
    fn truncated_image_fails_repair() {
        let mut image = corrupt_png();
        let declared = image.len();
        // one extra byte stands in for the missing terminator
        image.truncate(declared - 3);
        let mut data = Vec::new();
        BlockHeader::for_payload(declared)
            .write_to(&mut data)
            .unwrap();
        data.extend_from_slice(&image);

        let mut client = client(vec![
            Reply::data("1\n"),
            Reply::data("RIGOL,MSO5074,LX000000,00.00\n"),
            Reply::data("1\n"),
            Reply::Data(data),
            Reply::EndOfStream,
        ]);
        let mut sink = MemorySink::default();
        let request = CaptureRequest::new("scope", 5555);
        match capture_with(&mut client, &request, &mut sink) {
            Err(Error::Format(_)) => {}
            other => panic!("expected a format error for the cut IEND chunk, got {:?}", other),
        }
    }

    #[test]
    fn truncation_inside_trailing_bytes_is_reported() {
        let mut image = corrupt_png();
        image.extend_from_slice(b"pad");
        let mut data = Vec::new();
        BlockHeader::for_payload(image.len())
            .write_to(&mut data)
            .unwrap();
        // payload without the last padding byte and without terminator
        data.extend_from_slice(&image[..image.len() - 1]);

        let mut client = client(vec![
            Reply::data("1\n"),
            Reply::data("RIGOL,MSO5074,LX000000,00.00\n"),
            Reply::data("1\n"),
            Reply::Data(data.clone()),
            Reply::EndOfStream,
        ]);
        let mut sink = MemorySink::default();
        let request = CaptureRequest::new("scope", 5555);
        let report = capture_with(&mut client, &request, &mut sink).unwrap();
        assert_eq!(
            report.transfer,
            TransferStatus::Truncated {
                declared: data.len() + 2,
                received: data.len()
            }
        );
    }

    #[test]
    fn sink_errors_abort() {
        struct FailingSink;
        impl CaptureSink for FailingSink {
            type Error = std::io::Error;
            fn store(&mut self, _: &Screen, _: &CaptureRequest) -> Result<PathBuf, Self::Error> {
                Err(std::io::Error::other("disk full"))
            }
        }

        let mut client = client(vec![
            Reply::data("1\n"),
            Reply::data("RIGOL,MSO5074,LX000000,00.00\n"),
            Reply::data("1\n"),
            Reply::Data(block(&corrupt_png())),
        ]);
        let request = CaptureRequest::new("scope", 5555);
        match capture_with(&mut client, &request, &mut FailingSink) {
            Err(Error::Sink(err)) => assert_eq!(err.to_string(), "disk full"),
            other => panic!("expected Sink, got {:?}", other),
        }
    }
}
