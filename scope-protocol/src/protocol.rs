use std::fmt::Display;

/// The SCPI queries issued during a screen capture.
///
/// Every query is a single line of text terminated by `\n`. Short replies are a
/// single line as well; [`Query::ScreenData`] is answered with a binary block
/// (see [`BlockHeader`]).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Query {
    /// `*OPC?`, answered with `1` once the instrument accepts the next command.
    OperationComplete,
    /// `*IDN?`, answered with the comma separated identity of the instrument.
    Identify,
    /// `:DISP:DATA? ON,OFF,PNG`, answered with a PNG image of the display as a binary block.
    ScreenData,
}

impl Query {
    /// The command text without line terminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Query::OperationComplete => "*OPC?",
            Query::Identify => "*IDN?",
            Query::ScreenData => ":DISP:DATA? ON,OFF,PNG",
        }
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header of a definite-length binary block, `#<n><n digits of length>`.
///
/// The header is followed by `payload_len` bytes of payload and one trailing
/// terminator byte.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlockHeader {
    pub(crate) digit_count: u8,
    pub(crate) payload_len: usize,
}

impl BlockHeader {
    /// Leading byte of every binary block.
    pub const MARKER: u8 = b'#';
    /// Bytes preceding the length digits: the marker and the digit count.
    pub const PREFIX_LEN: usize = 2;
    /// Bytes following the payload.
    pub const TERMINATOR_LEN: usize = 1;

    /// Creates the smallest header able to describe `payload_len` bytes.
    pub fn for_payload(payload_len: usize) -> BlockHeader {
        let digit_count = payload_len.to_string().len() as u8;
        BlockHeader {
            digit_count,
            payload_len,
        }
    }

    /// How many ASCII digits encode the payload length.
    pub fn digit_count(&self) -> u8 {
        self.digit_count
    }

    /// The declared payload length in bytes.
    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// Size of the header itself, `2 + digit_count`.
    pub fn header_len(&self) -> usize {
        Self::PREFIX_LEN + self.digit_count as usize
    }

    /// Number of bytes that make up the whole block including the terminator.
    pub fn total_len(&self) -> usize {
        self.header_len() + self.payload_len + Self::TERMINATOR_LEN
    }
}

#[test]
fn header_sizes() {
    let header = BlockHeader {
        digit_count: 8,
        payload_len: 123,
    };
    assert_eq!(header.header_len(), 10);
    assert_eq!(header.total_len(), 134);
}

#[test]
fn header_for_payload_uses_minimal_digits() {
    assert_eq!(BlockHeader::for_payload(7).digit_count(), 1);
    assert_eq!(BlockHeader::for_payload(1152054).digit_count(), 7);
}

/// Identity reported by the instrument in reply to `*IDN?`.
///
/// The reply has the form `<manufacturer>,<model>,<serial>,<firmware>`.
/// Fields missing from the reply are left empty; the raw reply is kept since
/// it is used to name captures.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Identity {
    raw: String,
    manufacturer: String,
    model: String,
    serial: String,
    firmware: String,
}

impl Identity {
    pub fn new(raw: impl Into<String>) -> Identity {
        let raw = raw.into();
        let mut fields = raw.splitn(4, ',').map(|field| field.trim().to_string());
        let manufacturer = fields.next().unwrap_or_default();
        let model = fields.next().unwrap_or_default();
        let serial = fields.next().unwrap_or_default();
        let firmware = fields.next().unwrap_or_default();
        Identity {
            raw,
            manufacturer,
            model,
            serial,
            firmware,
        }
    }

    /// The unmodified reply line.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn firmware(&self) -> &str {
        &self.firmware
    }

    /// The raw reply with commas and spaces replaced by underscores.
    pub fn file_stem(&self) -> String {
        self.raw.replace([',', ' '], "_")
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} (serial {}, firmware {})",
            self.manufacturer, self.model, self.serial, self.firmware
        )
    }
}

#[test]
fn identity_fields() {
    let id = Identity::new("RIGOL TECHNOLOGIES,MSO5074,MS5A000000,00.01.02");
    assert_eq!(id.manufacturer(), "RIGOL TECHNOLOGIES");
    assert_eq!(id.model(), "MSO5074");
    assert_eq!(id.serial(), "MS5A000000");
    assert_eq!(id.firmware(), "00.01.02");
    assert_eq!(id.file_stem(), "RIGOL_TECHNOLOGIES_MSO5074_MS5A000000_00.01.02");
}

#[test]
fn identity_with_missing_fields() {
    let id = Identity::new("ACME");
    assert_eq!(id.manufacturer(), "ACME");
    assert_eq!(id.model(), "");
    assert_eq!(id.firmware(), "");
}
