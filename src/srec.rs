//! Motorola S-record (S19) output.
//!
//! Only 16-bit addressing is implemented: data records are `S1` and the
//! terminator is `S9`. Addresses are taken modulo 65536.

use std::path::Path;

use thiserror::Error;

use crate::model::Section;

/// Maximum number of data bytes per `S1` record.
pub const MAX_DATA_BYTES: usize = 30;

#[derive(Debug, Error)]
pub enum SRecordError {
    #[error("unsupported S-record address width: {0} bit(s)")]
    UnsupportedAddressWidth(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Header,
    Data16,
    Termination16,
}

impl RecordKind {
    fn tag(self) -> &'static str {
        match self {
            Self::Header => "S0",
            Self::Data16 => "S1",
            Self::Termination16 => "S9",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

/// One record: its kind and payload (address bytes followed by data).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub kind: RecordKind,
    pub payload: Vec<u8>,
}

impl Record {
    #[must_use]
    pub fn new(kind: RecordKind, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }

    /// Length byte: payload plus the checksum byte.
    #[must_use]
    pub fn length_byte(&self) -> u8 {
        (self.payload.len() + 1) as u8
    }

    /// One's complement of the byte sum of the length and payload.
    #[must_use]
    pub fn checksum(&self) -> u8 {
        !self
            .payload
            .iter()
            .fold(self.length_byte(), |sum, &b| sum.wrapping_add(b))
    }

    /// Record text without a line terminator.
    #[must_use]
    pub fn to_line(&self) -> String {
        let mut line = String::with_capacity(6 + self.payload.len() * 2);
        line.push_str(self.kind.tag());
        line.push_str(&format!("{:02X}", self.length_byte()));
        for b in &self.payload {
            line.push_str(&format!("{b:02X}"));
        }
        line.push_str(&format!("{:02X}", self.checksum()));
        line
    }
}

/// Accumulates records for a set of sections and renders them on save.
#[derive(Debug, Clone)]
pub struct SRecordWriter {
    entry_point: u32,
    line_ending: LineEnding,
    records: Vec<Record>,
}

impl SRecordWriter {
    /// Starts a new file with an `S0` header of five zero bytes.
    ///
    /// # Errors
    /// Returns `SRecordError::UnsupportedAddressWidth` unless `address_bits` is 16.
    pub fn new(address_bits: u8, entry_point: u32) -> Result<Self, SRecordError> {
        if address_bits != 16 {
            return Err(SRecordError::UnsupportedAddressWidth(address_bits));
        }
        Ok(Self {
            entry_point,
            line_ending: LineEnding::default(),
            records: vec![Record::new(RecordKind::Header, vec![0; 5])],
        })
    }

    #[must_use]
    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Appends the section's data as `S1` records of up to 30 bytes each.
    ///
    /// The caller decides whether a section is flashable; this only encodes.
    pub fn add_section(&mut self, section: &Section) {
        let base = section.physical_address();
        for (index, chunk) in section.data().chunks(MAX_DATA_BYTES).enumerate() {
            let offset = (index * MAX_DATA_BYTES) as u32;
            let address = (base.wrapping_add(offset) & 0xffff) as u16;
            let mut payload = Vec::with_capacity(2 + chunk.len());
            payload.extend_from_slice(&address.to_be_bytes());
            payload.extend_from_slice(chunk);
            self.records.push(Record::new(RecordKind::Data16, payload));
        }
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Appends the `S9` terminator carrying the entry point and renders the text.
    #[must_use]
    pub fn save(mut self) -> String {
        let entry = (self.entry_point & 0xffff) as u16;
        self.records.push(Record::new(
            RecordKind::Termination16,
            entry.to_be_bytes().to_vec(),
        ));
        let eol = self.line_ending.as_str();
        self.records
            .iter()
            .map(|record| record.to_line() + eol)
            .collect()
    }

    /// Like [`SRecordWriter::save`], writing the text to `path` (created or truncated).
    ///
    /// # Errors
    /// Propagates the I/O error from writing the file.
    pub fn save_to(self, path: impl AsRef<Path>) -> std::io::Result<()> {
        std::fs::write(path, self.save())
    }
}
