use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("wrong COFF file version, found {0:04X}")]
    UnsupportedVersion(u16),
    #[error("wrong COFF file format (optional header signature {magic:#06x})")]
    MalformedOptionalHeader { magic: u16 },
    #[error("unexpected end of file at offset {offset:#x}: wanted {wanted} byte(s), {available} available")]
    TruncatedFile {
        offset: u64,
        wanted: usize,
        available: usize,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub mod coff;
