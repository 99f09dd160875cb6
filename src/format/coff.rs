use std::path::Path;

use log::debug;

use crate::format::FormatError;
use crate::model::{
    CoffFile, FileHeader, OptionalHeader, SectionHeader, SectionTable, TargetVariant,
    OPTIONAL_HEADER_MAGIC, OPTIONAL_HEADER_SIZE,
};

const FILE_HEADER_SIZE: usize = 22;
const SECTION_NAME_SIZE: usize = 8;

/// Reads and decodes a COFF file from disk.
///
/// # Errors
/// Returns `FormatError::Io` when the file cannot be read, otherwise see [`decode`].
pub fn decode_file(path: impl AsRef<Path>) -> Result<CoffFile, FormatError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    debug!("read {} ({} bytes)", path.display(), bytes.len());
    decode(&bytes)
}

/// Decodes one COFF image held in memory.
///
/// Decoding is all-or-nothing: either every section carries its raw data or an
/// error is returned.
///
/// # Errors
/// `UnsupportedVersion` for an unknown version id, `MalformedOptionalHeader`
/// when the optional header magic is wrong, `TruncatedFile` on any short read.
pub fn decode(input: &[u8]) -> Result<CoffFile, FormatError> {
    let mut reader = Reader::new(input);

    let header = parse_file_header(reader.read_bytes(FILE_HEADER_SIZE)?);
    debug!(
        "header: version={:#06x} sections={} optional={} target={:#06x}",
        header.version_id, header.section_count, header.optional_header_size, header.target_id
    );
    let variant = header
        .variant()
        .ok_or(FormatError::UnsupportedVersion(header.version_id))?;

    let mut optional_header = None;
    let mut opaque_optional_header = Vec::new();
    match header.optional_header_size {
        0 => {}
        OPTIONAL_HEADER_SIZE => {
            let raw = reader.read_bytes(usize::from(OPTIONAL_HEADER_SIZE))?;
            optional_header = Some(parse_optional_header(raw, variant)?);
        }
        other => {
            // Unknown layout: skip it whole so the section records stay aligned.
            debug!("skipping {other} byte(s) of uninterpreted optional header");
            opaque_optional_header = reader.read_bytes(usize::from(other))?.to_vec();
        }
    }

    let record_size = variant.section_record_size();
    let mut record_count = header.section_count;
    if variant == TargetVariant::Coff2 {
        reader.read_bytes(record_size)?;
        record_count = record_count.saturating_sub(1);
    }

    let mut headers = SectionTable::new();
    for _ in 0..record_count {
        let section = parse_section_record(reader.read_bytes(record_size)?, variant);
        debug!(
            "section {}: paddr={:#x} size={} raw={:#x} page={}",
            section.name,
            section.physical_address,
            section.size,
            section.raw_data_offset,
            section.memory_page
        );
        if headers.insert(section.name.clone(), section).is_some() {
            debug!("duplicate section name replaced an earlier record");
        }
    }

    let sections = headers.try_map(|section| {
        reader.seek(section.raw_data_offset as usize);
        let data = reader.read_bytes(section.size as usize)?.to_vec();
        section.with_data(data)
    })?;

    Ok(CoffFile::new(
        header,
        variant,
        optional_header,
        opaque_optional_header,
        sections,
    ))
}

fn parse_file_header(raw: &[u8]) -> FileHeader {
    FileHeader {
        version_id: le_u16(raw, 0),
        section_count: le_u16(raw, 2),
        timestamp: le_u32(raw, 4) as i32,
        symbol_table_offset: le_u32(raw, 8),
        symbol_count: le_u32(raw, 12),
        optional_header_size: le_u16(raw, 16),
        flags: le_u16(raw, 18),
        target_id: le_u16(raw, 20),
    }
}

fn parse_optional_header(
    raw: &[u8],
    variant: TargetVariant,
) -> Result<OptionalHeader, FormatError> {
    let magic = le_u16(raw, 0);
    if magic != OPTIONAL_HEADER_MAGIC {
        return Err(FormatError::MalformedOptionalHeader { magic });
    }
    let scale = |offset: usize| to_bytes(le_u32(raw, offset), variant);
    Ok(OptionalHeader {
        version: le_u16(raw, 2) as i16,
        exec_code_size: scale(4),
        initialized_data_size: scale(8),
        uninitialized_data_size: scale(12),
        entry_point: scale(16),
        exec_code_address: scale(20),
        init_data_address: scale(24),
    })
}

fn parse_section_record(raw: &[u8], variant: TargetVariant) -> SectionHeader {
    let name = section_name(&raw[..SECTION_NAME_SIZE]);
    let stored_size = le_u32(raw, 16);
    let (size, memory_page) = match variant {
        TargetVariant::Coff1 => (stored_size.saturating_mul(2), u16::from(raw[39])),
        TargetVariant::Coff2 => (stored_size, le_u16(raw, 46)),
    };
    SectionHeader {
        name,
        physical_address: to_bytes(le_u32(raw, 8), variant),
        virtual_address: to_bytes(le_u32(raw, 12), variant),
        size,
        raw_data_offset: le_u32(raw, 20),
        relocation_offset: le_u32(raw, 24),
        memory_page,
    }
}

fn section_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches('\0')
        .to_string()
}

fn to_bytes(value: u32, variant: TargetVariant) -> u32 {
    if variant.is_word_addressed() {
        value.wrapping_mul(2)
    } else {
        value
    }
}

fn le_u16(raw: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([raw[offset], raw[offset + 1]])
}

fn le_u32(raw: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        raw[offset],
        raw[offset + 1],
        raw[offset + 2],
        raw[offset + 3],
    ])
}

struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    fn read_bytes(&mut self, size: usize) -> Result<&'a [u8], FormatError> {
        let available = self.input.len().saturating_sub(self.pos);
        if size > available {
            return Err(FormatError::TruncatedFile {
                offset: self.pos as u64,
                wanted: size,
                available,
            });
        }
        let begin = self.pos.min(self.input.len());
        self.pos = begin + size;
        Ok(&self.input[begin..self.pos])
    }
}
