#![allow(dead_code)]

pub const COFF1: u16 = 0x00c1;
pub const COFF2: u16 = 0x00c2;

pub struct SectionSpec {
    pub name: &'static str,
    /// Stored value: words for COFF1, bytes for COFF2.
    pub address: u32,
    pub page: u16,
    pub data: Vec<u8>,
}

pub fn section(name: &'static str, address: u32, page: u16, data: Vec<u8>) -> SectionSpec {
    SectionSpec {
        name,
        address,
        page,
        data,
    }
}

/// Optional header with fields in stored units.
pub fn optional_header(magic: u16, fields: [u32; 6]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&magic.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    for v in fields {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Lays out header, optional region, section records and raw data.
/// COFF2 files get a leading zeroed record counted in the header.
pub fn build(version: u16, optional: &[u8], sections: &[SectionSpec]) -> Vec<u8> {
    let record_size = if version == COFF2 { 48 } else { 40 };
    let leading = usize::from(version == COFF2);
    let count = sections.len() + leading;

    let mut out = Vec::new();
    out.extend_from_slice(&version.to_le_bytes());
    out.extend_from_slice(&(count as u16).to_le_bytes());
    out.extend_from_slice(&0x5000_0000i32.to_le_bytes());
    out.extend_from_slice(&0x1234u32.to_le_bytes());
    out.extend_from_slice(&7u32.to_le_bytes());
    out.extend_from_slice(&(optional.len() as u16).to_le_bytes());
    out.extend_from_slice(&0x0102u16.to_le_bytes());
    out.extend_from_slice(&0x009du16.to_le_bytes());
    out.extend_from_slice(optional);

    let mut data_offset = out.len() + count * record_size;
    out.extend(std::iter::repeat(0).take(leading * record_size));
    for spec in sections {
        let mut record = vec![0u8; record_size];
        let name = spec.name.as_bytes();
        record[..name.len()].copy_from_slice(name);
        let size = if version == COFF2 {
            spec.data.len() as u32
        } else {
            (spec.data.len() / 2) as u32
        };
        record[8..12].copy_from_slice(&spec.address.to_le_bytes());
        record[12..16].copy_from_slice(&spec.address.to_le_bytes());
        record[16..20].copy_from_slice(&size.to_le_bytes());
        record[20..24].copy_from_slice(&(data_offset as u32).to_le_bytes());
        if version == COFF2 {
            record[46..48].copy_from_slice(&spec.page.to_le_bytes());
        } else {
            record[39] = spec.page as u8;
        }
        out.extend_from_slice(&record);
        data_offset += spec.data.len();
    }
    for spec in sections {
        out.extend_from_slice(&spec.data);
    }
    out
}
