use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime};

use crate::format::FormatError;

pub const VERSION_COFF1: u16 = 0x00c1;
pub const VERSION_COFF2: u16 = 0x00c2;
pub const OPTIONAL_HEADER_MAGIC: u16 = 0x0108;
pub const OPTIONAL_HEADER_SIZE: u16 = 28;

/// Structural revision of the object file, keyed by the header version id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetVariant {
    /// Word-addressed targets: 40-byte section records, 64 KiB flash.
    Coff1,
    /// Byte-addressed targets: 48-byte section records, 128 KiB flash.
    Coff2,
}

impl TargetVariant {
    #[must_use]
    pub fn from_version_id(version_id: u16) -> Option<Self> {
        match version_id {
            VERSION_COFF1 => Some(Self::Coff1),
            VERSION_COFF2 => Some(Self::Coff2),
            _ => None,
        }
    }

    #[must_use]
    pub fn version_id(self) -> u16 {
        match self {
            Self::Coff1 => VERSION_COFF1,
            Self::Coff2 => VERSION_COFF2,
        }
    }

    #[must_use]
    pub fn section_record_size(self) -> usize {
        match self {
            Self::Coff1 => 40,
            Self::Coff2 => 48,
        }
    }

    #[must_use]
    pub fn flash_size(self) -> usize {
        match self {
            Self::Coff1 => 0x1_0000,
            Self::Coff2 => 0x2_0000,
        }
    }

    /// Whether sizes and addresses are stored as 16-bit word counts.
    #[must_use]
    pub fn is_word_addressed(self) -> bool {
        matches!(self, Self::Coff1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub version_id: u16,
    pub section_count: u16,
    /// Seconds since the Unix epoch.
    pub timestamp: i32,
    pub symbol_table_offset: u32,
    pub symbol_count: u32,
    pub optional_header_size: u16,
    pub flags: u16,
    pub target_id: u16,
}

impl FileHeader {
    #[must_use]
    pub fn variant(&self) -> Option<TargetVariant> {
        TargetVariant::from_version_id(self.version_id)
    }

    /// Build date without a time zone attached.
    #[must_use]
    pub fn build_date(&self) -> NaiveDateTime {
        DateTime::from_timestamp(i64::from(self.timestamp), 0)
            .unwrap_or_default()
            .naive_utc()
    }
}

impl fmt::Display for FileHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Version: {}, TargetID: {:04X}, OptionalHeaderNumBytes: {}",
            self.version_id, self.target_id, self.optional_header_size
        )
    }
}

/// Optional file header. Sizes and addresses are always byte quantities here,
/// the decoder has already converted word counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionalHeader {
    pub version: i16,
    pub exec_code_size: u32,
    pub initialized_data_size: u32,
    pub uninitialized_data_size: u32,
    pub entry_point: u32,
    pub exec_code_address: u32,
    pub init_data_address: u32,
}

impl fmt::Display for OptionalHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Version: {}, ExecCodeAddress: {:04X} ExecCodeSize: {}",
            self.version, self.exec_code_address, self.exec_code_size
        )
    }
}

/// Section metadata as read from a section record, before raw data is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    pub name: String,
    pub physical_address: u32,
    pub virtual_address: u32,
    /// Size in bytes.
    pub size: u32,
    pub raw_data_offset: u32,
    pub relocation_offset: u32,
    pub memory_page: u16,
}

impl SectionHeader {
    /// Attaches the raw bytes and freezes the section.
    ///
    /// # Errors
    /// Returns `FormatError::TruncatedFile` when `data` is shorter than the declared size.
    pub fn with_data(self, data: Vec<u8>) -> Result<Section, FormatError> {
        let wanted = self.size as usize;
        if data.len() != wanted {
            return Err(FormatError::TruncatedFile {
                offset: u64::from(self.raw_data_offset),
                wanted,
                available: data.len(),
            });
        }
        Ok(Section { header: self, data })
    }
}

/// A section with its raw data. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    header: SectionHeader,
    data: Vec<u8>,
}

impl Section {
    #[must_use]
    pub fn header(&self) -> &SectionHeader {
        &self.header
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.header.name
    }

    #[must_use]
    pub fn physical_address(&self) -> u32 {
        self.header.physical_address
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        self.header.size
    }

    #[must_use]
    pub fn memory_page(&self) -> u16 {
        self.header.memory_page
    }

    /// Flashable sections live in memory page 0.
    #[must_use]
    pub fn is_flashable(&self) -> bool {
        self.header.memory_page == 0
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn summary(&self) -> SectionSummary {
        SectionSummary {
            name: self.header.name.clone(),
            physical_address: self.header.physical_address,
            size: self.header.size,
            memory_page: self.header.memory_page,
        }
    }
}

/// Name-keyed section collection.
///
/// Iteration follows first-insertion order. Inserting a name that already
/// exists replaces the stored entry in place (last write wins).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionTable<T> {
    entries: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> SectionTable<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Returns the replaced entry when `name` was already present.
    pub fn insert(&mut self, name: String, entry: T) -> Option<T> {
        if let Some(&slot) = self.index.get(&name) {
            return Some(std::mem::replace(&mut self.entries[slot], entry));
        }
        self.index.insert(name, self.entries.len());
        self.entries.push(entry);
        None
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&T> {
        self.index.get(name).map(|&slot| &self.entries[slot])
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }

    /// Converts every entry, keeping names and order.
    ///
    /// # Errors
    /// Stops at the first entry `f` rejects.
    pub fn try_map<U, E>(
        self,
        mut f: impl FnMut(T) -> Result<U, E>,
    ) -> Result<SectionTable<U>, E> {
        let entries = self
            .entries
            .into_iter()
            .map(&mut f)
            .collect::<Result<Vec<_>, E>>()?;
        Ok(SectionTable {
            entries,
            index: self.index,
        })
    }
}

impl<'a, T> IntoIterator for &'a SectionTable<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// A fully decoded object file. Built once by the decoder and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoffFile {
    header: FileHeader,
    variant: TargetVariant,
    optional_header: Option<OptionalHeader>,
    opaque_optional_header: Vec<u8>,
    sections: SectionTable<Section>,
}

impl CoffFile {
    pub(crate) fn new(
        header: FileHeader,
        variant: TargetVariant,
        optional_header: Option<OptionalHeader>,
        opaque_optional_header: Vec<u8>,
        sections: SectionTable<Section>,
    ) -> Self {
        Self {
            header,
            variant,
            optional_header,
            opaque_optional_header,
            sections,
        }
    }

    #[must_use]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    #[must_use]
    pub fn variant(&self) -> TargetVariant {
        self.variant
    }

    #[must_use]
    pub fn optional_header(&self) -> Option<&OptionalHeader> {
        self.optional_header.as_ref()
    }

    /// Bytes of an optional header region whose size is neither 0 nor 28.
    #[must_use]
    pub fn opaque_optional_header(&self) -> &[u8] {
        &self.opaque_optional_header
    }

    #[must_use]
    pub fn sections(&self) -> &SectionTable<Section> {
        &self.sections
    }

    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    /// Entry point from the optional header, 0 when there is none.
    #[must_use]
    pub fn entry_point(&self) -> u32 {
        self.optional_header
            .as_ref()
            .map_or(0, |opt| opt.entry_point)
    }
}

/// One row of the section listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSummary {
    pub name: String,
    pub physical_address: u32,
    pub size: u32,
    pub memory_page: u16,
}

impl fmt::Display for SectionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<8} {:04X} {:>8} {}",
            self.name, self.physical_address, self.size, self.memory_page
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{FileHeader, SectionHeader, SectionTable, TargetVariant};
    use crate::format::FormatError;
    use pretty_assertions::assert_eq;

    fn header(name: &str, size: u32) -> SectionHeader {
        SectionHeader {
            name: name.to_string(),
            physical_address: 0,
            virtual_address: 0,
            size,
            raw_data_offset: 0x100,
            relocation_offset: 0,
            memory_page: 0,
        }
    }

    #[test]
    fn table_overwrites_duplicate_names_in_place() {
        let mut table = SectionTable::new();
        assert!(table.insert("a".to_string(), 1).is_none());
        assert!(table.insert("b".to_string(), 2).is_none());
        assert_eq!(table.insert("a".to_string(), 3), Some(1));

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("a"), Some(&3));
        assert_eq!(table.iter().copied().collect::<Vec<_>>(), vec![3, 2]);
    }

    #[test]
    fn with_data_rejects_short_buffer() {
        let err = header(".text", 4)
            .with_data(vec![1, 2])
            .expect_err("short data must fail");
        assert!(matches!(
            err,
            FormatError::TruncatedFile {
                offset: 0x100,
                wanted: 4,
                available: 2
            }
        ));
    }

    #[test]
    fn with_data_freezes_section() {
        let section = header(".text", 2).with_data(vec![0xaa, 0xbb]).expect("exact size");
        assert_eq!(section.name(), ".text");
        assert_eq!(section.data(), &[0xaa, 0xbb]);
        assert!(section.is_flashable());
    }

    #[test]
    fn variants_follow_version_ids() {
        assert_eq!(TargetVariant::from_version_id(0x00c1), Some(TargetVariant::Coff1));
        assert_eq!(TargetVariant::from_version_id(0x00c2), Some(TargetVariant::Coff2));
        assert_eq!(TargetVariant::from_version_id(0x00c0), None);
        assert_eq!(TargetVariant::Coff1.flash_size(), 65536);
        assert_eq!(TargetVariant::Coff2.flash_size(), 131_072);
    }

    #[test]
    fn build_date_is_epoch_relative() {
        let header = FileHeader {
            version_id: 0x00c1,
            section_count: 0,
            timestamp: 86_400 + 3_661,
            symbol_table_offset: 0,
            symbol_count: 0,
            optional_header_size: 0,
            flags: 0,
            target_id: 0x009d,
        };
        assert_eq!(header.build_date().to_string(), "1970-01-02 01:01:01");
        assert_eq!(
            header.to_string(),
            "Version: 193, TargetID: 009D, OptionalHeaderNumBytes: 0"
        );
    }
}
