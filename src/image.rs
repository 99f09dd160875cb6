use log::{debug, warn};

use crate::model::{CoffFile, Section};

/// Value of an erased flash cell.
pub const ERASED_BYTE: u8 = 0xff;

const ADDRESS_MASK: u32 = 0xffff;

/// Builds the simulated flash contents for the named sections.
///
/// The image size is fixed by the target variant. Each section lands at its
/// physical address folded into the low 16 bits, so higher addresses alias.
/// Sections are copied in the order given and later ones overwrite earlier
/// ones. Names absent from `file` are skipped.
#[must_use]
pub fn assemble<S: AsRef<str>>(file: &CoffFile, section_names: &[S]) -> Vec<u8> {
    let mut image = vec![ERASED_BYTE; file.variant().flash_size()];
    for name in section_names {
        let name = name.as_ref();
        match file.section(name) {
            Some(section) => place_section(&mut image, section),
            None => debug!("assemble: no section named {name}, skipped"),
        }
    }
    image
}

fn place_section(image: &mut [u8], section: &Section) {
    let start = ((section.physical_address() & ADDRESS_MASK) as usize).min(image.len());
    let data = section.data();
    let end = start.saturating_add(data.len()).min(image.len());
    let copied = end.saturating_sub(start);
    image[start..end].copy_from_slice(&data[..copied]);
    if copied < data.len() {
        warn!(
            "section {} clipped at end of flash image: {} of {} byte(s) placed",
            section.name(),
            copied,
            data.len()
        );
    }
}
