use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChecksumError {
    #[error("word checksum needs an even number of bytes, got {len}")]
    InvalidInput { len: usize },
}

/// Both checksums of one flash image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksums {
    pub crc32: u32,
    pub word_sum: u32,
}

impl Checksums {
    /// # Errors
    /// Returns `ChecksumError::InvalidInput` when `image` has odd length.
    pub fn compute(image: &[u8]) -> Result<Self, ChecksumError> {
        Ok(Self {
            crc32: crc32(image),
            word_sum: word_sum(image)?,
        })
    }
}

impl fmt::Display for Checksums {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CRC32: 0x{:08X}, Checksum32: 0x{:08X}",
            self.crc32, self.word_sum
        )
    }
}

/// Wrapping 32-bit sum of little-endian 16-bit words.
///
/// # Errors
/// Returns `ChecksumError::InvalidInput` when `data` has odd length.
pub fn word_sum(data: &[u8]) -> Result<u32, ChecksumError> {
    if data.len() % 2 != 0 {
        return Err(ChecksumError::InvalidInput { len: data.len() });
    }
    Ok(data
        .chunks_exact(2)
        .map(|w| u32::from(u16::from_le_bytes([w[0], w[1]])))
        .fold(0u32, u32::wrapping_add))
}

const CRC32_POLY: u32 = 0xedb8_8320;
const CRC32_TABLE: [u32; 256] = build_crc32_table();

const fn build_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CRC32_POLY
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// CRC-32/ISO-HDLC (the zlib/Ethernet CRC).
#[must_use]
pub fn crc32(data: &[u8]) -> u32 {
    let crc = data.iter().fold(0xffff_ffffu32, |crc, &b| {
        CRC32_TABLE[((crc ^ u32::from(b)) & 0xff) as usize] ^ (crc >> 8)
    });
    crc ^ 0xffff_ffff
}

#[cfg(test)]
mod tests {
    use super::{crc32, word_sum, ChecksumError, Checksums};
    use pretty_assertions::assert_eq;

    #[test]
    fn word_sum_reads_little_endian_words() {
        assert_eq!(word_sum(&[0x34, 0x12]), Ok(0x1234));
        assert_eq!(word_sum(&[]), Ok(0));
    }

    #[test]
    fn word_sum_wraps_at_32_bits() {
        let data = vec![0xff; 0x2_0000 * 2];
        assert_eq!(word_sum(&data), Ok(0xffffu32.wrapping_mul(0x2_0000)));
    }

    #[test]
    fn word_sum_is_linear_over_concatenation() {
        let a = [0x01, 0x80, 0xff, 0xff, 0x10, 0x00];
        let b = [0xfe, 0xff, 0x00, 0x7f];
        let joined = [&a[..], &b[..]].concat();
        let lhs = word_sum(&joined).expect("even");
        let rhs = word_sum(&a)
            .expect("even")
            .wrapping_add(word_sum(&b).expect("even"));
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn word_sum_rejects_odd_length() {
        assert_eq!(word_sum(&[1, 2, 3]), Err(ChecksumError::InvalidInput { len: 3 }));
    }

    #[test]
    fn crc32_matches_reference_vectors() {
        assert_eq!(crc32(&[]), 0);
        assert_eq!(crc32(b"123456789"), 0xcbf4_3926);
        assert_eq!(
            crc32(b"The quick brown fox jumps over the lazy dog"),
            0x414f_a339
        );
    }

    #[test]
    fn formats_status_line() {
        let sums = Checksums::compute(&[0x34, 0x12]).expect("even");
        assert_eq!(sums.word_sum, 0x1234);
        assert_eq!(
            Checksums { crc32: 0xcbf4_3926, word_sum: 0x1234 }.to_string(),
            "CRC32: 0xCBF43926, Checksum32: 0x00001234"
        );
    }
}
