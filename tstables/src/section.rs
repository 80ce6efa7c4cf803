//! Long PSI/SI section framing.
//!
//! ```text
//! +----------+---------------------+-----------+-------------+---------+------+-----+
//! | table_id | SSI|PI|rsv|length  | extension | rsv|ver|CNI | sec/last| data | CRC |
//! |  8 bits  | 1 | 1 | 2 | 12     |  16 bits  | 2 | 5 | 1   | 8 / 8   |  ... | 32  |
//! +----------+---------------------+-----------+-------------+---------+------+-----+
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::SectionError;
use crate::types::{
    LONG_SECTION_HEADER_SIZE, MAX_PRIVATE_LONG_SECTION_PAYLOAD_SIZE, MAX_VERSION,
    SECTION_CRC32_SIZE,
};

/// One long section of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    table_id: u8,
    private_indicator: bool,
    table_id_extension: u16,
    version: u8,
    is_current: bool,
    section_number: u8,
    last_section_number: u8,
    payload: Bytes,
}

impl Section {
    /// Build a section from its header fields and payload.
    ///
    /// The version is masked to 5 bits.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        table_id: u8,
        private_indicator: bool,
        table_id_extension: u16,
        version: u8,
        is_current: bool,
        section_number: u8,
        last_section_number: u8,
        payload: Bytes,
    ) -> Result<Self, SectionError> {
        if payload.len() > MAX_PRIVATE_LONG_SECTION_PAYLOAD_SIZE {
            return Err(SectionError::PayloadTooLarge(
                payload.len(),
                MAX_PRIVATE_LONG_SECTION_PAYLOAD_SIZE,
            ));
        }
        if section_number > last_section_number {
            return Err(SectionError::InvalidSectionNumber {
                number: section_number,
                last: last_section_number,
            });
        }
        Ok(Section {
            table_id,
            private_indicator,
            table_id_extension,
            version: version & MAX_VERSION,
            is_current,
            section_number,
            last_section_number,
            payload,
        })
    }

    /// Parse a long section from raw bytes starting at table_id.
    ///
    /// Bytes after the end announced by section_length are ignored.
    pub fn parse(data: &[u8], check_crc: bool) -> Result<Self, SectionError> {
        if data.len() < 3 {
            return Err(SectionError::TooShort(data.len()));
        }

        let table_id = data[0];
        if data[1] & 0x80 == 0 {
            return Err(SectionError::NotLongSection(table_id));
        }
        let private_indicator = data[1] & 0x40 != 0;
        let section_length = ((data[1] as u16 & 0x0F) << 8) | data[2] as u16;

        if (section_length as usize) < LONG_SECTION_HEADER_SIZE - 3 + SECTION_CRC32_SIZE {
            return Err(SectionError::LengthTooSmall(section_length));
        }

        let total_length = 3 + section_length as usize;
        if data.len() < total_length {
            return Err(SectionError::Incomplete {
                expected: total_length,
                actual: data.len(),
            });
        }

        let crc_offset = total_length - SECTION_CRC32_SIZE;
        if check_crc {
            let stored = u32::from_be_bytes([
                data[crc_offset],
                data[crc_offset + 1],
                data[crc_offset + 2],
                data[crc_offset + 3],
            ]);
            let computed = crc32_mpeg2(&data[..crc_offset]);
            if stored != computed {
                return Err(SectionError::CrcMismatch { stored, computed });
            }
        }

        Section::new(
            table_id,
            private_indicator,
            ((data[3] as u16) << 8) | data[4] as u16,
            (data[5] >> 1) & 0x1F,
            data[5] & 0x01 != 0,
            data[6],
            data[7],
            Bytes::copy_from_slice(&data[LONG_SECTION_HEADER_SIZE..crc_offset]),
        )
    }

    /// Serialize the section, computing its CRC32.
    pub fn to_bytes(&self) -> Bytes {
        let section_length = self.size() - 3;
        let mut buf = BytesMut::with_capacity(self.size());

        buf.put_u8(self.table_id);
        // SSI = 1, reserved bits set to 1.
        let mut flags = 0xB000u16;
        if self.private_indicator {
            flags |= 0x4000;
        }
        buf.put_u16(flags | (section_length as u16 & 0x0FFF));
        buf.put_u16(self.table_id_extension);
        buf.put_u8(0xC0 | (self.version << 1) | u8::from(self.is_current));
        buf.put_u8(self.section_number);
        buf.put_u8(self.last_section_number);
        buf.put_slice(&self.payload);

        let crc = crc32_mpeg2(&buf);
        buf.put_u32(crc);
        buf.freeze()
    }

    pub fn table_id(&self) -> u8 {
        self.table_id
    }

    pub fn private_indicator(&self) -> bool {
        self.private_indicator
    }

    pub fn table_id_extension(&self) -> u16 {
        self.table_id_extension
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn is_current(&self) -> bool {
        self.is_current
    }

    pub fn section_number(&self) -> u8 {
        self.section_number
    }

    pub fn last_section_number(&self) -> u8 {
        self.last_section_number
    }

    /// Section data after the header, before the CRC.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Total serialized size, header and CRC included.
    pub fn size(&self) -> usize {
        LONG_SECTION_HEADER_SIZE + self.payload.len() + SECTION_CRC32_SIZE
    }
}

/// Generator polynomial of CRC32/MPEG-2.
const CRC32_POLYNOMIAL: u32 = 0x04C1_1DB7;

/// Byte-indexed remainders, MSB first, no reflection.
const CRC32_TABLE: [u32; 256] = crc32_table();

const fn crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut byte = 0;
    while byte < 256 {
        let mut rem = (byte as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            let carry = rem & 0x8000_0000 != 0;
            rem <<= 1;
            if carry {
                rem ^= CRC32_POLYNOMIAL;
            }
            bit += 1;
        }
        table[byte] = rem;
        byte += 1;
    }
    table
}

/// CRC32/MPEG-2 of `data`: initial value all ones, no final xor.
///
/// Computing it over a whole section, CRC field included, yields zero.
pub fn crc32_mpeg2(data: &[u8]) -> u32 {
    data.iter().fold(0xFFFF_FFFF, |crc, &byte| {
        (crc << 8) ^ CRC32_TABLE[((crc >> 24) as u8 ^ byte) as usize]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Section {
        Section::new(
            0x40,
            true,
            0x7FE0,
            3,
            true,
            0,
            1,
            Bytes::from_static(&[0xF0, 0x00, 0xF0, 0x00]),
        )
        .unwrap()
    }

    #[test]
    fn test_crc32_empty() {
        assert_eq!(crc32_mpeg2(&[]), 0xFFFFFFFF);
    }

    #[test]
    fn test_crc32_check_value() {
        // Standard check value for CRC-32/MPEG-2
        assert_eq!(crc32_mpeg2(b"123456789"), 0x0376E6E7);
    }

    #[test]
    fn test_crc32_whole_section_is_zero() {
        assert_eq!(crc32_mpeg2(&sample().to_bytes()), 0);
    }

    #[test]
    fn test_serialize_header() {
        let bytes = sample().to_bytes();
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes[0], 0x40);
        // SSI, private, reserved, section_length = 13
        assert_eq!(&bytes[1..3], &[0xF0, 0x0D]);
        assert_eq!(&bytes[3..5], &[0x7F, 0xE0]);
        assert_eq!(bytes[5], 0xC0 | (3 << 1) | 1);
        assert_eq!(&bytes[6..8], &[0, 1]);
        let crc = crc32_mpeg2(&bytes[..12]);
        assert_eq!(&bytes[12..], &crc.to_be_bytes());
    }

    #[test]
    fn test_parse_serialized() {
        let original = sample();
        let parsed = Section::parse(&original.to_bytes(), true).unwrap();
        assert_eq!(parsed, original);
        assert_eq!(parsed.payload(), &[0xF0, 0x00, 0xF0, 0x00]);
    }

    #[test]
    fn test_parse_ignores_trailing_stuffing() {
        let mut raw = sample().to_bytes().to_vec();
        raw.extend_from_slice(&[0xFF; 10]);
        let parsed = Section::parse(&raw, true).unwrap();
        assert_eq!(parsed.size(), 16);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Section::parse(&[0x40], false), Err(SectionError::TooShort(1)));
        assert_eq!(
            Section::parse(&[0x40, 0x70, 0x05], false),
            Err(SectionError::NotLongSection(0x40))
        );
        assert_eq!(
            Section::parse(&[0x40, 0xF0, 0x05, 0, 0, 0, 0, 0], false),
            Err(SectionError::LengthTooSmall(5))
        );

        let raw = sample().to_bytes();
        assert!(matches!(
            Section::parse(&raw[..10], false),
            Err(SectionError::Incomplete { expected: 16, actual: 10 })
        ));

        let mut corrupted = raw.to_vec();
        corrupted[9] ^= 0xFF;
        assert!(matches!(
            Section::parse(&corrupted, true),
            Err(SectionError::CrcMismatch { .. })
        ));
        // Without CRC check the corrupted section still parses
        assert!(Section::parse(&corrupted, false).is_ok());
    }

    #[test]
    fn test_invalid_section_number() {
        let result = Section::new(0x40, true, 0, 0, true, 2, 1, Bytes::new());
        assert_eq!(
            result,
            Err(SectionError::InvalidSectionNumber { number: 2, last: 1 })
        );
    }

    #[test]
    fn test_payload_too_large() {
        let payload = Bytes::from(vec![0u8; 4085]);
        let result = Section::new(0x40, true, 0, 0, true, 0, 0, payload);
        assert_eq!(result, Err(SectionError::PayloadTooLarge(4085, 4084)));
    }
}
