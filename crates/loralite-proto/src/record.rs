//! Typed payload records and batched-plaintext interpretation.
//!
//! Group files on the end device hold length-prefixed records:
//!
//! ```text
//! [u16 LE len = payload_len + 1][dataType: 1][payload]
//! ```
//!
//! The length prefix is dropped when a file is drained for transmission —
//! the plaintext on the air is the bare `type || payload` concatenation,
//! and the receiver recovers record boundaries by scanning for the known
//! type tags. A payload byte that happens to equal a tag therefore splits
//! a region; the framing accepts this in exchange for the smaller airtime.

use bytes::BufMut;

use crate::{ProtocolError, Result};

/// Payload type tag. First byte of every typed plaintext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataType {
    /// Printable text; byte 0x01 decodes as an ASCII space.
    Text = 0x01,
    /// Opaque bytes, rendered as hex.
    Bytes = 0x02,
    /// Consecutive IEEE-754 little-endian singles.
    Floats = 0x03,
}

impl DataType {
    /// True if `byte` is one of the known tags.
    #[must_use]
    pub fn is_tag(byte: u8) -> bool {
        matches!(byte, 0x01..=0x03)
    }
}

impl TryFrom<u8> for DataType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(Self::Text),
            0x02 => Ok(Self::Bytes),
            0x03 => Ok(Self::Floats),
            other => Err(ProtocolError::UnknownDataType(other)),
        }
    }
}

/// One stored record: a type tag and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Payload interpretation.
    pub data_type: DataType,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

impl Record {
    /// On-disk size: length prefix, type tag, payload.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        2 + 1 + self.payload.len()
    }

    /// Append the file framing to `buf`.
    ///
    /// The payload must leave room for the type tag in the u16 length
    /// field; the group buffer enforces this long before it matters.
    pub fn write_to(&self, buf: &mut impl BufMut) {
        debug_assert!(self.payload.len() < usize::from(u16::MAX));
        let len = self.payload.len() as u16 + 1;
        buf.put_u16_le(len);
        buf.put_u8(self.data_type as u8);
        buf.put_slice(&self.payload);
    }

    /// Read one record from the front of `bytes`.
    ///
    /// Returns the record and the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// - `FrameTooShort` if fewer than 3 bytes remain.
    /// - `EmptyRecord` if the length field is zero.
    /// - `RecordTruncated` if the length field overruns the buffer.
    /// - `UnknownDataType` for an unrecognised tag.
    pub fn read_from(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < 3 {
            return Err(ProtocolError::FrameTooShort { expected: 3, actual: bytes.len() });
        }

        let len = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
        if len < 1 {
            return Err(ProtocolError::EmptyRecord);
        }

        let payload_len = len - 1;
        let available = bytes.len() - 3;
        if payload_len > available {
            return Err(ProtocolError::RecordTruncated { claimed: payload_len, available });
        }

        let data_type = DataType::try_from(bytes[2])?;
        let payload = bytes[3..3 + payload_len].to_vec();

        Ok((Self { data_type, payload }, 3 + payload_len))
    }

    /// Read every record in a file image, preserving order.
    ///
    /// # Errors
    ///
    /// Fails on the first malformed record; a partially-written trailing
    /// record makes the whole read fail rather than silently truncate.
    pub fn read_all(mut bytes: &[u8]) -> Result<Vec<Self>> {
        let mut records = Vec::new();
        while !bytes.is_empty() {
            let (record, consumed) = Self::read_from(bytes)?;
            records.push(record);
            bytes = &bytes[consumed..];
        }
        Ok(records)
    }
}

/// A decoded region of a batched plaintext.
#[derive(Debug, Clone, PartialEq)]
pub enum Region {
    /// Printable text (0x01 mapped to space, non-printables dropped).
    Text(String),
    /// Raw byte region.
    Bytes(Vec<u8>),
    /// Little-endian f32 values plus any non-aligned tail length.
    Floats {
        /// Decoded values.
        values: Vec<f32>,
        /// Bytes left over after the last whole float. Reported, not fatal.
        trailing: usize,
    },
    /// Region opened by an unrecognised tag; bytes carried verbatim.
    Unknown {
        /// The tag byte that opened the region.
        tag: u8,
        /// Region contents.
        data: Vec<u8>,
    },
}

/// Split a batched plaintext into typed regions.
///
/// The first byte of the plaintext is a tag; each region then extends until
/// the next known tag byte or the end of input. Empty input yields no
/// regions.
#[must_use]
pub fn scan_regions(plaintext: &[u8]) -> Vec<Region> {
    let mut regions = Vec::new();
    let mut pos = 0;

    while pos < plaintext.len() {
        let tag = plaintext[pos];
        pos += 1;

        let start = pos;
        while pos < plaintext.len() && !DataType::is_tag(plaintext[pos]) {
            pos += 1;
        }
        let data = &plaintext[start..pos];

        regions.push(match DataType::try_from(tag) {
            Ok(data_type) => decode_region(data_type, data),
            Err(_) => Region::Unknown { tag, data: data.to_vec() },
        });
    }

    regions
}

/// Decode one region's bytes under a known type tag.
///
/// Used by [`scan_regions`] per region, and directly by the end device
/// for single-typed downlinks where the whole body belongs to the leading
/// tag.
#[must_use]
pub fn decode_region(data_type: DataType, data: &[u8]) -> Region {
    match data_type {
        DataType::Text => Region::Text(decode_text(data)),
        DataType::Bytes => Region::Bytes(data.to_vec()),
        DataType::Floats => decode_floats(data),
    }
}

fn decode_text(data: &[u8]) -> String {
    data.iter()
        .filter_map(|&b| match b {
            0x01 => Some(' '),
            0x20..=0x7E => Some(b as char),
            _ => None,
        })
        .collect()
}

fn decode_floats(data: &[u8]) -> Region {
    let values = data
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    Region::Floats { values, trailing: data.len() % 4 }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn record_file_framing() {
        let record = Record { data_type: DataType::Text, payload: b"hi".to_vec() };
        let mut buf = Vec::new();
        record.write_to(&mut buf);

        // len = payload + type byte, little-endian
        assert_eq!(buf, vec![0x03, 0x00, 0x01, b'h', b'i']);

        let (parsed, consumed) = Record::read_from(&buf).expect("should parse");
        assert_eq!(consumed, buf.len());
        assert_eq!(parsed, record);
    }

    #[test]
    fn read_all_preserves_order() {
        let records = vec![
            Record { data_type: DataType::Text, payload: b"hi".to_vec() },
            Record { data_type: DataType::Bytes, payload: vec![0xDE, 0xAD] },
            Record { data_type: DataType::Floats, payload: 1.5f32.to_le_bytes().to_vec() },
        ];

        let mut file = Vec::new();
        for record in &records {
            record.write_to(&mut file);
        }

        assert_eq!(Record::read_all(&file).expect("should parse"), records);
    }

    #[test]
    fn truncated_record_is_an_error() {
        let record = Record { data_type: DataType::Bytes, payload: vec![1, 2, 3, 4] };
        let mut file = Vec::new();
        record.write_to(&mut file);
        file.truncate(file.len() - 1);

        assert!(matches!(
            Record::read_all(&file),
            Err(ProtocolError::RecordTruncated { .. })
        ));
    }

    #[test]
    fn zero_length_record_is_an_error() {
        assert_eq!(
            Record::read_from(&[0x00, 0x00, 0x01]),
            Err(ProtocolError::EmptyRecord)
        );
    }

    #[test]
    fn scan_two_text_regions() {
        // "hi" and "bye" as drained from a group file.
        let plaintext = [0x01, b'h', b'i', 0x01, b'b', b'y', b'e'];
        let regions = scan_regions(&plaintext);
        assert_eq!(
            regions,
            vec![Region::Text("hi".into()), Region::Text("bye".into())]
        );
    }

    #[test]
    fn scan_decodes_floats_with_trailing() {
        let mut plaintext = vec![0x03];
        plaintext.extend_from_slice(&1.5f32.to_le_bytes());
        plaintext.extend_from_slice(&(-2.0f32).to_le_bytes());
        plaintext.push(0x7F); // not a whole float

        let regions = scan_regions(&plaintext);
        assert_eq!(
            regions,
            vec![Region::Floats { values: vec![1.5, -2.0], trailing: 1 }]
        );
    }

    #[test]
    fn scan_maps_0x01_to_space_in_text() {
        // 0x01 inside a text region cannot survive the scanner (it opens a
        // new region), but the mapping applies when decoding, so a text
        // region following another is rendered independently.
        let regions = scan_regions(&[0x01, b'a', 0x01, b'b']);
        assert_eq!(regions, vec![Region::Text("a".into()), Region::Text("b".into())]);
    }

    #[test]
    fn scan_reports_unknown_tag() {
        let regions = scan_regions(&[0x41, 0x42, 0x43]);
        assert_eq!(
            regions,
            vec![Region::Unknown { tag: 0x41, data: vec![0x42, 0x43] }]
        );
    }

    #[test]
    fn scan_splits_region_on_embedded_tag_byte() {
        // Accepted fragility of the tag-scan framing: a payload byte equal
        // to a type tag ends the region early.
        let regions = scan_regions(&[0x02, 0xAA, 0x03, 0xBB, 0xCC, 0xDD, 0xEE]);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0], Region::Bytes(vec![0xAA]));
        assert!(matches!(regions[1], Region::Floats { .. }));
    }

    #[test]
    fn scan_empty_input() {
        assert!(scan_regions(&[]).is_empty());
    }

    proptest! {
        #[test]
        fn record_round_trip(
            tag in 1u8..=3,
            payload in prop::collection::vec(any::<u8>(), 0..300),
        ) {
            let record = Record {
                data_type: DataType::try_from(tag).unwrap(),
                payload,
            };
            let mut buf = Vec::new();
            record.write_to(&mut buf);

            let (parsed, consumed) = Record::read_from(&buf).unwrap();
            prop_assert_eq!(consumed, buf.len());
            prop_assert_eq!(parsed, record);
        }
    }
}
