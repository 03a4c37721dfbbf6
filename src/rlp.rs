//! Recursive length-prefix (RLP) encoding for transaction serialization.
//!
//! Integers are encoded as their minimal big-endian byte string (the empty
//! string represents zero); byte strings carry a length header; lists carry
//! a header covering the concatenated payload.

use crate::errors::{WalletError, WalletResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem {
    Bytes(Vec<u8>),
    List(Vec<RlpItem>),
}

impl RlpItem {
    /// Minimal big-endian encoding of an unsigned integer; zero becomes the
    /// empty byte string.
    pub fn uint(value: u128) -> Self {
        RlpItem::Bytes(uint_to_minimal_be(value))
    }

    /// Byte-string item with any leading zero bytes stripped, for 256-bit
    /// integers carried as fixed-width arrays (signature r and s).
    pub fn uint_be(bytes: &[u8]) -> Self {
        let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
        RlpItem::Bytes(bytes[start..].to_vec())
    }

    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        RlpItem::Bytes(data.into())
    }
}

fn uint_to_minimal_be(value: u128) -> Vec<u8> {
    let be = value.to_be_bytes();
    let start = be.iter().position(|&b| b != 0).unwrap_or(be.len());
    be[start..].to_vec()
}

pub fn encode(item: &RlpItem) -> Vec<u8> {
    match item {
        RlpItem::Bytes(data) => {
            // A single byte below 0x80 is its own encoding.
            if data.len() == 1 && data[0] < 0x80 {
                data.clone()
            } else {
                let mut out = length_header(data.len(), 0x80);
                out.extend_from_slice(data);
                out
            }
        }
        RlpItem::List(items) => {
            let payload: Vec<u8> = items.iter().flat_map(encode).collect();
            let mut out = length_header(payload.len(), 0xc0);
            out.extend_from_slice(&payload);
            out
        }
    }
}

fn length_header(len: usize, offset: u8) -> Vec<u8> {
    if len <= 55 {
        vec![offset + len as u8]
    } else {
        let len_be = uint_to_minimal_be(len as u128);
        let mut out = vec![offset + 55 + len_be.len() as u8];
        out.extend_from_slice(&len_be);
        out
    }
}

/// Decode a complete RLP encoding; trailing bytes are an error.
pub fn decode(bytes: &[u8]) -> WalletResult<RlpItem> {
    let (item, consumed) = decode_at(bytes)?;
    if consumed != bytes.len() {
        return Err(WalletError::ValidationError(
            "Trailing bytes after RLP item".to_string(),
        ));
    }
    Ok(item)
}

fn decode_at(bytes: &[u8]) -> WalletResult<(RlpItem, usize)> {
    let first = *bytes
        .first()
        .ok_or_else(|| WalletError::ValidationError("Empty RLP input".to_string()))?;

    match first {
        0x00..=0x7f => Ok((RlpItem::Bytes(vec![first]), 1)),
        0x80..=0xb7 => {
            let len = (first - 0x80) as usize;
            let data = slice_payload(bytes, 1, len)?;
            Ok((RlpItem::Bytes(data.to_vec()), 1 + len))
        }
        0xb8..=0xbf => {
            let len_of_len = (first - 0xb7) as usize;
            let (len, header) = long_length(bytes, len_of_len)?;
            let data = slice_payload(bytes, header, len)?;
            Ok((RlpItem::Bytes(data.to_vec()), header + len))
        }
        0xc0..=0xf7 => {
            let len = (first - 0xc0) as usize;
            let payload = slice_payload(bytes, 1, len)?;
            Ok((RlpItem::List(decode_list(payload)?), 1 + len))
        }
        0xf8..=0xff => {
            let len_of_len = (first - 0xf7) as usize;
            let (len, header) = long_length(bytes, len_of_len)?;
            let payload = slice_payload(bytes, header, len)?;
            Ok((RlpItem::List(decode_list(payload)?), header + len))
        }
    }
}

fn long_length(bytes: &[u8], len_of_len: usize) -> WalletResult<(usize, usize)> {
    let len_bytes = slice_payload(bytes, 1, len_of_len)?;
    let mut len = 0usize;
    for &b in len_bytes {
        len = len
            .checked_mul(256)
            .and_then(|l| l.checked_add(b as usize))
            .ok_or_else(|| WalletError::ValidationError("RLP length overflow".to_string()))?;
    }
    Ok((len, 1 + len_of_len))
}

fn slice_payload(bytes: &[u8], start: usize, len: usize) -> WalletResult<&[u8]> {
    bytes
        .get(start..start + len)
        .ok_or_else(|| WalletError::ValidationError("Truncated RLP input".to_string()))
}

fn decode_list(mut payload: &[u8]) -> WalletResult<Vec<RlpItem>> {
    let mut items = Vec::new();
    while !payload.is_empty() {
        let (item, consumed) = decode_at(payload)?;
        items.push(item);
        payload = &payload[consumed..];
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_single_values() {
        // Known encodings from the RLP definition.
        assert_eq!(encode(&RlpItem::bytes(b"dog".to_vec())), vec![0x83, b'd', b'o', b'g']);
        assert_eq!(encode(&RlpItem::Bytes(vec![])), vec![0x80]);
        assert_eq!(encode(&RlpItem::uint(0)), vec![0x80]);
        assert_eq!(encode(&RlpItem::uint(0x0f)), vec![0x0f]);
        assert_eq!(encode(&RlpItem::uint(0x0400)), vec![0x82, 0x04, 0x00]);
        assert_eq!(encode(&RlpItem::List(vec![])), vec![0xc0]);
    }

    #[test]
    fn nested_list_encoding() {
        // [ [], [[]], [ [], [[]] ] ]
        let item = RlpItem::List(vec![
            RlpItem::List(vec![]),
            RlpItem::List(vec![RlpItem::List(vec![])]),
            RlpItem::List(vec![
                RlpItem::List(vec![]),
                RlpItem::List(vec![RlpItem::List(vec![])]),
            ]),
        ]);
        assert_eq!(
            encode(&item),
            vec![0xc7, 0xc0, 0xc1, 0xc0, 0xc3, 0xc0, 0xc1, 0xc0]
        );
    }

    #[test]
    fn long_string_header() {
        let data = vec![0xaa; 56];
        let encoded = encode(&RlpItem::bytes(data.clone()));
        assert_eq!(encoded[0], 0xb8);
        assert_eq!(encoded[1], 56);
        assert_eq!(&encoded[2..], &data[..]);
    }

    #[test]
    fn round_trip_mixed_fields() {
        let item = RlpItem::List(vec![
            RlpItem::uint(5),
            RlpItem::uint(1_000_000_000),
            RlpItem::uint(21_000),
            RlpItem::bytes(vec![0x09; 20]),
            RlpItem::uint(1_000_000_000_000_000_000),
            RlpItem::Bytes(vec![]),
            RlpItem::uint(11_155_111),
            RlpItem::uint(0),
            RlpItem::uint(0),
        ]);
        let decoded = decode(&encode(&item)).unwrap();
        assert_eq!(decoded, item);
    }

    #[test]
    fn round_trip_large_payloads() {
        let item = RlpItem::List(vec![
            RlpItem::bytes(vec![0x11; 200]),
            RlpItem::List(vec![RlpItem::uint(u128::MAX), RlpItem::Bytes(vec![])]),
            RlpItem::bytes(vec![0x00, 0x00, 0x01]),
        ]);
        assert_eq!(decode(&encode(&item)).unwrap(), item);
    }

    #[test]
    fn uint_be_strips_leading_zeros() {
        let mut r = [0u8; 32];
        r[30] = 0x01;
        r[31] = 0x02;
        assert_eq!(RlpItem::uint_be(&r), RlpItem::Bytes(vec![0x01, 0x02]));
        assert_eq!(RlpItem::uint_be(&[0u8; 32]), RlpItem::Bytes(vec![]));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode(&[]).is_err());
        assert!(decode(&[0x83, b'd', b'o']).is_err()); // truncated
        assert!(decode(&[0x80, 0x00]).is_err()); // trailing bytes
    }
}
