//! COBS frame codec.
//!
//! Consistent Overhead Byte Stuffing removes every 0x00 from the payload so
//! that a single 0x00 can terminate the frame. A stream reader splits frames
//! by scanning for the delimiter, regardless of how the bytes were chunked by
//! the serial driver.
//!
//! ```text
//! payload:  11 22 00 33
//! encoded:  03 11 22 02 33 00
//!                         ^^ delimiter
//! ```

use crate::error::{Error, Result};

/// Frame delimiter.
pub const DELIMITER: u8 = 0x00;

/// Code byte of a block with no data bytes.
const EMPTY_BLOCK: u8 = 0x01;

/// Encode `payload` into a delimited frame.
///
/// An empty payload still carries its code byte: `01 00`.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    if payload.is_empty() {
        return vec![EMPTY_BLOCK, DELIMITER];
    }

    let mut frame = vec![0u8; ::cobs::max_encoding_length(payload.len()) + 1];
    let n = ::cobs::encode(payload, &mut frame);
    frame.truncate(n);
    frame.push(DELIMITER);
    frame
}

/// Decode a frame produced by [`encode`].
///
/// A trailing delimiter is optional; any other zero byte is an error.
pub fn decode(frame: &[u8]) -> Result<Vec<u8>> {
    let body = frame.strip_suffix(&[DELIMITER]).unwrap_or(frame);

    if body.is_empty() {
        return Err(Error::InvalidFrame("empty COBS frame".into()));
    }
    if body.contains(&DELIMITER) {
        return Err(Error::InvalidFrame("delimiter inside COBS frame".into()));
    }
    if body == [EMPTY_BLOCK] {
        return Ok(Vec::new());
    }

    let mut payload = vec![0u8; body.len()];
    let n = ::cobs::decode(body, &mut payload)
        .map_err(|_| Error::InvalidFrame(format!("malformed COBS frame ({} bytes)", body.len())))?;
    payload.truncate(n);
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_vector() {
        assert_eq!(encode(&[0x11, 0x22, 0x00, 0x33]), vec![0x03, 0x11, 0x22, 0x02, 0x33, 0x00]);
    }

    #[test]
    fn test_encode_reset_command() {
        assert_eq!(encode(&[0x00]), vec![0x01, 0x01, 0x00]);
    }

    #[test]
    fn test_encode_empty() {
        assert_eq!(encode(&[]), vec![0x01, 0x00]);
        assert_eq!(decode(&[0x01, 0x00]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_round_trip_with_embedded_zeros() {
        for len in 0..=60usize {
            let payload: Vec<u8> = (0..len)
                .map(|i| if i % 3 == 0 { 0x00 } else { (i * 37) as u8 })
                .collect();
            let frame = encode(&payload);

            assert_eq!(frame.last(), Some(&DELIMITER));
            assert!(!frame[..frame.len() - 1].contains(&DELIMITER));
            // One code byte per started 254-byte block, plus the delimiter
            assert_eq!(frame.len(), len + len / 254 + 2, "len {len}");
            assert_eq!(decode(&frame).unwrap(), payload, "len {len}");
        }
    }

    #[test]
    fn test_empty_payload_survives_the_link() {
        let frame = encode(&[]);
        assert_eq!(frame.len(), 2);
        assert_eq!(decode(&frame[..1]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_round_trip_all_zero_and_all_ff() {
        for payload in [vec![0x00; 60], vec![0xFF; 60]] {
            assert_eq!(decode(&encode(&payload)).unwrap(), payload);
        }
    }

    #[test]
    fn test_decode_without_trailing_delimiter() {
        assert_eq!(decode(&[0x02, 0x80]).unwrap(), vec![0x80]);
    }

    #[test]
    fn test_decode_rejects_empty_and_embedded_zero() {
        assert!(matches!(decode(&[]), Err(Error::InvalidFrame(_))));
        assert!(matches!(decode(&[0x00]), Err(Error::InvalidFrame(_))));
        assert!(matches!(decode(&[0x02, 0x00, 0x80, 0x00]), Err(Error::InvalidFrame(_))));
    }

    #[test]
    fn test_encode_decode_inverse_on_frames() {
        let frame = vec![0x03, 0x82, 0x01, 0x01, 0x00];
        assert_eq!(encode(&decode(&frame).unwrap()), frame);
    }
}
