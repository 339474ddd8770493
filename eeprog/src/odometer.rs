//! Odometer mileage encoding.
//!
//! The instrument cluster stores mileage in a 32-byte block of sixteen
//! big-endian 16-bit slots, spreading writes across the block for wear
//! leveling:
//!
//! - the low nibble of the mileage is a repeat count,
//! - the remaining bits (the "new" value) fill slot 0 and the next
//!   `repeat` slots; the rest hold the previous value (`new - 1`),
//! - the low nibble of each stored value goes through a substitution table
//!   in which consecutive entries differ in three of four bits,
//! - every other slot is stored bit-inverted.
//!
//! ```text
//! offset:  0  1 | 2  3 | 4  5 | 6  7 | ... | 30 31
//! slot:    0    | 1    | 2    | 3    | ... | 15
//! stored:  v    | !v   | v    | !v   | ... | !v
//! ```

use crate::error::{Error, Result};

/// Size of the encoded block.
pub const ENCODED_LEN: usize = 32;

/// Number of 16-bit slots in the block.
pub const SLOT_COUNT: usize = ENCODED_LEN / 2;

/// Largest mileage whose "new" value fits a 16-bit slot.
pub const MAX_MILEAGE: u32 = 0xF_FFFF;

/// Low-nibble substitution table.
pub const NIBBLE_TABLE: [u8; 16] = [
    0x00, 0x07, 0x0C, 0x0B, 0x06, 0x01, 0x0A, 0x0D, 0x03, 0x04, 0x0F, 0x08, 0x05, 0x02, 0x09, 0x0E,
];

/// Encode `mileage` into the 32-byte block.
pub fn encode(mileage: u32) -> Result<[u8; ENCODED_LEN]> {
    if mileage > MAX_MILEAGE {
        return Err(Error::MileageOutOfRange {
            mileage,
            max: MAX_MILEAGE,
        });
    }

    let repeat = (mileage & 0x0F) as usize;
    let new_value = (mileage >> 4) as u16;
    // Mileage below 16 stores 0xFFFF (pre-substitution) as the previous value.
    let old_value = new_value.wrapping_sub(1);

    let new_slot = substitute(new_value).to_be_bytes();
    let old_slot = substitute(old_value).to_be_bytes();

    let mut buf = [0u8; ENCODED_LEN];
    for (slot, pair) in buf.chunks_exact_mut(2).enumerate() {
        let value = if slot <= repeat { new_slot } else { old_slot };
        pair.copy_from_slice(&value);
    }

    invert_alternate_slots(&mut buf);
    Ok(buf)
}

/// Decode a 32-byte block back into mileage.
pub fn decode(encoded: &[u8; ENCODED_LEN]) -> u32 {
    let mut buf = *encoded;
    invert_alternate_slots(&mut buf);

    let mut slots = buf
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));

    let first = slots.next().unwrap_or_default();
    let count = 1 + slots.take_while(|&v| v == first).count() as u32;

    let value = u32::from(restore(first));
    // count is at least 1, so this never underflows
    (value << 4) + count - 1
}

/// Decode a block of arbitrary length, rejecting anything but 32 bytes.
pub fn decode_slice(encoded: &[u8]) -> Result<u32> {
    let block: &[u8; ENCODED_LEN] = encoded
        .try_into()
        .map_err(|_| Error::InvalidOdometerBuffer { len: encoded.len() })?;
    Ok(decode(block))
}

/// Invert every other slot in place (byte offsets 2,3 then 6,7 and so on).
///
/// Applying it twice restores the input.
pub fn invert_alternate_slots(buf: &mut [u8; ENCODED_LEN]) {
    for pair in buf.chunks_exact_mut(4) {
        pair[2] ^= 0xFF;
        pair[3] ^= 0xFF;
    }
}

fn substitute(value: u16) -> u16 {
    (value & 0xFFF0) + u16::from(NIBBLE_TABLE[usize::from(value & 0x0F)])
}

fn restore(value: u16) -> u16 {
    let nibble = (value & 0x0F) as u8;
    // The table is a permutation of 0..16; every nibble has an index.
    let index = NIBBLE_TABLE
        .iter()
        .position(|&t| t == nibble)
        .unwrap_or_default() as u16;
    (value & 0xFFF0) + index
}
