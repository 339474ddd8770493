//! Write chunking and read-back verification.
//!
//! A whole image never fits in one bridge packet. The plan splits it into
//! fixed-size payloads plus one trailing remainder, which may be empty.
//! Microwire parts are addressed in 16-bit registers, so each full chunk
//! advances the address by half its byte length.

use crate::error::{Error, Result};
use crate::protocol::DeviceKind;
use crate::protocol::command::address_u16;
use log::debug;

/// One write request worth of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// Target address in register units.
    pub address: u16,
    /// Bytes to write.
    pub data: &'a [u8],
}

/// Partition of a buffer into bridge-sized writes.
#[derive(Debug, Clone)]
pub struct ChunkPlan<'a> {
    chunks: Vec<Chunk<'a>>,
    max_payload: usize,
}

impl<'a> ChunkPlan<'a> {
    /// Plan the writes for `data` starting at register `base`.
    ///
    /// `max_payload` must be a non-zero multiple of the register width.
    /// Every chunk address, including the remainder's, must fit 16 bits.
    pub fn new(base: u16, data: &'a [u8], kind: DeviceKind, max_payload: usize) -> Result<Self> {
        let scale = kind.register_width();
        if max_payload == 0 || max_payload % scale != 0 {
            return Err(Error::Config(format!(
                "chunk size {max_payload} is not a multiple of the {kind} register width"
            )));
        }
        let step = (max_payload / scale) as u32;

        let full = data.len() / max_payload;
        let mut chunks = Vec::with_capacity(full + 1);
        for i in 0..=full {
            let address = address_u16(u32::from(base) + i as u32 * step)?;
            let start = i * max_payload;
            let end = (start + max_payload).min(data.len());
            chunks.push(Chunk {
                address,
                data: &data[start..end],
            });
        }

        debug!(
            "Chunk plan: {} bytes in {} full chunks of {max_payload} + {} remainder",
            data.len(),
            full,
            data.len() % max_payload
        );

        Ok(Self {
            chunks,
            max_payload,
        })
    }

    /// Chunks in write order.
    pub fn chunks(&self) -> &[Chunk<'a>] {
        &self.chunks
    }

    /// Iterate over chunks in write order.
    pub fn iter(&self) -> impl Iterator<Item = &Chunk<'a>> {
        self.chunks.iter()
    }

    /// Number of write requests, including the remainder.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Always false: even an empty buffer yields one empty remainder chunk.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Payload size of the full chunks.
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Total payload bytes.
    pub fn total_bytes(&self) -> usize {
        self.chunks.iter().map(|c| c.data.len()).sum()
    }
}

/// Compare read-back content against the source buffer.
pub fn verify(expected: &[u8], actual: &[u8]) -> Result<()> {
    if let Some(offset) = expected.iter().zip(actual).position(|(e, a)| e != a) {
        return Err(Error::VerifyMismatch {
            offset,
            expected: Some(expected[offset]),
            actual: Some(actual[offset]),
            readback: actual.to_vec(),
        });
    }

    if expected.len() != actual.len() {
        let offset = expected.len().min(actual.len());
        return Err(Error::VerifyMismatch {
            offset,
            expected: expected.get(offset).copied(),
            actual: actual.get(offset).copied(),
            readback: actual.to_vec(),
        });
    }

    Ok(())
}
