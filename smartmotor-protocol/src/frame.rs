//! Link framing
//!
//! ```text
//! 0x17 | len | type | payload[len] | xor
//! ```
//!
//! `xor` folds every byte from `len` through the end of the payload. A
//! bank reply is read into a fixed buffer, so decoding works on whole
//! slices: idle bytes and false starts ahead of a frame are skipped and
//! anything after the first valid frame is ignored. Layout version 0 is
//! never sent, so zero padding cannot pass for an empty frame.

use heapless::Vec;

pub const FRAME_START: u8 = 0x17;

pub const MAX_PAYLOAD_SIZE: usize = 64;

/// Start, length, type and checksum around the payload
const OVERHEAD: usize = 4;

pub const MAX_FRAME_SIZE: usize = MAX_PAYLOAD_SIZE + OVERHEAD;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    PayloadTooLarge,
    /// Checksum of a complete frame did not match
    InvalidChecksum,
    /// Buffer ended before a frame closed
    Incomplete,
    /// Payload does not fit the layout named by its type byte
    InvalidFrame,
    /// TYPE names a layout version this side does not speak
    UnknownLayout,
    /// Output buffer shorter than the encoded frame
    BufferTooSmall,
}

/// One frame on the link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Layout version (high nibble) and kind (low nibble)
    pub type_byte: u8,
    pub payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

fn checksum(type_byte: u8, payload: &[u8]) -> u8 {
    payload
        .iter()
        .fold(payload.len() as u8 ^ type_byte, |acc, b| acc ^ b)
}

impl Frame {
    pub fn new(type_byte: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let payload = Vec::from_slice(payload).map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self { type_byte, payload })
    }

    pub fn version(&self) -> u8 {
        self.type_byte >> 4
    }

    pub fn kind(&self) -> u8 {
        self.type_byte & 0x0F
    }

    /// Bytes this frame occupies on the wire
    pub fn encoded_len(&self) -> usize {
        self.payload.len() + OVERHEAD
    }

    /// Write the frame to the front of `out`, returning its length
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, FrameError> {
        let len = self.encoded_len();
        let out = out.get_mut(..len).ok_or(FrameError::BufferTooSmall)?;
        let (header, rest) = out.split_at_mut(3);
        let (body, tail) = rest.split_at_mut(self.payload.len());

        header.copy_from_slice(&[FRAME_START, self.payload.len() as u8, self.type_byte]);
        body.copy_from_slice(&self.payload);
        tail[0] = checksum(self.type_byte, &self.payload);
        Ok(len)
    }

    pub fn encode_to_vec(&self) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
        let mut out = Vec::new();
        // Capacity covers the largest frame
        let _ = out.resize(self.encoded_len(), 0);
        self.encode(&mut out)?;
        Ok(out)
    }

    /// Decode the first valid frame in `bytes`
    ///
    /// Every start byte is a candidate. One followed by an impossible
    /// length or a zero layout version, one cut off by the end of the
    /// buffer, or one whose checksum fails is dropped and scanning resumes
    /// right after it. With no valid frame, a checksum failure anywhere
    /// is reported ahead of truncation.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let mut error = FrameError::Incomplete;
        let mut rest = bytes;
        while let Some(start) = rest.iter().position(|&b| b == FRAME_START) {
            rest = &rest[start + 1..];

            let &[len, type_byte, ..] = rest else {
                break;
            };
            let len = len as usize;
            if len > MAX_PAYLOAD_SIZE || type_byte >> 4 == 0 {
                continue;
            }
            let Some(body) = rest.get(2..2 + len + 1) else {
                continue;
            };
            let (payload, sum) = body.split_at(len);
            if sum[0] == checksum(type_byte, payload) {
                return Frame::new(type_byte, payload);
            }
            error = FrameError::InvalidChecksum;
        }
        Err(error)
    }
}
