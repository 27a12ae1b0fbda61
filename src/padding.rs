//! SHA-256 message padding for in-circuit hashing.
//!
//! The circuit hashes a fixed-size buffer, so the standard padding is applied
//! outside and the buffer is zero-filled up to the circuit's maximum length.

use crate::error::{Error, Result};

const BLOCK_LEN: usize = 64;
const LENGTH_TRAILER: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddedMessage {
    /// Exactly `max_message_length` bytes.
    pub bytes: Vec<u8>,
    /// End of the padded message; always a multiple of 64.
    pub final_length: usize,
}

pub fn sha256_pad(message: &[u8], max_message_length: usize) -> Result<PaddedMessage> {
    let bit_length = (message.len() as u64) * 8;

    let unpadded = message.len() + 1 + LENGTH_TRAILER;
    let pad_length = match unpadded % BLOCK_LEN {
        0 => 0,
        rem => BLOCK_LEN - rem,
    };
    let final_length = unpadded + pad_length;

    if final_length > max_message_length {
        return Err(Error::MessageTooLong {
            padded: final_length,
            max: max_message_length,
        });
    }

    let mut bytes = vec![0u8; max_message_length];
    bytes[..message.len()].copy_from_slice(message);
    bytes[message.len()] = 0x80;
    bytes[final_length - LENGTH_TRAILER..final_length].copy_from_slice(&bit_length.to_be_bytes());

    Ok(PaddedMessage {
        bytes,
        final_length,
    })
}
