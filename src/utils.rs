use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use num_bigint::BigUint;

use crate::error::{Error, Result};

/// Big-endian interpretation of `bytes` as an unsigned integer.
pub fn bytes_to_bigint(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// Decode base64 (either alphabet, padding optional) and read it big-endian.
pub fn base64_to_bigint(encoded: &str) -> Result<BigUint> {
    let bytes = decode_base64(encoded)
        .ok_or_else(|| Error::KeyParse(format!("not valid base64: {encoded}")))?;
    Ok(bytes_to_bigint(&bytes))
}

/// One entry per character code point, zero-filled up to `pad_length`.
///
/// Longer strings are rejected instead of truncated.
pub fn chars_to_padded_int_array(
    s: &str,
    pad_length: usize,
    field: &'static str,
) -> Result<Vec<BigUint>> {
    let len = s.chars().count();
    if len > pad_length {
        return Err(Error::InputTooLong {
            field,
            len,
            max: pad_length,
        });
    }

    let mut values: Vec<BigUint> = s.chars().map(|c| BigUint::from(c as u32)).collect();
    values.resize(pad_length, BigUint::from(0u32));
    Ok(values)
}

/// Split `value` into `limb_count` little-endian limbs of `limb_bits` bits.
///
/// Fails with [`Error::EncodingOverflow`] when the value does not fit, so the
/// reconstruction `Σ limb[i] * 2^(limb_bits * i)` always equals `value`.
pub fn to_limbs(value: &BigUint, limb_bits: usize, limb_count: usize) -> Result<Vec<BigUint>> {
    let capacity = limb_bits * limb_count;
    if value.bits() > capacity as u64 {
        return Err(Error::EncodingOverflow {
            bits: value.bits(),
            limb_bits,
            limb_count,
            capacity,
        });
    }

    let mask = (BigUint::from(1u32) << limb_bits) - 1u32;
    let mut rest = value.clone();
    let mut limbs = Vec::with_capacity(limb_count);
    for _ in 0..limb_count {
        limbs.push(&rest & &mask);
        rest >>= limb_bits;
    }
    Ok(limbs)
}

/// Inverse of [`to_limbs`].
pub fn from_limbs(limbs: &[BigUint], limb_bits: usize) -> BigUint {
    limbs
        .iter()
        .rev()
        .fold(BigUint::from(0u32), |acc, limb| (acc << limb_bits) + limb)
}

pub fn bytes_to_integer_sequence(bytes: &[u8]) -> Vec<BigUint> {
    bytes.iter().map(|&b| BigUint::from(b)).collect()
}

/// Fixed-width big-endian encoding, left padded with zeros.
pub fn bigint_to_fixed_bytes<const N: usize>(value: &BigUint) -> Option<[u8; N]> {
    let bytes = value.to_bytes_be();
    if bytes.len() > N {
        return None;
    }
    let mut out = [0u8; N];
    out[N - bytes.len()..].copy_from_slice(&bytes);
    Some(out)
}

/// Decode base64 without knowing the alphabet or whether padding was kept.
pub fn decode_base64(encoded: &str) -> Option<Vec<u8>> {
    let trimmed = encoded.trim().trim_end_matches('=');
    if trimmed.len() % 4 == 1 {
        return None;
    }

    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .or_else(|_| URL_SAFE.decode(encoded.trim()))
        .or_else(|_| STANDARD.decode(encoded.trim()))
        .ok()
}

/// Strict decoding for token segments, which always use the URL-safe alphabet.
pub fn decode_base64url(segment: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')).ok()
}

pub fn encode_base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}
