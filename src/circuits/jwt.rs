//! Witness inputs for the ES256 JWT selective-disclosure circuit.
//!
//! The circuit re-hashes `header.payload` from a padded buffer, checks the
//! ECDSA signature against the limbed key, base64-decodes the payload and
//! asserts that each disclosed claim digest occurs at the given offset.

use num_bigint::BigUint;
use tracing::{debug, info};

use super::schema::{check_inputs, jwt_field_defs, CircuitInputs, InputValue};
use crate::{
    config::CircuitParams,
    credential::ClaimTuple,
    error::{Error, Result},
    keys::PublicKeyMaterial,
    padding::sha256_pad,
    token::{split_token, SIGNATURE_LEN},
    utils::{bytes_to_bigint, bytes_to_integer_sequence, chars_to_padded_int_array, to_limbs},
};

/// Assemble the circuit inputs for `token` signed by `key`, revealing `disclosed`.
///
/// Each claim's digest is recomputed with the same function used at issuance
/// and must appear in the decoded payload.
pub fn generate_jwt_inputs(
    params: &CircuitParams,
    token: &str,
    key: &PublicKeyMaterial,
    disclosed: &[ClaimTuple],
) -> Result<CircuitInputs> {
    let digests: Vec<String> = disclosed.iter().map(ClaimTuple::digest).collect();
    generate_jwt_inputs_for_digests(params, token, key, &digests)
}

/// Same as [`generate_jwt_inputs`] for callers that only hold the digests.
pub fn generate_jwt_inputs_for_digests(
    params: &CircuitParams,
    token: &str,
    key: &PublicKeyMaterial,
    digests: &[String],
) -> Result<CircuitInputs> {
    let parts = split_token(token)?;
    ensure_len("header", parts.header.len(), params.max_b64_header_length)?;
    ensure_len("payload", parts.payload.len(), params.max_b64_payload_length)?;
    ensure_len("disclosures", digests.len(), params.max_matches)?;

    let signing_input = parts.signing_input();
    let padded = sha256_pad(signing_input.as_bytes(), params.max_message_length)?;

    let signature = parts.signature_bytes()?;
    let (r, s) = signature.split_at(SIGNATURE_LEN / 2);

    let point = key.coordinates()?;
    let limbs = |value: &BigUint| to_limbs(value, params.limb_bits, params.limb_count);

    let payload_json = parts.payload_json()?;
    let zero = BigUint::from(0u32);
    let mut match_substring = vec![vec![zero.clone(); params.max_substring_length]; params.max_matches];
    let mut match_length = vec![zero.clone(); params.max_matches];
    let mut match_index = vec![zero; params.max_matches];

    for (slot, digest) in digests.iter().enumerate() {
        let index = payload_json
            .find(digest.as_str())
            .ok_or_else(|| Error::DisclosureNotFound(digest.clone()))?;
        match_substring[slot] =
            chars_to_padded_int_array(digest, params.max_substring_length, "matchSubstring")?;
        match_length[slot] = BigUint::from(digest.chars().count());
        match_index[slot] = BigUint::from(index);
        debug!(slot, index, "located disclosed claim digest");
    }

    let mut inputs = CircuitInputs::new();
    inputs.insert("message", InputValue::Array(bytes_to_integer_sequence(&padded.bytes)));
    inputs.insert("messageLength", InputValue::scalar(padded.final_length));
    inputs.insert("periodIndex", InputValue::scalar(parts.header.len()));
    inputs.insert("sig_r", InputValue::Array(limbs(&bytes_to_bigint(r))?));
    inputs.insert("sig_s", InputValue::Array(limbs(&bytes_to_bigint(s))?));
    inputs.insert("pubkey", InputValue::Matrix(vec![limbs(&point.x)?, limbs(&point.y)?]));
    inputs.insert("matchesCount", InputValue::scalar(digests.len()));
    inputs.insert("matchSubstring", InputValue::Matrix(match_substring));
    inputs.insert("matchLength", InputValue::Array(match_length));
    inputs.insert("matchIndex", InputValue::Array(match_index));

    check_inputs(&inputs, &jwt_field_defs(params))?;
    info!(
        message_length = padded.final_length,
        matches = digests.len(),
        "assembled JWT circuit inputs"
    );
    Ok(inputs)
}

fn ensure_len(field: &'static str, len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(Error::InputTooLong { field, len, max });
    }
    Ok(())
}
