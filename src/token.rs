//! ES256 token signature verification, independent of any proof.

use ring::signature::{UnparsedPublicKey, ECDSA_P256_SHA256_FIXED};
use tracing::debug;

use crate::{
    error::{Error, Result},
    keys::PublicKeyMaterial,
    utils::decode_base64url,
};

/// Fixed-width `r || s` signature length for P-256.
pub const SIGNATURE_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenParts<'a> {
    pub header: &'a str,
    pub payload: &'a str,
    pub signature: &'a str,
}

impl<'a> TokenParts<'a> {
    /// The exact bytes covered by the signature.
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.header, self.payload)
    }

    /// Raw `r || s`; any length other than [`SIGNATURE_LEN`] is malformed.
    pub fn signature_bytes(&self) -> Result<Vec<u8>> {
        let signature = decode_base64url(self.signature)
            .ok_or_else(|| Error::TokenFormat("signature is not base64url".into()))?;
        if signature.len() != SIGNATURE_LEN {
            return Err(Error::TokenFormat(format!(
                "signature has {} bytes, expected {SIGNATURE_LEN}",
                signature.len()
            )));
        }
        Ok(signature)
    }

    pub fn payload_json(&self) -> Result<String> {
        let bytes = decode_base64url(self.payload)
            .ok_or_else(|| Error::TokenFormat("payload is not base64url".into()))?;
        String::from_utf8(bytes).map_err(|_| Error::TokenFormat("payload is not UTF-8".into()))
    }
}

pub fn split_token(token: &str) -> Result<TokenParts<'_>> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    match segments.as_slice() {
        &[header, payload, signature] => Ok(TokenParts {
            header,
            payload,
            signature,
        }),
        _ => Err(Error::TokenFormat(format!(
            "expected 3 dot-separated segments, found {}",
            segments.len()
        ))),
    }
}

/// Check the token's ES256 signature.
///
/// `Ok(false)` means the signature does not verify; a token that cannot be
/// parsed at all is an error.
pub fn verify_token(token: &str, key: &PublicKeyMaterial) -> Result<bool> {
    let parts = split_token(token)?;
    let signature = parts.signature_bytes()?;
    let public_key = key.coordinates()?.to_uncompressed()?;

    let verified = UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, &public_key[..])
        .verify(parts.signing_input().as_bytes(), &signature)
        .is_ok();
    debug!(verified, signature_len = signature.len(), "checked token signature");
    Ok(verified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        credential::{Es256KeyPair, PayloadBuilder, TokenSigner},
        utils::encode_base64url,
    };
    use rand::{rngs::StdRng, SeedableRng};

    fn signed() -> (String, PublicKeyMaterial) {
        let issuer = Es256KeyPair::generate().unwrap();
        let issued = PayloadBuilder::new(StdRng::seed_from_u64(11)).build_at(
            issuer.public_jwk(),
            &[("name", "denkeni"), ("roc_birthday", "0750101")],
            1_700_000_000,
        );
        let token = issuer.signer().sign(&issued.payload).unwrap();
        (token, PublicKeyMaterial::Jwk(issuer.public_jwk().clone()))
    }

    #[test]
    fn valid_signature() {
        let (token, key) = signed();
        assert!(verify_token(&token, &key).unwrap());
    }

    #[test]
    fn tampered_signature_is_false_not_error() {
        let (token, key) = signed();
        let parts = split_token(&token).unwrap();
        let mut signature = parts.signature_bytes().unwrap();
        assert_eq!(signature.len(), SIGNATURE_LEN);
        signature[10] ^= 0x01;
        let tampered = format!("{}.{}", parts.signing_input(), encode_base64url(&signature));

        assert!(!verify_token(&tampered, &key).unwrap());
    }

    #[test]
    fn tampered_payload_is_false() {
        let (token, key) = signed();
        let parts = split_token(&token).unwrap();
        let forged = format!("{}.{}x.{}", parts.header, parts.payload, parts.signature);
        assert!(!verify_token(&forged, &key).unwrap());
    }

    #[test]
    fn missing_segment_is_format_error() {
        let (token, key) = signed();
        let parts = split_token(&token).unwrap();
        let truncated = parts.signing_input();

        assert!(matches!(
            verify_token(&truncated, &key),
            Err(Error::TokenFormat(_))
        ));
        assert!(matches!(
            verify_token(&format!("{token}.extra"), &key),
            Err(Error::TokenFormat(_))
        ));
    }

    #[test]
    fn undecodable_signature_is_format_error() {
        let (token, key) = signed();
        let parts = split_token(&token).unwrap();
        let broken = format!("{}.{}", parts.signing_input(), "not*base64");
        assert!(matches!(
            verify_token(&broken, &key),
            Err(Error::TokenFormat(_))
        ));
    }

    #[test]
    fn wrong_length_signature_is_format_error() {
        let (token, key) = signed();
        let parts = split_token(&token).unwrap();
        for len in [63, 65, 72] {
            let malformed = format!("{}.{}", parts.signing_input(), encode_base64url(&vec![7u8; len]));
            assert!(
                matches!(verify_token(&malformed, &key), Err(Error::TokenFormat(_))),
                "{len}-byte signature"
            );
        }
    }
}
