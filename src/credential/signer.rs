use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::{
    rand::SystemRandom,
    signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING},
};

use super::payload::CredentialPayload;
use crate::{
    error::{Error, Result},
    keys::EcJwk,
};

/// Turns a payload into a compact `header.payload.signature` token.
pub trait TokenSigner {
    fn sign(&self, payload: &CredentialPayload) -> Result<String>;
}

/// P-256 key pair held as PKCS#8 DER.
pub struct Es256KeyPair {
    pkcs8: Vec<u8>,
    public_jwk: EcJwk,
}

impl Es256KeyPair {
    pub fn generate() -> Result<Self> {
        let rng = SystemRandom::new();
        let document = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
            .map_err(|_| Error::Signing("key generation failed".into()))?;
        Self::from_pkcs8(document.as_ref())
    }

    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<Self> {
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8)
            .map_err(|e| Error::Signing(format!("rejected PKCS#8 key: {e}")))?;

        // uncompressed SEC1: 0x04 || x || y
        let point = key_pair.public_key().as_ref();
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        x.copy_from_slice(&point[1..33]);
        y.copy_from_slice(&point[33..65]);

        Ok(Self {
            pkcs8: pkcs8.to_vec(),
            public_jwk: EcJwk::from_coordinates(&x, &y),
        })
    }

    pub fn public_jwk(&self) -> &EcJwk {
        &self.public_jwk
    }

    pub fn pkcs8(&self) -> &[u8] {
        &self.pkcs8
    }

    pub fn signer(&self) -> Es256Signer {
        Es256Signer::from_pkcs8(&self.pkcs8)
    }
}

/// ES256 signer producing `{"typ":"JWT","alg":"ES256"}` tokens.
pub struct Es256Signer {
    key: EncodingKey,
}

impl Es256Signer {
    pub fn from_pkcs8(pkcs8: &[u8]) -> Self {
        Self {
            key: EncodingKey::from_ec_der(pkcs8),
        }
    }
}

impl TokenSigner for Es256Signer {
    fn sign(&self, payload: &CredentialPayload) -> Result<String> {
        encode(&Header::new(Algorithm::ES256), payload, &self.key)
            .map_err(|e| Error::Signing(e.to_string()))
    }
}
