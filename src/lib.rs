//! Selective-disclosure JWT credentials proven with a circom Groth16 circuit.
//!
//! This library covers the whole path from issuance to proof:
//! - ES256 credential issuance with salted, hashed claims (`_sd`)
//! - Circuit witness inputs for the ES256 JWT circuit (padding, limbs, match offsets)
//! - Circuit artifact retrieval over HTTP, IPFS mirrors or the local disk
//! - Proof generation and verification through an external Groth16 prover
//!
//! Public keys may be given as a JWK or as a base64 DER SubjectPublicKeyInfo.

pub mod circuits;
pub mod config;
pub mod credential;
pub mod error;
pub mod fetch;
pub mod keys;
pub mod padding;
pub mod prover;
pub mod snarkjs;
pub mod token;
pub mod utils;

// Re-export commonly used types and functions
pub use circuits::{
    check_inputs, generate_jwt_inputs, generate_jwt_inputs_for_digests, jwt_field_defs,
    parse_inputs, CircuitInputs, FieldShape, InputValue,
};
pub use config::{CircuitAssets, CircuitParams, FetchConfig, Settings};
pub use credential::{
    disclosure_digest, ClaimTuple, CredentialPayload, Es256KeyPair, IssuedCredential,
    PayloadBuilder, TokenSigner,
};
pub use error::{Error, Result};
pub use fetch::{AssetFetcher, AssetLocator};
pub use keys::{extract_xy_from_der, EcJwk, EcPoint, PublicKeyMaterial};
pub use padding::{sha256_pad, PaddedMessage};
pub use prover::{Groth16Proof, Groth16Prover, ProofOutput, ProofService};
pub use snarkjs::SnarkjsProver;
pub use token::{split_token, verify_token, TokenParts};
pub use utils::{base64_to_bigint, chars_to_padded_int_array, to_limbs};
