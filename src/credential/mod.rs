//! Selective-disclosure credential issuance.
//!
//! A credential is a JWT whose `vc.credentialSubject._sd` array commits to each
//! disclosable claim by hash. The holder keeps the raw [`ClaimTuple`]s and later
//! reveals a subset of them to the circuit.

pub mod claim;
pub mod payload;
pub mod signer;

use serde::{Deserialize, Serialize};

use crate::keys::EcJwk;

pub use claim::{disclosure_digest, format_claims_input, parse_claims_input, ClaimTuple};
pub use payload::{CredentialPayload, CredentialTemplate, IssuedPayload, PayloadBuilder};
pub use signer::{Es256KeyPair, Es256Signer, TokenSigner};

/// What the holder keeps after issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCredential {
    /// One canonical claim tuple per line.
    pub claims_input: String,
    pub token: String,
    pub public_jwk: EcJwk,
}
