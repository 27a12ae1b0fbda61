use std::collections::HashSet;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::claim::{random_id, ClaimTuple};
use crate::keys::EcJwk;

/// Credentials are valid for one hour from issuance.
pub const VALIDITY_SECS: i64 = 3600;
pub const SD_ALG: &str = "sha-256";

const NONCE_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const NONCE_LENGTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPayload {
    pub sub: String,
    pub iss: String,
    pub nbf: i64,
    pub exp: i64,
    pub jti: String,
    pub nonce: String,
    pub cnf: Confirmation,
    pub vc: CredentialBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub jwk: EcJwk,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialBody {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub credential_status: CredentialStatus,
    pub credential_schema: CredentialSchema,
    pub credential_subject: CredentialSubject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub status_list_index: String,
    pub status_list_credential: String,
    pub status_purpose: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSchema {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSubject {
    #[serde(rename = "_sd")]
    pub sd: Vec<String>,
    #[serde(rename = "_sd_alg")]
    pub sd_alg: String,
}

/// Issuer-specific fields copied verbatim into every credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialTemplate {
    pub jti: String,
    pub context: Vec<String>,
    pub types: Vec<String>,
    pub status: CredentialStatus,
    pub schema: CredentialSchema,
}

impl Default for CredentialTemplate {
    fn default() -> Self {
        Self {
            jti: "https://your-domain.org/credential/uuid".into(),
            context: vec!["https://www.w3.org/2018/credentials/v1".into()],
            types: vec!["VerifiableCredential".into(), "93581925_dd".into()],
            status: CredentialStatus {
                kind: "StatusList2021Entry".into(),
                id: "https://example.org/status-list/93581925_dd/r0#6".into(),
                status_list_index: "6".into(),
                status_list_credential: "https://example.org/status-list/93581925_dd/r0".into(),
                status_purpose: "revocation".into(),
            },
            schema: CredentialSchema {
                id: "https://example.org/schema/93581925/dd/V1/some-schema-id".into(),
                kind: "JsonSchema".into(),
            },
        }
    }
}

/// Payload plus the claims it commits to, in `_sd` order.
#[derive(Debug, Clone)]
pub struct IssuedPayload {
    pub payload: CredentialPayload,
    pub claims: Vec<ClaimTuple>,
}

/// Builds credential payloads from an injected random source.
///
/// Salts and nonces only need to be unlinkable, not secret, so any [`Rng`]
/// will do; tests pass a seeded one.
pub struct PayloadBuilder<R> {
    rng: R,
    template: CredentialTemplate,
    issued_nonces: HashSet<String>,
}

impl<R: Rng> PayloadBuilder<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            template: CredentialTemplate::default(),
            issued_nonces: HashSet::new(),
        }
    }

    pub fn with_template(mut self, template: CredentialTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn build(&mut self, holder_key: &EcJwk, attributes: &[(&str, &str)]) -> IssuedPayload {
        self.build_at(holder_key, attributes, Utc::now().timestamp())
    }

    pub fn build_at(
        &mut self,
        holder_key: &EcJwk,
        attributes: &[(&str, &str)],
        issued_at: i64,
    ) -> IssuedPayload {
        let sub = format!("did:key:{}", random_id(&mut self.rng, 6));
        let iss = format!("did:key:{}", random_id(&mut self.rng, 6));

        let claims: Vec<ClaimTuple> = attributes
            .iter()
            .map(|(name, value)| ClaimTuple::salted(&mut self.rng, name, value))
            .collect();
        let sd = claims.iter().map(ClaimTuple::digest).collect();

        let nonce = self.fresh_nonce();
        debug!(sub = %sub, iss = %iss, claims = claims.len(), "built credential payload");

        let template = &self.template;
        let payload = CredentialPayload {
            sub,
            iss,
            nbf: issued_at,
            exp: issued_at + VALIDITY_SECS,
            jti: template.jti.clone(),
            nonce,
            cnf: Confirmation {
                jwk: holder_key.clone(),
            },
            vc: CredentialBody {
                context: template.context.clone(),
                types: template.types.clone(),
                credential_status: template.status.clone(),
                credential_schema: template.schema.clone(),
                credential_subject: CredentialSubject {
                    sd,
                    sd_alg: SD_ALG.to_string(),
                },
            },
        };

        IssuedPayload { payload, claims }
    }

    fn fresh_nonce(&mut self) -> String {
        loop {
            let nonce: String = (0..NONCE_LENGTH)
                .map(|_| NONCE_ALPHABET[self.rng.gen_range(0..NONCE_ALPHABET.len())] as char)
                .collect();
            if self.issued_nonces.insert(nonce.clone()) {
                return nonce;
            }
        }
    }
}
