//! Circuit parameters, asset locations and network settings.
//!
//! The circuit parameters are a single immutable value shared by issuance and
//! proving, so the two sides can never disagree on field widths.

use std::{env, time::Duration};

use crate::error::{Error, Result};

pub const DEFAULT_PROGRAM: &str = "circuits/jwt.wasm";
pub const DEFAULT_PROVING_KEY: &str = "circuits/jwt.zkey";
pub const DEFAULT_VERIFICATION_KEY: &str = "circuits/verification_key.json";

/// Content identifiers starting with this prefix are resolved through mirrors.
pub const CONTENT_ADDRESS_PREFIX: &str = "bafybe";

pub const DEFAULT_GATEWAYS: &[&str] = &[
    "https://cloudflare-ipfs.com/ipfs/",
    "https://ipfs.io/ipfs/",
    "https://w3s.link/ipfs/",
    "https://dweb.link/ipfs/",
    "https://nftstorage.link/ipfs/",
    "https://trustless-gateway.link/ipfs/",
];

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Length of an unpadded base64url SHA-256 digest.
pub const DIGEST_B64_LEN: usize = 43;

/// P-256 coordinates and ECDSA scalars are at most this wide.
const FIELD_BITS: usize = 256;

/// Structural parameters of the ES256 JWT circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitParams {
    pub limb_bits: usize,
    pub limb_count: usize,
    pub max_message_length: usize,
    pub max_b64_header_length: usize,
    pub max_b64_payload_length: usize,
    pub max_matches: usize,
    pub max_substring_length: usize,
}

impl CircuitParams {
    /// Parameters the deployed circuit was compiled with.
    pub const ES256_JWT: CircuitParams = CircuitParams {
        limb_bits: 43,
        limb_count: 6,
        max_message_length: 2048,
        max_b64_header_length: 256,
        max_b64_payload_length: 2000,
        max_matches: 5,
        max_substring_length: 50,
    };

    /// Build from the list form `[n, k, maxMessageLength, maxB64HeaderLength,
    /// maxB64PayloadLength, maxMatches, maxSubstringLength]`.
    pub fn from_slice(values: &[usize]) -> Result<Self> {
        let [limb_bits, limb_count, max_message_length, max_b64_header_length, max_b64_payload_length, max_matches, max_substring_length] =
            <[usize; 7]>::try_from(values).map_err(|_| {
                Error::InvalidParams(format!("expected 7 parameters, got {}", values.len()))
            })?;

        let params = CircuitParams {
            limb_bits,
            limb_count,
            max_message_length,
            max_b64_header_length,
            max_b64_payload_length,
            max_matches,
            max_substring_length,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.limb_bits == 0 || self.limb_count == 0 {
            return Err(Error::InvalidParams("limb width and count must be non-zero".into()));
        }
        if self.limb_bits * self.limb_count < FIELD_BITS {
            return Err(Error::InvalidParams(format!(
                "{} limbs of {} bits cannot hold a {FIELD_BITS}-bit value",
                self.limb_count, self.limb_bits
            )));
        }
        if self.max_message_length == 0 || self.max_message_length % 64 != 0 {
            return Err(Error::InvalidParams(format!(
                "max message length {} is not a positive multiple of 64",
                self.max_message_length
            )));
        }
        if self.max_matches == 0 {
            return Err(Error::InvalidParams("at least one match slot is required".into()));
        }
        if self.max_substring_length < DIGEST_B64_LEN {
            return Err(Error::InvalidParams(format!(
                "max substring length {} is shorter than a claim digest ({DIGEST_B64_LEN})",
                self.max_substring_length
            )));
        }
        Ok(())
    }
}

impl Default for CircuitParams {
    fn default() -> Self {
        Self::ES256_JWT
    }
}

/// Where the three circuit artifacts live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitAssets {
    pub program: String,
    pub proving_key: String,
    pub verification_key: String,
}

impl Default for CircuitAssets {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            proving_key: DEFAULT_PROVING_KEY.to_string(),
            verification_key: DEFAULT_VERIFICATION_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Gateway base URLs, tried in order. Each must end with the path prefix
    /// the content identifier is appended to.
    pub mirrors: Vec<String>,
    pub content_prefix: String,
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            mirrors: DEFAULT_GATEWAYS.iter().map(|g| g.to_string()).collect(),
            content_prefix: CONTENT_ADDRESS_PREFIX.to_string(),
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// Everything the binary needs, overlaid from `ZKVC_*` environment variables.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub params: CircuitParams,
    pub assets: CircuitAssets,
    pub fetch: FetchConfig,
    pub snarkjs: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let mut settings = Settings::default();

        if let Ok(program) = env::var("ZKVC_PROGRAM") {
            settings.assets.program = program;
        }
        if let Ok(proving_key) = env::var("ZKVC_PROVING_KEY") {
            settings.assets.proving_key = proving_key;
        }
        if let Ok(verification_key) = env::var("ZKVC_VERIFICATION_KEY") {
            settings.assets.verification_key = verification_key;
        }
        if let Ok(gateways) = env::var("ZKVC_GATEWAYS") {
            settings.fetch.mirrors = gateways
                .split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(secs) = env::var("ZKVC_FETCH_TIMEOUT_SECS") {
            let secs = secs.parse::<u64>().map_err(|_| {
                Error::InvalidParams(format!("ZKVC_FETCH_TIMEOUT_SECS is not a number: {secs}"))
            })?;
            settings.fetch.timeout = Duration::from_secs(secs);
        }
        settings.snarkjs = env::var("ZKVC_SNARKJS").ok();

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_form_matches_deployed_circuit() {
        let params = CircuitParams::from_slice(&[43, 6, 2048, 256, 2000, 5, 50]).unwrap();
        assert_eq!(params, CircuitParams::ES256_JWT);
        assert!(CircuitParams::ES256_JWT.validate().is_ok());
    }

    #[test]
    fn rejects_inconsistent_params() {
        // 42 * 6 = 252 bits, too narrow for a P-256 coordinate
        assert!(matches!(
            CircuitParams::from_slice(&[42, 6, 2048, 256, 2000, 5, 50]),
            Err(Error::InvalidParams(_))
        ));
        assert!(CircuitParams::from_slice(&[43, 6, 2000, 256, 2000, 5, 50]).is_err());
        assert!(CircuitParams::from_slice(&[43, 6, 2048, 256, 2000, 5, 40]).is_err());
        assert!(CircuitParams::from_slice(&[43, 6, 2048]).is_err());
    }
}
