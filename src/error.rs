use thiserror::Error;

/// Errors raised anywhere in the credential-to-circuit pipeline.
///
/// Encoding and parsing failures are never corrected silently: they abort the
/// current step so that a malformed witness or a false verification result can
/// not be produced.
#[derive(Error, Debug)]
pub enum Error {
    /// Value does not fit in `limb_bits * limb_count` bits.
    #[error("encoding overflow: value needs {bits} bits but {limb_count} limbs of {limb_bits} bits hold only {capacity}")]
    EncodingOverflow {
        bits: u64,
        limb_bits: usize,
        limb_count: usize,
        capacity: usize,
    },

    #[error("key parse error: {0}")]
    KeyParse(String),

    #[error("message too long: padded length {padded} exceeds maximum {max}")]
    MessageTooLong { padded: usize, max: usize },

    #[error("input too long: {field} has length {len}, circuit allows {max}")]
    InputTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("malformed token: {0}")]
    TokenFormat(String),

    #[error("disclosed claim hash {0} does not occur in the token payload")]
    DisclosureNotFound(String),

    /// Circuit input mapping does not match the circuit's declared fields.
    #[error("circuit input schema mismatch: {0}")]
    InputSchema(String),

    #[error("invalid circuit parameters: {0}")]
    InvalidParams(String),

    #[error("failed to fetch asset {locator} after {attempts} attempt(s)")]
    AssetFetch { locator: String, attempts: usize },

    #[error("proof generation failed while {stage}")]
    ProofGeneration {
        stage: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("proof verification failed while {stage}")]
    ProofVerification {
        stage: &'static str,
        #[source]
        source: Box<Error>,
    },

    /// Failure reported by the external prover itself.
    #[error("prover: {0}")]
    Prover(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn proof_generation(stage: &'static str, source: Error) -> Self {
        Error::ProofGeneration {
            stage,
            source: Box::new(source),
        }
    }

    pub(crate) fn proof_verification(stage: &'static str, source: Error) -> Self {
        Error::ProofVerification {
            stage,
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
