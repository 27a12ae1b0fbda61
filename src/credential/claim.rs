use chrono::{Datelike, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::{
    error::{Error, Result},
    utils::encode_base64url,
};

const SALT_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const NAME_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
pub const SALT_LENGTH: usize = 6;

/// `(salt, name, value)` committed to in the credential.
///
/// Serializes as a JSON array in exactly that order; the order is part of the
/// digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClaimTuple {
    pub salt: String,
    pub name: String,
    pub value: String,
}

impl ClaimTuple {
    pub fn new(salt: impl Into<String>, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            salt: salt.into(),
            name: name.into(),
            value: value.into(),
        }
    }

    /// Claim with a fresh random salt.
    pub fn salted<R: Rng + ?Sized>(rng: &mut R, name: &str, value: &str) -> Self {
        Self::new(random_id(rng, SALT_LENGTH), name, value)
    }

    /// Compact JSON array, e.g. `["k3x9qa","name","denkeni"]`.
    pub fn canonical_json(&self) -> String {
        serde_json::json!([self.salt, self.name, self.value]).to_string()
    }

    pub fn digest(&self) -> String {
        disclosure_digest(&self.canonical_json())
    }
}

impl Serialize for ClaimTuple {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (&self.salt, &self.name, &self.value).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ClaimTuple {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let (salt, name, value) = <(String, String, String)>::deserialize(deserializer)?;
        Ok(Self { salt, name, value })
    }
}

/// base64url(SHA-256(serialized)) without padding.
///
/// Used both when the credential is issued and when the circuit input is
/// assembled.
pub fn disclosure_digest(serialized: &str) -> String {
    encode_base64url(&Sha256::digest(serialized.as_bytes()))
}

pub fn format_claims_input(claims: &[ClaimTuple]) -> String {
    claims
        .iter()
        .map(ClaimTuple::canonical_json)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse the line format written by [`format_claims_input`]; blank lines are skipped.
pub fn parse_claims_input(input: &str) -> Result<Vec<ClaimTuple>> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).map_err(Error::from))
        .collect()
}

pub fn random_id<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    random_string(rng, SALT_ALPHABET, length)
}

pub fn random_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    random_string(rng, NAME_ALPHABET, 7)
}

fn random_string<R: Rng + ?Sized>(rng: &mut R, alphabet: &[u8], length: usize) -> String {
    (0..length)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

/// Random birthday in the Minguo calendar as `YYYMMDD` (1912-2023 Gregorian).
pub fn random_roc_birthday<R: Rng + ?Sized>(rng: &mut R) -> String {
    let year = rng.gen_range(1912..=2023);
    let month = rng.gen_range(1..=12);
    let day = rng.gen_range(1..=days_in_month(year, month));
    format!("{:03}{:02}{:02}", year - 1911, month, day)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}
