//! P-256 public key material: JWK objects and SubjectPublicKeyInfo DER.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    utils::{bigint_to_fixed_bytes, bytes_to_bigint, decode_base64, encode_base64url},
};

const TAG_SEQUENCE: u8 = 0x30;
const TAG_BIT_STRING: u8 = 0x03;
const TAG_OID: u8 = 0x06;

/// 1.2.840.10045.2.1
const OID_EC_PUBLIC_KEY: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01];
/// 1.2.840.10045.3.1.7
const OID_PRIME256V1: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07];

const COORDINATE_LEN: usize = 32;
const UNCOMPRESSED_POINT: u8 = 0x04;

/// Public half of an ES256 JWK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcJwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
    pub y: String,
}

impl EcJwk {
    pub fn from_coordinates(x: &[u8; 32], y: &[u8; 32]) -> Self {
        Self {
            kty: "EC".to_string(),
            crv: "P-256".to_string(),
            x: encode_base64url(x),
            y: encode_base64url(y),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcPoint {
    pub x: BigUint,
    pub y: BigUint,
}

impl EcPoint {
    /// SEC1 uncompressed encoding `0x04 || x || y`.
    pub fn to_uncompressed(&self) -> Result<[u8; 65]> {
        let x: [u8; 32] = bigint_to_fixed_bytes(&self.x)
            .ok_or_else(|| Error::KeyParse("x coordinate wider than 32 bytes".into()))?;
        let y: [u8; 32] = bigint_to_fixed_bytes(&self.y)
            .ok_or_else(|| Error::KeyParse("y coordinate wider than 32 bytes".into()))?;

        let mut out = [0u8; 65];
        out[0] = UNCOMPRESSED_POINT;
        out[1..33].copy_from_slice(&x);
        out[33..].copy_from_slice(&y);
        Ok(out)
    }
}

/// A public key either as a JWK or as base64 DER (PEM armour allowed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKeyMaterial {
    Jwk(EcJwk),
    Der(String),
}

impl PublicKeyMaterial {
    pub fn coordinates(&self) -> Result<EcPoint> {
        match self {
            PublicKeyMaterial::Jwk(jwk) => jwk_coordinates(jwk),
            PublicKeyMaterial::Der(encoded) => extract_xy_from_der(encoded),
        }
    }
}

impl From<EcJwk> for PublicKeyMaterial {
    fn from(jwk: EcJwk) -> Self {
        PublicKeyMaterial::Jwk(jwk)
    }
}

fn jwk_coordinates(jwk: &EcJwk) -> Result<EcPoint> {
    if jwk.kty != "EC" || jwk.crv != "P-256" {
        return Err(Error::KeyParse(format!(
            "unsupported key type {}/{}",
            jwk.kty, jwk.crv
        )));
    }
    Ok(EcPoint {
        x: bytes_to_bigint(&jwk_coordinate(&jwk.x, "x")?),
        y: bytes_to_bigint(&jwk_coordinate(&jwk.y, "y")?),
    })
}

fn jwk_coordinate(encoded: &str, name: &str) -> Result<Vec<u8>> {
    let bytes = decode_base64(encoded)
        .ok_or_else(|| Error::KeyParse(format!("{name} coordinate is not base64")))?;
    if bytes.len() != COORDINATE_LEN {
        return Err(Error::KeyParse(format!(
            "{name} coordinate has {} bytes, expected {COORDINATE_LEN}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Extract `(x, y)` from a base64 SubjectPublicKeyInfo.
///
/// Expects `SEQUENCE { SEQUENCE { id-ecPublicKey, prime256v1 }, BIT STRING }`
/// holding an uncompressed point; any other layout is rejected.
pub fn extract_xy_from_der(encoded: &str) -> Result<EcPoint> {
    let body: String = encoded
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("-----"))
        .collect();
    let der = decode_base64(&body).ok_or_else(|| Error::KeyParse("key is not base64".into()))?;

    let mut outer = DerReader::new(&der);
    let mut spki = DerReader::new(outer.read(TAG_SEQUENCE)?);
    outer.finish()?;

    let mut algorithm = DerReader::new(spki.read(TAG_SEQUENCE)?);
    let key_oid = algorithm.read(TAG_OID)?;
    if key_oid != OID_EC_PUBLIC_KEY {
        return Err(Error::KeyParse("algorithm is not id-ecPublicKey".into()));
    }
    let curve_oid = algorithm.read(TAG_OID)?;
    if curve_oid != OID_PRIME256V1 {
        return Err(Error::KeyParse("curve is not prime256v1".into()));
    }
    algorithm.finish()?;

    let bits = spki.read(TAG_BIT_STRING)?;
    spki.finish()?;

    // unused-bits count, point format, then x || y
    match bits {
        [0x00, UNCOMPRESSED_POINT, xy @ ..] if xy.len() == 2 * COORDINATE_LEN => Ok(EcPoint {
            x: bytes_to_bigint(&xy[..COORDINATE_LEN]),
            y: bytes_to_bigint(&xy[COORDINATE_LEN..]),
        }),
        _ => Err(Error::KeyParse(format!(
            "bit string of {} bytes is not an uncompressed P-256 point",
            bits.len()
        ))),
    }
}

/// Bounds-checked reader over definite-length DER.
struct DerReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> DerReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn byte(&mut self) -> Result<u8> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| Error::KeyParse(format!("unexpected end of DER at offset {}", self.pos)))?;
        self.pos += 1;
        Ok(b)
    }

    fn length(&mut self) -> Result<usize> {
        let first = self.byte()?;
        if first < 0x80 {
            return Ok(first as usize);
        }
        let count = (first & 0x7f) as usize;
        if count == 0 || count > 4 {
            return Err(Error::KeyParse(format!("unsupported DER length form 0x{first:02x}")));
        }
        let mut len = 0usize;
        for _ in 0..count {
            len = (len << 8) | self.byte()? as usize;
        }
        Ok(len)
    }

    /// Read one element with the given tag and return its contents.
    fn read(&mut self, tag: u8) -> Result<&'a [u8]> {
        let found = self.byte()?;
        if found != tag {
            return Err(Error::KeyParse(format!(
                "expected tag 0x{tag:02x}, found 0x{found:02x}"
            )));
        }
        let len = self.length()?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| Error::KeyParse(format!("element of {len} bytes overruns buffer")))?;
        let contents = &self.buf[self.pos..end];
        self.pos = end;
        Ok(contents)
    }

    fn finish(&self) -> Result<()> {
        if self.pos != self.buf.len() {
            return Err(Error::KeyParse(format!(
                "{} trailing bytes",
                self.buf.len() - self.pos
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine};

    // RFC 6979 A.2.5 public key
    const DER_B64: &str = "MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEYP7UuiVanTHJYet0xjVtaMBJuJI7Yfps5mliLmDyn7Z5A/4QCLi8maQa6elWKLxk8vGyDC1+n1F3o8KU1EYimQ==";
    const X: &str = "43872280807156713839160376167191808430140484563252114113014272064716834774966";
    const Y: &str = "54736908695619294235531183715189990111299271757105154178488727263331972686489";

    fn jwk() -> EcJwk {
        EcJwk {
            kty: "EC".into(),
            crv: "P-256".into(),
            x: "YP7UuiVanTHJYet0xjVtaMBJuJI7Yfps5mliLmDyn7Y".into(),
            y: "eQP-EAi4vJmkGunpVii8ZPLxsgwtfp9Rd6PClNRGIpk".into(),
        }
    }

    fn der() -> Vec<u8> {
        STANDARD.decode(DER_B64).unwrap()
    }

    #[test]
    fn der_yields_known_coordinates() {
        let point = extract_xy_from_der(DER_B64).unwrap();
        assert_eq!(point.x, X.parse::<BigUint>().unwrap());
        assert_eq!(point.y, Y.parse::<BigUint>().unwrap());
    }

    #[test]
    fn pem_armour_is_accepted() {
        let pem = format!(
            "-----BEGIN PUBLIC KEY-----\n{}\n{}\n-----END PUBLIC KEY-----\n",
            &DER_B64[..64],
            &DER_B64[64..]
        );
        assert_eq!(
            extract_xy_from_der(&pem).unwrap(),
            extract_xy_from_der(DER_B64).unwrap()
        );
    }

    #[test]
    fn jwk_and_der_agree() {
        let from_jwk = PublicKeyMaterial::Jwk(jwk()).coordinates().unwrap();
        let from_der = PublicKeyMaterial::Der(DER_B64.into()).coordinates().unwrap();
        assert_eq!(from_jwk, from_der);

        let sec1 = from_jwk.to_uncompressed().unwrap();
        assert_eq!(&sec1[..], &der()[26..]);
    }

    #[test]
    fn wrong_curve_fails_closed() {
        let mut bytes = der();
        // last byte of the prime256v1 OID
        bytes[22] = 0x08;
        let err = extract_xy_from_der(&STANDARD.encode(&bytes)).unwrap_err();
        assert!(matches!(err, Error::KeyParse(msg) if msg.contains("prime256v1")));
    }

    #[test]
    fn wrong_tag_and_truncation_fail() {
        let mut bytes = der();
        bytes[0] = 0x31;
        assert!(matches!(
            extract_xy_from_der(&STANDARD.encode(&bytes)),
            Err(Error::KeyParse(_))
        ));

        let bytes = der();
        for cut in [0usize, 1, 10, 30, bytes.len() - 1] {
            assert!(
                matches!(
                    extract_xy_from_der(&STANDARD.encode(&bytes[..cut])),
                    Err(Error::KeyParse(_))
                ),
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn trailing_bytes_fail() {
        let mut bytes = der();
        bytes.push(0);
        assert!(extract_xy_from_der(&STANDARD.encode(&bytes)).is_err());
    }

    #[test]
    fn compressed_point_rejected() {
        let mut bytes = der();
        bytes[26] = 0x02;
        assert!(extract_xy_from_der(&STANDARD.encode(&bytes)).is_err());
    }

    #[test]
    fn jwk_validation() {
        let mut bad_curve = jwk();
        bad_curve.crv = "secp256k1".into();
        assert!(PublicKeyMaterial::Jwk(bad_curve).coordinates().is_err());

        let mut short = jwk();
        short.x = "AQAB".into();
        assert!(PublicKeyMaterial::Jwk(short).coordinates().is_err());
    }
}
