//! Key loading and algorithm detection (C1 startup path).
//!
//! The signing algorithm is derived from the key's own ASN.1 structure
//! rather than configured separately, so a mismatched key/algorithm pair
//! fails at startup instead of at the first `Mint`/`Authorize` call.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};

use crate::errors::Error;

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_P256: &str = "1.2.840.10045.3.1.7";
const OID_P384: &str = "1.3.132.0.34";
const OID_P521: &str = "1.3.132.0.35";

/// A loaded signing key, paired with the algorithm selected for it.
pub struct SigningKey {
    pub algorithm: Algorithm,
    pub encoding_key: EncodingKey,
}

/// A loaded verification key, paired with the algorithm it was issued for.
/// `Authorize` only tries a key against tokens asserting a matching `alg`.
pub struct VerificationKey {
    pub algorithm: Algorithm,
    pub decoding_key: DecodingKey,
}

/// Loads a PKCS#8 PEM-encoded private key and selects RS256/ES256/ES384/ES512
/// from its algorithm OID (and, for EC keys, its named-curve OID).
pub fn load_signing_key(pem_bytes: &[u8]) -> Result<SigningKey, Error> {
    let pem_str = std::str::from_utf8(pem_bytes).map_err(|e| Error::InvalidKey {
        reason: format!("signing key is not valid UTF-8 PEM: {e}"),
    })?;
    let parsed = pem::parse(pem_str).map_err(|e| Error::InvalidKey {
        reason: format!("could not parse PEM: {e}"),
    })?;
    let der = parsed.contents();

    let info = pkcs8::PrivateKeyInfo::try_from(der).map_err(|e| Error::InvalidKey {
        reason: format!("not a valid PKCS#8 private key: {e}"),
    })?;

    let curve_oid = info
        .algorithm
        .parameters
        .as_ref()
        .and_then(|p| p.decode_as::<pkcs8::ObjectIdentifier>().ok())
        .map(|oid| oid.to_string());

    let algorithm = detect_algorithm(&info.algorithm.oid.to_string(), curve_oid)?;

    let encoding_key = match algorithm {
        Algorithm::RS256 => EncodingKey::from_rsa_pem(pem_str.as_bytes()),
        Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(pem_str.as_bytes()),
        _ => unreachable!("detect_algorithm only returns RS256/ES256/ES384"),
    }
    .map_err(|e| Error::InvalidKey {
        reason: format!("key rejected by jsonwebtoken: {e}"),
    })?;

    Ok(SigningKey {
        algorithm,
        encoding_key,
    })
}

/// Loads a SubjectPublicKeyInfo PEM-encoded public key for verification.
pub fn load_verification_key(pem_bytes: &[u8]) -> Result<VerificationKey, Error> {
    let pem_str = std::str::from_utf8(pem_bytes).map_err(|e| Error::InvalidKey {
        reason: format!("verification key is not valid UTF-8 PEM: {e}"),
    })?;
    let parsed = pem::parse(pem_str).map_err(|e| Error::InvalidKey {
        reason: format!("could not parse PEM: {e}"),
    })?;
    let der = parsed.contents();

    let spki = spki::SubjectPublicKeyInfoRef::try_from(der).map_err(|e| Error::InvalidKey {
        reason: format!("not a valid SubjectPublicKeyInfo: {e}"),
    })?;

    let curve_oid = spki
        .algorithm
        .parameters
        .as_ref()
        .and_then(|p| p.decode_as::<pkcs8::ObjectIdentifier>().ok())
        .map(|oid| oid.to_string());

    let algorithm = detect_algorithm(&spki.algorithm.oid.to_string(), curve_oid)?;

    let decoding_key = match algorithm {
        Algorithm::RS256 => DecodingKey::from_rsa_pem(pem_str.as_bytes()),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem_str.as_bytes()),
        _ => unreachable!("detect_algorithm only returns RS256/ES256/ES384"),
    }
    .map_err(|e| Error::InvalidKey {
        reason: format!("key rejected by jsonwebtoken: {e}"),
    })?;

    Ok(VerificationKey {
        algorithm,
        decoding_key,
    })
}

fn detect_algorithm(key_oid: &str, curve_oid: Option<String>) -> Result<Algorithm, Error> {
    if key_oid == OID_RSA_ENCRYPTION {
        return Ok(Algorithm::RS256);
    }
    if key_oid == OID_EC_PUBLIC_KEY {
        return match curve_oid.as_deref() {
            Some(OID_P256) => Ok(Algorithm::ES256),
            Some(OID_P384) => Ok(Algorithm::ES384),
            Some(OID_P521) => Err(Error::InvalidKey {
                reason: "P-521 (ES512) keys are not supported by the available JWS backend"
                    .to_owned(),
            }),
            other => Err(Error::InvalidKey {
                reason: format!("unsupported EC curve: {other:?}"),
            }),
        };
    }
    Err(Error::InvalidKey {
        reason: format!("unsupported key algorithm OID: {key_oid}"),
    })
}
