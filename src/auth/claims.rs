use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// JWT claims minted by `Mint` and parsed by `Authorize`. The tenant label
/// map travels under the private claim key `telemeter.openshift.io`, mirroring
/// the upstream project's token shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    pub aud: Vec<String>,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    #[serde(rename = "telemeter.openshift.io")]
    pub telemeter: TelemeterClaim,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemeterClaim {
    pub labels: BTreeMap<String, String>,
}

/// Extracts the `iss` field from a JWS compact serialization without
/// verifying its signature, for the fast issuer pre-check. Returns `None`
/// for any structurally malformed token; callers must still verify the
/// signature before trusting anything else in the payload.
pub fn peek_issuer(token: &str) -> Option<String> {
    use base64::Engine as _;

    let payload_segment = token.split('.').nth(1)?;
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload_segment)
        .ok()?;
    let value: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    value.get("iss")?.as_str().map(str::to_owned)
}
