//! Relay authentication
//!
//! Project-config fetches are authenticated with an Ed25519 signature over
//! the request body combined with a timestamp header. The wire format is
//! `<b64url(signature)>.<b64url(headerJSON)>` where the header is
//! `{"t": "<RFC3339 UTC>"}` and the signed message is the raw header JSON,
//! a NUL separator and the body.

use crate::GeneratorError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use ed25519_dalek::{Signer, SigningKey, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct SignatureHeader {
    t: String,
}

/// Build a signing key from the base64url-encoded public/private pair as
/// found in a Relay `credentials.json`.
///
/// Relay serializes the private key without the public part; both halves
/// are validated to be 32 bytes.
pub fn private_key_from_strings(
    public: &str,
    private: &str,
) -> Result<SigningKey, GeneratorError> {
    let public_raw = URL_SAFE_NO_PAD
        .decode(public)
        .map_err(|err| GeneratorError::Credentials(format!("could not decode public key: {err}")))?;
    let private_raw = URL_SAFE_NO_PAD.decode(private).map_err(|err| {
        GeneratorError::Credentials(format!("could not decode private key: {err}"))
    })?;

    if public_raw.len() != PUBLIC_KEY_LENGTH {
        return Err(GeneratorError::Credentials(format!(
            "invalid public key length: {} expected {PUBLIC_KEY_LENGTH}",
            public_raw.len()
        )));
    }
    let seed: [u8; SECRET_KEY_LENGTH] = private_raw.as_slice().try_into().map_err(|_| {
        GeneratorError::Credentials(format!(
            "invalid private key length: {} expected {SECRET_KEY_LENGTH}",
            private_raw.len()
        ))
    })?;

    Ok(SigningKey::from_bytes(&seed))
}

/// Sign `body` for the `X-Sentry-Relay-Signature` header.
pub fn relay_auth_sign(
    key: &SigningKey,
    body: &[u8],
    timestamp: DateTime<Utc>,
) -> Result<String, GeneratorError> {
    let header = SignatureHeader {
        t: timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
    };
    let header_raw = serde_json::to_vec(&header)?;

    let mut message = header_raw.clone();
    message.push(b'\x00');
    message.extend_from_slice(body);

    let signature = key.sign(&message);
    Ok(format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(signature.to_bytes()),
        URL_SAFE_NO_PAD.encode(&header_raw)
    ))
}
