//! JWS envelope construction for signed ACME requests

use hmac::{Hmac, KeyInit, Mac};
use serde_json::{Value, json};
use sha2::{Sha256, Sha384, Sha512};
use url::Url;

use crate::crypto::encoding::base64url;
use crate::crypto::keypair::KeyPair;
use crate::error::{AcmeError, Result};

/// Sign a request body as a flattened JWS JSON envelope.
///
/// The protected header carries `alg`, `nonce`, `url` and either the
/// account `kid` or the embedded public `jwk` (the latter only for
/// account creation, certificate-key revocation and key rollover).
/// A `None` payload produces the empty-string payload of POST-as-GET.
pub fn sign(
    payload: Option<&Value>,
    url: &Url,
    nonce: &str,
    key_pair: &KeyPair,
    kid: Option<&str>,
) -> Result<Value> {
    let mut protected = json!({
        "alg": key_pair.jwa_algorithm(),
        "nonce": nonce,
        "url": url.as_str(),
    });
    match kid {
        Some(kid) => {
            protected["kid"] = Value::String(kid.to_owned());
        }
        None => {
            protected["jwk"] = key_pair.public_jwk()?.to_value();
        }
    }
    envelope(&protected, payload, key_pair)
}

/// Build the inner JWS of a key rollover: signed with the *new* key,
/// carrying its public JWK, with no nonce
pub fn key_change(
    key_change_url: &Url,
    account_location: &Url,
    old_key: &KeyPair,
    new_key: &KeyPair,
) -> Result<Value> {
    let protected = json!({
        "alg": new_key.jwa_algorithm(),
        "jwk": new_key.public_jwk()?.to_value(),
        "url": key_change_url.as_str(),
    });
    let payload = json!({
        "account": account_location.as_str(),
        "oldKey": old_key.public_jwk()?.to_value(),
    });
    envelope(&protected, Some(&payload), new_key)
}

fn envelope(protected: &Value, payload: Option<&Value>, key_pair: &KeyPair) -> Result<Value> {
    let protected_b64 = base64url(protected.to_string());
    let payload_b64 = match payload {
        Some(value) => base64url(value.to_string()),
        None => String::new(),
    };
    let signing_input = format!("{protected_b64}.{payload_b64}");
    let signature = key_pair.sign(signing_input.as_bytes())?;
    Ok(json!({
        "protected": protected_b64,
        "payload": payload_b64,
        "signature": base64url(signature),
    }))
}

/// Pick the default MAC algorithm for an external account binding key
pub fn mac_algorithm_for_key(mac_key: &[u8]) -> &'static str {
    match mac_key.len() {
        len if len >= 64 => "HS512",
        len if len >= 48 => "HS384",
        _ => "HS256",
    }
}

/// Build the `externalAccountBinding` claim: an inner JWS over the
/// account's public JWK, MAC-signed with the CA-issued key
pub fn external_account_binding(
    key_identifier: &str,
    mac_key: &[u8],
    mac_algorithm: &str,
    account_key: &KeyPair,
    new_account_url: &Url,
) -> Result<Value> {
    let protected = json!({
        "alg": mac_algorithm,
        "kid": key_identifier,
        "url": new_account_url.as_str(),
    });
    let payload = account_key.public_jwk()?.to_value();
    let protected_b64 = base64url(protected.to_string());
    let payload_b64 = base64url(payload.to_string());
    let signing_input = format!("{protected_b64}.{payload_b64}");

    let signature = match mac_algorithm {
        "HS256" => {
            let mut mac = Hmac::<Sha256>::new_from_slice(mac_key)
                .map_err(|_| AcmeError::unsupported("invalid MAC key"))?;
            mac.update(signing_input.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
        "HS384" => {
            let mut mac = Hmac::<Sha384>::new_from_slice(mac_key)
                .map_err(|_| AcmeError::unsupported("invalid MAC key"))?;
            mac.update(signing_input.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
        "HS512" => {
            let mut mac = Hmac::<Sha512>::new_from_slice(mac_key)
                .map_err(|_| AcmeError::unsupported("invalid MAC key"))?;
            mac.update(signing_input.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
        other => {
            return Err(AcmeError::unsupported(format!(
                "unsupported MAC algorithm {other:?}"
            )));
        }
    };

    Ok(json!({
        "protected": protected_b64,
        "payload": payload_b64,
        "signature": base64url(signature),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::encoding::base64url_decode;

    fn decode_json(b64: &str) -> Value {
        serde_json::from_slice(&base64url_decode(b64).unwrap()).unwrap()
    }

    #[test]
    fn test_sign_with_jwk_header() {
        let key = KeyPair::generate_p256().unwrap();
        let url = Url::parse("https://ca.example/acme/new-account").unwrap();
        let jws = sign(Some(&json!({"termsOfServiceAgreed": true})), &url, "n0nce", &key, None)
            .unwrap();

        let protected = decode_json(jws["protected"].as_str().unwrap());
        assert_eq!(protected["alg"], "ES256");
        assert_eq!(protected["nonce"], "n0nce");
        assert_eq!(protected["url"], "https://ca.example/acme/new-account");
        assert!(protected.get("jwk").is_some());
        assert!(protected.get("kid").is_none());

        let payload = decode_json(jws["payload"].as_str().unwrap());
        assert_eq!(payload["termsOfServiceAgreed"], true);
        assert!(!jws["signature"].as_str().unwrap().is_empty());
    }

    #[test]
    fn test_sign_with_kid_header() {
        let key = KeyPair::generate_p256().unwrap();
        let url = Url::parse("https://ca.example/acme/order/1").unwrap();
        let jws = sign(None, &url, "n0nce", &key, Some("https://ca.example/acme/acct/1")).unwrap();

        let protected = decode_json(jws["protected"].as_str().unwrap());
        assert_eq!(protected["kid"], "https://ca.example/acme/acct/1");
        assert!(protected.get("jwk").is_none());
        // POST-as-GET has the empty-string payload
        assert_eq!(jws["payload"], "");
    }

    #[test]
    fn test_key_change_inner_jws() {
        let old_key = KeyPair::generate_p256().unwrap();
        let new_key = KeyPair::generate_p384().unwrap();
        let key_change_url = Url::parse("https://ca.example/acme/key-change").unwrap();
        let account = Url::parse("https://ca.example/acme/acct/1").unwrap();

        let inner = key_change(&key_change_url, &account, &old_key, &new_key).unwrap();
        let protected = decode_json(inner["protected"].as_str().unwrap());
        assert_eq!(protected["alg"], "ES384");
        assert_eq!(protected["url"], "https://ca.example/acme/key-change");
        assert!(protected.get("nonce").is_none());

        let payload = decode_json(inner["payload"].as_str().unwrap());
        assert_eq!(payload["account"], "https://ca.example/acme/acct/1");
        assert_eq!(
            payload["oldKey"],
            old_key.public_jwk().unwrap().to_value()
        );
    }

    #[test]
    fn test_mac_algorithm_for_key() {
        assert_eq!(mac_algorithm_for_key(&[0u8; 32]), "HS256");
        assert_eq!(mac_algorithm_for_key(&[0u8; 48]), "HS384");
        assert_eq!(mac_algorithm_for_key(&[0u8; 64]), "HS512");
    }

    #[test]
    fn test_external_account_binding_shape() {
        let key = KeyPair::generate_p256().unwrap();
        let url = Url::parse("https://ca.example/acme/new-account").unwrap();
        let eab = external_account_binding("kid-1", &[7u8; 32], "HS256", &key, &url).unwrap();

        let protected = decode_json(eab["protected"].as_str().unwrap());
        assert_eq!(protected["alg"], "HS256");
        assert_eq!(protected["kid"], "kid-1");

        let payload = decode_json(eab["payload"].as_str().unwrap());
        assert_eq!(payload, key.public_jwk().unwrap().to_value());

        // HMAC-SHA256 output is 32 bytes
        let signature = base64url_decode(eab["signature"].as_str().unwrap()).unwrap();
        assert_eq!(signature.len(), 32);
    }

    #[test]
    fn test_external_account_binding_rejects_unknown_alg() {
        let key = KeyPair::generate_p256().unwrap();
        let url = Url::parse("https://ca.example/acme/new-account").unwrap();
        assert!(external_account_binding("kid", &[0u8; 32], "HS1024", &key, &url).is_err());
    }
}
