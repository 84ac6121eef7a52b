/// JSON Web Key (JWK) representation and RFC 7638 thumbprints
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::crypto::encoding::base64url;
use crate::crypto::hash::sha256;
use crate::error::{AcmeError, Result};

/// A public JSON Web Key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    /// Key type ("RSA", "EC", "OKP")
    pub kty: String,

    /// Key parameters; a `BTreeMap` keeps members in lexicographic order
    #[serde(flatten)]
    pub params: BTreeMap<String, Value>,
}

impl Jwk {
    /// Create an EC public key JWK
    pub fn ec(crv: impl Into<String>, x: impl Into<String>, y: impl Into<String>) -> Self {
        let mut params = BTreeMap::new();
        params.insert("crv".to_string(), Value::String(crv.into()));
        params.insert("x".to_string(), Value::String(x.into()));
        params.insert("y".to_string(), Value::String(y.into()));
        Self {
            kty: "EC".to_string(),
            params,
        }
    }

    /// Create an RSA public key JWK
    pub fn rsa(n: impl Into<String>, e: impl Into<String>) -> Self {
        let mut params = BTreeMap::new();
        params.insert("n".to_string(), Value::String(n.into()));
        params.insert("e".to_string(), Value::String(e.into()));
        Self {
            kty: "RSA".to_string(),
            params,
        }
    }

    /// Create an OKP (EdDSA) public key JWK
    pub fn okp(crv: impl Into<String>, x: impl Into<String>) -> Self {
        let mut params = BTreeMap::new();
        params.insert("crv".to_string(), Value::String(crv.into()));
        params.insert("x".to_string(), Value::String(x.into()));
        Self {
            kty: "OKP".to_string(),
            params,
        }
    }

    fn param(&self, name: &str) -> Result<&str> {
        self.params
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AcmeError::unsupported(format!("JWK of type {} lacks parameter {name:?}", self.kty))
            })
    }

    /// Compute the RFC 7638 SHA-256 thumbprint, base64url encoded.
    ///
    /// Only the required members of the key type are hashed, in
    /// lexicographic member order.
    pub fn thumbprint(&self) -> Result<String> {
        // serde_json maps are sorted, so the members of these literals
        // serialize in lexicographic order as RFC 7638 requires
        let required = match self.kty.as_str() {
            "EC" => json!({
                "crv": self.param("crv")?,
                "kty": "EC",
                "x": self.param("x")?,
                "y": self.param("y")?,
            }),
            "RSA" => json!({
                "e": self.param("e")?,
                "kty": "RSA",
                "n": self.param("n")?,
            }),
            "OKP" => json!({
                "crv": self.param("crv")?,
                "kty": "OKP",
                "x": self.param("x")?,
            }),
            other => {
                return Err(AcmeError::unsupported(format!(
                    "unsupported JWK key type {other:?}"
                )));
            }
        };
        Ok(base64url(sha256(required.to_string())))
    }

    /// Convert to a JSON value for embedding in a JWS header
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ec_jwk_shape() {
        let jwk = Jwk::ec("P-256", "xval", "yval");
        let value = jwk.to_value();
        assert_eq!(value["kty"], "EC");
        assert_eq!(value["crv"], "P-256");
        assert_eq!(value["x"], "xval");
        assert_eq!(value["y"], "yval");
    }

    #[test]
    fn test_rfc7638_rsa_thumbprint_vector() {
        // The example key from RFC 7638 section 3.1
        let jwk = Jwk::rsa(
            "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw",
            "AQAB",
        );
        assert_eq!(
            jwk.thumbprint().unwrap(),
            "NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs"
        );
    }

    #[test]
    fn test_thumbprint_ignores_extra_params() {
        let mut jwk = Jwk::ec("P-256", "x", "y");
        let plain = jwk.thumbprint().unwrap();
        jwk.params
            .insert("alg".to_string(), Value::String("ES256".to_string()));
        assert_eq!(jwk.thumbprint().unwrap(), plain);
    }

    #[test]
    fn test_thumbprint_unsupported_kty() {
        let jwk = Jwk {
            kty: "oct".to_string(),
            params: BTreeMap::new(),
        };
        assert!(jwk.thumbprint().is_err());
    }
}
