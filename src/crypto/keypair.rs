//! Account and domain key pairs backed by aws-lc-rs

use aws_lc_rs::rand::SystemRandom;
use aws_lc_rs::signature::{
    ECDSA_P256_SHA256_FIXED_SIGNING, ECDSA_P384_SHA384_FIXED_SIGNING,
    ECDSA_P521_SHA512_FIXED_SIGNING, EcdsaKeyPair, EcdsaSigningAlgorithm, Ed25519KeyPair,
    KeyPair as _, RSA_PKCS1_SHA256, RsaKeyPair,
};

use crate::crypto::encoding::base64url;
use crate::crypto::jwk::Jwk;
use crate::error::{AcmeError, Result};

/// Key type of a [`KeyPair`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// ECDSA on P-256
    EcdsaP256,
    /// ECDSA on P-384
    EcdsaP384,
    /// ECDSA on P-521
    EcdsaP521,
    /// EdDSA on Ed25519
    Ed25519,
    /// RSA with PKCS#1 v1.5 padding
    Rsa,
}

impl KeyType {
    /// The JWA signature algorithm identifier for this key type
    pub fn jwa_algorithm(&self) -> &'static str {
        match self {
            KeyType::EcdsaP256 => "ES256",
            KeyType::EcdsaP384 => "ES384",
            KeyType::EcdsaP521 => "ES512",
            KeyType::Ed25519 => "EdDSA",
            KeyType::Rsa => "RS256",
        }
    }

    fn curve_name(&self) -> Option<&'static str> {
        match self {
            KeyType::EcdsaP256 => Some("P-256"),
            KeyType::EcdsaP384 => Some("P-384"),
            KeyType::EcdsaP521 => Some("P-521"),
            _ => None,
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyType::EcdsaP256 => write!(f, "ECDSA-P256"),
            KeyType::EcdsaP384 => write!(f, "ECDSA-P384"),
            KeyType::EcdsaP521 => write!(f, "ECDSA-P521"),
            KeyType::Ed25519 => write!(f, "Ed25519"),
            KeyType::Rsa => write!(f, "RSA"),
        }
    }
}

enum Inner {
    Ecdsa(EcdsaKeyPair),
    Ed25519(Ed25519KeyPair),
    Rsa(RsaKeyPair),
}

/// A signing key pair for JWS envelopes and CSRs.
///
/// Keys are held in PKCS#8 form so they can be persisted by the
/// application and bridged into the CSR generator.
pub struct KeyPair {
    key_type: KeyType,
    pkcs8: Vec<u8>,
    inner: Inner,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("key_type", &self.key_type)
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate an ECDSA P-256 key pair
    pub fn generate_p256() -> Result<Self> {
        Self::generate_ecdsa(KeyType::EcdsaP256, &ECDSA_P256_SHA256_FIXED_SIGNING)
    }

    /// Generate an ECDSA P-384 key pair
    pub fn generate_p384() -> Result<Self> {
        Self::generate_ecdsa(KeyType::EcdsaP384, &ECDSA_P384_SHA384_FIXED_SIGNING)
    }

    /// Generate an ECDSA P-521 key pair
    pub fn generate_p521() -> Result<Self> {
        Self::generate_ecdsa(KeyType::EcdsaP521, &ECDSA_P521_SHA512_FIXED_SIGNING)
    }

    /// Generate an Ed25519 key pair
    pub fn generate_ed25519() -> Result<Self> {
        let rng = SystemRandom::new();
        let document = Ed25519KeyPair::generate_pkcs8(&rng)
            .map_err(|_| AcmeError::unsupported("Ed25519 key generation failed"))?;
        Self::from_pkcs8_der(document.as_ref())
    }

    fn generate_ecdsa(key_type: KeyType, alg: &'static EcdsaSigningAlgorithm) -> Result<Self> {
        let rng = SystemRandom::new();
        let document = EcdsaKeyPair::generate_pkcs8(alg, &rng)
            .map_err(|_| AcmeError::unsupported(format!("{key_type} key generation failed")))?;
        Self::from_pkcs8_der(document.as_ref())
    }

    /// Load a key pair from PKCS#8 DER.
    ///
    /// The key type is detected by probing; RSA, ECDSA P-256/P-384/P-521
    /// and Ed25519 keys are accepted.
    pub fn from_pkcs8_der(pkcs8: &[u8]) -> Result<Self> {
        let probes: [(KeyType, &'static EcdsaSigningAlgorithm); 3] = [
            (KeyType::EcdsaP256, &ECDSA_P256_SHA256_FIXED_SIGNING),
            (KeyType::EcdsaP384, &ECDSA_P384_SHA384_FIXED_SIGNING),
            (KeyType::EcdsaP521, &ECDSA_P521_SHA512_FIXED_SIGNING),
        ];
        for (key_type, alg) in probes {
            if let Ok(key) = EcdsaKeyPair::from_pkcs8(alg, pkcs8) {
                return Ok(Self {
                    key_type,
                    pkcs8: pkcs8.to_vec(),
                    inner: Inner::Ecdsa(key),
                });
            }
        }
        if let Ok(key) = Ed25519KeyPair::from_pkcs8_maybe_unchecked(pkcs8) {
            return Ok(Self {
                key_type: KeyType::Ed25519,
                pkcs8: pkcs8.to_vec(),
                inner: Inner::Ed25519(key),
            });
        }
        if let Ok(key) = RsaKeyPair::from_pkcs8(pkcs8) {
            return Ok(Self {
                key_type: KeyType::Rsa,
                pkcs8: pkcs8.to_vec(),
                inner: Inner::Rsa(key),
            });
        }
        Err(AcmeError::unsupported(
            "unsupported key type: expected RSA, ECDSA P-256/P-384/P-521 or Ed25519 in PKCS#8 form",
        ))
    }

    /// Load a key pair from a PKCS#8 PEM document
    pub fn from_pkcs8_pem(pem_data: &str) -> Result<Self> {
        let parsed = pem::parse(pem_data)
            .map_err(|err| AcmeError::unsupported(format!("invalid PEM: {err}")))?;
        if parsed.tag() != "PRIVATE KEY" {
            return Err(AcmeError::unsupported(format!(
                "expected a PRIVATE KEY PEM block, found {:?}",
                parsed.tag()
            )));
        }
        Self::from_pkcs8_der(parsed.contents())
    }

    /// The PKCS#8 DER encoding of this key pair
    pub fn to_pkcs8_der(&self) -> &[u8] {
        &self.pkcs8
    }

    /// The PKCS#8 PEM encoding of this key pair
    pub fn to_pkcs8_pem(&self) -> String {
        pem::encode(&pem::Pem::new("PRIVATE KEY", self.pkcs8.clone()))
    }

    /// Key type
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// The JWA algorithm this key signs with
    pub fn jwa_algorithm(&self) -> &'static str {
        self.key_type.jwa_algorithm()
    }

    /// The public half as a JWK
    pub fn public_jwk(&self) -> Result<Jwk> {
        match &self.inner {
            Inner::Ecdsa(key) => {
                let point = key.public_key().as_ref();
                // uncompressed SEC1 point: 0x04 || X || Y
                if point.first() != Some(&0x04) || point.len() % 2 != 1 {
                    return Err(AcmeError::unsupported("unexpected EC public key encoding"));
                }
                let coord_len = (point.len() - 1) / 2;
                let x = &point[1..1 + coord_len];
                let y = &point[1 + coord_len..];
                let curve = self.key_type.curve_name().expect("EC key has a curve");
                Ok(Jwk::ec(curve, base64url(x), base64url(y)))
            }
            Inner::Ed25519(key) => Ok(Jwk::okp("Ed25519", base64url(key.public_key().as_ref()))),
            Inner::Rsa(key) => {
                let (n, e) = parse_pkcs1_public(key.public_key().as_ref())?;
                Ok(Jwk::rsa(base64url(n), base64url(e)))
            }
        }
    }

    /// RFC 7638 thumbprint of the public key, base64url encoded
    pub fn thumbprint(&self) -> Result<String> {
        self.public_jwk()?.thumbprint()
    }

    /// Sign a message, returning the raw JWS signature bytes
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let rng = SystemRandom::new();
        match &self.inner {
            Inner::Ecdsa(key) => key
                .sign(&rng, message)
                .map(|sig| sig.as_ref().to_vec())
                .map_err(|_| AcmeError::unsupported("ECDSA signing failed")),
            Inner::Ed25519(key) => Ok(key.sign(message).as_ref().to_vec()),
            Inner::Rsa(key) => {
                let mut signature = vec![0u8; key.public_modulus_len()];
                key.sign(&RSA_PKCS1_SHA256, &rng, message, &mut signature)
                    .map_err(|_| AcmeError::unsupported("RSA signing failed"))?;
                Ok(signature)
            }
        }
    }

    /// Bridge into the CSR generator's key type
    pub(crate) fn to_rcgen(&self) -> Result<rcgen::KeyPair> {
        rcgen::KeyPair::try_from(self.pkcs8.as_slice())
            .map_err(|err| AcmeError::unsupported(format!("key not usable for CSRs: {err}")))
    }
}

/// Extract (modulus, exponent) from a DER-encoded PKCS#1 RSAPublicKey
fn parse_pkcs1_public(der: &[u8]) -> Result<(&[u8], &[u8])> {
    fn take_tlv<'a>(input: &'a [u8], tag: u8) -> Result<(&'a [u8], &'a [u8])> {
        let malformed = || AcmeError::unsupported("malformed RSA public key");
        let (&found, rest) = input.split_first().ok_or_else(malformed)?;
        if found != tag {
            return Err(malformed());
        }
        let (&first, rest) = rest.split_first().ok_or_else(malformed)?;
        let (len, rest) = if first < 0x80 {
            (first as usize, rest)
        } else {
            let count = (first & 0x7f) as usize;
            if count == 0 || count > 2 || rest.len() < count {
                return Err(malformed());
            }
            let len = rest[..count].iter().fold(0usize, |acc, &b| acc << 8 | b as usize);
            (len, &rest[count..])
        };
        if rest.len() < len {
            return Err(malformed());
        }
        Ok(rest.split_at(len))
    }

    let (body, _) = take_tlv(der, 0x30)?;
    let (n, rest) = take_tlv(body, 0x02)?;
    let (e, _) = take_tlv(rest, 0x02)?;
    // drop the DER sign byte of the modulus
    let n = if n.first() == Some(&0x00) { &n[1..] } else { n };
    Ok((n, e))
}
