/// Certificate download, alternate chains and revocation
use jiff::Timestamp;
use serde_json::{Map, Value as JsonValue, json};
use url::Url;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::crypto::encoding::base64url;
use crate::crypto::keypair::KeyPair;
use crate::directory::Resource;
use crate::error::{AcmeError, Result};
use crate::session::{Login, Session};
use crate::types::RevocationReason;

/// An issued certificate: the PEM chain behind an order's certificate
/// URL, with its alternate chains
pub struct Certificate {
    login: Login,
    location: Url,
    chain: Option<Vec<Vec<u8>>>,
    alternates: Vec<Url>,
}

impl Certificate {
    pub(crate) fn new(login: Login, location: Url) -> Self {
        Self {
            login,
            location,
            chain: None,
            alternates: Vec::new(),
        }
    }

    /// The certificate URL
    pub fn location(&self) -> &Url {
        &self.location
    }

    /// Download the certificate chain. Discovering alternate chains is
    /// a side effect of the download.
    pub fn download(&mut self) -> Result<()> {
        let mut conn = self.login.session().connect()?;
        conn.send_certificate_request(&self.location, &self.login)?;
        self.alternates = conn.links("alternate");
        self.chain = Some(conn.read_certificates()?);
        tracing::info!(
            certificate = %self.location,
            alternates = self.alternates.len(),
            "certificate chain downloaded"
        );
        Ok(())
    }

    fn ensure_downloaded(&mut self) -> Result<()> {
        if self.chain.is_none() {
            self.download().map_err(AcmeError::lazy)?;
        }
        Ok(())
    }

    /// The end-entity certificate in DER form
    pub fn certificate(&mut self) -> Result<Vec<u8>> {
        self.ensure_downloaded()?;
        let chain = self.chain.as_ref().expect("chain was just downloaded");
        Ok(chain.first().expect("chain is never empty").clone())
    }

    /// The full chain in DER form, end-entity first
    pub fn chain(&mut self) -> Result<&[Vec<u8>]> {
        self.ensure_downloaded()?;
        Ok(self.chain.as_deref().expect("chain was just downloaded"))
    }

    /// The full chain as a PEM document
    pub fn chain_pem(&mut self) -> Result<String> {
        let blocks: Vec<pem::Pem> = self
            .chain()?
            .iter()
            .map(|der| pem::Pem::new("CERTIFICATE", der.clone()))
            .collect();
        Ok(pem::encode_many(&blocks))
    }

    /// URLs of alternate chains offered by the CA
    pub fn alternates(&mut self) -> Result<Vec<Url>> {
        self.ensure_downloaded()?;
        Ok(self.alternates.clone())
    }

    /// One of the alternate chains, by index into [`alternates`]
    ///
    /// [`alternates`]: Certificate::alternates
    pub fn alternate(&mut self, index: usize) -> Result<Certificate> {
        let alternates = self.alternates()?;
        let url = alternates.get(index).ok_or_else(|| {
            AcmeError::unsupported(format!("no alternate chain with index {index}"))
        })?;
        Ok(Certificate::new(self.login.clone(), url.clone()))
    }

    /// Expiry of the end-entity certificate
    pub fn expires_at(&mut self) -> Result<Timestamp> {
        let der = self.certificate()?;
        let (_, parsed) = X509Certificate::from_der(&der)
            .map_err(|err| AcmeError::protocol(format!("invalid certificate: {err}")))?;
        Timestamp::from_second(parsed.validity().not_after.timestamp())
            .map_err(|err| AcmeError::protocol(format!("certificate expiry out of range: {err}")))
    }

    /// Revoke the certificate, signed by the account key
    pub fn revoke(&mut self, reason: Option<RevocationReason>) -> Result<()> {
        let der = self.certificate()?;
        let url = self.login.session().resource_url(Resource::RevokeCert)?;
        let claims = revocation_claims(&der, reason);
        let mut conn = self.login.session().connect()?;
        conn.send_signed_request(&url, &claims, &self.login)?;
        tracing::info!(certificate = %self.location, "certificate revoked");
        Ok(())
    }

    /// Revoke a certificate without an account, signed by the
    /// certificate's own key pair. The request identifies itself with
    /// the embedded public key instead of an account URL.
    pub fn revoke_with_key(
        session: &Session,
        key_pair: &KeyPair,
        certificate: &[u8],
        reason: Option<RevocationReason>,
    ) -> Result<()> {
        let url = session.resource_url(Resource::RevokeCert)?;
        let claims = revocation_claims(certificate, reason);
        let mut conn = session.connect()?;
        conn.send_signed_request_with_key(&url, &claims, session, key_pair)?;
        tracing::info!("certificate revoked with its own key");
        Ok(())
    }
}

fn revocation_claims(certificate: &[u8], reason: Option<RevocationReason>) -> JsonValue {
    let mut claims = Map::new();
    claims.insert("certificate".to_owned(), json!(base64url(certificate)));
    if let Some(reason) = reason {
        claims.insert("reason".to_owned(), json!(reason.as_u8()));
    }
    JsonValue::Object(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revocation_claims_with_reason() {
        let claims = revocation_claims(b"der-bytes", Some(RevocationReason::KeyCompromise));
        assert_eq!(claims["certificate"], base64url(b"der-bytes"));
        assert_eq!(claims["reason"], 1);
    }

    #[test]
    fn test_revocation_claims_without_reason() {
        let claims = revocation_claims(b"der-bytes", None);
        assert!(claims.get("reason").is_none());
    }

    #[test]
    fn test_expiry_of_generated_certificate() {
        let params = rcgen::CertificateParams::new(vec!["cert.example".to_string()]).unwrap();
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();

        let (_, parsed) = X509Certificate::from_der(cert.der()).unwrap();
        let expiry = Timestamp::from_second(parsed.validity().not_after.timestamp()).unwrap();
        assert!(expiry > Timestamp::now());
    }
}
