/// CSR generation for DNS/IP orders and for S/MIME email certificates
use std::net::IpAddr;

use rcgen::string::Ia5String;
use rcgen::{CertificateParams, DnType, KeyUsagePurpose, SanType};

use crate::crypto::keypair::KeyPair;
use crate::error::{AcmeError, Result};
use crate::types::Identifier;

fn csr_error(err: rcgen::Error) -> AcmeError {
    AcmeError::unsupported(format!("cannot build CSR: {err}"))
}

/// Builder for a PKCS#10 signing request covering DNS and IP
/// identifiers. The first DNS name becomes the common name.
#[derive(Default)]
pub struct CsrBuilder {
    identifiers: Vec<Identifier>,
}

impl CsrBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a domain
    pub fn domain(mut self, domain: &str) -> Result<Self> {
        self.identifiers.push(Identifier::dns(domain)?);
        Ok(self)
    }

    /// Add several domains
    pub fn domains<I, S>(mut self, domains: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for domain in domains {
            self = self.domain(domain.as_ref())?;
        }
        Ok(self)
    }

    /// Add an IP address
    pub fn ip(mut self, addr: IpAddr) -> Self {
        self.identifiers.push(Identifier::ip(addr));
        self
    }

    /// Add an identifier
    pub fn identifier(mut self, identifier: Identifier) -> Self {
        self.identifiers.push(identifier);
        self
    }

    fn params(&self) -> Result<CertificateParams> {
        if self.identifiers.is_empty() {
            return Err(AcmeError::unsupported(
                "a signing request requires at least one identifier",
            ));
        }
        let mut dns_names = Vec::new();
        let mut ips = Vec::new();
        for identifier in &self.identifiers {
            if identifier.is_dns() {
                dns_names.push(identifier.value().to_owned());
            } else if identifier.kind().eq_ignore_ascii_case(Identifier::TYPE_IP) {
                let addr: IpAddr = identifier.value().parse().map_err(|err| {
                    AcmeError::unsupported(format!(
                        "invalid IP identifier {:?}: {err}",
                        identifier.value()
                    ))
                })?;
                ips.push(addr);
            } else if identifier.is_email() {
                return Err(AcmeError::unsupported(
                    "email identifiers need an S/MIME signing request",
                ));
            } else {
                return Err(AcmeError::unsupported(format!(
                    "cannot build a CSR for {} identifiers",
                    identifier.kind()
                )));
            }
        }

        let mut params = CertificateParams::new(dns_names.clone()).map_err(csr_error)?;
        for addr in ips {
            params.subject_alt_names.push(SanType::IpAddress(addr));
        }
        if let Some(common_name) = dns_names.first() {
            params
                .distinguished_name
                .push(DnType::CommonName, common_name.as_str());
        }
        Ok(params)
    }

    /// Sign the request with the domain key pair, returning DER
    pub fn sign(&self, key_pair: &KeyPair) -> Result<Vec<u8>> {
        let params = self.params()?;
        let key = key_pair.to_rcgen()?;
        let csr = params.serialize_request(&key).map_err(csr_error)?;
        Ok(csr.der().to_vec())
    }

    /// Sign the request with the domain key pair, returning PEM
    pub fn sign_pem(&self, key_pair: &KeyPair) -> Result<String> {
        let params = self.params()?;
        let key = key_pair.to_rcgen()?;
        let csr = params.serialize_request(&key).map_err(csr_error)?;
        csr.pem().map_err(csr_error)
    }
}

/// Key usage of an S/MIME certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyUsageType {
    /// Signing only
    Signing,
    /// Encryption only
    Encryption,
    /// Both signing and encryption
    #[default]
    SigningAndEncryption,
}

impl KeyUsageType {
    fn purposes(&self) -> Vec<KeyUsagePurpose> {
        match self {
            KeyUsageType::Signing => vec![KeyUsagePurpose::DigitalSignature],
            KeyUsageType::Encryption => vec![KeyUsagePurpose::KeyEncipherment],
            KeyUsageType::SigningAndEncryption => vec![
                KeyUsagePurpose::DigitalSignature,
                KeyUsagePurpose::KeyEncipherment,
            ],
        }
    }
}

/// Builder for an S/MIME signing request with email subject alternative
/// names. The first email becomes the common name.
pub struct SmimeCsrBuilder {
    emails: Vec<String>,
    key_usage: KeyUsageType,
}

impl Default for SmimeCsrBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SmimeCsrBuilder {
    /// Create a builder with the default signing-and-encryption usage
    pub fn new() -> Self {
        Self {
            emails: Vec::new(),
            key_usage: KeyUsageType::default(),
        }
    }

    /// Add an email address
    pub fn email(mut self, email: &str) -> Result<Self> {
        if !email.contains('@') {
            return Err(AcmeError::unsupported(format!(
                "invalid email address {email:?}"
            )));
        }
        self.emails.push(email.to_owned());
        Ok(self)
    }

    /// Set the key usage bits of the requested certificate
    pub fn key_usage(mut self, key_usage: KeyUsageType) -> Self {
        self.key_usage = key_usage;
        self
    }

    fn params(&self) -> Result<CertificateParams> {
        if self.emails.is_empty() {
            return Err(AcmeError::unsupported(
                "an S/MIME signing request requires at least one email address",
            ));
        }
        let mut params = CertificateParams::new(Vec::<String>::new()).map_err(csr_error)?;
        for email in &self.emails {
            let name = Ia5String::try_from(email.as_str()).map_err(csr_error)?;
            params.subject_alt_names.push(SanType::Rfc822Name(name));
        }
        params
            .distinguished_name
            .push(DnType::CommonName, self.emails[0].as_str());
        params.key_usages = self.key_usage.purposes();
        Ok(params)
    }

    /// Sign the request with the certificate key pair, returning DER
    pub fn sign(&self, key_pair: &KeyPair) -> Result<Vec<u8>> {
        let params = self.params()?;
        let key = key_pair.to_rcgen()?;
        let csr = params.serialize_request(&key).map_err(csr_error)?;
        Ok(csr.der().to_vec())
    }
}
