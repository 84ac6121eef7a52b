/// Provider for `acme://ssl.com` URIs
use url::Url;

use super::{AcmeProvider, acme_host, acme_path, unknown_variant};
use crate::error::Result;

const PRODUCTION_ECC: &str = "https://acme.ssl.com/sslcom-dv-ecc";
const PRODUCTION_RSA: &str = "https://acme.ssl.com/sslcom-dv-rsa";
const STAGING_ECC: &str = "https://acme-try.ssl.com/sslcom-dv-ecc";
const STAGING_RSA: &str = "https://acme-try.ssl.com/sslcom-dv-rsa";

/// SSL.com, with `/ecc` (default), `/rsa` and `/staging` variants
pub struct SslComProvider;

impl AcmeProvider for SslComProvider {
    fn accepts(&self, server_uri: &Url) -> bool {
        acme_host(server_uri) == Some("ssl.com")
    }

    fn resolve(&self, server_uri: &Url) -> Result<Url> {
        let directory = match acme_path(server_uri) {
            "" | "ecc" => PRODUCTION_ECC,
            "rsa" => PRODUCTION_RSA,
            "staging" | "staging/ecc" => STAGING_ECC,
            "staging/rsa" => STAGING_RSA,
            _ => return Err(unknown_variant(server_uri)),
        };
        Ok(Url::parse(directory).expect("valid directory URL"))
    }
}
