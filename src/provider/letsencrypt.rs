/// Provider for `acme://letsencrypt.org` URIs
use url::Url;

use super::{AcmeProvider, acme_host, acme_path, unknown_variant};
use crate::error::Result;

const PRODUCTION: &str = "https://acme-v02.api.letsencrypt.org/directory";
const STAGING: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Let's Encrypt, with a `/staging` variant
pub struct LetsEncryptProvider;

impl AcmeProvider for LetsEncryptProvider {
    fn accepts(&self, server_uri: &Url) -> bool {
        acme_host(server_uri) == Some("letsencrypt.org")
    }

    fn resolve(&self, server_uri: &Url) -> Result<Url> {
        let directory = match acme_path(server_uri) {
            "" => PRODUCTION,
            "staging" => STAGING,
            _ => return Err(unknown_variant(server_uri)),
        };
        Ok(Url::parse(directory).expect("valid directory URL"))
    }
}
