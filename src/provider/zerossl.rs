/// Provider for `acme://zerossl.com` URIs
use url::Url;

use super::{AcmeProvider, acme_host, acme_path, unknown_variant};
use crate::error::Result;

const PRODUCTION: &str = "https://acme.zerossl.com/v2/DV90";

/// ZeroSSL. Requires an external account binding at registration.
pub struct ZeroSslProvider;

impl AcmeProvider for ZeroSslProvider {
    fn accepts(&self, server_uri: &Url) -> bool {
        acme_host(server_uri) == Some("zerossl.com")
    }

    fn resolve(&self, server_uri: &Url) -> Result<Url> {
        match acme_path(server_uri) {
            "" => Ok(Url::parse(PRODUCTION).expect("valid directory URL")),
            _ => Err(unknown_variant(server_uri)),
        }
    }
}
