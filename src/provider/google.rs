/// Provider for `acme://pki.goog` URIs
use url::Url;

use super::{AcmeProvider, acme_host, acme_path, unknown_variant};
use crate::error::Result;

const PRODUCTION: &str = "https://dv.acme-v02.api.pki.goog/directory";
const STAGING: &str = "https://dv.acme-v02.test-api.pki.goog/directory";

/// Google Trust Services, with a `/staging` variant
pub struct GoogleProvider;

impl AcmeProvider for GoogleProvider {
    fn accepts(&self, server_uri: &Url) -> bool {
        acme_host(server_uri) == Some("pki.goog")
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
