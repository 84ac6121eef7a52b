/// Provider for `acme://actalis.com` URIs
use url::Url;

use super::{AcmeProvider, acme_host, acme_path, unknown_variant};
use crate::error::Result;

const PRODUCTION: &str = "https://acme-api.actalis.com/acme/directory";

/// Actalis
pub struct ActalisProvider;

impl AcmeProvider for ActalisProvider {
    fn accepts(&self, server_uri: &Url) -> bool {
        acme_host(server_uri) == Some("actalis.com")
    }

    fn resolve(&self, server_uri: &Url) -> Result<Url> {
        match acme_path(server_uri) {
            "" => Ok(Url::parse(PRODUCTION).expect("valid directory URL")),
            _ => Err(unknown_variant(server_uri)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        let uri = Url::parse("acme://actalis.com").unwrap();
        assert!(ActalisProvider.accepts(&uri));
        assert_eq!(ActalisProvider.resolve(&uri).unwrap().as_str(), PRODUCTION);
    }
}
