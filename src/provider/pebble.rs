/// Provider for `acme://pebble` test server URIs
use url::Url;

use super::{AcmeProvider, acme_host, acme_path};
use crate::error::{AcmeError, Result};

const DEFAULT_AUTHORITY: &str = "localhost:14000";

/// The Pebble test server, with an optional `host[:port]` suffix
/// (`acme://pebble/pebble.example:14001`)
pub struct PebbleProvider;

impl AcmeProvider for PebbleProvider {
    fn accepts(&self, server_uri: &Url) -> bool {
        acme_host(server_uri) == Some("pebble")
    }

    fn resolve(&self, server_uri: &Url) -> Result<Url> {
        let authority = match acme_path(server_uri) {
            "" => DEFAULT_AUTHORITY,
            authority => authority,
        };
        Url::parse(&format!("https://{authority}/dir"))
            .map_err(|err| AcmeError::unsupported(format!("invalid pebble host: {err}")))
    }
}
