//! Provider SPI: mapping server URIs to directory endpoints and
//! constructing typed challenges
//!
//! Bundled providers answer `acme://` shorthand URIs for well-known
//! certificate authorities; the generic provider passes plain
//! `http`/`https` URIs through unchanged.

use std::rc::Rc;

use url::Url;

use crate::challenge::{self, Challenge};
use crate::claims::Claims;
use crate::error::{AcmeError, Result};
use crate::session::Login;
use crate::transport::{Connection, NetworkSettings};

mod actalis;
mod generic;
mod google;
mod letsencrypt;
mod pebble;
mod sslcom;
mod zerossl;

pub use actalis::ActalisProvider;
pub use generic::GenericProvider;
pub use google::GoogleProvider;
pub use letsencrypt::LetsEncryptProvider;
pub use pebble::PebbleProvider;
pub use sslcom::SslComProvider;
pub use zerossl::ZeroSslProvider;

/// A provider maps an opaque server URI to a concrete ACME directory and
/// supplies connections and challenge instances for it
pub trait AcmeProvider {
    /// `true` if this provider serves the given server URI
    fn accepts(&self, server_uri: &Url) -> bool;

    /// The directory URL for the given server URI
    fn resolve(&self, server_uri: &Url) -> Result<Url>;

    /// Open a connection to the CA
    fn connect(&self, _server_uri: &Url, settings: &NetworkSettings) -> Result<Connection> {
        Connection::new(settings)
    }

    /// Build a typed challenge from its JSON description. The default
    /// dispatches on the `type` field and falls back to a generic
    /// challenge for unknown types.
    fn create_challenge(&self, login: &Login, data: Claims) -> Result<Challenge> {
        challenge::from_claims(login, data)
    }
}

/// The scheme of provider shorthand URIs
pub(crate) const ACME_SCHEME: &str = "acme";

/// The host of an `acme://` URI, if the URI uses that scheme
pub(crate) fn acme_host(server_uri: &Url) -> Option<&str> {
    if server_uri.scheme() == ACME_SCHEME {
        server_uri.host_str()
    } else {
        None
    }
}

/// The path of an `acme://` URI with the leading slash removed
pub(crate) fn acme_path(server_uri: &Url) -> &str {
    server_uri.path().trim_start_matches('/')
}

fn unknown_variant(server_uri: &Url) -> AcmeError {
    AcmeError::unsupported(format!("unknown server URI variant {server_uri}"))
}

/// The default provider registry: all bundled providers, then the
/// generic pass-through provider
pub fn default_providers() -> Vec<Rc<dyn AcmeProvider>> {
    vec![
        Rc::new(LetsEncryptProvider),
        Rc::new(PebbleProvider),
        Rc::new(GoogleProvider),
        Rc::new(ZeroSslProvider),
        Rc::new(SslComProvider),
        Rc::new(ActalisProvider),
        Rc::new(GenericProvider),
    ]
}

/// Find the first provider accepting the server URI
pub(crate) fn find_provider(
    providers: &[Rc<dyn AcmeProvider>],
    server_uri: &Url,
) -> Result<Rc<dyn AcmeProvider>> {
    providers
        .iter()
        .find(|provider| provider.accepts(server_uri))
        .cloned()
        .ok_or_else(|| {
            AcmeError::unsupported(format!("no ACME provider accepts server URI {server_uri}"))
        })
}
