/// Pass-through provider for plain `http`/`https` directory URLs
use url::Url;

use super::AcmeProvider;
use crate::error::Result;

/// Accepts any `http` or `https` server URI and uses it directly as the
/// directory URL
pub struct GenericProvider;

impl AcmeProvider for GenericProvider {
    fn accepts(&self, server_uri: &Url) -> bool {
        matches!(server_uri.scheme(), "http" | "https")
    }

    fn resolve(&self, server_uri: &Url) -> Result<Url> {
        Ok(server_uri.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_http_and_https() {
        let provider = GenericProvider;
        assert!(provider.accepts(&Url::parse("https://ca.example/dir").unwrap()));
        assert!(provider.accepts(&Url::parse("http://localhost:14000/dir").unwrap()));
        assert!(!provider.accepts(&Url::parse("acme://letsencrypt.org").unwrap()));
    }

    #[test]
    fn test_resolve_is_identity() {
        let uri = Url::parse("https://ca.example/custom/dir").unwrap();
        assert_eq!(GenericProvider.resolve(&uri).unwrap(), uri);
    }
}
