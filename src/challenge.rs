/// Challenges: typed variants, key authorizations, triggering, polling
use std::time::{Duration, Instant};

use jiff::Timestamp;
use serde_json::json;
use url::Url;

use crate::claims::Claims;
use crate::crypto::encoding::{base32_lower, base64url};
use crate::crypto::hash::sha256;
use crate::error::{AcmeError, Result};
use crate::problem::Problem;
use crate::resource::{INITIAL_POLL_DELAY, ResourceState, poll_delay, sleep_within_deadline};
use crate::session::Login;
use crate::types::{Status, to_ace};

/// The `http-01` challenge type
pub const HTTP_01: &str = "http-01";
/// The `dns-01` challenge type
pub const DNS_01: &str = "dns-01";
/// The account-scoped `dns-account-01` challenge type
pub const DNS_ACCOUNT_01: &str = "dns-account-01";
/// The `tls-alpn-01` challenge type
pub const TLS_ALPN_01: &str = "tls-alpn-01";
/// The `email-reply-00` challenge type of the S/MIME extension
pub const EMAIL_REPLY_00: &str = "email-reply-00";

/// The ALPN protocol name negotiated for `tls-alpn-01` validation
pub const ACME_TLS_ALPN_PROTOCOL: &str = "acme-tls/1";

/// The recognized challenge variants, plus fallbacks for types this
/// library does not know
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChallengeKind {
    /// `http-01`
    Http01,
    /// `dns-01`
    Dns01,
    /// `dns-account-01`
    DnsAccount01,
    /// `tls-alpn-01`
    TlsAlpn01,
    /// `email-reply-00`
    EmailReply00,
    /// An unknown challenge type carrying a `token` field
    Token,
    /// An unknown challenge type without a token
    Generic,
}

impl ChallengeKind {
    fn from_type(challenge_type: &str, has_token: bool) -> Self {
        match challenge_type {
            HTTP_01 => ChallengeKind::Http01,
            DNS_01 => ChallengeKind::Dns01,
            DNS_ACCOUNT_01 => ChallengeKind::DnsAccount01,
            TLS_ALPN_01 => ChallengeKind::TlsAlpn01,
            EMAIL_REPLY_00 => ChallengeKind::EmailReply00,
            _ if has_token => ChallengeKind::Token,
            _ => ChallengeKind::Generic,
        }
    }

    fn has_token(&self) -> bool {
        !matches!(self, ChallengeKind::Generic)
    }
}

/// Build a typed challenge from its JSON description
pub(crate) fn from_claims(login: &Login, data: Claims) -> Result<Challenge> {
    let challenge_type = data.get("type").required()?.as_string()?;
    let location = data.get("url").required()?.as_url()?;
    let kind = ChallengeKind::from_type(&challenge_type, data.contains("token"));
    Ok(Challenge {
        login: login.clone(),
        resource: ResourceState::with_json(location, data),
        kind,
        challenge_type,
    })
}

/// An ACME challenge resource
pub struct Challenge {
    login: Login,
    resource: ResourceState,
    kind: ChallengeKind,
    challenge_type: String,
}

impl Challenge {
    /// The challenge variant
    pub fn kind(&self) -> ChallengeKind {
        self.kind
    }

    /// The wire name of the challenge type
    pub fn challenge_type(&self) -> &str {
        &self.challenge_type
    }

    /// The challenge URL
    pub fn location(&self) -> &Url {
        self.resource.location()
    }

    /// Re-fetch the challenge resource
    pub fn fetch(&mut self) -> Result<()> {
        self.resource.fetch(&self.login)
    }

    fn json(&mut self) -> Result<&Claims> {
        self.resource.load(&self.login)
    }

    /// Challenge status
    pub fn status(&mut self) -> Result<Status> {
        self.json()?.get("status").required()?.as_status()
    }

    /// When the challenge was validated
    pub fn validated(&mut self) -> Result<Option<Timestamp>> {
        self.json()?
            .get("validated")
            .optional()
            .map(|v| v.as_instant())
            .transpose()
    }

    /// The problem reported for a failed validation, if any
    pub fn error(&mut self) -> Result<Option<Problem>> {
        self.json()?
            .get("error")
            .optional()
            .map(|v| v.as_problem())
            .transpose()
    }

    fn require_kind(&self, expected: &[ChallengeKind], what: &str) -> Result<()> {
        if expected.contains(&self.kind) {
            Ok(())
        } else {
            Err(AcmeError::unsupported(format!(
                "{what} is not defined for {} challenges",
                self.challenge_type
            )))
        }
    }

    /// The challenge token
    pub fn token(&mut self) -> Result<String> {
        if !self.kind.has_token() {
            return Err(AcmeError::unsupported(format!(
                "{} challenges carry no token",
                self.challenge_type
            )));
        }
        self.json()?.get("token").required()?.as_string()
    }

    /// The key authorization: `token || "." || base64url(thumbprint)`.
    ///
    /// For `http-01` this is the body to publish under the well-known
    /// path; the DNS and TLS variants derive digests from it.
    pub fn key_authorization(&mut self) -> Result<String> {
        if self.kind == ChallengeKind::EmailReply00 {
            return Err(AcmeError::unsupported(
                "email-reply-00 needs the token part received by email; \
                 use key_authorization_with_part1",
            ));
        }
        let token = self.token()?;
        let thumbprint = self.login.key_pair().thumbprint()?;
        Ok(format!("{token}.{thumbprint}"))
    }

    /// The key authorization of an `email-reply-00` challenge. The full
    /// token is the part received in the challenge email concatenated
    /// with the token of the challenge resource.
    pub fn key_authorization_with_part1(&mut self, token_part1: &str) -> Result<String> {
        self.require_kind(&[ChallengeKind::EmailReply00], "split-token authorization")?;
        let token_part2 = self.json()?.get("token").required()?.as_string()?;
        let thumbprint = self.login.key_pair().thumbprint()?;
        Ok(format!("{token_part1}{token_part2}.{thumbprint}"))
    }

    /// The `from` address an `email-reply-00` challenge email will be
    /// sent from
    pub fn email_from(&mut self) -> Result<String> {
        self.require_kind(&[ChallengeKind::EmailReply00], "the sender address")?;
        self.json()?.get("from").required()?.as_string()
    }

    /// The well-known path where an `http-01` token must be published
    pub fn http_resource_path(&mut self) -> Result<String> {
        self.require_kind(&[ChallengeKind::Http01], "the well-known path")?;
        Ok(format!("/.well-known/acme-challenge/{}", self.token()?))
    }

    /// The TXT record value of a `dns-01` or `dns-account-01`
    /// challenge: base64url of the SHA-256 of the key authorization
    pub fn dns_digest(&mut self) -> Result<String> {
        self.require_kind(
            &[ChallengeKind::Dns01, ChallengeKind::DnsAccount01],
            "the TXT record digest",
        )?;
        Ok(base64url(sha256(self.key_authorization()?)))
    }

    /// The resource record name where the TXT record must be published.
    ///
    /// For `dns-01` this is `_acme-challenge.<domain>`; `dns-account-01`
    /// scopes the name with a label derived from the account URL.
    pub fn dns_rr_name(&mut self, domain: &str) -> Result<String> {
        let domain = to_ace(domain)?;
        let domain = domain.strip_prefix("*.").unwrap_or(&domain);
        match self.kind {
            ChallengeKind::Dns01 => Ok(format!("_acme-challenge.{domain}")),
            ChallengeKind::DnsAccount01 => {
                let digest = sha256(self.login.account_location().as_str());
                let label = base32_lower(&digest[..10]);
                Ok(format!("_{label}._acme-challenge.{domain}"))
            }
            _ => Err(AcmeError::unsupported(format!(
                "the resource record name is not defined for {} challenges",
                self.challenge_type
            ))),
        }
    }

    /// The SHA-256 digest embedded in the `acmeIdentifier` extension of
    /// a `tls-alpn-01` validation certificate
    pub fn tls_alpn_validation(&mut self) -> Result<[u8; 32]> {
        self.require_kind(&[ChallengeKind::TlsAlpn01], "the validation digest")?;
        Ok(sha256(self.key_authorization()?))
    }

    /// Tell the server the challenge response is in place. The server
    /// moves the challenge from `pending` to `processing`.
    pub fn trigger(&mut self) -> Result<()> {
        let url = self.resource.location().clone();
        let claims = json!({});
        let mut conn = self.login.session().connect()?;
        conn.send_signed_request(&url, &claims, &self.login)?;
        self.resource.set_json(conn.read_json()?);
        tracing::info!(challenge = %url, challenge_type = %self.challenge_type, "challenge triggered");
        Ok(())
    }

    /// Poll until the server validated or rejected the challenge
    pub fn wait_for_completion(&mut self, timeout: Duration) -> Result<Status> {
        let deadline = Instant::now() + timeout;
        let mut backoff = INITIAL_POLL_DELAY;
        loop {
            self.fetch()?;
            let status = self.status()?;
            if matches!(status, Status::Valid | Status::Invalid) {
                tracing::debug!(status = %status, "challenge polling finished");
                return Ok(status);
            }
            let delay = poll_delay(self.resource.retry_after(), &mut backoff);
            sleep_within_deadline(delay, deadline, "challenge to complete")?;
        }
    }
}
