/// Certificate orders: creation, finalization and polling
use std::net::IpAddr;
use std::time::{Duration, Instant};

use jiff::Timestamp;
use serde_json::{Map, Value as JsonValue, json};
use url::Url;

use crate::authorization::Authorization;
use crate::certificate::Certificate;
use crate::claims::Claims;
use crate::crypto::encoding::base64url;
use crate::crypto::keypair::KeyPair;
use crate::csr::CsrBuilder;
use crate::directory::Resource;
use crate::error::{AcmeError, Result};
use crate::problem::Problem;
use crate::resource::{INITIAL_POLL_DELAY, ResourceState, poll_delay, sleep_within_deadline};
use crate::session::Login;
use crate::types::{Identifier, Status};

/// Builder for a new certificate order
pub struct OrderBuilder {
    login: Login,
    identifiers: Vec<Identifier>,
    not_before: Option<Timestamp>,
    not_after: Option<Timestamp>,
    profile: Option<String>,
}

impl OrderBuilder {
    pub(crate) fn new(login: Login) -> Self {
        Self {
            login,
            identifiers: Vec::new(),
            not_before: None,
            not_after: None,
            profile: None,
        }
    }

    /// Add a domain to the order
    pub fn domain(mut self, domain: &str) -> Result<Self> {
        self.identifiers.push(Identifier::dns(domain)?);
        Ok(self)
    }

    /// Add several domains to the order
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

    /// Add an IP address to the order
    pub fn ip(mut self, addr: IpAddr) -> Self {
        self.identifiers.push(Identifier::ip(addr));
        self
    }

    /// Add an email address to the order (S/MIME extension)
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.identifiers.push(Identifier::email(email));
        self
    }

    /// Add an arbitrary identifier to the order
    pub fn identifier(mut self, identifier: Identifier) -> Self {
        self.identifiers.push(identifier);
        self
    }

    /// Request the certificate to be valid no earlier than this instant
    pub fn not_before(mut self, instant: Timestamp) -> Self {
        self.not_before = Some(instant);
        self
    }

    /// Request the certificate to be valid no later than this instant
    pub fn not_after(mut self, instant: Timestamp) -> Self {
        self.not_after = Some(instant);
        self
    }

    /// Select a certificate profile advertised by the CA
    pub fn profile(mut self, name: impl Into<String>) -> Self {
        self.profile = Some(name.into());
        self
    }

    /// Post the order to `newOrder` and return the created order
    pub fn create(self) -> Result<Order> {
        if self.identifiers.is_empty() {
            return Err(AcmeError::unsupported(
                "an order requires at least one identifier",
            ));
        }
        let session = self.login.session();
        if let Some(profile) = &self.profile {
            let meta = session.metadata()?;
            if !meta.profiles.is_empty() && !meta.has_profile(profile) {
                return Err(AcmeError::unsupported(format!(
                    "CA does not offer certificate profile {profile:?}"
                )));
            }
        }

        let url = session.resource_url(Resource::NewOrder)?;
        let mut claims = Map::new();
        claims.insert("identifiers".to_owned(), json!(self.identifiers));
        if let Some(not_before) = self.not_before {
            claims.insert("notBefore".to_owned(), json!(not_before.to_string()));
        }
        if let Some(not_after) = self.not_after {
            claims.insert("notAfter".to_owned(), json!(not_after.to_string()));
        }
        if let Some(profile) = &self.profile {
            claims.insert("profile".to_owned(), json!(profile));
        }

        let mut conn = session.connect()?;
        conn.send_signed_request(&url, &JsonValue::Object(claims), &self.login)?;
        let location = conn.location_required()?;
        let json = conn.read_json()?;
        tracing::info!(order = %location, "order created");
        Ok(Order::with_json(self.login.clone(), location, json))
    }
}

/// An ACME certificate order resource
#[derive(Debug)]
pub struct Order {
    login: Login,
    resource: ResourceState,
}

impl Order {
    pub(crate) fn new(login: Login, location: Url) -> Self {
        Self {
            login,
            resource: ResourceState::new(location),
        }
    }

    pub(crate) fn with_json(login: Login, location: Url, json: Claims) -> Self {
        Self {
            login,
            resource: ResourceState::with_json(location, json),
        }
    }

    /// The order URL
    pub fn location(&self) -> &Url {
        self.resource.location()
    }

    /// Re-fetch the order resource
    pub fn fetch(&mut self) -> Result<()> {
        self.resource.fetch(&self.login)
    }

    fn json(&mut self) -> Result<&Claims> {
        self.resource.load(&self.login)
    }

    /// Order status
    pub fn status(&mut self) -> Result<Status> {
        self.json()?.get("status").required()?.as_status()
    }

    /// When the order expires
    pub fn expires(&mut self) -> Result<Option<Timestamp>> {
        self.json()?
            .get("expires")
            .optional()
            .map(|v| v.as_instant())
            .transpose()
    }

    /// The identifiers this order covers
    pub fn identifiers(&mut self) -> Result<Vec<Identifier>> {
        self.json()?
            .get("identifiers")
            .required()?
            .as_array()?
            .iter()
            .map(|v| v.as_identifier())
            .collect()
    }

    /// Requested `notBefore` instant, if any
    pub fn not_before(&mut self) -> Result<Option<Timestamp>> {
        self.json()?
            .get("notBefore")
            .optional()
            .map(|v| v.as_instant())
            .transpose()
    }

    /// Requested `notAfter` instant, if any
    pub fn not_after(&mut self) -> Result<Option<Timestamp>> {
        self.json()?
            .get("notAfter")
            .optional()
            .map(|v| v.as_instant())
            .transpose()
    }

    /// The certificate profile of this order, if any
    pub fn profile(&mut self) -> Result<Option<String>> {
        self.json()?
            .get("profile")
            .optional()
            .map(|v| v.as_string())
            .transpose()
    }

    /// The problem that made the order fail, if it is invalid
    pub fn error(&mut self) -> Result<Option<Problem>> {
        self.json()?
            .get("error")
            .optional()
            .map(|v| v.as_problem())
            .transpose()
    }

    /// The URLs of the order's authorizations
    pub fn authorization_urls(&mut self) -> Result<Vec<Url>> {
        self.json()?
            .get("authorizations")
            .required()?
            .as_array()?
            .iter()
            .map(|v| v.as_url())
            .collect()
    }

    /// The order's authorizations, fetched lazily
    pub fn authorizations(&mut self) -> Result<Vec<Authorization>> {
        let urls = self.authorization_urls()?;
        Ok(urls
            .into_iter()
            .map(|url| self.login.bind_authorization(url))
            .collect())
    }

    /// Find the authorization for an identifier. Authorizations are an
    /// unordered set; this matches by identifier.
    pub fn authorization(&mut self, identifier: &Identifier) -> Result<Option<Authorization>> {
        for mut authorization in self.authorizations()? {
            if authorization.identifier()? == *identifier {
                return Ok(Some(authorization));
            }
        }
        Ok(None)
    }

    /// The finalization URL of this order
    pub fn finalize_url(&mut self) -> Result<Url> {
        self.json()?.get("finalize").required()?.as_url()
    }

    /// The certificate URL, present once the order is valid
    pub fn certificate_url(&mut self) -> Result<Option<Url>> {
        self.json()?
            .get("certificate")
            .optional()
            .map(|v| v.as_url())
            .transpose()
    }

    /// Finalize the order with a caller-provided DER-encoded CSR
    pub fn execute(&mut self, csr: &[u8]) -> Result<()> {
        let url = self.finalize_url()?;
        let claims = json!({ "csr": base64url(csr) });
        let mut conn = self.login.session().connect()?;
        conn.send_signed_request(&url, &claims, &self.login)?;
        self.resource.set_json(conn.read_json()?);
        tracing::info!(order = %self.resource.location(), "finalization requested");
        Ok(())
    }

    /// Finalize the order with an automatically built CSR that covers
    /// the order's identifiers, signed by the given domain key pair.
    ///
    /// Orders containing email identifiers must be finalized with an
    /// explicitly built S/MIME CSR instead.
    pub fn execute_with_key(&mut self, key_pair: &KeyPair) -> Result<()> {
        let mut builder = CsrBuilder::new();
        for identifier in self.identifiers()? {
            builder = builder.identifier(identifier);
        }
        let csr = builder.sign(key_pair)?;
        self.execute(&csr)
    }

    /// The issued certificate. The order must be valid.
    pub fn certificate(&mut self) -> Result<Certificate> {
        if self.status()? != Status::Valid {
            return Err(AcmeError::unsupported("order is not valid yet"));
        }
        let url = self.certificate_url()?.ok_or_else(|| {
            AcmeError::protocol("valid order does not provide a certificate URL")
        })?;
        Ok(self.login.bind_certificate(url))
    }

    /// Poll until the order leaves the pending state: all
    /// authorizations done (`ready`), or `valid`/`invalid`
    pub fn wait_until_ready(&mut self, timeout: Duration) -> Result<Status> {
        self.wait_for(
            &[Status::Ready, Status::Valid, Status::Invalid],
            timeout,
            "order to become ready",
        )
    }

    /// Poll until the order reaches a terminal state after finalization
    pub fn wait_for_completion(&mut self, timeout: Duration) -> Result<Status> {
        self.wait_for(
            &[Status::Valid, Status::Invalid],
            timeout,
            "order to complete",
        )
    }

    fn wait_for(&mut self, terminal: &[Status], timeout: Duration, what: &str) -> Result<Status> {
        let deadline = Instant::now() + timeout;
        let mut backoff = INITIAL_POLL_DELAY;
        loop {
            self.fetch()?;
            let status = self.status()?;
            if terminal.contains(&status) {
                tracing::debug!(status = %status, "order polling finished");
                return Ok(status);
            }
            let delay = poll_delay(self.resource.retry_after(), &mut backoff);
            sleep_within_deadline(delay, deadline, what)?;
        }
    }
}
