/// A single ACME HTTP exchange: JWS signing, sending, response decoding
use std::sync::LazyLock;

use jiff::Timestamp;
use regex::Regex;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, IF_MODIFIED_SINCE, LOCATION};
use serde_json::Value as JsonValue;
use url::Url;

use crate::claims::Claims;
use crate::crypto::jws;
use crate::crypto::keypair::KeyPair;
use crate::directory::Resource;
use crate::error::{AcmeError, Result, ServerError};
use crate::problem::Problem;
use crate::session::{Login, Session};
use crate::transport::headers;
use crate::transport::settings::NetworkSettings;

const MIME_JSON: &str = "application/json";
const MIME_JSON_PROBLEM: &str = "application/problem+json";
const MIME_JOSE_JSON: &str = "application/jose+json";
const MIME_CERTIFICATE_CHAIN: &str = "application/pem-certificate-chain";

/// Link relation of rate-limit documentation URLs
const REL_DOCUMENTATION: &str = "urn:ietf:params:acme:documentation";
/// Link relation of the terms-of-service document
const REL_TERMS_OF_SERVICE: &str = "terms-of-service";

/// Maximum number of signed attempts per logical request when the server
/// keeps answering `badNonce`
const MAX_NONCE_ATTEMPTS: usize = 10;

static NONCE_SYNTAX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[0-9A-Za-z_-]+$").expect("valid nonce regex"));

struct Exchange {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    url: Url,
}

/// A connection performs one HTTP exchange at a time.
///
/// It is not meant to be shared: create one, send one request, read the
/// response through the accessors, drop it (or reuse it sequentially).
/// Response accessors panic when no request has been sent yet.
pub struct Connection {
    http: reqwest::blocking::Client,
    exchange: Option<Exchange>,
}

impl Connection {
    /// Open a connection with the given network settings
    pub fn new(settings: &NetworkSettings) -> Result<Self> {
        Ok(Self {
            http: settings.build_client()?,
            exchange: None,
        })
    }

    /// Fetch a fresh replay nonce into the session by querying the
    /// `newNonce` endpoint
    pub fn reset_nonce(&mut self, session: &Session) -> Result<()> {
        let url = session.resource_url(Resource::NewNonce)?;
        tracing::debug!(url = %url, "fetching new nonce");
        let request = self.http.head(url.as_str());
        let response = request
            .send()
            .map_err(|err| AcmeError::network(format!("nonce request failed: {err}")))?;
        self.store(response, session)?;
        if !self.exchange().status.is_success() {
            return Err(self.decode_error());
        }
        if !self.exchange().headers.contains_key("replay-nonce") {
            return Err(AcmeError::protocol("Replay-Nonce header missing"));
        }
        Ok(())
    }

    /// Send an unauthenticated GET, optionally conditional on
    /// `If-Modified-Since`. Returns the HTTP status; `200` and `304` are
    /// accepted, anything else enters the error decoder.
    pub fn send_request(
        &mut self,
        url: &Url,
        session: &Session,
        if_modified_since: Option<Timestamp>,
    ) -> Result<StatusCode> {
        tracing::debug!(url = %url, "sending GET request");
        let mut request = self.http.get(url.as_str()).header(ACCEPT, MIME_JSON);
        if let Some(locale) = session.locale() {
            request = request.header(ACCEPT_LANGUAGE, locale);
        }
        if let Some(since) = if_modified_since {
            request = request.header(IF_MODIFIED_SINCE, headers::format_http_date(since));
        }
        let response = request
            .send()
            .map_err(|err| AcmeError::network(format!("request failed: {err}")))?;
        self.store(response, session)?;

        let status = self.exchange().status;
        if status.is_success() || status == StatusCode::NOT_MODIFIED {
            Ok(status)
        } else {
            Err(self.decode_error())
        }
    }

    /// Send a signed POST with a JSON payload, authenticated by the
    /// login's account URL (`kid`)
    pub fn send_signed_request(
        &mut self,
        url: &Url,
        claims: &JsonValue,
        login: &Login,
    ) -> Result<()> {
        self.send_jws(
            url,
            Some(claims),
            login.session(),
            &login.key_pair(),
            Some(login.account_location().as_str().to_owned()),
            MIME_JSON,
        )
    }

    /// Send a signed POST-as-GET (empty payload) for reading a resource
    pub fn send_signed_post_as_get(&mut self, url: &Url, login: &Login) -> Result<()> {
        self.send_jws(
            url,
            None,
            login.session(),
            &login.key_pair(),
            Some(login.account_location().as_str().to_owned()),
            MIME_JSON,
        )
    }

    /// Send a signed POST-as-GET that accepts a PEM certificate chain
    pub fn send_certificate_request(&mut self, url: &Url, login: &Login) -> Result<()> {
        self.send_jws(
            url,
            None,
            login.session(),
            &login.key_pair(),
            Some(login.account_location().as_str().to_owned()),
            MIME_CERTIFICATE_CHAIN,
        )
    }

    /// Send a signed POST that identifies itself by embedded `jwk`
    /// instead of `kid`. Used for account creation and for revocation
    /// with the certificate key.
    pub fn send_signed_request_with_key(
        &mut self,
        url: &Url,
        claims: &JsonValue,
        session: &Session,
        key_pair: &KeyPair,
    ) -> Result<()> {
        self.send_jws(url, Some(claims), session, key_pair, None, MIME_JSON)
    }

    fn send_jws(
        &mut self,
        url: &Url,
        payload: Option<&JsonValue>,
        session: &Session,
        key_pair: &KeyPair,
        kid: Option<String>,
        accept: &str,
    ) -> Result<()> {
        let mut attempt = 1;
        loop {
            if session.nonce().is_none() {
                self.reset_nonce(session)?;
            }
            let nonce = session
                .take_nonce()
                .ok_or_else(|| AcmeError::protocol("no nonce available"))?;
            let body = jws::sign(payload, url, &nonce, key_pair, kid.as_deref())?;
            let body = serde_json::to_vec(&body)
                .map_err(|err| AcmeError::protocol(format!("cannot encode JWS: {err}")))?;

            tracing::debug!(url = %url, attempt, "sending signed POST request");
            let mut request = self
                .http
                .post(url.as_str())
                .header(CONTENT_TYPE, MIME_JOSE_JSON)
                .header(ACCEPT, accept);
            if let Some(locale) = session.locale() {
                request = request.header(ACCEPT_LANGUAGE, locale);
            }
            let response = request
                .body(body)
                .send()
                .map_err(|err| AcmeError::network(format!("request failed: {err}")))?;
            self.store(response, session)?;

            if self.exchange().status.is_success() {
                return Ok(());
            }
            let err = self.decode_error();
            let bad_nonce = matches!(&err, AcmeError::Server(ServerError::BadNonce(_)));
            if bad_nonce && attempt < MAX_NONCE_ATTEMPTS {
                tracing::debug!(attempt, "server reported a bad nonce, replaying request");
                attempt += 1;
                continue;
            }
            return Err(err);
        }
    }

    /// Capture the response and harvest its replay nonce into the session
    fn store(&mut self, response: reqwest::blocking::Response, session: &Session) -> Result<()> {
        let status = response.status();
        let url = response.url().clone();
        let response_headers = response.headers().clone();
        let body = response
            .bytes()
            .map_err(|err| AcmeError::network(format!("failed to read response body: {err}")))?
            .to_vec();
        tracing::debug!(status = status.as_u16(), bytes = body.len(), "received response");
        self.exchange = Some(Exchange {
            status,
            headers: response_headers,
            body,
            url,
        });

        if let Some(value) = self.exchange().headers.get("replay-nonce") {
            let nonce = value
                .to_str()
                .ok()
                .filter(|nonce| NONCE_SYNTAX.is_match(nonce))
                .ok_or_else(|| AcmeError::protocol("malformed Replay-Nonce header"))?;
            session.set_nonce(nonce.to_owned());
        }
        Ok(())
    }

    fn exchange(&self) -> &Exchange {
        self.exchange
            .as_ref()
            .expect("no request has been sent on this connection")
    }

    /// Status of the last exchange
    pub fn status(&self) -> StatusCode {
        self.exchange().status
    }

    /// The `Location` header, resolved against the request URL
    pub fn location(&self) -> Option<Url> {
        let exchange = self.exchange();
        exchange
            .headers
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| exchange.url.join(value).ok())
    }

    /// The `Location` header, or a protocol error if absent
    pub fn location_required(&self) -> Result<Url> {
        self.location()
            .ok_or_else(|| AcmeError::protocol("Location header missing"))
    }

    /// All `Link` header targets with the given relation
    pub fn links(&self, rel: &str) -> Vec<Url> {
        let exchange = self.exchange();
        headers::links(&exchange.headers, &exchange.url, rel)
    }

    /// The `Retry-After` header as an absolute instant
    pub fn retry_after(&self) -> Option<Timestamp> {
        headers::retry_after(&self.exchange().headers)
    }

    /// The `Last-Modified` header
    pub fn last_modified(&self) -> Option<Timestamp> {
        headers::last_modified(&self.exchange().headers)
    }

    /// The `Expires` header
    pub fn expires(&self) -> Option<Timestamp> {
        headers::expires(&self.exchange().headers)
    }

    fn content_type(&self) -> Option<String> {
        self.exchange()
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| {
                value
                    .split(';')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .to_ascii_lowercase()
            })
    }

    /// Decode the response body as a JSON claims object. Requires an
    /// `application/json` or `application/problem+json` content type.
    pub fn read_json(&self) -> Result<Claims> {
        match self.content_type().as_deref() {
            Some(MIME_JSON) | Some(MIME_JSON_PROBLEM) => {}
            other => {
                return Err(AcmeError::protocol(format!(
                    "expected a JSON response, got content type {other:?}"
                )));
            }
        }
        Claims::from_slice(&self.exchange().body)
    }

    /// Decode the response body as an ordered PEM certificate chain
    pub fn read_certificates(&self) -> Result<Vec<Vec<u8>>> {
        match self.content_type().as_deref() {
            Some(MIME_CERTIFICATE_CHAIN) => {}
            other => {
                return Err(AcmeError::protocol(format!(
                    "expected a certificate chain, got content type {other:?}"
                )));
            }
        }
        let blocks = pem::parse_many(&self.exchange().body)
            .map_err(|err| AcmeError::protocol(format!("invalid PEM chain: {err}")))?;
        let certificates: Vec<Vec<u8>> = blocks
            .iter()
            .filter(|block| block.tag() == "CERTIFICATE")
            .map(|block| block.contents().to_vec())
            .collect();
        if certificates.is_empty() {
            return Err(AcmeError::protocol("no certificates in response"));
        }
        Ok(certificates)
    }

    /// Map a failed exchange to a typed error
    fn decode_error(&self) -> AcmeError {
        let exchange = self.exchange();
        match self.content_type().as_deref() {
            Some(MIME_JSON_PROBLEM) | Some(MIME_JSON) => {
                match serde_json::from_slice::<Problem>(&exchange.body) {
                    Ok(problem) => self.map_problem(problem),
                    Err(err) => AcmeError::protocol(format!(
                        "HTTP {} with undecodable problem document: {err}",
                        exchange.status.as_u16()
                    )),
                }
            }
            _ => AcmeError::protocol(format!(
                "unexpected HTTP status {}",
                exchange.status.as_u16()
            )),
        }
    }

    fn map_problem(&self, problem: Problem) -> AcmeError {
        let server_error = match problem.acme_error() {
            Some("badNonce") => ServerError::BadNonce(problem),
            Some("unauthorized") => ServerError::Unauthorized(problem),
            Some("rateLimited") => ServerError::RateLimited {
                retry_after: self.retry_after(),
                documents: self.links(REL_DOCUMENTATION),
                problem,
            },
            Some("userActionRequired") => ServerError::UserActionRequired {
                tos: self.links(REL_TERMS_OF_SERVICE).into_iter().next(),
                problem,
            },
            Some("accountDoesNotExist") => ServerError::AccountDoesNotExist(problem),
            Some("alreadyRevoked") => ServerError::AlreadyRevoked(problem),
            Some("externalAccountRequired") => ServerError::ExternalAccountRequired(problem),
            _ => ServerError::Other(problem),
        };
        AcmeError::Server(server_error)
    }
}
