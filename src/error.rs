/// Error handling for the ACME client
use jiff::Timestamp;
use thiserror::Error;
use url::Url;

use crate::problem::Problem;

/// Result type for ACME operations
pub type Result<T> = std::result::Result<T, AcmeError>;

/// Error types for ACME operations
#[derive(Error, Debug)]
pub enum AcmeError {
    /// Transport failed: timeout, DNS, TLS, connection reset
    #[error("network error: {0}")]
    Network(String),

    /// The server response violates RFC 8555: bad headers, wrong media
    /// type, malformed timestamp, missing required field
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The CA does not advertise the required directory entry or feature
    #[error("not supported by the CA: {0}")]
    NotSupported(String),

    /// Structured failure reported by the ACME server
    #[error(transparent)]
    Server(#[from] ServerError),

    /// Local misuse of the library, e.g. building a CSR without any
    /// identifier or using an unsupported key type
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A polling loop exceeded its caller-supplied deadline
    #[error("deadline elapsed while waiting for {0}")]
    Deadline(String),

    /// A lazy getter had to fetch the resource and the fetch failed
    #[error("deferred fetch failed")]
    LazyLoad(#[source] Box<AcmeError>),
}

impl AcmeError {
    /// Create a network error
    pub fn network(msg: impl ToString) -> Self {
        AcmeError::Network(msg.to_string())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl ToString) -> Self {
        AcmeError::Protocol(msg.to_string())
    }

    /// Create a not-supported error
    pub fn not_supported(msg: impl ToString) -> Self {
        AcmeError::NotSupported(msg.to_string())
    }

    /// Create an unsupported-operation error
    pub fn unsupported(msg: impl ToString) -> Self {
        AcmeError::Unsupported(msg.to_string())
    }

    /// Wrap an error that occurred inside a lazy fetch
    pub fn lazy(err: AcmeError) -> Self {
        AcmeError::LazyLoad(Box::new(err))
    }
}

/// Structured server failures, decoded from RFC 7807 problem documents
#[derive(Error, Debug)]
pub enum ServerError {
    /// `urn:ietf:params:acme:error:unauthorized`
    #[error("unauthorized: {0}")]
    Unauthorized(Problem),

    /// `urn:ietf:params:acme:error:rateLimited`
    #[error("rate limited: {problem}")]
    RateLimited {
        /// Instant after which the request may be retried
        retry_after: Option<Timestamp>,
        /// `urn:ietf:params:acme:documentation` links from the response
        documents: Vec<Url>,
        /// The decoded problem document
        problem: Problem,
    },

    /// `urn:ietf:params:acme:error:userActionRequired`
    #[error("user action required: {problem}")]
    UserActionRequired {
        /// Terms-of-service link from the response, if any
        tos: Option<Url>,
        /// The decoded problem document
        problem: Problem,
    },

    /// `urn:ietf:params:acme:error:accountDoesNotExist`
    #[error("account does not exist: {0}")]
    AccountDoesNotExist(Problem),

    /// `urn:ietf:params:acme:error:alreadyRevoked`
    #[error("certificate already revoked: {0}")]
    AlreadyRevoked(Problem),

    /// `urn:ietf:params:acme:error:badNonce`, surfaced after the replay
    /// budget is exhausted
    #[error("bad nonce: {0}")]
    BadNonce(Problem),

    /// `urn:ietf:params:acme:error:externalAccountRequired`
    #[error("external account binding required: {0}")]
    ExternalAccountRequired(Problem),

    /// Any other problem type, including `malformed` and foreign schemes
    #[error("{0}")]
    Other(Problem),
}

impl ServerError {
    /// The problem document carried by this error
    pub fn problem(&self) -> &Problem {
        match self {
            ServerError::Unauthorized(p)
            | ServerError::AccountDoesNotExist(p)
            | ServerError::AlreadyRevoked(p)
            | ServerError::BadNonce(p)
            | ServerError::ExternalAccountRequired(p)
            | ServerError::Other(p) => p,
            ServerError::RateLimited { problem, .. }
            | ServerError::UserActionRequired { problem, .. } => problem,
        }
    }
}
