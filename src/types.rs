/// Common types and protocol primitives for ACME
use std::fmt;
use std::net::IpAddr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::{AcmeError, Result};

/// Normalize a domain name to its ACE (Punycode) form.
///
/// Lower-cases, trims, maps the alternate dot separators U+3002, U+FF0E
/// and U+FF61 to `.`, and applies IDN ToASCII. A leading `*.` wildcard
/// prefix is preserved unchanged.
pub fn to_ace(domain: &str) -> Result<String> {
    let domain = domain.trim();
    let (wildcard, rest) = match domain.strip_prefix("*.") {
        Some(rest) => (true, rest),
        None => (false, domain),
    };
    let mapped: String = rest
        .chars()
        .map(|c| match c {
            '\u{3002}' | '\u{FF0E}' | '\u{FF61}' => '.',
            c => c,
        })
        .collect();
    let ace = idna::domain_to_ascii(&mapped)
        .map_err(|err| AcmeError::protocol(format!("invalid domain name {domain:?}: {err:?}")))?;
    if wildcard {
        Ok(format!("*.{ace}"))
    } else {
        Ok(ace)
    }
}

/// Parse an ACME timestamp: RFC 3339 with fractional seconds of any
/// length, `Z` or a numeric offset.
pub fn parse_timestamp(value: &str) -> Result<Timestamp> {
    value
        .parse::<Timestamp>()
        .map_err(|err| AcmeError::protocol(format!("malformed timestamp {value:?}: {err}")))
}

/// Identifier for a certificate subject
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Identifier {
    /// Type: "dns", "ip" or "email"
    #[serde(rename = "type")]
    kind: String,
    /// Value: domain name, IP address or email address
    value: String,
}

impl Identifier {
    /// The `dns` identifier type
    pub const TYPE_DNS: &'static str = "dns";
    /// The `ip` identifier type
    pub const TYPE_IP: &'static str = "ip";
    /// The `email` identifier type of the S/MIME extension
    pub const TYPE_EMAIL: &'static str = "email";

    /// Create an identifier with an arbitrary type and value
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    /// Create a DNS identifier. The domain is normalized to ACE form.
    pub fn dns(domain: impl AsRef<str>) -> Result<Self> {
        Ok(Self::new(Self::TYPE_DNS, to_ace(domain.as_ref())?))
    }

    /// Create an IP identifier
    pub fn ip(addr: IpAddr) -> Self {
        Self::new(Self::TYPE_IP, addr.to_string())
    }

    /// Create an email identifier for S/MIME certificates
    pub fn email(email: impl Into<String>) -> Self {
        Self::new(Self::TYPE_EMAIL, email.into())
    }

    /// Identifier type
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Identifier value in canonical form
    pub fn value(&self) -> &str {
        &self.value
    }

    /// `true` if this is a DNS identifier
    pub fn is_dns(&self) -> bool {
        self.kind.eq_ignore_ascii_case(Self::TYPE_DNS)
    }

    /// `true` if this is an email identifier
    pub fn is_email(&self) -> bool {
        self.kind.eq_ignore_ascii_case(Self::TYPE_EMAIL)
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.kind.eq_ignore_ascii_case(&other.kind) && self.value == other.value
    }
}

impl std::hash::Hash for Identifier {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.kind.to_ascii_lowercase().hash(state);
        self.value.hash(state);
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind, self.value)
    }
}

/// Status of an ACME resource.
///
/// All resources share one status vocabulary; each resource only ever
/// reports the subset RFC 8555 defines for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Waiting for client action
    Pending,
    /// The server is processing a client action
    Processing,
    /// All authorizations are valid, the order awaits finalization
    Ready,
    /// Terminal success
    Valid,
    /// Terminal failure
    Invalid,
    /// The resource was revoked
    Revoked,
    /// The resource was deactivated by the client
    Deactivated,
    /// The resource expired before completion
    Expired,
    /// A status value this library does not know
    Unknown,
}

impl Status {
    /// Parse a status string; unrecognized values map to [`Status::Unknown`]
    pub fn parse(value: &str) -> Self {
        match value {
            "pending" => Status::Pending,
            "processing" => Status::Processing,
            "ready" => Status::Ready,
            "valid" => Status::Valid,
            "invalid" => Status::Invalid,
            "revoked" => Status::Revoked,
            "deactivated" => Status::Deactivated,
            "expired" => Status::Expired,
            _ => Status::Unknown,
        }
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Processing => "processing",
            Status::Ready => "ready",
            Status::Valid => "valid",
            Status::Invalid => "invalid",
            Status::Revoked => "revoked",
            Status::Deactivated => "deactivated",
            Status::Expired => "expired",
            Status::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Certificate revocation reason, RFC 5280 section 5.3.1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RevocationReason {
    /// Reason unspecified
    Unspecified = 0,
    /// Key compromise
    KeyCompromise = 1,
    /// CA compromise
    CaCompromise = 2,
    /// Affiliation changed
    AffiliationChanged = 3,
    /// Superseded
    Superseded = 4,
    /// Cessation of operation
    CessationOfOperation = 5,
    /// Certificate hold
    CertificateHold = 6,
    /// Remove from CRL
    RemoveFromCRL = 8,
    /// Privilege withdrawn
    PrivilegeWithdrawn = 9,
    /// AA compromise
    AACompromise = 10,
}

impl RevocationReason {
    /// Get the numeric value
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
