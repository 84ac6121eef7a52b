/// ACME directory resource and server metadata
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AcmeError, Result};

/// Well-known directory resource keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// `newNonce` endpoint
    NewNonce,
    /// `newAccount` endpoint
    NewAccount,
    /// `newOrder` endpoint
    NewOrder,
    /// Optional `newAuthz` endpoint for pre-authorization
    NewAuthz,
    /// `revokeCert` endpoint
    RevokeCert,
    /// `keyChange` endpoint
    KeyChange,
}

impl Resource {
    /// The JSON key of this resource in the directory document
    pub fn key(&self) -> &'static str {
        match self {
            Resource::NewNonce => "newNonce",
            Resource::NewAccount => "newAccount",
            Resource::NewOrder => "newOrder",
            Resource::NewAuthz => "newAuthz",
            Resource::RevokeCert => "revokeCert",
            Resource::KeyChange => "keyChange",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// The directory document advertised by an ACME server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Directory {
    /// New nonce endpoint
    #[serde(rename = "newNonce", skip_serializing_if = "Option::is_none")]
    pub new_nonce: Option<Url>,

    /// New account endpoint
    #[serde(rename = "newAccount", skip_serializing_if = "Option::is_none")]
    pub new_account: Option<Url>,

    /// New order endpoint
    #[serde(rename = "newOrder", skip_serializing_if = "Option::is_none")]
    pub new_order: Option<Url>,

    /// Pre-authorization endpoint, not offered by every CA
    #[serde(rename = "newAuthz", skip_serializing_if = "Option::is_none")]
    pub new_authz: Option<Url>,

    /// Certificate revocation endpoint
    #[serde(rename = "revokeCert", skip_serializing_if = "Option::is_none")]
    pub revoke_cert: Option<Url>,

    /// Key rollover endpoint
    #[serde(rename = "keyChange", skip_serializing_if = "Option::is_none")]
    pub key_change: Option<Url>,

    /// Directory metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<DirectoryMeta>,
}

impl Directory {
    /// The URL of a well-known resource, or `NotSupported` when the CA
    /// does not advertise that endpoint
    pub fn url(&self, resource: Resource) -> Result<&Url> {
        let url = match resource {
            Resource::NewNonce => &self.new_nonce,
            Resource::NewAccount => &self.new_account,
            Resource::NewOrder => &self.new_order,
            Resource::NewAuthz => &self.new_authz,
            Resource::RevokeCert => &self.revoke_cert,
            Resource::KeyChange => &self.key_change,
        };
        url.as_ref()
            .ok_or_else(|| AcmeError::not_supported(resource.key()))
    }

    /// The directory metadata, empty if the server sent none
    pub fn meta(&self) -> DirectoryMeta {
        self.meta.clone().unwrap_or_default()
    }
}

/// Directory metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryMeta {
    /// Terms of Service document
    #[serde(rename = "termsOfService", skip_serializing_if = "Option::is_none")]
    pub terms_of_service: Option<Url>,

    /// Website of the CA
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<Url>,

    /// CAA identities of the CA
    #[serde(rename = "caaIdentities", default, skip_serializing_if = "Vec::is_empty")]
    pub caa_identities: Vec<String>,

    /// Whether `newAccount` requires an external account binding
    #[serde(
        rename = "externalAccountRequired",
        skip_serializing_if = "Option::is_none"
    )]
    pub external_account_required: Option<bool>,

    /// Certificate profiles selectable at order creation, mapping name
    /// to description
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profiles: BTreeMap<String, String>,

    /// Short-term automatic renewal settings (RFC 8739)
    #[serde(rename = "auto-renewal", skip_serializing_if = "Option::is_none")]
    pub auto_renewal: Option<AutoRenewal>,
}

impl DirectoryMeta {
    /// `true` if `newAccount` requires an external account binding
    pub fn external_account_required(&self) -> bool {
        self.external_account_required.unwrap_or(false)
    }

    /// `true` if the CA offers the named certificate profile
    pub fn has_profile(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }
}

/// STAR auto-renewal settings from the directory metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoRenewal {
    /// Minimum certificate lifetime accepted, in seconds
    #[serde(rename = "min-lifetime", skip_serializing_if = "Option::is_none")]
    pub min_lifetime: Option<u64>,

    /// Maximum delegation period, in seconds
    #[serde(rename = "max-duration", skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<u64>,

    /// Whether unauthenticated GET of the certificate is allowed
    #[serde(
        rename = "allow-certificate-get",
        skip_serializing_if = "Option::is_none"
    )]
    pub allow_certificate_get: Option<bool>,
}
