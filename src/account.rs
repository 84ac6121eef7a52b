/// Account registration and management
use jiff::Timestamp;
use reqwest::StatusCode;
use serde_json::{Map, Value as JsonValue, json};
use url::Url;

use crate::authorization::Authorization;
use crate::claims::Claims;
use crate::crypto::jws;
use crate::crypto::keypair::KeyPair;
use crate::directory::Resource;
use crate::error::{AcmeError, Result};
use crate::order::OrderBuilder;
use crate::resource::ResourceState;
use crate::session::{Login, Session};
use crate::types::{Identifier, Status};

struct ExternalAccountBinding {
    key_identifier: String,
    mac_key: Vec<u8>,
    mac_algorithm: Option<String>,
}

/// Builder for registering an account, or for locating an existing one
#[derive(Default)]
pub struct AccountBuilder {
    contacts: Vec<Url>,
    terms_of_service_agreed: Option<bool>,
    only_existing: bool,
    key_pair: Option<KeyPair>,
    external_account_binding: Option<ExternalAccountBinding>,
}

impl AccountBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a contact URI, e.g. `mailto:admin@example.com`
    pub fn add_contact(mut self, contact: &str) -> Result<Self> {
        let contact = Url::parse(contact)
            .map_err(|err| AcmeError::unsupported(format!("invalid contact URI: {err}")))?;
        self.contacts.push(contact);
        Ok(self)
    }

    /// Add an email contact
    pub fn add_email(self, email: &str) -> Result<Self> {
        self.add_contact(&format!("mailto:{email}"))
    }

    /// Agree to the CA's terms of service
    pub fn agree_to_terms_of_service(mut self) -> Self {
        self.terms_of_service_agreed = Some(true);
        self
    }

    /// Only locate an existing account for the key pair; fail with
    /// `accountDoesNotExist` instead of registering a new one
    pub fn only_existing(mut self) -> Self {
        self.only_existing = true;
        self
    }

    /// The account key pair. Required.
    pub fn use_key_pair(mut self, key_pair: KeyPair) -> Self {
        self.key_pair = Some(key_pair);
        self
    }

    /// Attach an external account binding from a CA-issued key
    /// identifier and base64url encoded MAC key
    pub fn with_key_identifier(mut self, key_identifier: impl Into<String>, mac_key: &str) -> Result<Self> {
        let mac_key = crate::crypto::encoding::base64url_decode(mac_key)
            .map_err(|_| AcmeError::unsupported("MAC key is not valid base64url"))?;
        self.external_account_binding = Some(ExternalAccountBinding {
            key_identifier: key_identifier.into(),
            mac_key,
            mac_algorithm: None,
        });
        Ok(self)
    }

    /// Override the external account binding MAC algorithm. By default
    /// the algorithm is inferred from the key length.
    pub fn with_mac_algorithm(mut self, mac_algorithm: impl Into<String>) -> Self {
        if let Some(eab) = &mut self.external_account_binding {
            eab.mac_algorithm = Some(mac_algorithm.into());
        }
        self
    }

    /// Register the account (or locate the existing one) and return it
    pub fn create(self, session: &Session) -> Result<Account> {
        let key_pair = self
            .key_pair
            .ok_or_else(|| AcmeError::unsupported("an account key pair is required"))?;
        let url = session.resource_url(Resource::NewAccount)?;

        let mut claims = Map::new();
        if !self.contacts.is_empty() {
            let contacts: Vec<&str> = self.contacts.iter().map(Url::as_str).collect();
            claims.insert("contact".to_owned(), json!(contacts));
        }
        if let Some(agreed) = self.terms_of_service_agreed {
            claims.insert("termsOfServiceAgreed".to_owned(), json!(agreed));
        }
        if self.only_existing {
            claims.insert("onlyReturnExisting".to_owned(), json!(true));
        }
        if let Some(eab) = &self.external_account_binding {
            let algorithm = match &eab.mac_algorithm {
                Some(algorithm) => algorithm.as_str(),
                None => jws::mac_algorithm_for_key(&eab.mac_key),
            };
            claims.insert(
                "externalAccountBinding".to_owned(),
                jws::external_account_binding(
                    &eab.key_identifier,
                    &eab.mac_key,
                    algorithm,
                    &key_pair,
                    &url,
                )?,
            );
        }

        let mut conn = session.connect()?;
        conn.send_signed_request_with_key(&url, &JsonValue::Object(claims), session, &key_pair)?;
        let location = conn.location_required()?;
        tracing::info!(
            account = %location,
            existing = conn.status() != StatusCode::CREATED,
            "account registration complete"
        );
        let json = conn.read_json()?;
        let login = session.login(location, key_pair);
        Ok(Account::with_json(login, json))
    }

    /// Register the account and return a login for it
    pub fn create_login(self, session: &Session) -> Result<Login> {
        self.create(session).map(|account| account.login().clone())
    }
}

/// An ACME account resource
#[derive(Debug)]
pub struct Account {
    login: Login,
    resource: ResourceState,
}

impl Account {
    pub(crate) fn new(login: Login) -> Self {
        let location = login.account_location().clone();
        Self {
            login,
            resource: ResourceState::new(location),
        }
    }

    pub(crate) fn with_json(login: Login, json: Claims) -> Self {
        let location = login.account_location().clone();
        Self {
            login,
            resource: ResourceState::with_json(location, json),
        }
    }

    /// The login of this account
    pub fn login(&self) -> &Login {
        &self.login
    }

    /// The account URL
    pub fn location(&self) -> &Url {
        self.resource.location()
    }

    /// Re-fetch the account resource
    pub fn fetch(&mut self) -> Result<()> {
        self.resource.fetch(&self.login)
    }

    fn json(&mut self) -> Result<&Claims> {
        self.resource.load(&self.login)
    }

    /// Account status: valid, deactivated or revoked
    pub fn status(&mut self) -> Result<Status> {
        self.json()?.get("status").required()?.as_status()
    }

    /// The registered contact URIs
    pub fn contacts(&mut self) -> Result<Vec<Url>> {
        match self.json()?.get("contact").optional() {
            Some(contacts) => contacts.as_array()?.iter().map(|v| v.as_uri()).collect(),
            None => Ok(Vec::new()),
        }
    }

    /// Whether the account holder agreed to the terms of service
    pub fn terms_of_service_agreed(&mut self) -> Result<Option<bool>> {
        self.json()?
            .get("termsOfServiceAgreed")
            .optional()
            .map(|v| v.as_bool())
            .transpose()
    }

    /// The URL of the account's orders list, if the CA provides one
    pub fn orders_url(&mut self) -> Result<Option<Url>> {
        self.json()?
            .get("orders")
            .optional()
            .map(|v| v.as_url())
            .transpose()
    }

    /// The external account binding registered with the account, if any
    pub fn external_account_binding(&mut self) -> Result<Option<Claims>> {
        self.json()?
            .get("externalAccountBinding")
            .optional()
            .map(|v| v.as_object())
            .transpose()
    }

    /// Start building a new certificate order
    pub fn new_order(&self) -> OrderBuilder {
        OrderBuilder::new(self.login.clone())
    }

    /// Pre-authorize an identifier via the optional `newAuthz` endpoint.
    /// Fails with `NotSupported` when the CA does not offer
    /// pre-authorization.
    pub fn pre_authorize(&mut self, identifier: Identifier) -> Result<Authorization> {
        let url = self.login.session().resource_url(Resource::NewAuthz)?;
        let claims = json!({ "identifier": identifier });
        let mut conn = self.login.session().connect()?;
        conn.send_signed_request(&url, &claims, &self.login)?;
        let location = conn.location_required()?;
        let json = conn.read_json()?;
        Ok(Authorization::with_json(self.login.clone(), location, json))
    }

    /// Pre-authorize a domain name
    pub fn pre_authorize_domain(&mut self, domain: &str) -> Result<Authorization> {
        self.pre_authorize(Identifier::dns(domain)?)
    }

    /// Start modifying the account's mutable attributes
    pub fn modify(&mut self) -> AccountUpdate<'_> {
        AccountUpdate {
            account: self,
            contacts: Vec::new(),
        }
    }

    /// Deactivate the account. This is terminal.
    pub fn deactivate(&mut self) -> Result<()> {
        let url = self.resource.location().clone();
        let claims = json!({ "status": "deactivated" });
        let mut conn = self.login.session().connect()?;
        conn.send_signed_request(&url, &claims, &self.login)?;
        self.resource.set_json(conn.read_json()?);
        tracing::info!(account = %url, "account deactivated");
        Ok(())
    }

    /// Roll over to a new account key pair.
    ///
    /// Posts an inner JWS signed with the new key to `keyChange`; on
    /// success the login signs all future requests with the new key.
    pub fn change_key(&mut self, new_key: KeyPair) -> Result<()> {
        let key_change_url = self.login.session().resource_url(Resource::KeyChange)?;
        let old_key = self.login.key_pair();
        let inner = jws::key_change(
            &key_change_url,
            self.login.account_location(),
            &old_key,
            &new_key,
        )?;
        let mut conn = self.login.session().connect()?;
        conn.send_signed_request(&key_change_url, &inner, &self.login)?;
        self.login.replace_key_pair(new_key);
        tracing::info!(account = %self.login.account_location(), "account key rolled over");
        Ok(())
    }

    /// Creation timestamp reported by the server, if any
    pub fn created_at(&mut self) -> Result<Option<Timestamp>> {
        self.json()?
            .get("createdAt")
            .optional()
            .map(|v| v.as_instant())
            .transpose()
    }
}

/// Pending changes to an account; RFC 8555 only allows updating the
/// contact list
pub struct AccountUpdate<'a> {
    account: &'a mut Account,
    contacts: Vec<Url>,
}

impl AccountUpdate<'_> {
    /// Add a contact URI to the replacement contact list
    pub fn add_contact(mut self, contact: &str) -> Result<Self> {
        let contact = Url::parse(contact)
            .map_err(|err| AcmeError::unsupported(format!("invalid contact URI: {err}")))?;
        self.contacts.push(contact);
        Ok(self)
    }

    /// Add an email contact to the replacement contact list
    pub fn add_email(self, email: &str) -> Result<Self> {
        self.add_contact(&format!("mailto:{email}"))
    }

    /// Send the update and refresh the account from the response
    pub fn commit(self) -> Result<()> {
        let contacts: Vec<&str> = self.contacts.iter().map(Url::as_str).collect();
        let claims = json!({ "contact": contacts });
        let url = self.account.resource.location().clone();
        let mut conn = self.account.login.session().connect()?;
        conn.send_signed_request(&url, &claims, &self.account.login)?;
        self.account.resource.set_json(conn.read_json()?);
        Ok(())
    }
}
