/// Session and login handles binding the client to one ACME server
use std::cell::RefCell;
use std::rc::Rc;

use jiff::Timestamp;
use reqwest::StatusCode;
use url::Url;

use crate::account::Account;
use crate::authorization::Authorization;
use crate::certificate::Certificate;
use crate::challenge::Challenge;
use crate::crypto::keypair::KeyPair;
use crate::directory::{Directory, DirectoryMeta, Resource};
use crate::error::{AcmeError, Result};
use crate::order::Order;
use crate::provider::{AcmeProvider, default_providers, find_provider};
use crate::transport::{Connection, NetworkSettings};

#[derive(Debug)]
struct SessionState {
    locale: Option<String>,
    network: NetworkSettings,
    nonce: Option<String>,
    directory: Option<Directory>,
    directory_last_modified: Option<Timestamp>,
    directory_expires: Option<Timestamp>,
}

struct SessionInner {
    server_uri: Url,
    provider: Rc<dyn AcmeProvider>,
    state: RefCell<SessionState>,
}

impl std::fmt::Debug for SessionInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionInner")
            .field("server_uri", &self.server_uri)
            .field("state", &self.state)
            .finish()
    }
}

/// A session with one ACME server.
///
/// The session owns the directory cache and the single-slot replay
/// nonce. Cloning is cheap and yields a handle to the same session.
/// Sessions are deliberately not thread-safe; use one session per
/// thread when concurrency is needed.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Rc<SessionInner>,
}

impl Session {
    /// Create a session for a server URI, using the default provider
    /// registry
    pub fn new(server_uri: &str) -> Result<Self> {
        Self::builder(server_uri)?.build()
    }

    /// Start building a session with custom providers, locale or
    /// network settings
    pub fn builder(server_uri: &str) -> Result<SessionBuilder> {
        let server_uri = Url::parse(server_uri)
            .map_err(|err| AcmeError::unsupported(format!("invalid server URI: {err}")))?;
        Ok(SessionBuilder {
            server_uri,
            providers: default_providers(),
            locale: None,
            network: NetworkSettings::default(),
        })
    }

    /// The opaque server URI this session was created with
    pub fn server_uri(&self) -> &Url {
        &self.inner.server_uri
    }

    /// The provider serving this session
    pub fn provider(&self) -> Rc<dyn AcmeProvider> {
        Rc::clone(&self.inner.provider)
    }

    /// The locale sent as `Accept-Language`, if any
    pub fn locale(&self) -> Option<String> {
        self.inner.state.borrow().locale.clone()
    }

    /// Set the locale used for localized problem details
    pub fn set_locale(&self, locale: Option<String>) {
        self.inner.state.borrow_mut().locale = locale;
    }

    /// The network settings of this session
    pub fn network_settings(&self) -> NetworkSettings {
        self.inner.state.borrow().network.clone()
    }

    /// Replace the network settings
    pub fn set_network_settings(&self, settings: NetworkSettings) {
        self.inner.state.borrow_mut().network = settings;
    }

    /// The currently stored replay nonce, if any
    pub fn nonce(&self) -> Option<String> {
        self.inner.state.borrow().nonce.clone()
    }

    /// Consume the stored replay nonce
    pub(crate) fn take_nonce(&self) -> Option<String> {
        self.inner.state.borrow_mut().nonce.take()
    }

    /// Store a replay nonce, replacing any previous one
    pub(crate) fn set_nonce(&self, nonce: String) {
        self.inner.state.borrow_mut().nonce = Some(nonce);
    }

    /// Open a new connection to the server
    pub fn connect(&self) -> Result<Connection> {
        self.inner
            .provider
            .connect(&self.inner.server_uri, &self.network_settings())
    }

    /// The server's directory, fetched or revalidated as needed.
    ///
    /// A cached directory is returned without network traffic until its
    /// `Expires` hint passes; after that a conditional GET revalidates
    /// it.
    pub fn directory(&self) -> Result<Directory> {
        self.ensure_directory()?;
        let state = self.inner.state.borrow();
        Ok(state.directory.clone().expect("directory was just cached"))
    }

    fn ensure_directory(&self) -> Result<()> {
        let (cached, last_modified, expires) = {
            let state = self.inner.state.borrow();
            (
                state.directory.is_some(),
                state.directory_last_modified,
                state.directory_expires,
            )
        };
        if cached && expires.is_some_and(|expiry| expiry > Timestamp::now()) {
            return Ok(());
        }

        let url = self.inner.provider.resolve(&self.inner.server_uri)?;
        tracing::debug!(url = %url, revalidate = cached, "fetching directory");
        let mut conn = self.connect()?;
        let if_modified_since = if cached { last_modified } else { None };
        let status = conn.send_request(&url, self, if_modified_since)?;

        let mut state = self.inner.state.borrow_mut();
        if status == StatusCode::NOT_MODIFIED {
            if state.directory.is_none() {
                return Err(AcmeError::protocol("304 response without a cached directory"));
            }
            if let Some(last_modified) = conn.last_modified() {
                state.directory_last_modified = Some(last_modified);
            }
            state.directory_expires = conn.expires();
        } else {
            let claims = conn.read_json()?;
            let directory: Directory = serde_json::from_value(claims.to_value())
                .map_err(|err| AcmeError::protocol(format!("invalid directory: {err}")))?;
            state.directory = Some(directory);
            state.directory_last_modified = conn.last_modified();
            state.directory_expires = conn.expires();
        }
        Ok(())
    }

    /// The URL of a well-known directory resource
    pub fn resource_url(&self, resource: Resource) -> Result<Url> {
        Ok(self.directory()?.url(resource)?.clone())
    }

    /// The server metadata from the directory's `meta` object
    pub fn metadata(&self) -> Result<DirectoryMeta> {
        Ok(self.directory()?.meta())
    }

    /// Bind an account URL and key pair into a login. No network traffic
    /// is caused; the account is fetched lazily.
    pub fn login(&self, account_location: Url, key_pair: KeyPair) -> Login {
        Login::new(self.clone(), account_location, key_pair)
    }
}

/// Builder for a [`Session`]
pub struct SessionBuilder {
    server_uri: Url,
    providers: Vec<Rc<dyn AcmeProvider>>,
    locale: Option<String>,
    network: NetworkSettings,
}

impl SessionBuilder {
    /// Replace the provider registry. Providers are consulted in order;
    /// the first whose `accepts` matches the server URI wins.
    pub fn providers(mut self, providers: Vec<Rc<dyn AcmeProvider>>) -> Self {
        self.providers = providers;
        self
    }

    /// Set the locale for localized problem details
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Set the network settings
    pub fn network_settings(mut self, settings: NetworkSettings) -> Self {
        self.network = settings;
        self
    }

    /// Resolve the provider and build the session
    pub fn build(self) -> Result<Session> {
        let provider = find_provider(&self.providers, &self.server_uri)?;
        Ok(Session {
            inner: Rc::new(SessionInner {
                server_uri: self.server_uri,
                provider,
                state: RefCell::new(SessionState {
                    locale: self.locale,
                    network: self.network,
                    nonce: None,
                    directory: None,
                    directory_last_modified: None,
                    directory_expires: None,
                }),
            }),
        })
    }
}

#[derive(Debug)]
struct LoginInner {
    session: Session,
    account_location: Url,
    key_pair: RefCell<Rc<KeyPair>>,
}

/// A session bound to an account URL and its key pair.
///
/// Resources created through a login use it to sign their requests.
/// Cloning is cheap and yields a handle to the same login, so a key
/// rollover is visible to every resource created from it.
#[derive(Debug, Clone)]
pub struct Login {
    inner: Rc<LoginInner>,
}

impl Login {
    /// Bind a session, account URL and account key pair together
    pub fn new(session: Session, account_location: Url, key_pair: KeyPair) -> Self {
        Self {
            inner: Rc::new(LoginInner {
                session,
                account_location,
                key_pair: RefCell::new(Rc::new(key_pair)),
            }),
        }
    }

    /// The session this login belongs to
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// The account URL
    pub fn account_location(&self) -> &Url {
        &self.inner.account_location
    }

    /// The current account key pair
    pub fn key_pair(&self) -> Rc<KeyPair> {
        Rc::clone(&self.inner.key_pair.borrow())
    }

    /// Swap in a new account key pair after a successful rollover
    pub(crate) fn replace_key_pair(&self, key_pair: KeyPair) {
        *self.inner.key_pair.borrow_mut() = Rc::new(key_pair);
    }

    /// The account resource of this login
    pub fn account(&self) -> Account {
        Account::new(self.clone())
    }

    /// Re-attach a persisted order URL
    pub fn bind_order(&self, location: Url) -> Order {
        Order::new(self.clone(), location)
    }

    /// Re-attach a persisted authorization URL
    pub fn bind_authorization(&self, location: Url) -> Authorization {
        Authorization::new(self.clone(), location)
    }

    /// Re-attach a persisted certificate URL
    pub fn bind_certificate(&self, location: Url) -> Certificate {
        Certificate::new(self.clone(), location)
    }

    /// Re-attach a persisted challenge URL. The challenge is fetched to
    /// learn its type.
    pub fn bind_challenge(&self, location: Url) -> Result<Challenge> {
        let mut conn = self.session().connect()?;
        conn.send_signed_post_as_get(&location, self)?;
        let claims = conn.read_json()?;
        self.session().provider().create_challenge(self, claims)
    }
}
