/// Authorization resources and challenge selection
use std::time::{Duration, Instant};

use jiff::Timestamp;
use serde_json::json;
use url::Url;

use crate::challenge::Challenge;
use crate::claims::Claims;
use crate::error::Result;
use crate::resource::{INITIAL_POLL_DELAY, ResourceState, poll_delay, sleep_within_deadline};
use crate::session::Login;
use crate::types::{Identifier, Status};

/// An ACME authorization resource: one identifier and the challenges
/// that can prove control over it
pub struct Authorization {
    login: Login,
    resource: ResourceState,
}

impl Authorization {
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

    /// The authorization URL
    pub fn location(&self) -> &Url {
        self.resource.location()
    }

    /// Re-fetch the authorization resource
    pub fn fetch(&mut self) -> Result<()> {
        self.resource.fetch(&self.login)
    }

    fn json(&mut self) -> Result<&Claims> {
        self.resource.load(&self.login)
    }

    /// The identifier this authorization is about
    pub fn identifier(&mut self) -> Result<Identifier> {
        self.json()?.get("identifier").required()?.as_identifier()
    }

    /// Authorization status
    pub fn status(&mut self) -> Result<Status> {
        self.json()?.get("status").required()?.as_status()
    }

    /// When the authorization expires
    pub fn expires(&mut self) -> Result<Option<Timestamp>> {
        self.json()?
            .get("expires")
            .optional()
            .map(|v| v.as_instant())
            .transpose()
    }

    /// `true` if this authorization is for a wildcard domain
    pub fn wildcard(&mut self) -> Result<bool> {
        self.json()?
            .get("wildcard")
            .optional()
            .map(|v| v.as_bool())
            .transpose()
            .map(|wildcard| wildcard.unwrap_or(false))
    }

    /// All challenges offered for this authorization, typed via the
    /// session's provider
    pub fn challenges(&mut self) -> Result<Vec<Challenge>> {
        let login = self.login.clone();
        let provider = login.session().provider();
        let json = self.resource.load(&login)?;
        json.get("challenges")
            .required()?
            .as_array()?
            .iter()
            .map(|v| provider.create_challenge(&login, v.as_object()?))
            .collect()
    }

    /// The first challenge of the given type, or `None` when the server
    /// does not offer it
    pub fn find_challenge(&mut self, challenge_type: &str) -> Result<Option<Challenge>> {
        Ok(self
            .challenges()?
            .into_iter()
            .find(|challenge| challenge.challenge_type() == challenge_type))
    }

    /// Deactivate this authorization
    pub fn deactivate(&mut self) -> Result<()> {
        let url = self.resource.location().clone();
        let claims = json!({ "status": "deactivated" });
        let mut conn = self.login.session().connect()?;
        conn.send_signed_request(&url, &claims, &self.login)?;
        self.resource.set_json(conn.read_json()?);
        tracing::info!(authorization = %url, "authorization deactivated");
        Ok(())
    }

    /// Poll until the authorization reaches a terminal state
    pub fn wait_for_completion(&mut self, timeout: Duration) -> Result<Status> {
        let terminal = [
            Status::Valid,
            Status::Invalid,
            Status::Deactivated,
            Status::Expired,
            Status::Revoked,
        ];
        let deadline = Instant::now() + timeout;
        let mut backoff = INITIAL_POLL_DELAY;
        loop {
            self.fetch()?;
            let status = self.status()?;
            if terminal.contains(&status) {
                return Ok(status);
            }
            let delay = poll_delay(self.resource.retry_after(), &mut backoff);
            sleep_within_deadline(delay, deadline, "authorization to complete")?;
        }
    }
}
