/// Shared behavior of URL-identified ACME resources: lazy fetching,
/// retry-after capture and polling
use std::time::{Duration, Instant};

use jiff::Timestamp;
use url::Url;

use crate::claims::Claims;
use crate::error::{AcmeError, Result};
use crate::session::Login;

/// Smallest sleep between polls when the server gave a retry hint
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// First backoff step when no retry hint is given
pub(crate) const INITIAL_POLL_DELAY: Duration = Duration::from_secs(3);
/// Backoff ceiling
const MAX_POLL_DELAY: Duration = Duration::from_secs(30);

/// State common to all resources: the identifying URL, the most
/// recently fetched JSON, and the fetch metadata
#[derive(Debug)]
pub(crate) struct ResourceState {
    location: Url,
    json: Option<Claims>,
    retry_after: Option<Timestamp>,
}

impl ResourceState {
    pub(crate) fn new(location: Url) -> Self {
        Self {
            location,
            json: None,
            retry_after: None,
        }
    }

    pub(crate) fn with_json(location: Url, json: Claims) -> Self {
        Self {
            location,
            json: Some(json),
            retry_after: None,
        }
    }

    pub(crate) fn location(&self) -> &Url {
        &self.location
    }

    pub(crate) fn retry_after(&self) -> Option<Timestamp> {
        self.retry_after
    }

    pub(crate) fn set_json(&mut self, json: Claims) {
        self.json = Some(json);
    }

    /// Re-fetch the resource with a POST-as-GET and replace the cached
    /// JSON
    pub(crate) fn fetch(&mut self, login: &Login) -> Result<()> {
        let mut conn = login.session().connect()?;
        conn.send_signed_post_as_get(&self.location, login)?;
        self.retry_after = conn.retry_after();
        self.json = Some(conn.read_json()?);
        Ok(())
    }

    /// The cached JSON, fetching it first if necessary. Errors from the
    /// implied fetch are wrapped in [`AcmeError::LazyLoad`].
    pub(crate) fn load(&mut self, login: &Login) -> Result<&Claims> {
        if self.json.is_none() {
            self.fetch(login).map_err(AcmeError::lazy)?;
        }
        Ok(self.json.as_ref().expect("resource was just fetched"))
    }
}

/// Compute the next polling delay: the server's retry hint when given,
/// otherwise the exponential backoff, which is advanced
pub(crate) fn poll_delay(retry_after: Option<Timestamp>, backoff: &mut Duration) -> Duration {
    match retry_after {
        Some(hint) => {
            let remaining = hint.duration_since(Timestamp::now());
            let remaining = Duration::try_from(remaining).unwrap_or(Duration::ZERO);
            remaining.max(MIN_POLL_INTERVAL)
        }
        None => {
            let delay = *backoff;
            *backoff = (*backoff * 2).min(MAX_POLL_DELAY);
            delay
        }
    }
}

/// Sleep for `delay`, failing with [`AcmeError::Deadline`] when the
/// sleep would cross the deadline
pub(crate) fn sleep_within_deadline(delay: Duration, deadline: Instant, what: &str) -> Result<()> {
    let now = Instant::now();
    if now + delay >= deadline {
        return Err(AcmeError::Deadline(what.to_owned()));
    }
    tracing::debug!(delay_ms = delay.as_millis() as u64, what, "waiting before next poll");
    std::thread::sleep(delay);
    Ok(())
}
