//! HTTP smoke-test probes.
//!
//! After activation the deployer requests a handful of known endpoints, both
//! directly against the application port and through the web-server front
//! end. Probe failures never abort a deployment; they are reported as
//! warnings in the summary.

use crate::config::ProbeTarget;
use serde::Serialize;
use std::time::Duration;

/// Trait for issuing a single HTTP probe.
///
/// Abstractions allow tests to simulate responses without network access.
#[cfg_attr(test, mockall::automock)]
pub trait HttpProber {
    /// Requests `url` and returns the HTTP status code.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] if the request cannot be completed or the
    /// server answers with an error status.
    fn probe(&self, url: &str) -> Result<u16, ProbeError>;
}

/// Errors arising from a probe request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// The server responded with a non-success status.
    #[error("{url} answered HTTP {status}")]
    Status {
        /// The URL that was requested.
        url: String,
        /// Status code returned.
        status: u16,
    },

    /// The request failed before a response arrived.
    #[error("{url} unreachable: {reason}")]
    Unreachable {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },
}

/// HTTP prober backed by `ureq`.
pub struct UreqProber {
    agent: ureq::Agent,
}

impl UreqProber {
    /// Creates a prober whose requests give up after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl HttpProber for UreqProber {
    fn probe(&self, url: &str) -> Result<u16, ProbeError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        Ok(response.status().as_u16())
    }
}

/// Map a ureq error to a [`ProbeError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> ProbeError {
    match err {
        ureq::Error::StatusCode(status) => ProbeError::Status {
            url: url.to_owned(),
            status: *status,
        },
        other => ProbeError::Unreachable {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

/// Outcome of one probe, kept for the summary and receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeOutcome {
    /// Label of the probe.
    pub name: String,
    /// URL requested.
    pub url: String,
    /// Status code, when a response arrived.
    pub status: Option<u16>,
    /// Failure description, when the probe did not succeed.
    pub error: Option<String>,
}

impl ProbeOutcome {
    /// Returns `true` for a 2xx response.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.status.is_some_and(|code| (200..300).contains(&code))
    }
}

/// Runs every probe in order and collects the outcomes.
pub fn run_probes(prober: &dyn HttpProber, targets: &[ProbeTarget]) -> Vec<ProbeOutcome> {
    targets
        .iter()
        .map(|target| match prober.probe(&target.url) {
            Ok(status) => ProbeOutcome {
                name: target.name.clone(),
                url: target.url.clone(),
                status: Some(status),
                error: None,
            },
            Err(err) => ProbeOutcome {
                name: target.name.clone(),
                url: target.url.clone(),
                status: match &err {
                    ProbeError::Status { status, .. } => Some(*status),
                    ProbeError::Unreachable { .. } => None,
                },
                error: Some(err.to_string()),
            },
        })
        .collect()
}
