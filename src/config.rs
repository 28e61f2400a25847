use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::claims::GITHUB_ACTIONS_ISSUER;
use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::error::transport_error;
use crate::error::Result;
use crate::policy::Policy;

/// JWKS endpoint of the GitHub Actions OIDC provider
pub const DEFAULT_JWKS_URL: &str = "https://token.actions.githubusercontent.com/.well-known/jwks";

const DEFAULT_JWKS_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Configuration for the token verifier
///
/// Every setting has a default, so `VerifierConfig::default()` verifies github.com tokens
/// without checking the audience and without a policy.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Access policy evaluated after the token is verified; `None` allows every valid token
    pub(crate) policy: Option<Policy>,
    /// Audience the token must carry; `None` skips the check
    pub(crate) audience: Option<String>,
    /// Expected `iss` claim
    pub(crate) issuer: String,
    /// Where the signing keys are published
    pub(crate) jwks_url: String,
    /// Time-to-live for cached JWKS (default: 1 hour)
    pub(crate) jwks_cache_ttl: Duration,
    /// Optional custom HTTP client for fetching JWKS
    /// If not provided, a client with a 10 second timeout is created
    pub(crate) http_client: Option<Client>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            policy: None,
            audience: None,
            issuer: GITHUB_ACTIONS_ISSUER.to_string(),
            jwks_url: DEFAULT_JWKS_URL.to_string(),
            jwks_cache_ttl: Duration::from_secs(DEFAULT_JWKS_CACHE_TTL_SECS),
            http_client: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl VerifierConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the policy that decides whether a verified token is authorized
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Require the token's audience claim to contain this value
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Override the expected issuer, e.g. for GitHub Enterprise Server
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Fetch signing keys from a custom JWKS URL; an empty URL keeps the default
    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        if !url.is_empty() {
            self.jwks_url = url;
        }
        self
    }

    /// Set the JWKS cache TTL; a zero TTL keeps the default
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        if !ttl.is_zero() {
            self.jwks_cache_ttl = ttl;
        }
        self
    }

    /// Set a custom HTTP client
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Use a custom time source for cache expiry and token lifetime checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) fn build_http_client(&self) -> Result<Client> {
        match &self.http_client {
            Some(client) => Ok(client.clone()),
            None => Client::builder()
                .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
                .build()
                .map_err(transport_error),
        }
    }
}
