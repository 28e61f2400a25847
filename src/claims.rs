use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::Result;

/// Issuer of GitHub Actions OIDC tokens on github.com
pub const GITHUB_ACTIONS_ISSUER: &str = "https://token.actions.githubusercontent.com";

/// Audience claim, which tokens carry either as a single string or as an array
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    #[default]
    None,
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        self.as_slice().iter().any(|aud| aud == audience)
    }

    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::None => &[],
            Self::Single(aud) => std::slice::from_ref(aud),
            Self::Multiple(auds) => auds,
        }
    }
}

/// Claims of a GitHub Actions OIDC token
///
/// Missing string claims deserialize as empty so that [`ActionsClaims::validate`] can report
/// which required claim is absent instead of failing the whole decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsClaims {
    /// Issuer
    pub iss: String,
    /// Subject, e.g. `repo:octo-org/octo-repo:ref:refs/heads/main`
    pub sub: String,
    pub aud: Audience,
    /// Expiration time as Unix timestamp
    pub exp: i64,
    /// Issued at, as Unix timestamp
    pub iat: Option<i64>,
    /// Not before, as Unix timestamp
    pub nbf: Option<i64>,
    pub jti: Option<String>,

    pub repository: String,
    pub repository_owner: String,
    pub repository_owner_id: String,
    /// `public`, `private` or `internal`
    pub repository_visibility: String,
    pub repository_id: String,

    /// Git ref that triggered the run, e.g. `refs/heads/main`
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// `branch` or `tag`
    pub ref_type: String,
    pub sha: String,

    /// Workflow name
    pub workflow: String,
    pub workflow_ref: String,
    pub workflow_sha: String,
    pub job_workflow_ref: String,
    pub job_workflow_sha: String,
    /// Event that triggered the run, e.g. `push` or `pull_request`
    pub event_name: String,
    pub run_id: String,
    pub run_number: String,
    pub run_attempt: String,
    /// `github-hosted` or `self-hosted`
    pub runner_environment: String,

    pub actor: String,
    pub actor_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggering_actor: Option<String>,

    /// Deployment environment, only present for jobs that reference one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_slug: Option<String>,
}

impl ActionsClaims {
    /// Check the issuer and the presence of the claims every Actions token must carry
    pub fn validate(&self, expected_issuer: &str) -> Result<()> {
        if self.iss != expected_issuer {
            return Err(Error::WrongIssuer {
                expected: expected_issuer.to_string(),
                actual: self.iss.clone(),
            });
        }

        let required = [
            ("repository", &self.repository),
            ("repository_owner", &self.repository_owner),
            ("ref", &self.git_ref),
            ("workflow", &self.workflow),
            ("event_name", &self.event_name),
            ("actor", &self.actor),
        ];

        match required.into_iter().find(|(_, value)| value.is_empty()) {
            Some((claim, _)) => Err(Error::MissingClaim(claim)),
            None => Ok(()),
        }
    }

    /// Deployment environment, treating an empty claim as absent
    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref().filter(|env| !env.is_empty())
    }
}
