//! # gha-oidc
//!
//! Verification of GitHub Actions OIDC tokens with claim-based access policies.
//!
//! A workflow requests an ID token from GitHub and presents it to your service. This crate
//! checks that the token was signed by GitHub, that it is current and meant for you, and then
//! decides from its claims (repository, ref, workflow, actor, environment, ...) whether the
//! workflow may proceed.
//!
//! ## Features
//!
//! - RS256/RS384/RS512 signature verification against GitHub's published JWKS
//! - JWKS caching with a TTL and on-demand refresh for rotated keys
//! - Issuer, audience, expiration and required-claim validation
//! - Ordered allow/deny rules with `*` and `**` glob patterns, first match wins
//! - Typed errors with a stable [`ErrorKind`] for programmatic handling
//!
//! ## Example
//!
//! ```rust,no_run
//! use gha_oidc::{Conditions, Policy, Rule, Verifier, VerifierConfig, VerifyToken};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let policy = Policy::new(
//!         vec![Rule::allow(
//!             "main-branch-pushes",
//!             Conditions {
//!                 repository: vec!["myorg/*".into()],
//!                 git_ref: vec!["refs/heads/main".into()],
//!                 ..Default::default()
//!             },
//!         )],
//!         true,
//!     );
//!
//!     let config = VerifierConfig::new()
//!         .with_audience("https://github.com/myorg")
//!         .with_policy(policy);
//!     let verifier = Verifier::new(config)?;
//!
//!     let token = "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9...";
//!     let result = verifier.verify(token).await?;
//!
//!     println!("Repository: {}", result.claims.repository);
//!     println!("Decision: {}", result.decision.reason);
//!
//!     Ok(())
//! }
//! ```

mod claims;
mod clock;
mod config;
mod error;
mod jwks_cache;
pub mod matcher;
pub mod policy;
mod verifier;

// Re-exports for public API
pub use claims::ActionsClaims;
pub use claims::Audience;
pub use claims::GITHUB_ACTIONS_ISSUER;
pub use clock::Clock;
pub use clock::SystemClock;
pub use config::VerifierConfig;
pub use config::DEFAULT_JWKS_URL;
pub use error::Disposition;
pub use error::Error;
pub use error::ErrorKind;
pub use error::FetchError;
pub use error::PolicyError;
pub use error::Result;
pub use jwks_cache::KeyCache;
pub use jwks_cache::SigningKey;
pub use policy::Conditions;
pub use policy::Effect;
pub use policy::EvaluationResult;
pub use policy::Policy;
pub use policy::Rule;
pub use verifier::verify_token;
pub use verifier::VerificationResult;
pub use verifier::Verifier;
pub use verifier::VerifyToken;
