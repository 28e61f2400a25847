use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::decode;
use jsonwebtoken::decode_header;
use jsonwebtoken::Algorithm;
use jsonwebtoken::Validation;

use crate::claims::ActionsClaims;
use crate::clock::Clock;
use crate::config::VerifierConfig;
use crate::error::decode_error;
use crate::error::Error;
use crate::error::Result;
use crate::jwks_cache::KeyCache;
use crate::policy;
use crate::policy::EvaluationResult;
use crate::policy::Policy;

/// Only RSA PKCS#1 v1.5 signatures are accepted. Checking this before key resolution keeps
/// an HMAC token from being verified with the RSA public key as its secret.
const TRUSTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];

/// Trait for token verification
#[async_trait]
pub trait VerifyToken {
    /// Verify a token and authorize it against the configured policy
    async fn verify(&self, token: &str) -> Result<VerificationResult>;
}

/// A verified and authorized token
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub claims: ActionsClaims,
    /// The policy decision that allowed the token
    pub decision: EvaluationResult,
}

/// GitHub Actions OIDC token verifier with JWKS caching and policy evaluation
pub struct Verifier {
    key_cache: KeyCache,
    policy: Option<Policy>,
    issuer: String,
    audience: Option<String>,
    clock: Arc<dyn Clock>,
}

impl Verifier {
    /// Create a new verifier
    ///
    /// Fails if the configured policy is invalid, so a misconfigured policy never reaches
    /// request handling.
    pub fn new(config: VerifierConfig) -> Result<Self> {
        policy::validate(config.policy.as_ref())?;

        let client = config.build_http_client()?;

        Ok(Self {
            key_cache: KeyCache::new(
                config.jwks_url,
                config.jwks_cache_ttl,
                client,
                Arc::clone(&config.clock),
            ),
            policy: config.policy,
            issuer: config.issuer,
            audience: config.audience,
            clock: config.clock,
        })
    }

    pub fn key_cache(&self) -> &KeyCache {
        &self.key_cache
    }

    pub fn policy(&self) -> Option<&Policy> {
        self.policy.as_ref()
    }

    /// Check the signature and lifetime of the token and decode its claims
    async fn parse_token(&self, token: &str) -> Result<ActionsClaims> {
        let header = decode_header(token).map_err(|error| {
            tracing::debug!(%error, "Failed to decode token header");
            Error::InvalidToken(format!("malformed token: {error}"))
        })?;

        if !TRUSTED_ALGORITHMS.contains(&header.alg) {
            tracing::warn!(algorithm = ?header.alg, "Token signed with untrusted algorithm");
            return Err(Error::UnexpectedAlgorithm(header.alg));
        }

        let kid = header.kid.ok_or(Error::KeyIdMissing)?;
        let key = self.key_cache.resolve(&kid).await?;

        // Lifetime is checked against our own clock and the audience is optional, so
        // jsonwebtoken only verifies the signature and the presence of `exp`
        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        let token_data = decode::<ActionsClaims>(token, key.decoding_key(), &validation)
            .map_err(decode_error)?;

        self.check_lifetime(&token_data.claims)?;

        Ok(token_data.claims)
    }

    fn check_lifetime(&self, claims: &ActionsClaims) -> Result<()> {
        let now = self.clock.now().timestamp();

        if claims.exp <= now {
            return Err(Error::TokenExpired(claims.exp));
        }

        match claims.nbf {
            Some(nbf) if now < nbf => Err(Error::TokenNotYetValid(nbf)),
            _ => Ok(()),
        }
    }

    fn check_audience(&self, claims: &ActionsClaims) -> Result<()> {
        match &self.audience {
            Some(expected) if !claims.aud.contains(expected) => Err(Error::AudienceMismatch {
                expected: expected.clone(),
                actual: claims.aud.as_slice().to_vec(),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl VerifyToken for Verifier {
    async fn verify(&self, token: &str) -> Result<VerificationResult> {
        let claims = self.parse_token(token).await?;

        claims.validate(&self.issuer)?;
        self.check_audience(&claims)?;

        let decision = policy::evaluate(self.policy.as_ref(), &claims);
        if !decision.allowed {
            tracing::info!(
                repository = %claims.repository,
                git_ref = %claims.git_ref,
                actor = %claims.actor,
                reason = %decision.reason,
                "Token denied by policy"
            );
            return Err(Error::AccessDenied {
                matched_rule: decision.matched_rule,
                reason: decision.reason,
            });
        }

        tracing::debug!(
            repository = %claims.repository,
            reason = %decision.reason,
            "Token verified"
        );

        Ok(VerificationResult { claims, decision })
    }
}

/// Build a one-off verifier and verify a single token
///
/// Each call starts with an empty key cache, so long-lived callers should keep a
/// [`Verifier`] instead.
pub async fn verify_token(token: &str, config: VerifierConfig) -> Result<VerificationResult> {
    Verifier::new(config)?.verify(token).await
}
