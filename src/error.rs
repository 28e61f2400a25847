use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::Algorithm;
use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("invalid token: missing 'kid' in the token header")]
    KeyIdMissing,
    #[error("invalid token: {0} claim is required")]
    MissingClaim(&'static str),
    #[error("token expired: expiration timestamp {0}")]
    TokenExpired(i64),
    #[error("token not valid yet: not before timestamp {0}")]
    TokenNotYetValid(i64),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("invalid signature: unexpected signing algorithm {0:?}")]
    UnexpectedAlgorithm(Algorithm),
    #[error("invalid issuer: expected {expected}, got {actual}")]
    WrongIssuer { expected: String, actual: String },
    #[error("invalid audience: expected {expected}, got {actual:?}")]
    AudienceMismatch {
        expected: String,
        actual: Vec<String>,
    },
    #[error("access denied by policy: {reason}")]
    AccessDenied {
        matched_rule: Option<String>,
        reason: String,
    },
    #[error("failed to fetch JWKS: {0}")]
    KeySetFetch(#[from] FetchError),
    #[error("signing key not found: key ID {0:?} is not in the JWKS")]
    KeyNotFound(String),
    #[error(transparent)]
    InvalidPolicy(#[from] PolicyError),
}

/// Why a JWKS refresh failed
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("HTTP {0}")]
    Status(StatusCode),
    #[error("malformed response body: {0}")]
    MalformedBody(#[source] serde_json::Error),
}

/// A policy that cannot be used, reported when the verifier is built
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("policy error: policy must have at least one rule")]
    NoRules,
    #[error("policy error in rule {rule:?}: effect must be 'allow' or 'deny', got {effect:?}")]
    InvalidEffect { rule: String, effect: String },
    #[error("policy error in rule {rule:?}: rule must have at least one condition")]
    NoConditions { rule: String },
    #[error("policy error: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl PolicyError {
    /// Name of the offending rule, or its `rule[<index>]` label when it has no name
    pub fn rule(&self) -> Option<&str> {
        match self {
            Self::InvalidEffect { rule, .. } | Self::NoConditions { rule } => Some(rule),
            Self::NoRules | Self::Malformed(_) => None,
        }
    }
}

/// Stable category of an [`Error`], independent of its message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidToken,
    TokenExpired,
    TokenNotYetValid,
    InvalidSignature,
    InvalidAudience,
    InvalidIssuer,
    AccessDenied,
    KeySetFetch,
    KeyNotFound,
    InvalidPolicy,
}

/// What a caller should do about a failed verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// The key set could not be fetched; the same token may verify later
    RetryLater,
    /// The token will never be accepted
    Reject,
    /// The verifier configuration must be fixed
    Reconfigure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidToken => "invalid_token",
            Self::TokenExpired => "token_expired",
            Self::TokenNotYetValid => "token_not_yet_valid",
            Self::InvalidSignature => "invalid_signature",
            Self::InvalidAudience => "invalid_audience",
            Self::InvalidIssuer => "invalid_issuer",
            Self::AccessDenied => "access_denied",
            Self::KeySetFetch => "jwks_fetch",
            Self::KeyNotFound => "key_not_found",
            Self::InvalidPolicy => "invalid_policy",
        }
    }

    pub fn disposition(self) -> Disposition {
        match self {
            Self::KeySetFetch => Disposition::RetryLater,
            Self::InvalidPolicy => Disposition::Reconfigure,
            _ => Disposition::Reject,
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidToken(_) | Self::KeyIdMissing | Self::MissingClaim(_) => {
                ErrorKind::InvalidToken
            }
            Self::TokenExpired(_) => ErrorKind::TokenExpired,
            Self::TokenNotYetValid(_) => ErrorKind::TokenNotYetValid,
            Self::InvalidSignature(_) | Self::UnexpectedAlgorithm(_) => {
                ErrorKind::InvalidSignature
            }
            Self::WrongIssuer { .. } => ErrorKind::InvalidIssuer,
            Self::AudienceMismatch { .. } => ErrorKind::InvalidAudience,
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::KeySetFetch(_) => ErrorKind::KeySetFetch,
            Self::KeyNotFound(_) => ErrorKind::KeyNotFound,
            Self::InvalidPolicy(_) => ErrorKind::InvalidPolicy,
        }
    }

    pub fn disposition(&self) -> Disposition {
        self.kind().disposition()
    }

    /// Whether the same token might verify on a later attempt
    pub fn is_retryable(&self) -> bool {
        self.disposition() == Disposition::RetryLater
    }
}

pub(crate) fn transport_error(error: reqwest::Error) -> Error {
    Error::KeySetFetch(FetchError::Transport(error))
}

pub(crate) fn status_error(status: StatusCode) -> Error {
    Error::KeySetFetch(FetchError::Status(status))
}

pub(crate) fn malformed_key_set_error(error: serde_json::Error) -> Error {
    Error::KeySetFetch(FetchError::MalformedBody(error))
}

/// Map a `jsonwebtoken` decode failure into the crate taxonomy
pub(crate) fn decode_error(error: jsonwebtoken::errors::Error) -> Error {
    match error.kind() {
        JwtErrorKind::InvalidSignature
        | JwtErrorKind::InvalidAlgorithm
        | JwtErrorKind::InvalidAlgorithmName
        | JwtErrorKind::MissingAlgorithm
        | JwtErrorKind::InvalidRsaKey(_)
        | JwtErrorKind::InvalidKeyFormat => Error::InvalidSignature(error.to_string()),
        _ => Error::InvalidToken(error.to_string()),
    }
}
