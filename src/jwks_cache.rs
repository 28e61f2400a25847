use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::DateTime;
use chrono::Utc;
use jsonwebtoken::DecodingKey;
use reqwest::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::error::malformed_key_set_error;
use crate::error::status_error;
use crate::error::transport_error;
use crate::error::Error;
use crate::error::Result;

const RSA_KEY_TYPE: &str = "RSA";

/// JWKS document as served by the provider
///
/// Individual keys are kept loosely typed so one bad entry does not fail the whole document.
#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<RawJwk>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawJwk {
    kty: String,
    kid: String,
    n: String,
    e: String,
}

#[derive(Debug, Error)]
enum KeyParseError {
    #[error("missing key ID")]
    MissingKeyId,
    #[error("failed to decode {component}: {source}")]
    Decode {
        component: &'static str,
        source: base64::DecodeError,
    },
    #[error("{0} is empty")]
    Empty(&'static str),
}

/// RSA public key from the provider's JWKS
#[derive(Clone)]
pub struct SigningKey {
    key_id: String,
    modulus: Vec<u8>,
    exponent: Vec<u8>,
    decoding_key: DecodingKey,
}

impl SigningKey {
    fn from_jwk(jwk: &RawJwk) -> std::result::Result<Self, KeyParseError> {
        if jwk.kid.is_empty() {
            return Err(KeyParseError::MissingKeyId);
        }

        let modulus = decode_component("n", &jwk.n)?;
        let exponent = decode_component("e", &jwk.e)?;

        Ok(Self {
            key_id: jwk.kid.clone(),
            decoding_key: DecodingKey::from_rsa_raw_components(&modulus, &exponent),
            modulus,
            exponent,
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Big-endian modulus without leading zero bytes
    pub fn modulus(&self) -> &[u8] {
        &self.modulus
    }

    /// Big-endian public exponent without leading zero bytes
    pub fn exponent(&self) -> &[u8] {
        &self.exponent
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .field("modulus_bits", &(self.modulus.len() * 8))
            .finish_non_exhaustive()
    }
}

/// Decode an unpadded base64url big-endian integer
fn decode_component(
    component: &'static str,
    encoded: &str,
) -> std::result::Result<Vec<u8>, KeyParseError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|source| KeyParseError::Decode { component, source })?;

    let significant = bytes
        .iter()
        .position(|&byte| byte != 0)
        .ok_or(KeyParseError::Empty(component))?;

    Ok(bytes[significant..].to_vec())
}

/// Immutable view of the key set from one successful fetch
struct KeySnapshot {
    keys: HashMap<String, Arc<SigningKey>>,
    fetched_at: DateTime<Utc>,
}

impl KeySnapshot {
    fn from_document(document: JwksDocument, fetched_at: DateTime<Utc>) -> Self {
        let mut keys = HashMap::with_capacity(document.keys.len());

        for jwk in document.keys {
            if jwk.kty != RSA_KEY_TYPE {
                tracing::debug!(kid = %jwk.kid, kty = %jwk.kty, "Ignoring non-RSA key");
                continue;
            }

            match SigningKey::from_jwk(&jwk) {
                Ok(key) => {
                    keys.insert(key.key_id.clone(), Arc::new(key));
                }
                Err(error) => {
                    tracing::warn!(kid = %jwk.kid, %error, "Skipping malformed JWKS entry");
                }
            }
        }

        Self { keys, fetched_at }
    }

    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        // A clock that moved backwards leaves the snapshot fresh
        match now.signed_duration_since(self.fetched_at).to_std() {
            Ok(age) => age >= ttl,
            Err(_) => false,
        }
    }
}

/// Cache for the provider's JWKS with time-based expiry
///
/// The key set is refreshed on demand: when a requested key ID is missing or the cached set
/// is older than the TTL. Each refresh installs a new snapshot; readers never observe a
/// partially populated set. Concurrent refreshes are collapsed into one fetch.
pub struct KeyCache {
    url: String,
    client: Client,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    snapshot: RwLock<Option<Arc<KeySnapshot>>>,
    refresh_gate: Mutex<()>,
}

impl KeyCache {
    /// Create an empty cache for the JWKS at `url`
    pub fn new(url: impl Into<String>, ttl: Duration, client: Client, clock: Arc<dyn Clock>) -> Self {
        Self {
            url: url.into(),
            client,
            ttl,
            clock,
            snapshot: RwLock::new(None),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Resolve a key ID to its public key, fetching the JWKS if needed
    pub async fn resolve(&self, key_id: &str) -> Result<Arc<SigningKey>> {
        let observed = self.current().await;

        let stale_key = match &observed {
            Some(snapshot) => {
                let key = snapshot.keys.get(key_id);
                if !snapshot.is_expired(self.clock.now(), self.ttl) {
                    if let Some(key) = key {
                        tracing::debug!(kid = key_id, "JWKS cache hit");
                        return Ok(Arc::clone(key));
                    }
                }
                key.cloned()
            }
            None => None,
        };

        let snapshot = match self.refresh_after(observed.as_ref()).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                return match stale_key {
                    Some(key) => {
                        tracing::warn!(kid = key_id, %error, "JWKS refresh failed, using stale key");
                        Ok(key)
                    }
                    None => Err(error),
                };
            }
        };

        snapshot
            .keys
            .get(key_id)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(key_id.to_string()))
    }

    /// Time of the last successful refresh
    pub async fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.current().await.map(|snapshot| snapshot.fetched_at)
    }

    /// Number of usable keys in the current snapshot
    pub async fn len(&self) -> usize {
        self.current()
            .await
            .map_or(0, |snapshot| snapshot.keys.len())
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn current(&self) -> Option<Arc<KeySnapshot>> {
        self.snapshot.read().await.clone()
    }

    /// Refresh unless another caller replaced `observed` while we waited for the gate
    async fn refresh_after(&self, observed: Option<&Arc<KeySnapshot>>) -> Result<Arc<KeySnapshot>> {
        let _gate = self.refresh_gate.lock().await;

        if let Some(current) = self.current().await {
            let unchanged = observed.is_some_and(|seen| Arc::ptr_eq(seen, &current));
            if !unchanged {
                tracing::debug!("JWKS refreshed by a concurrent caller");
                return Ok(current);
            }
        }

        self.refresh().await
    }

    /// Fetch the JWKS and install it as the current snapshot
    async fn refresh(&self) -> Result<Arc<KeySnapshot>> {
        let document = self.fetch_jwks().await?;
        let snapshot = Arc::new(KeySnapshot::from_document(document, self.clock.now()));

        tracing::debug!(url = %self.url, keys = snapshot.keys.len(), "JWKS refreshed");

        *self.snapshot.write().await = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    async fn fetch_jwks(&self) -> Result<JwksDocument> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(status_error(status));
        }

        let body = response.bytes().await.map_err(transport_error)?;
        serde_json::from_slice(&body).map_err(malformed_key_set_error)
    }
}
