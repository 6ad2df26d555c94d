//! Identity Adapter
//!
//! Resolves an `X-API-Key` credential to a principal, grounded on the
//! teacher's `AuthenticatedApiKey` lookup in `api/middleware.rs` (SHA-256 hash
//! against the stored `key_hash`, with API-key scope checked via
//! `has_permission`).

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::store::{ApiKeyRow, Store};

/// The authenticated identity attached to a request, distinct from
/// `OperationContext` (which carries the correlation id/client ip alongside
/// it); kept separate so handlers that only need the API key's scope don't
/// have to thread the whole context through.
#[derive(Debug, Clone)]
pub struct Principal {
    pub api_key_id: Uuid,
    pub principal_id: Uuid,
    pub permissions: Vec<String>,
}

impl Principal {
    pub fn is_elevated(&self) -> bool {
        self.permissions.iter().any(|p| p == "admin")
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission || p == "admin")
    }
}

impl From<ApiKeyRow> for Principal {
    fn from(row: ApiKeyRow) -> Self {
        Self {
            api_key_id: row.id,
            principal_id: row.principal_id,
            permissions: row.permissions,
        }
    }
}

pub struct IdentityAdapter {
    store: Store,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("API key is invalid or unknown")]
    InvalidCredential,
    #[error("API key has been disabled")]
    Disabled,
}

impl IdentityAdapter {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Resolve a raw `X-API-Key` credential into a `Principal`. Hashes the
    /// presented key with SHA-256 and looks it up by digest, the same way
    /// `generate_api_key`/`auth_middleware` compare `encode(sha256(...))`
    /// rather than storing the key in plaintext.
    pub async fn resolve(&self, raw_key: &str) -> Result<Principal, IdentityError> {
        let key_hash = hash_key(raw_key);

        let row = self
            .store
            .find_api_key_by_hash(&key_hash)
            .await
            .map_err(|_| IdentityError::InvalidCredential)?
            .ok_or(IdentityError::InvalidCredential)?;

        if !row.is_active {
            return Err(IdentityError::Disabled);
        }

        let api_key_id = row.id;
        let principal = Principal::from(row);

        let _ = self.store.touch_api_key(api_key_id).await;

        Ok(principal)
    }
}

pub fn hash_key(raw_key: &str) -> String {
    format!("{:x}", Sha256::digest(raw_key.as_bytes()))
}

/// Generate a fresh API key plus its digest, following the format the
/// teacher's `generate_api_key()` uses: a random prefix for display purposes
/// and the full key hashed before it is ever persisted.
pub fn generate_api_key() -> (String, String, String) {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    let random_bytes: [u8; 24] = rng.gen();
    let key = format!("evt_live_{}", hex::encode(random_bytes));
    let prefix = key[..8].to_string();
    let hash = hash_key(&key);

    (key, prefix, hash)
}
