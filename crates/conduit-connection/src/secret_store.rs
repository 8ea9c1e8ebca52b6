//! Credential storage behind the host's secret facility
//!
//! All credentials live in a SINGLE keychain entry holding a JSON map from
//! connection id to a serialized `Credential`. One entry means one OS
//! permission prompt instead of one per connection.
//!
//! The store adds no cryptography of its own; confidentiality at rest is the
//! keychain's job. Blob contents are never logged.

use async_trait::async_trait;
use conduit_core::{ConduitError, Credential, Result, run_blocking};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use zeroize::Zeroizing;

/// Service name used for the keychain entry
pub const SERVICE_NAME: &str = "dev.conduit.connections";

/// Account name for the single keychain entry that stores all credentials
pub const ACCOUNT_NAME: &str = "credentials";

/// Id-keyed credential storage
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn store(&self, id: Uuid, credential: &Credential) -> Result<()>;

    /// Stored credential, or `None` when absent or unreadable
    async fn get(&self, id: Uuid) -> Result<Option<Credential>>;

    /// Remove the entry; deleting an absent id is not an error
    async fn delete(&self, id: Uuid) -> Result<()>;

    async fn has(&self, id: Uuid) -> Result<bool>;
}

fn encode_blob(credential: &Credential) -> Result<Zeroizing<String>> {
    serde_json::to_string(credential)
        .map(Zeroizing::new)
        .map_err(|e| ConduitError::Secret(format!("Failed to serialize credential: {}", e)))
}

/// Parse one stored blob; a corrupt blob reads as absent
fn decode_blob(id: Uuid, blob: &str) -> Option<Credential> {
    match serde_json::from_str(blob) {
        Ok(credential) => Some(credential),
        Err(e) => {
            tracing::warn!(connection_id = %id, error = %e, "stored credential is malformed, treating as absent");
            None
        }
    }
}

/// Set or clear one cached entry, then persist the whole map
///
/// When `save` fails the entry is restored to its previous value, so the
/// cache never reports a credential the keychain does not hold.
fn commit_entry(
    map: &mut HashMap<String, String>,
    key: String,
    value: Option<String>,
    save: impl FnOnce(&HashMap<String, String>) -> Result<()>,
) -> Result<()> {
    let previous = match value {
        Some(value) => map.insert(key.clone(), value),
        None => map.remove(&key),
    };
    if let Err(e) = save(map) {
        match previous {
            Some(previous) => map.insert(key, previous),
            None => map.remove(&key),
        };
        return Err(e);
    }
    if let Some(previous) = previous {
        drop(Zeroizing::new(previous));
    }
    Ok(())
}

/// Secret store backed by the OS keychain
///
/// The map is loaded lazily on first access so that constructing the store
/// never triggers a keychain prompt.
pub struct KeyringSecretStore {
    inner: Arc<KeyringMap>,
}

struct KeyringMap {
    service: String,
    account: String,
    cache: RwLock<Option<HashMap<String, String>>>,
}

impl KeyringSecretStore {
    pub fn new() -> Self {
        Self::with_entry(SERVICE_NAME, ACCOUNT_NAME)
    }

    /// Use a custom keychain entry
    pub fn with_entry(service: impl Into<String>, account: impl Into<String>) -> Self {
        tracing::debug!("secret store initialized (credentials loaded on demand)");
        Self {
            inner: Arc::new(KeyringMap {
                service: service.into(),
                account: account.into(),
                cache: RwLock::new(None),
            }),
        }
    }
}

impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringMap {
    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| ConduitError::Secret(format!("Failed to open keychain entry: {}", e)))
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        match self.entry()?.get_password() {
            Ok(json) => {
                let json = Zeroizing::new(json);
                let map: HashMap<String, String> = serde_json::from_str(&json).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "keychain credential map is malformed, starting empty");
                    HashMap::new()
                });
                tracing::debug!(count = map.len(), "loaded credentials from keychain");
                Ok(map)
            }
            Err(keyring::Error::NoEntry) => {
                tracing::debug!("no credentials in keychain yet");
                Ok(HashMap::new())
            }
            Err(e) => Err(ConduitError::Secret(format!("Failed to read keychain: {}", e))),
        }
    }

    fn save(&self, map: &HashMap<String, String>) -> Result<()> {
        let entry = self.entry()?;
        if map.is_empty() {
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => tracing::warn!(error = %e, "failed to delete empty keychain entry"),
            }
            return Ok(());
        }

        let json = Zeroizing::new(serde_json::to_string(map).map_err(|e| {
            ConduitError::Secret(format!("Failed to serialize credential map: {}", e))
        })?);
        entry
            .set_password(&json)
            .map_err(|e| ConduitError::Secret(format!("Failed to write keychain: {}", e)))?;
        tracing::debug!(count = map.len(), "saved credentials to keychain");
        Ok(())
    }

    fn with_map<T>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> Result<T>) -> Result<T> {
        let mut cache = self.cache.write();
        if cache.is_none() {
            *cache = Some(self.load()?);
        }
        f(cache.get_or_insert_with(HashMap::new))
    }

    fn put(&self, id: Uuid, blob: Zeroizing<String>) -> Result<()> {
        self.with_map(|map| {
            commit_entry(map, id.to_string(), Some(blob.to_string()), |m| self.save(m))
        })
    }

    fn fetch(&self, id: Uuid) -> Result<Option<Credential>> {
        self.with_map(|map| Ok(map.get(&id.to_string()).and_then(|blob| decode_blob(id, blob))))
    }

    fn remove(&self, id: Uuid) -> Result<()> {
        self.with_map(|map| {
            let key = id.to_string();
            if !map.contains_key(&key) {
                return Ok(());
            }
            commit_entry(map, key, None, |m| self.save(m))
        })
    }
}

#[async_trait]
impl SecretStore for KeyringSecretStore {
    async fn store(&self, id: Uuid, credential: &Credential) -> Result<()> {
        let blob = encode_blob(credential)?;
        let inner = self.inner.clone();
        run_blocking("keychain write", move || inner.put(id, blob)).await?;
        tracing::debug!(connection_id = %id, "stored credential");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Credential>> {
        let inner = self.inner.clone();
        run_blocking("keychain read", move || inner.fetch(id)).await
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let inner = self.inner.clone();
        run_blocking("keychain delete", move || inner.remove(id)).await?;
        tracing::debug!(connection_id = %id, "deleted credential");
        Ok(())
    }

    async fn has(&self, id: Uuid) -> Result<bool> {
        let inner = self.inner.clone();
        run_blocking("keychain read", move || {
            inner.with_map(|map| Ok(map.contains_key(&id.to_string())))
        })
        .await
    }
}

/// Process-local secret store for tests and headless runs
#[derive(Default)]
pub struct MemorySecretStore {
    blobs: RwLock<HashMap<Uuid, Zeroizing<String>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    #[cfg(test)]
    pub(crate) fn insert_raw(&self, id: Uuid, blob: &str) {
        self.blobs.write().insert(id, Zeroizing::new(blob.to_string()));
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn store(&self, id: Uuid, credential: &Credential) -> Result<()> {
        let blob = encode_blob(credential)?;
        self.blobs.write().insert(id, blob);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Credential>> {
        Ok(self
            .blobs
            .read()
            .get(&id)
            .and_then(|blob| decode_blob(id, blob)))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.blobs.write().remove(&id);
        Ok(())
    }

    async fn has(&self, id: Uuid) -> Result<bool> {
        Ok(self.blobs.read().contains_key(&id))
    }
}

#[cfg(test)]
mod tests;
