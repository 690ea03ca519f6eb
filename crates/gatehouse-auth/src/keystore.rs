//! Verification keys indexed by key identifier.
//!
//! Keys live on disk as `<kid>.pem` files holding RSA public keys. The whole
//! key set sits behind an [`ArcSwap`]: readers take a snapshot without
//! locking, and rotation builds a complete replacement map before publishing
//! it in one store. A reader never sees a half-loaded folder.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use jsonwebtoken::DecodingKey;

use crate::error::{AuthError, AuthResult};

const PEM_EXTENSION: &str = "pem";

/// Resolves a key identifier to a verification key.
pub trait KeyLookup: Send + Sync {
    /// Returns the key for `kid`, or `None` if there is no such key.
    fn lookup(&self, kid: &str) -> Option<Arc<VerificationKey>>;
}

/// An RSA public key ready for signature verification.
#[derive(Clone)]
pub struct VerificationKey {
    kid: String,
    pem: String,
    decoding: DecodingKey,
}

impl VerificationKey {
    /// Parses an RSA public key in PEM form.
    pub fn from_rsa_pem(kid: impl Into<String>, pem: impl Into<String>) -> AuthResult<Self> {
        let kid = kid.into();
        let pem = pem.into();
        let decoding = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| AuthError::key_load(&kid, format!("invalid RSA public key: {e}")))?;
        Ok(Self { kid, pem, decoding })
    }

    /// Key identifier.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// PEM text, as handed to the authentication rule.
    #[must_use]
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Key in the form the verifier consumes.
    #[must_use]
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

type KeyMap = HashMap<String, Arc<VerificationKey>>;

/// Read-mostly key store with atomic whole-set replacement.
///
/// # Example
///
/// ```no_run
/// use gatehouse_auth::{KeyLookup, KeyStore};
///
/// # fn example() -> Result<(), gatehouse_auth::AuthError> {
/// let store = KeyStore::load_from_dir("zarf/keys")?;
/// let key = store.lookup("54bb2165-71e1-41a6-af3e-7da4a0e1e2c1");
///
/// // Later, after new key files are dropped into the folder:
/// store.reload_from_dir("zarf/keys")?;
/// # Ok(())
/// # }
/// ```
pub struct KeyStore {
    keys: ArcSwap<KeyMap>,
}

impl KeyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Creates a store holding `keys`.
    pub fn from_keys(keys: impl IntoIterator<Item = VerificationKey>) -> Self {
        let store = Self::new();
        store.replace(keys);
        store
    }

    /// Loads every `<kid>.pem` file in `dir`.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> AuthResult<Self> {
        let store = Self::new();
        store.reload_from_dir(dir)?;
        Ok(store)
    }

    /// Rebuilds the key set from `dir` and swaps it in.
    ///
    /// On error the current key set stays in place. Returns the number of keys
    /// now active.
    pub fn reload_from_dir(&self, dir: impl AsRef<Path>) -> AuthResult<usize> {
        let keys = read_key_dir(dir.as_ref())?;
        let count = keys.len();
        self.keys.store(Arc::new(keys));
        Ok(count)
    }

    /// Replaces the whole key set.
    pub fn replace(&self, keys: impl IntoIterator<Item = VerificationKey>) {
        let map: KeyMap = keys
            .into_iter()
            .map(|key| (key.kid.clone(), Arc::new(key)))
            .collect();
        self.keys.store(Arc::new(map));
    }

    /// Publishes a copy of the current set with `key` added or replaced.
    pub fn rotate_in(&self, key: VerificationKey) {
        let key = Arc::new(key);
        self.keys.rcu(|current| {
            let mut next = KeyMap::clone(current);
            next.insert(key.kid.clone(), Arc::clone(&key));
            next
        });
    }

    /// Publishes a copy of the current set without `kid`.
    pub fn retire(&self, kid: &str) {
        self.keys.rcu(|current| {
            let mut next = KeyMap::clone(current);
            next.remove(kid);
            next
        });
    }

    /// Sorted key identifiers.
    #[must_use]
    pub fn kids(&self) -> Vec<String> {
        let mut kids: Vec<String> = self.keys.load().keys().cloned().collect();
        kids.sort();
        kids
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.load().len()
    }

    /// Returns `true` if the store has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.load().is_empty()
    }
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore").field("kids", &self.kids()).finish()
    }
}

impl KeyLookup for KeyStore {
    fn lookup(&self, kid: &str) -> Option<Arc<VerificationKey>> {
        self.keys.load().get(kid).cloned()
    }
}

fn read_key_dir(dir: &Path) -> AuthResult<KeyMap> {
    let entries = fs::read_dir(dir).map_err(|e| AuthError::key_load(dir, e.to_string()))?;

    let mut keys = KeyMap::new();
    for entry in entries {
        let path = entry
            .map_err(|e| AuthError::key_load(dir, e.to_string()))?
            .path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(PEM_EXTENSION) {
            continue;
        }
        let Some(kid) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let pem = fs::read_to_string(&path).map_err(|e| AuthError::key_load(&path, e.to_string()))?;
        let key = VerificationKey::from_rsa_pem(kid, pem)
            .map_err(|e| AuthError::key_load(&path, e.to_string()))?;
        keys.insert(kid.to_string(), Arc::new(key));
    }
    Ok(keys)
}
