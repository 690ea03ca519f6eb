//! Fixture keys and a ready-made [`Auth`].
//!
//! The `testdata/keys` folder holds the public halves named `<kid>.pem`,
//! the layout [`KeyStore::load_from_dir`] expects. `testdata/private`
//! holds the matching signing keys.

use std::path::PathBuf;
use std::sync::Arc;

use gatehouse_auth::{Auth, AuthConfig, KeyStore, VerificationKey};

use crate::error::TestResult;

/// Key id of the primary fixture key.
pub const PRIMARY_KID: &str = "54bb2165-71e1-41a6-af3e-7da4a0e1e2c1";

/// Key id of the secondary fixture key.
pub const SECONDARY_KID: &str = "0b8d6c0e-3a9f-4c52-9e0d-6f4f2a7c1d11";

/// Public PEM of the primary key.
pub const PRIMARY_PUBLIC_PEM: &str = include_str!("../testdata/keys/54bb2165-71e1-41a6-af3e-7da4a0e1e2c1.pem");

/// Public PEM of the secondary key.
pub const SECONDARY_PUBLIC_PEM: &str = include_str!("../testdata/keys/0b8d6c0e-3a9f-4c52-9e0d-6f4f2a7c1d11.pem");

/// Private PEM of the primary key.
pub const PRIMARY_PRIVATE_PEM: &str = include_str!("../testdata/private/54bb2165-71e1-41a6-af3e-7da4a0e1e2c1.pem");

/// Private PEM of the secondary key.
pub const SECONDARY_PRIVATE_PEM: &str =
    include_str!("../testdata/private/0b8d6c0e-3a9f-4c52-9e0d-6f4f2a7c1d11.pem");

/// The fixture public key folder.
pub fn keys_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata").join("keys")
}

/// A store holding only the primary key.
pub fn primary_key_store() -> TestResult<KeyStore> {
    Ok(KeyStore::from_keys([VerificationKey::from_rsa_pem(
        PRIMARY_KID,
        PRIMARY_PUBLIC_PEM,
    )?]))
}

/// A store holding both fixture keys.
pub fn key_store() -> TestResult<KeyStore> {
    Ok(KeyStore::from_keys([
        VerificationKey::from_rsa_pem(PRIMARY_KID, PRIMARY_PUBLIC_PEM)?,
        VerificationKey::from_rsa_pem(SECONDARY_KID, SECONDARY_PUBLIC_PEM)?,
    ]))
}

/// [`Auth`] over `keys` with the default configuration.
pub fn auth_with(keys: Arc<KeyStore>) -> TestResult<Auth> {
    Ok(Auth::new(AuthConfig::default(), keys)?)
}

/// [`Auth`] over [`primary_key_store`].
pub fn auth() -> TestResult<Auth> {
    auth_with(Arc::new(primary_key_store()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_dir_loads_both_keys() {
        let store = KeyStore::load_from_dir(keys_dir()).unwrap();
        let mut kids = store.kids();
        kids.sort();
        assert_eq!(kids, vec![SECONDARY_KID.to_string(), PRIMARY_KID.to_string()]);
    }
}
