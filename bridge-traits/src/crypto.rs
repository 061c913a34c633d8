//! Token Encryption Abstraction
//!
//! The sync engine stores provider access tokens encrypted at rest but never
//! owns key material. Encryption and decryption are delegated to the host
//! application through the [`TokenCipher`] trait; the engine only moves
//! [`EncryptedSecret`] values between the database and the cipher.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// An encrypted secret as persisted alongside an integration record.
///
/// All components are opaque to the engine. `key_id` identifies which key
/// the cipher should use, supporting key rotation without re-encryption
/// sweeps inside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSecret {
    /// Encrypted payload, encoding decided by the cipher implementation
    pub ciphertext: String,
    /// Initialization vector used for this ciphertext
    pub iv: String,
    /// Authentication tag for authenticated encryption schemes
    pub tag: String,
    /// Identifier of the key that produced this ciphertext
    pub key_id: String,
}

/// Opaque encrypt/decrypt service for provider credentials.
///
/// Implementations may hold keys locally or delegate to a remote key
/// service; either way the engine never sees raw key material. Plaintext
/// values must never be logged.
#[async_trait]
pub trait TokenCipher: Send + Sync {
    /// Encrypt a plaintext secret
    ///
    /// # Errors
    ///
    /// Returns an error if the key identified by the cipher's current key id
    /// is unavailable or the encryption operation fails.
    async fn encrypt(&self, plaintext: &str) -> Result<EncryptedSecret>;

    /// Decrypt a previously encrypted secret
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unavailable, the ciphertext is
    /// malformed, or authentication fails.
    async fn decrypt(&self, secret: &EncryptedSecret) -> Result<String>;
}
