//! Management credential hashing.

use std::fmt;

use hmac::{Hmac, Mac, digest::InvalidLength};
use rand::{RngCore, rngs::OsRng};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const MAX_INPUT_LEN: usize = 4096;
const SALT_LEN: usize = 16;

/// Fills a buffer with cryptographically secure random bytes.
pub type EntropySource = fn(&mut [u8]) -> Result<(), rand::Error>;

pub fn os_entropy(buffer: &mut [u8]) -> Result<(), rand::Error> {
    OsRng.try_fill_bytes(buffer)
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("secure random source unavailable")]
    CryptoUnavailable(#[source] rand::Error),
    #[error("credential input exceeds {MAX_INPUT_LEN} bytes")]
    InputTooLong,
    #[error("hmac key rejected")]
    InvalidKey(#[from] InvalidLength),
}

/// HMAC-SHA256 of `parts` under `key`, hex encoded.
pub fn keyed_hash(key: &[u8], parts: &[&[u8]]) -> Result<String, AuthError> {
    let mut mac = HmacSha256::new_from_slice(key)?;
    for part in parts {
        mac.update(part);
    }
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Salted hash of the management password, computed once at startup.
#[derive(Clone)]
pub struct Credentials {
    hash: String,
    salt: [u8; SALT_LEN],
    realm: String,
}

impl Credentials {
    /// Hash `password` under a fresh random salt. `realm` (the blog title) is
    /// mixed into the hash.
    pub fn from_password(password: &str, realm: &str) -> Result<Self, AuthError> {
        Self::from_password_with(password, realm, os_entropy)
    }

    pub fn from_password_with(
        password: &str,
        realm: &str,
        entropy: EntropySource,
    ) -> Result<Self, AuthError> {
        let mut salt = [0u8; SALT_LEN];
        entropy(&mut salt).map_err(AuthError::CryptoUnavailable)?;
        let hash = hash_password(password, realm, &salt)?;
        Ok(Self {
            hash,
            salt,
            realm: realm.to_string(),
        })
    }

    /// Constant-time comparison of `candidate` against the stored hash.
    pub fn verify(&self, candidate: &str) -> bool {
        match hash_password(candidate, &self.realm, &self.salt) {
            Ok(hashed) => hashed.as_bytes().ct_eq(self.hash.as_bytes()).into(),
            Err(_) => false,
        }
    }

    /// Server secret that session tokens are derived from.
    pub fn session_seed(&self) -> &str {
        &self.hash
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("realm", &self.realm)
            .finish_non_exhaustive()
    }
}

fn hash_password(password: &str, realm: &str, salt: &[u8]) -> Result<String, AuthError> {
    if password.len() > MAX_INPUT_LEN {
        return Err(AuthError::InputTooLong);
    }
    keyed_hash(salt, &[password.as_bytes(), realm.as_bytes()])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_salt(buffer: &mut [u8]) -> Result<(), rand::Error> {
        buffer.copy_from_slice(&[7u8; SALT_LEN]);
        Ok(())
    }

    fn no_entropy(_buffer: &mut [u8]) -> Result<(), rand::Error> {
        Err(rand::Error::new(std::io::Error::other("entropy exhausted")))
    }

    #[test]
    fn keyed_hash_is_deterministic_and_key_dependent() {
        let a = keyed_hash(b"key", &[b"message"]).expect("hash");
        assert_eq!(a, keyed_hash(b"key", &[b"message"]).expect("hash"));
        assert_ne!(a, keyed_hash(b"other", &[b"message"]).expect("hash"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn keyed_hash_accepts_keys_of_any_length() {
        assert!(keyed_hash(b"", &[b"message"]).is_ok());
        assert!(keyed_hash(&[9u8; 512], &[b"message"]).is_ok());
    }

    #[test]
    fn verify_accepts_only_the_original_password() {
        let credentials =
            Credentials::from_password_with("hunter2", "Microblog", fixed_salt).expect("creds");
        assert!(credentials.verify("hunter2"));
        assert!(!credentials.verify("hunter3"));
        assert!(!credentials.verify(""));
        assert!(!credentials.verify(&"x".repeat(MAX_INPUT_LEN + 1)));
    }

    #[test]
    fn hash_depends_on_salt() {
        let salted = Credentials::from_password_with("pw", "Microblog", fixed_salt).expect("a");
        let random = Credentials::from_password("pw", "Microblog").expect("b");
        assert_ne!(salted.session_seed(), random.session_seed());
    }

    #[test]
    fn missing_entropy_is_reported() {
        let err = Credentials::from_password_with("pw", "Microblog", no_entropy)
            .expect_err("no entropy");
        assert!(matches!(err, AuthError::CryptoUnavailable(_)));
    }

    #[test]
    fn debug_output_hides_the_hash() {
        let credentials =
            Credentials::from_password_with("pw", "Microblog", fixed_salt).expect("creds");
        let rendered = format!("{credentials:?}");
        assert!(!rendered.contains(credentials.session_seed()));
    }
}
