//! Password hashing and session token primitives.
//!
//! - Argon2id for password hashing (PHC strings with an embedded salt)
//! - 32 random bytes, base64url encoded, for session tokens
//! - Keyed BLAKE3 digests of tokens for the session lookup table

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core},
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::errors::AuthError;
use crate::config::{HashingConfig, SecretKey};

/// Random bytes in a session token.
pub const TOKEN_BYTES: usize = 32;

/// Context string for deriving the token digest key from the secret key.
const TOKEN_KEY_CONTEXT: &str = "strongbox 2024 session token digest v1";

fn argon2(params: &HashingConfig) -> Result<Argon2<'static>, AuthError> {
    let params = Params::new(params.memory_kib, params.iterations, params.parallelism, None)
        .map_err(|e| AuthError::HashingFailed {
            reason: e.to_string(),
        })?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password using Argon2id with a fresh random salt.
///
/// # Returns
/// A tuple of (password_hash, salt_string) where:
/// - password_hash is the Argon2 hash string (PHC format)
/// - salt_string is the random salt used (base64 encoded string)
pub fn hash_password(
    password: impl AsRef<str>,
    params: &HashingConfig,
) -> Result<(String, String), AuthError> {
    let salt = SaltString::generate(&mut rand_core::OsRng);

    let password_hash = argon2(params)?
        .hash_password(password.as_ref().as_bytes(), &salt)
        .map_err(|e| AuthError::HashingFailed {
            reason: e.to_string(),
        })?
        .to_string();

    Ok((password_hash, salt.as_str().to_string()))
}

/// Verify a password against its PHC hash in constant time.
///
/// Cost parameters are read from the hash itself, so hashes made under an
/// older configuration keep verifying. A malformed hash never verifies.
pub fn verify_password(password: impl AsRef<str>, password_hash: impl AsRef<str>) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(password_hash.as_ref()) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_ref().as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a new opaque session token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let token = Base64UrlUnpadded::encode_string(&bytes);
    bytes.zeroize();
    token
}

/// Digests session tokens with a key derived from the configured secret.
///
/// Only digests are kept in the session table, so a memory dump of the
/// table cannot be replayed as tokens.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct TokenHasher {
    key: [u8; 32],
}

impl TokenHasher {
    pub(crate) fn new(secret: &SecretKey) -> Self {
        Self {
            key: blake3::derive_key(TOKEN_KEY_CONTEXT, secret.expose().as_bytes()),
        }
    }

    pub(crate) fn digest(&self, token: &str) -> String {
        blake3::keyed_hash(&self.key, token.as_bytes())
            .to_hex()
            .to_string()
    }
}

impl std::fmt::Debug for TokenHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenHasher([REDACTED])")
    }
}
