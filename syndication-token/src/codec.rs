use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::mask::{mask_token, DEFAULT_MASK_PREFIX, DEFAULT_MASK_SUFFIX};

/// Number of random bytes behind every embed token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// A freshly generated embed token in cleartext.
///
/// The cleartext is handed to the requesting actor exactly once. `Debug` and
/// `Display` only ever print the masked form so the value cannot leak into
/// logs by accident; call [`PlaintextToken::expose`] to get the real string.
#[derive(Clone, PartialEq, Eq)]
pub struct PlaintextToken(String);

impl PlaintextToken {
    /// Returns the cleartext token string.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper and returns the cleartext token string.
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Masked form suitable for re-display.
    pub fn masked(&self) -> String {
        mask_token(&self.0, DEFAULT_MASK_PREFIX, DEFAULT_MASK_SUFFIX)
    }

    /// One-way hash of this token.
    pub fn hash(&self) -> TokenHash {
        hash_token(&self.0)
    }
}

impl fmt::Debug for PlaintextToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PlaintextToken").field(&self.masked()).finish()
    }
}

impl fmt::Display for PlaintextToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Hex-encoded SHA-256 digest of a plaintext token.
///
/// This is the only representation of a token secret that is persisted and
/// the key every token lookup goes through.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenHash(String);

impl TokenHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate a new embed token and its verification hash.
///
/// The token is 256 bits drawn from the operating system CSPRNG and encoded
/// as unpadded URL-safe base64 (43 characters).
///
/// # Returns
///
/// The cleartext token and the hash that should be persisted for it
pub fn generate_token() -> (PlaintextToken, TokenHash) {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let plaintext = URL_SAFE_NO_PAD.encode(bytes);
    let hash = hash_token(&plaintext);
    (PlaintextToken(plaintext), hash)
}

/// Hash a presented token string.
///
/// Any string hashes, including malformed or empty input; such tokens simply
/// never match a stored hash.
pub fn hash_token(plaintext: &str) -> TokenHash {
    let digest = Sha256::digest(plaintext.as_bytes());
    TokenHash(hex::encode(digest))
}
