//! # Syndication Token
//!
//! Token codec for syndication embed tokens.
//!
//! This crate generates the bearer secrets handed to external embedding
//! sites, derives the one-way hash that is the only form ever persisted, and
//! implements the domain allow-list matching applied when a token is
//! presented. It is pure: no storage, no clock and no networking.
//!
//! ## Features
//!
//! - Token generation: 256-bit CSPRNG tokens, URL-safe base64 encoded
//! - Token hashing: SHA-256, hex encoded, for lookup by hash only
//! - Masking: `abcdefgh...wxyz` style re-display of secrets
//! - Domain matching: normalised exact or subdomain allow-list checks
//!
//! ## Usage
//!
//! ```
//! use syndication_token::{domain_allowed, generate_token, hash_token};
//!
//! let (plaintext, hash) = generate_token();
//!
//! // The hash computed when the token is presented matches the stored one
//! assert_eq!(hash_token(plaintext.expose()), hash);
//!
//! // Subdomains of an allow-listed domain are accepted
//! assert!(domain_allowed(&["example.org"], "https://cdn.example.org/embed"));
//! assert!(!domain_allowed(&["example.org"], "evil.com"));
//! ```

mod codec;
mod domain;
mod mask;

pub use codec::{generate_token, hash_token, PlaintextToken, TokenHash, TOKEN_BYTES};
pub use domain::{domain_allowed, normalize_domain};
pub use mask::{mask_token, DEFAULT_MASK_PREFIX, DEFAULT_MASK_SUFFIX};
