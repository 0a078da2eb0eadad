//! # Syndication
//!
//! Consent-gated, revocable embed tokens for syndicated storyteller content.
//!
//! A storyteller's gallery or story may be shown on an external website only
//! while a consent record for that (content, site) pair is approved. Content
//! classified as culturally sensitive waits for an elder's sign-off before
//! any token can be issued. Owners can revoke at any time, and the
//! revocation reaches every issued token before the call returns.
//!
//! ## Features
//!
//! - **Consent workflow**: pending / approved / denied / revoked, with an elder approval gate
//! - **Embed tokens**: 256-bit random bearer tokens, stored only as SHA-256 hashes
//! - **Domain allow-lists**: exact or subdomain matching, snapshotted at issuance
//! - **Fail-closed validation**: storage errors and timeouts reject the token
//! - **Usage telemetry**: atomic per-token counters with last-used domain and address
//! - **Revocation cascade**: consent and content-removal revocation propagate to tokens
//! - **Pluggable storage**: async store traits with an in-memory backend
//!
//! ## Feature Flags
//!
//! - `toml`: Enables configuration loading from TOML files (on by default)
//!
//! ## Basic Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use syndication::{
//!     Actor, ConsentRequest, ContentProfile, ContentRef, CulturalSensitivity, MemoryDirectory,
//!     RequestContext, Site, Syndication,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = Arc::new(MemoryDirectory::new());
//! directory.put_site(Site::new("partner", "Partner News", &["partner.net"])).await;
//! let gallery = ContentRef::gallery("gallery-7");
//! directory
//!     .put_content(
//!         ContentProfile::new(gallery.clone(), "teller-1")
//!             .with_sensitivity(CulturalSensitivity::High),
//!     )
//!     .await;
//!
//! let syndication = Syndication::builder()
//!     .in_memory()
//!     .directory(directory)
//!     .build()?;
//!
//! // High sensitivity: the consent waits for an elder
//! let owner = Actor::storyteller("teller-1");
//! let consent = syndication
//!     .create_consent(ConsentRequest::new(gallery, "partner"), &owner)
//!     .await?;
//! syndication.approve(&consent.id, &Actor::elder("elder-1")).await?;
//!
//! // The plaintext is only available here
//! let issued = syndication.issue(&consent.id, Some(90), &owner).await?;
//!
//! // On every embed request
//! let context = RequestContext::new().domain("cdn.partner.net");
//! match syndication.validate(issued.plaintext.expose(), &context).await.grant() {
//!     Some(grant) => println!("serve {} with {:?}", grant.content, grant.permissions),
//!     None => println!("access denied"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use syndication::SyndicationConfig;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // 1. Builder
//! let config = SyndicationConfig::builder()
//!     .default_expiry_days(14)
//!     .storage_timeout_ms(500)
//!     .build()?;
//!
//! // 2. From a JSON file
//! let config = SyndicationConfig::from_file("./syndication.json")?;
//!
//! // 3. From environment variables
//! let config = SyndicationConfig::from_env("SYNDICATION")?;
//! # Ok(())
//! # }
//! ```
//!
//! When using `from_env()`, the following variables are read, all optional:
//!
//! - `{PREFIX}_DEFAULT_EXPIRY_DAYS`: Token lifetime when an issue request names none (30)
//! - `{PREFIX}_MAX_EXPIRY_DAYS`: Longest lifetime an issue request may ask for (365)
//! - `{PREFIX}_STORAGE_TIMEOUT_MS`: Per-call storage deadline on the validation path (2000)
//! - `{PREFIX}_MASK_PREFIX_LEN` / `{PREFIX}_MASK_SUFFIX_LEN`: Visible characters of a masked token (8 / 4)
//!
//! [`try_load_default_config`] looks for `SYNDICATION_*` variables, then
//! `./syndication.{json,toml}`, `~/.syndication/config.{json,toml}` and
//! `/etc/syndication/config.{json,toml}`.

pub use syndication_sdk::*;
