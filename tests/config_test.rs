mod common;

use chrono::Duration;
use std::env;
use std::error::Error;
use std::fs;
use syndication::{
    Clock, ConfigError, ErrorCode, SdkError, Syndication, SyndicationConfig,
    MAX_ALLOWED_EXPIRY_DAYS,
};

#[tokio::test]
async fn test_json_config_drives_issuance() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let file_path = temp_dir.path().join("syndication.json");
    fs::write(
        &file_path,
        r#"{
            "default_expiry_days": 7,
            "max_expiry_days": 90
        }"#,
    )?;

    let config = SyndicationConfig::from_file(&file_path)?;
    assert_eq!(config.storage_timeout_ms, 2_000);

    let env = common::env_with(|builder| builder.config(&config)).await;
    let consent = env.approved_consent().await;

    let issued = env.syndication.issue(&consent.id, None, &env.owner).await?;
    assert_eq!(
        issued.token.expires_at,
        Some(env.clock.now() + Duration::days(7))
    );

    let err = env
        .syndication
        .issue(&consent.id, Some(91), &env.owner)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ExpiryOutOfRange);
    assert!(env.syndication.issue(&consent.id, Some(90), &env.owner).await.is_ok());

    Ok(())
}

#[cfg(feature = "toml")]
#[tokio::test]
async fn test_toml_config_sets_mask_width() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let file_path = temp_dir.path().join("syndication.toml");
    fs::write(
        &file_path,
        r#"
            default_expiry_days = 14
            mask_prefix_len = 4
            mask_suffix_len = 2
        "#,
    )?;

    let config = SyndicationConfig::from_toml(&file_path)?;
    let env = common::env_with(|builder| builder.config(&config)).await;
    let consent = env.approved_consent().await;
    let issued = env.syndication.issue(&consent.id, None, &env.owner).await?;

    let plaintext = issued.plaintext.expose();
    let expected = format!("{}...{}", &plaintext[..4], &plaintext[plaintext.len() - 2..]);
    assert_eq!(issued.token.masked, expected);

    Ok(())
}

#[tokio::test]
async fn test_builder_overrides_file_values() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let file_path = temp_dir.path().join("syndication.json");
    fs::write(&file_path, r#"{ "default_expiry_days": 7 }"#)?;
    let config = SyndicationConfig::from_file(&file_path)?;

    let env = common::env_with(|builder| builder.config(&config).default_expiry_days(3)).await;
    assert_eq!(env.syndication.config().default_expiry_days, 3);
    assert_eq!(env.syndication.config().max_expiry_days, MAX_ALLOWED_EXPIRY_DAYS);

    Ok(())
}

#[test]
fn test_invalid_file_is_rejected() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;

    let bad_values = temp_dir.path().join("bad_values.json");
    fs::write(&bad_values, r#"{ "default_expiry_days": 30, "max_expiry_days": 7 }"#)?;
    assert!(matches!(
        SyndicationConfig::from_file(&bad_values),
        Err(ConfigError::InvalidExpiry(_))
    ));

    let bad_json = temp_dir.path().join("bad.json");
    fs::write(&bad_json, "{ default_expiry_days: ")?;
    assert!(matches!(
        SyndicationConfig::from_file(&bad_json),
        Err(ConfigError::ParseError(_))
    ));

    let missing = temp_dir.path().join("missing.json");
    assert!(matches!(
        SyndicationConfig::from_file(&missing),
        Err(ConfigError::IOError(_))
    ));

    Ok(())
}

#[test]
fn test_env_config_overrides_defaults() -> Result<(), Box<dyn Error>> {
    // A prefix no other test uses, so parallel tests do not interfere
    let prefix = "ROOT_CONFIG_TEST";
    env::set_var(format!("{prefix}_DEFAULT_EXPIRY_DAYS"), "10");
    env::set_var(format!("{prefix}_STORAGE_TIMEOUT_MS"), "250");

    let config = SyndicationConfig::from_env(prefix)?;
    assert_eq!(config.default_expiry_days, 10);
    assert_eq!(config.storage_timeout().as_millis(), 250);
    assert_eq!(config.max_expiry_days, MAX_ALLOWED_EXPIRY_DAYS);

    env::set_var(format!("{prefix}_STORAGE_TIMEOUT_MS"), "soon");
    assert!(matches!(
        SyndicationConfig::from_env(prefix),
        Err(ConfigError::ParseError(_))
    ));

    env::remove_var(format!("{prefix}_DEFAULT_EXPIRY_DAYS"));
    env::remove_var(format!("{prefix}_STORAGE_TIMEOUT_MS"));

    Ok(())
}

#[test]
fn test_builder_rejects_invalid_window() {
    let result = Syndication::builder()
        .in_memory()
        .max_expiry_days(MAX_ALLOWED_EXPIRY_DAYS + 1)
        .build();
    assert!(matches!(
        result,
        Err(SdkError::Config(ConfigError::InvalidExpiry(_)))
    ));
}
