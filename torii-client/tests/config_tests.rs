use pretty_assertions::assert_eq;
use std::io::Write;
use torii_client::config::{DEFAULT_RPC_URL, DEFAULT_TORII_URL};
use torii_client::{ClientConfig, ConfigError, Platform, ToriiError, init_logging};

// ── ClientConfig ─────────────────────────────────────────────────

#[test]
fn defaults_point_at_local_devnet() {
    let config = ClientConfig::default();
    assert_eq!(config.torii_url, DEFAULT_TORII_URL);
    assert_eq!(config.rpc_url, DEFAULT_RPC_URL);
    assert!(config.world_address.is_empty());
}

#[test]
fn parse_full_toml() {
    let config = ClientConfig::from_toml_str(
        r#"
        torii_url = "https://api.cartridge.gg/x/arena/torii"
        rpc_url = "https://api.cartridge.gg/x/arena/katana"
        world_address = "0x0525177c8afe8680d7ad1da30ca183e482cfcd6404c1e09d83fd3fa2994fd4b8"
        "#,
    )
    .unwrap();

    assert_eq!(
        config,
        ClientConfig::new(
            "https://api.cartridge.gg/x/arena/torii",
            "https://api.cartridge.gg/x/arena/katana",
            "0x0525177c8afe8680d7ad1da30ca183e482cfcd6404c1e09d83fd3fa2994fd4b8",
        )
    );
}

#[test]
fn missing_keys_take_defaults() {
    let config = ClientConfig::from_toml_str(r#"world_address = "0x1""#).unwrap();
    assert_eq!(config.torii_url, DEFAULT_TORII_URL);
    assert_eq!(config.world_address, "0x1");
}

#[test]
fn invalid_toml_is_parse_error() {
    let err = ClientConfig::from_toml_str("torii_url = [").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
    assert!(err.to_string().starts_with("failed to parse config"));
}

#[test]
fn load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "torii_url = \"http://indexer:8080\"").unwrap();

    let config = ClientConfig::from_file(file.path()).unwrap();

    assert_eq!(config.torii_url, "http://indexer:8080");
    assert_eq!(config.rpc_url, DEFAULT_RPC_URL);
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ClientConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

// ── Errors ───────────────────────────────────────────────────────

#[test]
fn error_messages() {
    assert_eq!(
        ToriiError::Connect("refused".into()).to_string(),
        "connect failed: refused"
    );
    assert_eq!(
        ToriiError::UnsupportedPlatform {
            platform: Platform::Browser,
            operation: "world_metadata",
        }
        .to_string(),
        "world_metadata is not supported on the browser backend"
    );
    assert_eq!(
        ToriiError::InvariantViolation("client used after disconnect".into()).to_string(),
        "invariant violation: client used after disconnect"
    );
}

#[test]
fn only_remote_calls_are_retryable() {
    assert!(ToriiError::RemoteCall("timeout".into()).is_retryable());
    assert!(!ToriiError::Connect("refused".into()).is_retryable());
    assert!(!ToriiError::Decode("bad".into()).is_retryable());
    assert!(!ToriiError::InvariantViolation("x".into()).is_retryable());
}

#[test]
fn current_platform_on_host() {
    assert_eq!(Platform::current(), Platform::Native);
    assert_eq!(Platform::Native.to_string(), "native");
}

// ── Logging ──────────────────────────────────────────────────────

#[test]
fn init_logging_tolerates_existing_subscriber() {
    init_logging("torii_client=debug");
    assert!(!init_logging("info"));
}

#[test]
fn tokio_test_block_on_drives_native_futures() {
    use std::sync::Arc;
    use torii_client::native::mock::MockNative;
    use torii_client::{NativeBackend, ToriiClient};

    let api = Arc::new(MockNative::new());
    let client = ToriiClient::new(
        NativeBackend::connect(Arc::clone(&api), &ClientConfig::default()).unwrap(),
    );
    let models = tokio_test::block_on(client.subscribed_models()).unwrap();
    assert!(models.is_empty());
}
