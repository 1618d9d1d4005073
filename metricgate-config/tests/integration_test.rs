//! Integration tests for metricgate-config

use metricgate_config::*;
use std::io::Write;
use std::time::Duration;
use temp_env::with_vars;

const KEY: &str = "change-me-very-strong";

#[test]
fn test_default_config_requires_key() {
    let config = GatewayConfig::default();
    assert!(config.validate_all().is_err());
}

#[test]
fn test_config_loader_from_env() {
    let vars = vec![
        ("METRICGATE_API_KEY", Some(KEY)),
        ("METRICGATE_SERVER_PORT", Some("9000")),
        ("METRICGATE_SERVER_STREAM_PORT", Some("9001")),
        ("METRICGATE_BATCH_SIZE", Some("100")),
        ("METRICGATE_FLUSH_INTERVAL_MS", Some("25")),
        ("METRICGATE_LOG_LEVEL", Some("debug")),
        ("METRICS_API_KEY", None),
    ];

    with_vars(vars, || {
        let config = ConfigLoader::new().from_env().unwrap();

        assert_eq!(config.auth.api_key, KEY);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.stream_port, Some(9001));
        assert_eq!(config.buffer.batch_size, 100);
        assert_eq!(config.buffer.flush_interval, Duration::from_millis(25));
        assert_eq!(config.logging.level, LogLevel::Debug);
    });
}

#[test]
fn test_legacy_api_key_variable() {
    let vars = vec![("METRICGATE_API_KEY", None), ("METRICS_API_KEY", Some(KEY))];

    with_vars(vars, || {
        let config = ConfigLoader::new().from_env().unwrap();
        assert_eq!(config.auth.api_key, KEY);
    });
}

#[test]
fn test_prefixed_key_wins_over_legacy() {
    let vars = vec![
        ("METRICGATE_API_KEY", Some("prefixed-secret-key")),
        ("METRICS_API_KEY", Some(KEY)),
    ];

    with_vars(vars, || {
        let config = ConfigLoader::new().from_env().unwrap();
        assert_eq!(config.auth.api_key, "prefixed-secret-key");
    });
}

#[test]
fn test_missing_key_fails_startup() {
    let vars: Vec<(&str, Option<&str>)> = vec![("METRICGATE_API_KEY", None), ("METRICS_API_KEY", None)];

    with_vars(vars, || {
        let err = ConfigLoader::new().from_env().unwrap_err();
        assert!(matches!(err, ConfigError::DomainError { ref domain, .. } if domain == "auth"));
    });
}

#[test]
fn test_invalid_env_value() {
    let vars = vec![
        ("METRICGATE_API_KEY", Some(KEY)),
        ("METRICGATE_SERVER_PORT", Some("eighty")),
    ];

    with_vars(vars, || {
        let err = ConfigLoader::new().from_env().unwrap_err();
        assert!(matches!(err, ConfigError::EnvError(_)));
    });
}

#[test]
fn test_stream_port_can_be_disabled() {
    let vars = vec![
        ("METRICGATE_API_KEY", Some(KEY)),
        ("METRICGATE_SERVER_STREAM_PORT", Some("off")),
    ];

    with_vars(vars, || {
        let config = ConfigLoader::new().from_env().unwrap();
        assert_eq!(config.server.stream_port, None);
        assert_eq!(config.server.stream_addr(), None);
    });
}

#[test]
fn test_custom_prefix() {
    let vars = vec![("GW_API_KEY", Some(KEY)), ("GW_MAX_IN_FLIGHT", Some("8"))];

    with_vars(vars, || {
        let config = ConfigLoader::with_prefix("GW").from_env().unwrap();
        assert_eq!(config.admission.max_in_flight, 8);
    });
}

#[test]
fn test_comprehensive_yaml_config() {
    let yaml = r#"
server:
  bind_address: "127.0.0.1"
  port: 8000
  stream_port: 8081
  max_body_bytes: 8192
  shutdown_timeout: 3s

auth:
  api_key: "change-me-very-strong"

admission:
  max_in_flight: 64
  admission_timeout: 20ms
  max_connections: 200
  per_connection_rate: 5.0
  per_connection_burst: 10

buffer:
  batch_size: 250
  flush_interval: 100ms
  capacity: 10000
  retry:
    max_attempts: 3
    initial_delay: 50ms
    max_delay: 1s
    multiplier: 2.0

sink:
  type: webhook
  url: "https://tsdb.internal/api/v1/batches"
  timeout: 2s
  headers:
    X-Tenant: ops

logging:
  level: warn
  format: json
  directives: "tower_http=info"
"#;

    let mut file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let vars: Vec<(&str, Option<&str>)> = vec![
        ("METRICGATE_API_KEY", None),
        ("METRICGATE_SERVER_PORT", None),
        ("METRICGATE_BATCH_SIZE", None),
        ("METRICGATE_LOG_LEVEL", None),
    ];

    with_vars(vars, || {
        let config = ConfigLoader::new().from_file(file.path()).unwrap();

        assert_eq!(config.server.http_addr(), "127.0.0.1:8000");
        assert_eq!(config.server.shutdown_timeout, Duration::from_secs(3));
        assert_eq!(config.admission.admission_timeout, Duration::from_millis(20));
        assert_eq!(config.buffer.batch_size, 250);
        assert_eq!(config.buffer.retry.max_attempts, 3);
        assert_eq!(config.buffer.retry.max_delay, Duration::from_secs(1));
        assert_eq!(config.sink.kind(), "webhook");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.filter_string(), "warn,tower_http=info");
    });
}

#[test]
fn test_env_overrides_file() {
    let mut file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
    file.write_all(b"auth:\n  api_key: \"change-me-very-strong\"\nbuffer:\n  batch_size: 250\n")
        .unwrap();

    with_vars(vec![("METRICGATE_BATCH_SIZE", Some("10"))], || {
        let config = ConfigLoader::new().load(Some(file.path())).unwrap();
        assert_eq!(config.buffer.batch_size, 10);
    });
}

#[test]
fn test_capacity_below_batch_size_rejected() {
    let mut file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
    file.write_all(b"auth:\n  api_key: \"change-me-very-strong\"\nbuffer:\n  batch_size: 500\n  capacity: 100\n")
        .unwrap();

    with_vars(vec![("METRICGATE_BATCH_SIZE", None::<&str>)], || {
        let err = ConfigLoader::new().from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::DomainError { ref domain, .. } if domain == "buffer"));
    });
}

#[test]
fn test_sample_config_round_trips() {
    let sample = GatewayConfig::generate_sample();
    let parsed: GatewayConfig = serde_yaml::from_str(&sample).unwrap();
    assert_eq!(parsed.auth.api_key, "change-me");
    assert_eq!(parsed.server.port, 8000);
}
