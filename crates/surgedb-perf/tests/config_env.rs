//! Environment overrides. Kept in its own test binary because it mutates the
//! process environment.

use std::io::Write;
use surgedb_perf::{ConfigError, PerfConfig};

const CONFIG: &str = r#"
[server]
start_cmd = "./target/release/surgedb-server"

[http]
collection = "perf_collection"
dimensions = 384
prefill = 10000
duration = 60
concurrency = 32

[[http.scenarios]]
name = "search_plain"
"#;

#[test]
fn test_load_applies_env_then_validates() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();

    std::env::set_var("SURGEDB_PERF_BASE_URL", "http://10.0.0.5:3000");
    std::env::set_var("SURGEDB_PERF_DURATION", "5");
    std::env::set_var("SURGEDB_PERF_CONCURRENCY", "not-a-number");

    let config = PerfConfig::load(file.path()).unwrap();
    assert_eq!(config.server.base_url, "http://10.0.0.5:3000");
    assert_eq!(config.http.duration, 5);
    // Unparseable values are ignored.
    assert_eq!(config.http.concurrency, 32);

    // An override can also make the config invalid.
    std::env::set_var("SURGEDB_PERF_CONCURRENCY", "0");
    let err = PerfConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));

    std::env::remove_var("SURGEDB_PERF_BASE_URL");
    std::env::remove_var("SURGEDB_PERF_DURATION");
    std::env::remove_var("SURGEDB_PERF_CONCURRENCY");
}

#[test]
fn test_malformed_toml_is_a_toml_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"[server\nstart_cmd = 1").unwrap();

    let err = PerfConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::TomlError { .. }));
}
