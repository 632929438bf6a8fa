use qrz_rtlog::load_config::{load_config, API_KEY_ENV};
use qrz_rtlog_core::config::DispatchMode;
use qrz_rtlog_core::contract::SourceKind;
use serial_test::serial;
use std::env;
use std::fs::write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).expect("write temp config");
    file
}

#[test]
#[serial]
fn full_config_loads_with_defaults_for_pipeline() {
    let file = config_file(
        r#"
qrz:
  call: AB3GY
  api_key: ABCD-1234-EFGH-5678
wsjtx:
  ip: 127.0.0.1
  port: 2237
  timeout: 5
n1mm:
  ip: 127.0.0.1
  port: 12060
  timeout: 0.5
"#,
    );

    let config = load_config(file.path()).expect("config should load");

    assert_eq!(config.qrz.call, "AB3GY");
    assert_eq!(config.qrz.api_key(), "ABCD-1234-EFGH-5678");
    assert!(config.qrz.url.is_none());

    let endpoints: Vec<_> = config.endpoints().map(|(s, e)| (s, e.port)).collect();
    assert_eq!(
        endpoints,
        vec![(SourceKind::Wsjtx, 2237), (SourceKind::N1mm, 12060)]
    );
    let n1mm = config.n1mm.as_ref().unwrap();
    assert_eq!(n1mm.receive_timeout(), Duration::from_millis(500));

    assert_eq!(config.pipeline.mode, DispatchMode::Queued);
    assert_eq!(config.pipeline.queue_capacity, 20);
}

#[test]
#[serial]
fn api_key_falls_back_to_environment() {
    let file = config_file(
        r#"
qrz:
  call: AB3GY
n1mm:
  ip: 127.0.0.1
  port: 12060
  timeout: 5
"#,
    );
    env::set_var(API_KEY_ENV, "FROM-ENV-KEY");

    let config = load_config(file.path()).expect("config should load with env key");
    env::remove_var(API_KEY_ENV);

    assert_eq!(config.qrz.api_key(), "FROM-ENV-KEY");
    assert!(config.wsjtx.is_none());
    assert_eq!(config.endpoints().count(), 1);
}

#[test]
#[serial]
fn missing_api_key_is_an_error() {
    let file = config_file("qrz:\n  call: AB3GY\n");
    env::remove_var(API_KEY_ENV);

    let err = load_config(file.path()).unwrap_err();
    assert!(
        err.to_string().contains("missing QRZ API key"),
        "unexpected error: {err}"
    );
}

#[test]
#[serial]
fn pipeline_section_overrides_mode_and_capacity() {
    let file = config_file(
        r#"
qrz:
  call: AB3GY
  api_key: KEY
  url: http://127.0.0.1:9/api
pipeline:
  mode: direct
  queue_capacity: 5
"#,
    );

    let config = load_config(file.path()).expect("config should load");
    assert_eq!(config.pipeline.mode, DispatchMode::Direct);
    assert_eq!(config.pipeline.queue_capacity, 5);
    assert_eq!(config.pipeline.idle_interval(), Duration::from_secs(5));
    assert_eq!(config.qrz.url.as_deref(), Some("http://127.0.0.1:9/api"));
}

#[test]
#[serial]
fn zero_values_are_rejected() {
    let zero_timeout = config_file(
        r#"
qrz:
  call: AB3GY
  api_key: KEY
wsjtx:
  ip: 127.0.0.1
  port: 2237
  timeout: 0
"#,
    );
    assert!(load_config(zero_timeout.path()).is_err());

    let zero_capacity = config_file(
        r#"
qrz:
  call: AB3GY
  api_key: KEY
pipeline:
  queue_capacity: 0
"#,
    );
    let err = load_config(zero_capacity.path()).unwrap_err();
    assert!(err.to_string().contains("queue_capacity"), "unexpected error: {err}");
}

#[test]
#[serial]
fn seconds_too_large_for_a_duration_are_rejected() {
    let huge_timeout = config_file(
        r#"
qrz:
  call: AB3GY
  api_key: KEY
n1mm:
  ip: 127.0.0.1
  port: 12060
  timeout: 1e20
"#,
    );
    let err = load_config(huge_timeout.path()).unwrap_err();
    assert!(err.to_string().contains("receive timeout"), "unexpected error: {err}");

    let huge_idle = config_file(
        r#"
qrz:
  call: AB3GY
  api_key: KEY
pipeline:
  idle_interval: 1e20
"#,
    );
    let err = load_config(huge_idle.path()).unwrap_err();
    assert!(err.to_string().contains("idle_interval"), "unexpected error: {err}");
}

#[test]
#[serial]
fn unreadable_and_malformed_files_name_the_failing_step() {
    let err = load_config("/definitely/not/here.yml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));

    let file = config_file("qrz: [not, a, mapping\n");
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config YAML"));
}
