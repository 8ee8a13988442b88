use std::collections::HashMap;
use std::path::PathBuf;

use backend::config::{AppConfig, ConfigError};

const DIGEST: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn config_load_yaml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.yaml");
    std::fs::write(
        &path,
        r#"
server:
  port: 5001
models:
  dir: /var/lib/modelos
  members:
    - name: modelo_original
      file: modelo_original.onnx
    - name: tuner_1
      file: tuner_1.onnx
"#,
    )
    .unwrap();

    let cfg = AppConfig::from_file(&path).unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.server.port, 5001);
    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.models.dir, PathBuf::from("/var/lib/modelos"));
    assert_eq!(cfg.models.members.len(), 2);
    assert_eq!(cfg.bind_address(), "0.0.0.0:5001");
}

#[test]
fn config_defaults_apply() {
    let cfg = AppConfig::from_yaml(
        r#"
models:
  members:
    - name: solo
      file: solo.onnx
"#,
    )
    .unwrap();

    assert_eq!(cfg.server.port, 5002);
    assert_eq!(cfg.server.max_upload_bytes, 20 * 1024 * 1024);
    assert_eq!(cfg.models.dir, PathBuf::from("modelos_descargados"));
    assert!(cfg.models.members[0].url.is_none());
}

#[test]
fn config_missing_file_is_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = AppConfig::load(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn config_malformed_yaml_is_parse_error() {
    let err = AppConfig::from_yaml("models: [unclosed").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn env_overrides_take_precedence() {
    let mut cfg = AppConfig::from_yaml(
        r#"
server:
  host: 127.0.0.1
  port: 5001
models:
  members:
    - name: solo
      file: solo.onnx
"#,
    )
    .unwrap();

    cfg.apply_overrides(env(&[
        ("HOST", "0.0.0.0"),
        ("PORT", "8080"),
        ("MODEL_DIR", "/tmp/modelos"),
        ("MAX_UPLOAD_BYTES", "1024"),
    ]))
    .unwrap();

    assert_eq!(cfg.bind_address(), "0.0.0.0:8080");
    assert_eq!(cfg.models.dir, PathBuf::from("/tmp/modelos"));
    assert_eq!(cfg.server.max_upload_bytes, 1024);
}

#[test]
fn unparsable_port_override_is_rejected() {
    let mut cfg = AppConfig::from_yaml(
        r#"
models:
  members:
    - name: solo
      file: solo.onnx
"#,
    )
    .unwrap();

    let err = cfg.apply_overrides(env(&[("PORT", "not-a-port")])).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidOverride { ref key, .. } if key == "PORT"));
}

#[test]
fn empty_member_list_is_rejected() {
    let cfg = AppConfig::from_yaml("models:\n  members: []\n").unwrap();
    assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn duplicate_model_names_are_rejected() {
    let cfg = AppConfig::from_yaml(
        r#"
models:
  members:
    - name: twin
      file: a.onnx
    - name: twin
      file: b.onnx
"#,
    )
    .unwrap();

    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("duplicate model name twin"));
}

#[test]
fn url_without_checksum_is_rejected() {
    let cfg = AppConfig::from_yaml(
        r#"
models:
  members:
    - name: remote
      file: remote.onnx
      url: http://example.com/remote.onnx
"#,
    )
    .unwrap();

    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("no sha256"));
}

#[test]
fn url_with_checksum_is_accepted() {
    let cfg = AppConfig::from_yaml(&format!(
        r#"
models:
  members:
    - name: remote
      file: remote.onnx
      url: http://example.com/remote.onnx
      sha256: {DIGEST}
"#
    ))
    .unwrap();

    cfg.validate().unwrap();
}

#[test]
fn malformed_checksum_is_rejected() {
    let cfg = AppConfig::from_yaml(
        r#"
models:
  members:
    - name: local
      file: local.onnx
      sha256: abc123
"#,
    )
    .unwrap();

    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("malformed sha256"));
}
