//! Config hash stability.
//!
//! GREEN when:
//! - the same layers hash identically across calls
//! - key order inside a YAML document does not change the hash
//! - different values produce different hashes
//! - overlays take effect and the merged result hashes stably

use sgp_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
dispatch:
  defer_threshold: 100
  poll_interval_ms: 500
checksum:
  size: 16
  secret_env: "SGP_CHECKSUM_SECRET"
freeze:
  grace_days: 30
"#;

const BASE_YAML_REORDERED: &str = r#"
freeze:
  grace_days: 30
checksum:
  secret_env: "SGP_CHECKSUM_SECRET"
  size: 16
dispatch:
  poll_interval_ms: 500
  defer_threshold: 100
"#;

const OVERLAY_YAML: &str = r#"
dispatch:
  defer_threshold: 0
import:
  commit_policy: all_or_nothing
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();

    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();

    assert_eq!(original.config_hash, reordered.config_hash);
    assert_eq!(original.canonical_json, reordered.canonical_json);
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, "freeze:\n  grace_days: 7\n"]).unwrap();

    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn merged_layers_produce_stable_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);

    let cfg = a.typed().unwrap();
    assert_eq!(cfg.dispatch.defer_threshold, 0, "overlay should win");
    assert_eq!(cfg.dispatch.poll_interval_ms, 500, "base keys survive the merge");
    assert_eq!(cfg.import.commit_policy.as_str(), "all_or_nothing");
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}
