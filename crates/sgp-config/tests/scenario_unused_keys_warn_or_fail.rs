//! Unused config keys are reported, and fail the load under `Fail`.

use sgp_config::{load_layered_yaml_from_strings, report_unused_keys, UnusedKeyPolicy};

const CLEAN_YAML: &str = r#"
dispatch:
  defer_threshold: 100
import:
  rollback: true
  commit_policy: per_row
storage:
  root: "var/sgp"
"#;

const TYPO_YAML: &str = r#"
dispatch:
  defer_treshold: 5
import:
  rollback: true
extras:
  - a
  - b
"#;

#[test]
fn clean_config_reports_nothing() {
    let loaded = load_layered_yaml_from_strings(&[CLEAN_YAML]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean(), "{:?}", report.unused_leaf_pointers);
}

#[test]
fn warn_lists_unused_leaves_sorted() {
    let loaded = load_layered_yaml_from_strings(&[TYPO_YAML]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(
        report.unused_leaf_pointers,
        vec![
            "/dispatch/defer_treshold".to_string(),
            "/extras/0".to_string(),
            "/extras/1".to_string(),
        ]
    );
}

#[test]
fn fail_rejects_unused_leaves() {
    let loaded = load_layered_yaml_from_strings(&[TYPO_YAML]).unwrap();
    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("CONFIG_UNUSED_KEYS"), "{msg}");
    assert!(msg.contains("3 unused"), "{msg}");
}

#[test]
fn empty_config_is_clean() {
    let loaded = load_layered_yaml_from_strings(&["{}"]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean());
}
