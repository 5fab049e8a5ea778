//! sgp-config
//!
//! Layered YAML configuration.
//!
//! Layers are merged in order (earlier = base, later = override), checked for
//! literal secrets, canonicalized to sorted-key JSON and hashed. [`SgpConfig`]
//! is the typed view; every key has a default so an empty config is valid.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sgp_schemas::CommitPolicy;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;

/// Leaf names that must never hold a literal value; configs name the env var
/// that carries it (`checksum.secret_env`).
const SECRET_LEAF_NAMES: &[&str] = &["secret", "password", "checksum_secret", "database_url"];

/// Schemes whose URLs may embed a password. The database URL belongs in
/// `SGP_DATABASE_URL`.
const DB_URL_SCHEMES: &[&str] = &["postgres://", "postgresql://"];

const PEM_MARKER: &str = "-----BEGIN";

/// JSON-pointer prefixes read by [`SgpConfig`]. Keep in sync with the typed view.
pub const CONSUMED_POINTERS: &[&str] = &[
    "/dispatch/defer_threshold",
    "/dispatch/poll_interval_ms",
    "/checksum/size",
    "/checksum/secret_env",
    "/freeze/grace_days",
    "/import/max_file_size",
    "/import/rollback",
    "/import/commit_policy",
    "/storage/root",
];

// ---------------------------------------------------------------------------
// Typed view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SgpConfig {
    pub dispatch: DispatchConfig,
    pub checksum: ChecksumConfig,
    pub freeze: FreezeConfig,
    pub import: ImportConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Batches with fewer rows run inline; the rest are deferred. 0 = always defer.
    pub defer_threshold: usize,
    pub poll_interval_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            defer_threshold: 100,
            poll_interval_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksumConfig {
    /// Hex digits kept.
    pub size: usize,
    /// Env var holding the optional digest secret (the value never lives in config).
    pub secret_env: String,
}

impl Default for ChecksumConfig {
    fn default() -> Self {
        Self {
            size: 16,
            secret_env: "SGP_CHECKSUM_SECRET".to_string(),
        }
    }
}

impl ChecksumConfig {
    /// Secret from the environment; empty when unset.
    pub fn secret(&self) -> String {
        std::env::var(&self.secret_env).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreezeConfig {
    pub grace_days: i64,
}

impl Default for FreezeConfig {
    fn default() -> Self {
        Self { grace_days: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub max_file_size: usize,
    pub rollback: bool,
    pub commit_policy: CommitPolicy,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_file_size: 2 * 1024 * 1024,
            rollback: false,
            commit_policy: CommitPolicy::PerRow,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "var/sgp".to_string(),
        }
    }
}

impl SgpConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        serde_json::from_value(config_json.clone()).context("config does not match schema")
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    pub fn typed(&self) -> Result<SgpConfig> {
        SgpConfig::from_json(&self.config_json)
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        // An empty YAML document decodes to null; treat it as "no overrides".
        if v_json.is_null() {
            continue;
        }
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn canonicalize_json(v: &Value) -> Result<String> {
    serde_json::to_string(&sort_keys(v)).context("canonical json serialize failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(v, "", &mut leaves);

    let hit = leaves.into_iter().find(|ptr| {
        v.pointer(ptr)
            .and_then(Value::as_str)
            .is_some_and(|s| is_secret_literal(ptr, s))
    });
    match hit {
        Some(ptr) => bail!("CONFIG_SECRET_DETECTED leaf={ptr} value=REDACTED"),
        None => Ok(()),
    }
}

fn is_secret_literal(ptr: &str, value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }
    let leaf = ptr.rsplit('/').next().unwrap_or_default();
    if SECRET_LEAF_NAMES.contains(&leaf) || value.starts_with(PEM_MARKER) {
        return true;
    }
    DB_URL_SCHEMES
        .iter()
        .filter_map(|scheme| value.strip_prefix(scheme))
        .any(url_has_password)
}

/// `user:pass@host/...` carries a password; `user@host` and `host` do not.
fn url_has_password(after_scheme: &str) -> bool {
    let authority = after_scheme.split('/').next().unwrap_or_default();
    authority
        .rsplit_once('@')
        .is_some_and(|(userinfo, _)| userinfo.contains(':'))
}

// ---------------------------------------------------------------------------
// Unused-key guard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Minimal set of unused leaf pointers (sorted)
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// List config leaves that nothing reads. With `Fail`, any such leaf is an error.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<&str> = CONSUMED_POINTERS.iter().copied().collect();

    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|lp| !consumed.iter().any(|cp| is_prefix_pointer(cp, lp)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS: {} unused config leaf key(s) detected. \
            Remove them or update the consumed registry. First few: {}",
            report.unused_leaf_pointers.len(),
            preview_list(&report.unused_leaf_pointers, 12)
        );
    }

    Ok(report)
}

/// "/a/b" consumes "/a/b" and "/a/b/c" but not "/a/bc".
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if leaf == prefix {
        return true;
    }
    leaf.strip_prefix(prefix)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{}/{}", prefix, i);
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ => {
            let p = if prefix.is_empty() {
                "/".to_string()
            } else {
                prefix.to_string()
            };
            out.push(p);
        }
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn preview_list(items: &[String], n: usize) -> String {
    let take = items.iter().take(n).cloned().collect::<Vec<_>>();
    format!("{:?}", take)
}
