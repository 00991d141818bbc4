//! Configuration model for the gateway.
//!
//! The upstream system this gateway fronts describes its configuration as
//! hierarchical XML; we accept the same schema re-expressed as TOML (see
//! DESIGN.md for the reasoning) via `serde`. Supports a global `search`
//! block inherited by virtual (`cfg:`) databases, per-database overrides,
//! and per-output-syntax record field maps.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};
use crate::record::RecordSyntax;

/// The process-wide config snapshot, reloaded on every Init (§3, §9
/// "Config snapshot on Init"). Sessions copy the `Arc` at Init time so a
/// mid-session reload never corrupts an in-flight request.
static SNAPSHOT: Lazy<ArcSwap<GatewayConfig>> = Lazy::new(|| ArcSwap::from_pointee(GatewayConfig::load_default()));

/// Reload from disk and publish the new snapshot, returning it.
pub fn reload() -> Arc<GatewayConfig> {
    let fresh = Arc::new(GatewayConfig::load_default());
    SNAPSHOT.store(fresh.clone());
    fresh
}

/// The current snapshot without reloading.
pub fn current() -> Arc<GatewayConfig> {
    SNAPSHOT.load_full()
}

/// Root configuration structure, reloaded on every `Init`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Per-database configuration, keyed by database name.
    pub database: HashMap<String, DatabaseConfig>,

    /// URL template for the optional credential side-channel, e.g.
    /// `https://auth.example.org/check?user={user}&pass={pass}`.
    pub authentication: Option<String>,

    /// Global defaults inherited by virtual (`cfg:`) databases.
    pub search: Option<SearchConfig>,
}

/// How a database's `resultsetid` handling behaves when a query refers back
/// to a previously materialized result set via `@set`/RSID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSetIdPolicy {
    /// Prefer the back-end-reported RSID, fall back to re-submitting the
    /// original query text when no RSID is known.
    #[default]
    Fallback,
    /// Always require an RSID; fail with diagnostic 18 if none is known.
    Id,
    /// Always re-submit the original query text, ignoring any RSID.
    Search,
}

/// Query dialect a database's back-end expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Cql,
    Solr,
}

/// `search.map` entry: maps a BIB-1 Use-attribute integer to a back-end
/// index/field name.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UseMapping {
    pub index: String,
}

/// Per-database search configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Absent means "raw PQF / Type-1 passthrough".
    pub querytype: Option<QueryType>,
    pub map: HashMap<u16, UseMapping>,
}

/// `schema` entry: how to request and interpret a named output schema from
/// the back-end at Fetch time.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchemaConfig {
    /// The back-end (SRU) schema name to request.
    pub sru: String,
    pub encoding: String,
    pub format: String,
}

/// One `{xpath, content}` rule in a per-syntax record field-mapping list.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FieldSpec {
    pub xpath: String,
    pub content: String,
}

/// Per-database configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Back-end endpoint URL (the ZOOM target).
    pub zurl: String,

    pub search: Option<SearchConfig>,

    /// If true, only the set-name `"default"` may be used for Search/Sort.
    pub nonamedresultsets: bool,

    pub resultsetid: ResultSetIdPolicy,

    /// Requested-schema-name -> back-end schema/encoding/format.
    pub schema: HashMap<String, SchemaConfig>,

    /// Extra charset parameters appended when retrieving records, e.g.
    /// `"marc8"` to produce `utf8,marc8`.
    pub charset: Option<String>,

    /// Arbitrary key -> value ZOOM options, passed through verbatim to the
    /// connection at connect time.
    pub option: HashMap<String, String>,

    /// Per-output-syntax field-mapping lists (`usmarc-record`, `grs1-record`,
    /// ... in the original XML; here keyed by `RecordSyntax`).
    #[serde(default)]
    pub record: HashMap<RecordSyntax, Vec<FieldSpec>>,

    /// `option.explicit_availability`: when set, Fetch patches every MARC
    /// `952` field missing subfield `q` by adding an empty one.
    #[serde(default)]
    pub explicit_availability: bool,
}

impl DatabaseConfig {
    /// The query dialect to compile RPN trees into for this database.
    pub fn querytype(&self) -> Option<QueryType> {
        self.search.as_ref().and_then(|s| s.querytype)
    }

    pub fn use_map(&self, use_attr: u16) -> Option<&str> {
        self.search
            .as_ref()
            .and_then(|s| s.map.get(&use_attr))
            .map(|m| m.index.as_str())
    }
}

impl GatewayConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| GatewayError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| GatewayError::Config(format!("failed to parse config: {e}")))
    }

    /// Load from default locations: `ZOOMGATE_CONFIG` env var, `./zoomgate.toml`,
    /// `~/.config/zoomgate/config.toml`, or built-in (empty) defaults.
    pub fn load_default() -> Self {
        if let Ok(path) = std::env::var("ZOOMGATE_CONFIG") {
            if let Ok(cfg) = Self::from_file(&path) {
                tracing::info!(path = %path, "loaded config from ZOOMGATE_CONFIG");
                return cfg;
            }
        }

        if let Ok(cfg) = Self::from_file("zoomgate.toml") {
            tracing::info!("loaded config from ./zoomgate.toml");
            return cfg;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("zoomgate").join("config.toml");
            if let Ok(cfg) = Self::from_file(&user_config) {
                tracing::info!(path = %user_config.display(), "loaded config from user config dir");
                return cfg;
            }
        }

        tracing::debug!("no config file found, using empty defaults");
        Self::default()
    }

    /// Look up a real (non-virtual) database by name.
    pub fn lookup(&self, name: &str) -> Option<&DatabaseConfig> {
        self.database.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_use_map_and_querytype() {
        let toml = r#"
[database.books]
zurl = "http://books.example/sru"

[database.books.search]
querytype = "cql"

[database.books.search.map]
4 = { index = "title" }
"#;
        let cfg = GatewayConfig::from_toml(toml).unwrap();
        let db = cfg.lookup("books").unwrap();
        assert_eq!(db.querytype(), Some(QueryType::Cql));
        assert_eq!(db.use_map(4), Some("title"));
    }

    #[test]
    fn default_resultsetid_policy_is_fallback() {
        let db = DatabaseConfig::default();
        assert_eq!(db.resultsetid, ResultSetIdPolicy::Fallback);
    }

    #[test]
    fn missing_config_file_yields_empty_defaults() {
        std::env::remove_var("ZOOMGATE_CONFIG");
        let cfg = GatewayConfig::default();
        assert!(cfg.database.is_empty());
    }
}
