//! The session driver (§4.1): Init, Search, Present, Fetch, Scan, Sort,
//! Delete, Close, with credential handling, config snapshotting, and the
//! connection/result-set lifecycle they share.
//!
//! Each handler returns a typed `Result`; `GatewayError::as_diagnostic`
//! implements the failure barrier the original dispatcher wrapped every
//! handler in -- `Protocol`/`Backend` become a reply diagnostic, anything
//! else propagates and is fatal to the session (see `wire::Worker`).

use std::sync::Arc;

use crate::auth;
use crate::backends::{ConnectionManager, FetchOptions, ScanOptions};
use crate::config::{GatewayConfig, QueryType};
use crate::database;
use crate::diagnostics::{self, code, DiagSet};
use crate::error::{GatewayError, Result};
use crate::query_builder;
use crate::record::{self, RecordSyntax};
use crate::resultset::{ResultSet, ResultSetRegistry};
use crate::rpn::RpnNode;
use crate::sort::{self, SortKey, SortRequestKey};

pub struct InitOutcome {
    pub implementation_id: &'static str,
    pub implementation_name: &'static str,
    pub implementation_version: &'static str,
}

pub struct SearchOutcome {
    pub setname: String,
    pub hits: u64,
}

pub struct PresentOutcome {
    pub setname: String,
    pub start: u32,
    pub number: u32,
}

pub enum FetchedRecord {
    Xml(String),
    Marc21(Vec<u8>),
    Grs1(String),
    Sutrs(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Success,
    Partial,
}

pub struct ScanOutcome {
    pub entries: Vec<crate::backends::ScanEntry>,
    pub status: ScanStatus,
}

/// A client's live session: Init -> ... -> Close. All state here is
/// private to one session; nothing is shared across sessions (§5).
pub struct Session {
    config: Arc<GatewayConfig>,
    connections: ConnectionManager,
    resultsets: ResultSetRegistry,
    username: Option<String>,
    password: Option<String>,
    http: reqwest::Client,
}

impl Session {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            config: crate::config::current(),
            connections: ConnectionManager::new(),
            resultsets: ResultSetRegistry::new(),
            username: None,
            password: None,
            http,
        }
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn init(&mut self, username: Option<String>, password: Option<String>) -> Result<InitOutcome> {
        self.config = crate::config::reload();
        self.username = username;
        self.password = password;

        if let Some(template) = &self.config.authentication {
            auth::check(&self.http, template, self.username.as_deref(), self.password.as_deref()).await?;
        }

        tracing::info!(authenticated = self.config.authentication.is_some(), "session initialized");

        Ok(InitOutcome {
            implementation_id: "ZGATE",
            implementation_name: "zoomgate",
            implementation_version: env!("CARGO_PKG_VERSION"),
        })
    }

    /// Pre-seed a connection for `db_name`, bypassing the connection pool's
    /// own dial. Lets tests exercise Search/Present/Fetch/Scan/Sort against
    /// a fake `BackendConnection` (see `tests/session_integration.rs`).
    pub fn seed_connection(&mut self, db_name: impl Into<String>, conn: Arc<dyn crate::backends::BackendConnection>) {
        self.connections.insert(db_name, conn);
    }

    /// Delete-Set is a no-op by design (§4.1, §9): there is no upstream
    /// equivalent in ZOOM/SRU to actually drop a result set early.
    pub fn delete(&mut self) {
        tracing::debug!("delete-set requested; reporting unconditional success");
    }

    pub fn close(&mut self) {
        self.connections.clear();
        self.resultsets.clear();
    }

    #[tracing::instrument(skip(self, rpn), fields(setname = %setname))]
    pub async fn search(&mut self, databases: &[String], setname: &str, rpn: &RpnNode) -> Result<SearchOutcome> {
        let db_config = database::resolve(&self.config, databases)?.into_owned();
        if db_config.nonamedresultsets && setname != "default" {
            return Err(GatewayError::protocol(code::NONAMEDRESULTSETS_VIOLATION, setname.to_string()));
        }
        let db_name = databases[0].clone();

        let qtext = compile_for_dialect(rpn, &db_config, &self.resultsets)?;
        let conn = self
            .connections
            .get_or_connect(&db_name, &db_config, self.username.as_deref(), self.password.as_deref())
            .await?;
        let outcome = conn.search(&qtext).await?;

        self.resultsets.publish(ResultSet {
            db_name,
            db_config,
            setname: setname.to_string(),
            qtext,
            cursor: outcome.cursor,
            rsid: outcome.rsid,
            hits: outcome.hits,
        });

        Ok(SearchOutcome {
            setname: setname.to_string(),
            hits: outcome.hits,
        })
    }

    pub fn present(&self, setname: &str, start: u32, number: u32) -> Result<PresentOutcome> {
        let set = self
            .resultsets
            .get(setname)
            .ok_or_else(|| GatewayError::protocol(code::RESULT_SET_NOT_FOUND, setname.to_string()))?;

        let last = start as u64 + number.saturating_sub(1) as u64;
        if start == 0 || start as u64 > set.hits || last > set.hits {
            return Err(GatewayError::protocol(
                code::PRESENT_OUT_OF_RANGE,
                format!("{start}+{number} against {} hits", set.hits),
            ));
        }

        Ok(PresentOutcome {
            setname: setname.to_string(),
            start,
            number,
        })
    }

    #[tracing::instrument(skip(self), fields(setname = %setname, offset))]
    pub async fn fetch(
        &mut self,
        setname: &str,
        offset: u32,
        requested_syntax: &str,
        schema_name: Option<&str>,
    ) -> Result<FetchedRecord> {
        let set = self
            .resultsets
            .get(setname)
            .cloned()
            .ok_or_else(|| GatewayError::protocol(code::RESULT_SET_NOT_FOUND, setname.to_string()))?;

        let conn = self
            .connections
            .get_or_connect(&set.db_name, &set.db_config, self.username.as_deref(), self.password.as_deref())
            .await?;

        let configured_schema = schema_name.and_then(|name| set.db_config.schema.get(name));

        let mut opts = FetchOptions::default();
        if let Some(schema) = configured_schema {
            opts.schema = Some(schema.sru.clone());
        }
        if let Some(extra) = &set.db_config.charset {
            opts.charset = Some(extra.clone());
        }

        let raw = conn.fetch(&set.cursor, offset, &opts).await?;

        if let Some(diagnostic) = detect_srw_diagnostic(&raw.xml) {
            return Err(GatewayError::Protocol(diagnostic));
        }

        if let Some(schema) = configured_schema {
            let record = record::first_marc_record(&raw.xml)
                .map_err(|e| GatewayError::Other(anyhow::anyhow!("malformed {} record: {e}", schema.format)))?;
            let bytes = record
                .to_binary()
                .map_err(|e| GatewayError::Other(anyhow::anyhow!("marc21 serialization failed: {e}")))?;
            return Ok(FetchedRecord::Marc21(bytes));
        }

        let marcxml = record::extract_marcxml(&raw.xml);
        let syntax = RecordSyntax::parse(requested_syntax)
            .ok_or_else(|| GatewayError::protocol(code::RECORD_SYNTAX_NOT_SUPPORTED, requested_syntax.to_string()))?;

        match record::convert(&marcxml, syntax, &set.db_config)? {
            record::RenderedRecord::Xml(s) => Ok(FetchedRecord::Xml(s)),
            record::RenderedRecord::Marc21(b) => Ok(FetchedRecord::Marc21(b)),
            record::RenderedRecord::Grs1(s) => Ok(FetchedRecord::Grs1(s)),
            record::RenderedRecord::Sutrs(s) => Ok(FetchedRecord::Sutrs(s)),
        }
    }

    #[tracing::instrument(skip(self, rpn))]
    pub async fn scan(
        &mut self,
        databases: &[String],
        rpn: &RpnNode,
        number: u32,
        position: u32,
        step_size: u32,
    ) -> Result<ScanOutcome> {
        let db_config = database::resolve(&self.config, databases)?.into_owned();
        let db_name = databases[0].clone();

        let qtext = match db_config.querytype() {
            Some(QueryType::Cql) => query_builder::compile_cql(rpn, &db_config, &self.resultsets)?,
            _ => query_builder::compile_pqf(rpn),
        };

        let conn = self
            .connections
            .get_or_connect(&db_name, &db_config, self.username.as_deref(), self.password.as_deref())
            .await?;
        let outcome = conn
            .scan(
                &qtext,
                ScanOptions {
                    number,
                    position,
                    step_size,
                },
            )
            .await?;

        let status = if outcome.entries.len() as u32 == outcome.requested {
            ScanStatus::Success
        } else {
            ScanStatus::Partial
        };

        Ok(ScanOutcome {
            entries: outcome.entries,
            status,
        })
    }

    #[tracing::instrument(skip(self, keys_req))]
    pub async fn sort(&mut self, input_sets: &[String], output: &str, keys_req: &[SortRequestKey]) -> Result<SearchOutcome> {
        let first_name = input_sets
            .first()
            .ok_or_else(|| GatewayError::protocol(code::ILLEGAL_SORT_ELEMENT, "no input sets"))?;
        let first_set = self
            .resultsets
            .get(first_name)
            .cloned()
            .ok_or_else(|| GatewayError::protocol(code::RESULT_SET_NOT_FOUND, first_name.clone()))?;

        let keys: Vec<SortKey> = keys_req.iter().map(sort::extract_key).collect::<Result<_>>()?;

        let conn = self
            .connections
            .get_or_connect(
                &first_set.db_name,
                &first_set.db_config,
                self.username.as_deref(),
                self.password.as_deref(),
            )
            .await?;

        let qtext = match first_set.db_config.querytype() {
            Some(QueryType::Cql) => {
                sort::compose_cql(input_sets, &first_set.db_config, &self.resultsets, &keys, conn.sru_version())?
            }
            _ => sort::compose_pqf(input_sets, &sort::render_yaz_sortspec(&keys)),
        };

        let outcome = conn.search(&qtext).await?;

        self.resultsets.publish(ResultSet {
            db_name: first_set.db_name,
            db_config: first_set.db_config,
            setname: output.to_string(),
            qtext,
            cursor: outcome.cursor,
            rsid: outcome.rsid,
            hits: outcome.hits,
        });

        Ok(SearchOutcome {
            setname: output.to_string(),
            hits: outcome.hits,
        })
    }
}

fn compile_for_dialect(rpn: &RpnNode, db: &crate::config::DatabaseConfig, sets: &ResultSetRegistry) -> Result<String> {
    match db.querytype() {
        Some(QueryType::Cql) => query_builder::compile_cql(rpn, db, sets),
        Some(QueryType::Solr) => query_builder::compile_solr(rpn, db, sets),
        None => Ok(query_builder::compile_pqf(rpn)),
    }
}

/// Heuristic fallback (§4.5) for back-ends too old to report per-record
/// errors through the ZOOM layer itself: look for an SRW diagnostic
/// element's URI and translate it via the SRW->BIB-1 table.
fn detect_srw_diagnostic(xml: &str) -> Option<diagnostics::Diagnostic> {
    const MARKER: &str = "info:srw/diagnostic/1/";
    let idx = xml.find(MARKER)?;
    let rest = &xml[idx..];
    let code = diagnostics::parse_srw_diagnostic_uri(rest.split(['<', '"']).next()?)?;
    Some(diagnostics::translate_backend_error(DiagSet::Srw, code, "srw diagnostic in record envelope"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_srw_diagnostic_uri_in_envelope() {
        let xml = r#"<record><diag:uri>info:srw/diagnostic/1/16</diag:uri></record>"#;
        let diagnostic = detect_srw_diagnostic(xml).unwrap();
        assert_eq!(diagnostic.code, code::UNSUPPORTED_USE_ATTRIBUTE);
    }

    #[test]
    fn no_diagnostic_marker_yields_none() {
        assert!(detect_srw_diagnostic("<record/>").is_none());
    }
}
