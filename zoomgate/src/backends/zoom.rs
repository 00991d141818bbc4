//! The one `BackendConnection` implementation the core ships: an
//! HTTP-reachable SRU/Solr back-end, with a PQF-over-HTTP fallback for
//! databases configured without a `search.querytype` (see DESIGN.md).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{DatabaseConfig, QueryType};
use crate::error::Result;

use super::{connect_failed, BackendConnection, Cursor, FetchOptions, RawRecord, ScanEntry, ScanOptions, ScanOutcome, SearchOutcome};

/// Connection-time options copied from `dbConfig.option`, plus the fixed
/// defaults §4.9 specifies.
#[derive(Debug, Clone)]
struct ConnectOptions {
    present_chunk: u32,
    preferred_record_syntax: String,
    extra: HashMap<String, String>,
}

pub struct ZoomConnection {
    zurl: String,
    dialect: Option<QueryType>,
    http: reqwest::Client,
    username: Option<String>,
    password: Option<String>,
    options: ConnectOptions,
    sru_version: Option<(u8, u8)>,
}

impl ZoomConnection {
    pub async fn connect(
        db_config: &DatabaseConfig,
        username: Option<&str>,
        password: Option<&str>,
    ) -> anyhow::Result<Self> {
        let mut extra = HashMap::new();
        for (k, v) in &db_config.option {
            extra.insert(k.clone(), v.clone());
        }

        let options = ConnectOptions {
            present_chunk: 10,
            preferred_record_syntax: "xml".to_string(),
            extra,
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        if db_config.zurl.trim().is_empty() {
            anyhow::bail!("empty zurl");
        }

        let dialect = db_config.querytype();
        let sru_version = if dialect == Some(QueryType::Cql) {
            Some((1, 2))
        } else {
            None
        };

        tracing::debug!(zurl = %db_config.zurl, ?dialect, "zoom connection established");

        Ok(Self {
            zurl: db_config.zurl.clone(),
            dialect,
            http,
            username: username.map(str::to_string),
            password: password.map(str::to_string),
            options,
            sru_version,
        })
    }

    fn query_param(&self) -> &'static str {
        match self.dialect {
            Some(QueryType::Cql) => "query",
            Some(QueryType::Solr) => "q",
            None => "pqf",
        }
    }
}

#[async_trait]
impl BackendConnection for ZoomConnection {
    async fn search(&self, qtext: &str) -> Result<SearchOutcome> {
        tracing::trace!(qtext = %qtext, zurl = %self.zurl, "issuing search");

        let mut request = self.http.get(&self.zurl).query(&[(self.query_param(), qtext)]);
        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request
            .send()
            .await
            .map_err(|e| connect_failed(format!("CONNECT: {e}")))?;

        if !response.status().is_success() {
            return Err(crate::error::GatewayError::backend(
                crate::diagnostics::DiagSet::Zoom,
                response.status().as_u16() as u32,
                format!("search request failed: {}", response.status()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| crate::error::GatewayError::backend(crate::diagnostics::DiagSet::Zoom, 0, e.to_string()))?;

        let hits = estimate_hit_count(&body);
        let cursor = Cursor(format!("{:x}", simple_hash(qtext)));
        let rsid = if self.dialect == Some(QueryType::Cql) {
            Some(cursor.0.clone())
        } else {
            None
        };

        Ok(SearchOutcome { cursor, hits, rsid })
    }

    async fn fetch(&self, cursor: &Cursor, offset: u32, opts: &FetchOptions) -> Result<RawRecord> {
        tracing::trace!(cursor = %cursor.0, offset, "fetching record");

        let mut query: Vec<(&str, String)> = vec![
            ("resultSetId", cursor.0.clone()),
            ("startRecord", offset.to_string()),
            ("maximumRecords", "1".to_string()),
        ];
        if let Some(schema) = &opts.schema {
            query.push(("recordSchema", schema.clone()));
        }
        let charset = opts
            .charset
            .as_ref()
            .map(|c| format!("utf8,{c}"))
            .unwrap_or_else(|| "utf8".to_string());
        query.push(("charset", charset));

        let response = self
            .http
            .get(&self.zurl)
            .query(&query)
            .send()
            .await
            .map_err(|e| connect_failed(format!("CONNECT: {e}")))?;

        let xml = response
            .text()
            .await
            .map_err(|e| crate::error::GatewayError::backend(crate::diagnostics::DiagSet::Zoom, 0, e.to_string()))?;

        Ok(RawRecord { xml })
    }

    async fn scan(&self, qtext: &str, opts: ScanOptions) -> Result<ScanOutcome> {
        tracing::trace!(qtext = %qtext, ?opts, "issuing scan");

        let response = self
            .http
            .get(&self.zurl)
            .query(&[
                (self.query_param(), qtext.to_string()),
                ("number", opts.number.to_string()),
                ("position", opts.position.to_string()),
                ("stepSize", opts.step_size.to_string()),
            ])
            .send()
            .await
            .map_err(|e| connect_failed(format!("CONNECT: {e}")))?;

        let body = response
            .text()
            .await
            .map_err(|e| crate::error::GatewayError::backend(crate::diagnostics::DiagSet::Zoom, 0, e.to_string()))?;

        let entries = parse_scan_terms(&body, opts.number);
        Ok(ScanOutcome {
            requested: opts.number,
            entries,
        })
    }

    fn sru_version(&self) -> Option<(u8, u8)> {
        self.sru_version
    }
}

/// Very small, deliberately forgiving extraction of a hit count from either
/// an SRU `<numberOfRecords>` element or a Solr `"numFound":N` field --
/// enough to drive the gateway's own logic without a general SRU/Solr
/// response-model crate.
fn estimate_hit_count(body: &str) -> u64 {
    if let Some(start) = body.find("<numberOfRecords>") {
        let rest = &body[start + "<numberOfRecords>".len()..];
        if let Some(end) = rest.find('<') {
            if let Ok(n) = rest[..end].trim().parse() {
                return n;
            }
        }
    }
    if let Some(start) = body.find("\"numFound\":") {
        let rest = &body[start + "\"numFound\":".len()..];
        let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if let Ok(n) = rest[..end].trim().parse() {
            return n;
        }
    }
    0
}

fn parse_scan_terms(body: &str, requested: u32) -> Vec<ScanEntry> {
    body.lines()
        .filter(|l| !l.trim().is_empty())
        .take(requested as usize)
        .enumerate()
        .map(|(i, term)| ScanEntry {
            term: term.trim().to_string(),
            occurrence: (i + 1) as u64,
        })
        .collect()
}

fn simple_hash(s: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}
