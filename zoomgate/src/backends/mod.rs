//! The ZOOM abstraction.
//!
//! The original gateway reaches every back-end -- Z39.50 or SRU/Solr --
//! through the ZOOM client library, which this spec explicitly treats as an
//! external collaborator. `BackendConnection` is the trait the gateway's own
//! code calls through; `zoom` supplies the one implementation the core
//! ships (HTTP-reachable SRU and Solr back-ends, plus a PQF-over-HTTP
//! fallback for back-ends without a native CQL/Solr dialect -- see
//! DESIGN.md for why a binary Z39.50 client isn't implemented here).
//!
//! A `ConnectionManager` is owned by each `Session` and keys connections by
//! database name, lazily creating one on first use (see §4.9 of the spec).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::DatabaseConfig;
use crate::diagnostics::{code, DiagSet};
use crate::error::{GatewayError, Result};

mod zoom;
pub use zoom::ZoomConnection;

/// An opaque, back-end-assigned handle to a live result set. Stored by
/// value in `ResultSet` (per the "arena vs. cursor lifetimes" design note)
/// rather than as a borrowed reference into the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(pub String);

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub schema: Option<String>,
    pub charset: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub number: u32,
    pub position: u32,
    pub step_size: u32,
}

#[derive(Debug, Clone)]
pub struct ScanEntry {
    pub term: String,
    pub occurrence: u64,
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub entries: Vec<ScanEntry>,
    pub requested: u32,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub cursor: Cursor,
    pub hits: u64,
    pub rsid: Option<String>,
}

/// The back-end's XML record envelope, as returned by a Fetch.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub xml: String,
}

/// Unified interface to a single back-end connection, the gateway's stand-in
/// for "the ZOOM connection object" the original code holds per database.
#[async_trait]
pub trait BackendConnection: Send + Sync {
    async fn search(&self, qtext: &str) -> Result<SearchOutcome>;

    async fn fetch(&self, cursor: &Cursor, offset: u32, opts: &FetchOptions) -> Result<RawRecord>;

    async fn scan(&self, qtext: &str, opts: ScanOptions) -> Result<ScanOutcome>;

    /// `Some((major, minor))` for an SRU back-end; `None` for Z39.50/PQF.
    /// Consulted by the sort planner to decide between native `sortby` and
    /// a YAZ sortspec attached to the query (see §4.8).
    fn sru_version(&self) -> Option<(u8, u8)>;
}

/// Lazily-populated, per-session map of database-name -> open connection.
#[derive(Default)]
pub struct ConnectionManager {
    connections: HashMap<String, Arc<dyn BackendConnection>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached connection for `db_name`, connecting lazily on
    /// first use per §4.9: `presentChunk=10`, `preferredRecordSyntax=xml`,
    /// credentials from the session (if any), then every
    /// `dbConfig.option` value, in that order.
    pub async fn get_or_connect(
        &mut self,
        db_name: &str,
        db_config: &DatabaseConfig,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Arc<dyn BackendConnection>> {
        if let Some(conn) = self.connections.get(db_name) {
            return Ok(conn.clone());
        }

        tracing::debug!(database = db_name, zurl = %db_config.zurl, "connecting to back-end");
        let conn: Arc<dyn BackendConnection> = Arc::new(
            ZoomConnection::connect(db_config, username, password)
                .await
                .map_err(|e| {
                    tracing::warn!(database = db_name, error = %e, "back-end connect failed");
                    GatewayError::Protocol(crate::diagnostics::translate_backend_error(
                        DiagSet::Zoom,
                        0,
                        &format!("CONNECT: {e}"),
                    ))
                })?,
        );
        self.connections.insert(db_name.to_string(), conn.clone());
        Ok(conn)
    }

    pub fn get(&self, db_name: &str) -> Option<&Arc<dyn BackendConnection>> {
        self.connections.get(db_name)
    }

    /// Pre-seed a connection for `db_name`, bypassing `get_or_connect`'s own
    /// dial. Used by tests to exercise the session driver against a fake
    /// `BackendConnection` without a live back-end.
    pub fn insert(&mut self, db_name: impl Into<String>, conn: Arc<dyn BackendConnection>) {
        self.connections.insert(db_name.into(), conn);
    }

    pub fn clear(&mut self) {
        self.connections.clear();
    }
}

pub(crate) fn connect_failed(message: impl Into<String>) -> GatewayError {
    GatewayError::protocol(code::CONNECT_FAILED, message.into())
}
