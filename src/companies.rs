// CompanyDatabase - the surface callers use.
// Fetch-if-absent, open, clean, then query the latest canonical snapshot.

use crate::config::Config;
use crate::db::{self, Table};
use crate::error::Result;
use crate::fetch::{self, Fetcher};
use crate::normalize::{self, NormalizeReport};
use crate::query::{self, Predicates, QueryResult};
use rusqlite::Connection;
use std::sync::Arc;
use tracing::info;

/// Query handle over one canonical snapshot. Cheap to clone and `Send + Sync`,
/// so it can be shared across threads while the database keeps its connection.
#[derive(Debug, Clone)]
pub struct CompanyLookup {
    snapshot: Arc<Table>,
}

impl CompanyLookup {
    pub fn new(snapshot: Arc<Table>) -> Self {
        Self { snapshot }
    }

    pub fn query(&self, predicates: &Predicates, limit: Option<usize>) -> Result<QueryResult> {
        query::query(&self.snapshot, predicates, limit)
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.snapshot.columns
    }
}

pub struct CompanyDatabase {
    conn: Connection,
    config: Config,
    snapshot: Option<Arc<Table>>,
}

impl CompanyDatabase {
    /// Download the store if it is not on disk yet, then open it.
    pub fn open(config: Config, fetcher: &dyn Fetcher) -> Result<Self> {
        fetch::ensure_downloaded(fetcher, &config.database_url, &config.database_path)?;
        let conn = db::open(&config.database_path)?;
        Ok(Self::from_connection(conn, config))
    }

    pub fn from_connection(conn: Connection, config: Config) -> Self {
        Self {
            conn,
            config,
            snapshot: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Rebuild the canonical table from the raw one and adopt it as the snapshot.
    pub fn clean(&mut self) -> Result<NormalizeReport> {
        let (snapshot, report) = normalize::normalize_store(
            &self.conn,
            &self.config.raw_table,
            &self.config.canonical_table,
        )?;
        self.snapshot = Some(snapshot);
        Ok(report)
    }

    /// Adopt a canonical table left by an earlier run, without re-cleaning.
    pub fn load_cleaned(&mut self) -> Result<Arc<Table>> {
        let table = Arc::new(db::read_table(&self.conn, &self.config.canonical_table)?);
        info!(
            table = %self.config.canonical_table,
            rows = table.len(),
            "loaded canonical snapshot"
        );
        self.snapshot = Some(Arc::clone(&table));
        Ok(table)
    }

    /// The current snapshot, if `clean` or `load_cleaned` has run.
    pub fn snapshot(&self) -> Option<Arc<Table>> {
        self.snapshot.clone()
    }

    /// Handle for the current snapshot; later `clean` runs do not affect it.
    pub fn lookup(&self) -> Option<CompanyLookup> {
        self.snapshot.clone().map(CompanyLookup::new)
    }

    /// Query the canonical store. Without a snapshot the canonical table is read from the store.
    pub fn query(&self, predicates: &Predicates, limit: Option<usize>) -> Result<QueryResult> {
        match self.lookup() {
            Some(lookup) => lookup.query(predicates, limit),
            None => {
                let table = db::read_table(&self.conn, &self.config.canonical_table)?;
                query::query(&table, predicates, limit)
            }
        }
    }
}
