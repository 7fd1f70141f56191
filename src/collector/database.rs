use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::collector::QueryCandidate;

pub const EXPLAIN_PREFIX: &str = "EXPLAIN FORMAT=JSON ";

/// Issued after every EXPLAIN so the connection is not left on the query's schema.
pub const RESTORE_SCHEMA_STATEMENT: &str = "USE `performance_schema`";

const SELECT_DIGESTS: &str = "SELECT SCHEMA_NAME, DIGEST, QUERY_SAMPLE_TEXT, LAST_SEEN \
FROM performance_schema.events_statements_summary_by_digest \
WHERE LAST_SEEN > ? \
AND QUERY_SAMPLE_TEXT IS NOT NULL \
AND DIGEST IS NOT NULL \
AND SCHEMA_NAME NOT IN ";

/// Error text reported by the engine, e.g. `Error 1044: Access denied ...`.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct DatabaseError {
    pub message: String,
}

impl DatabaseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// One row of the digest summary scan.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestRow {
    pub schema_name: String,
    pub digest: String,
    pub query_sample_text: String,
    pub last_seen: DateTime<Utc>,
}

impl From<DigestRow> for QueryCandidate {
    fn from(row: DigestRow) -> Self {
        QueryCandidate {
            schema: row.schema_name,
            digest: row.digest,
            query_text: row.query_sample_text,
            last_seen: row.last_seen,
        }
    }
}

/// A pool of connections to the monitored server. Checkouts must be safe to
/// perform concurrently from several collectors.
#[async_trait]
pub trait ExplainDatabase: Send + Sync + 'static {
    type Connection: ExplainConnection;

    /// Runs the digest scan with `last_seen` bound to its only placeholder.
    async fn select_digests(&self, query: &str, last_seen: DateTime<Utc>) -> Result<Vec<DigestRow>, DatabaseError>;

    async fn acquire(&self) -> Result<Self::Connection, DatabaseError>;
}

/// A single checked-out session. Schema selection is session scoped.
#[async_trait]
pub trait ExplainConnection: Send {
    async fn execute(&mut self, statement: &str) -> Result<(), DatabaseError>;

    /// Runs an `EXPLAIN FORMAT=JSON` statement and returns the raw single-column payload.
    async fn query_explain_json(&mut self, statement: &str) -> Result<Vec<u8>, DatabaseError>;
}

pub fn select_digests_query(exclusion_clause: &str) -> String {
    format!("{SELECT_DIGESTS}{exclusion_clause}")
}

pub fn use_schema_statement(schema: &str) -> String {
    format!("USE `{}`", schema.replace('`', "``"))
}

pub fn explain_statement(query_text: &str) -> String {
    format!("{EXPLAIN_PREFIX}{query_text}")
}
