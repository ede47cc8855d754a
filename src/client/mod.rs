//! The transactional client capability: everything the replay engine needs
//! from a database connection, abstracted behind a trait so the engine can
//! run against a real MySQL connection or a dry-run byte sink without
//! caring which.

mod dry_run;
mod live;

pub use dry_run::DryRunClient;
pub use live::LiveClient;

use crate::errors::PlayerResult;
use async_trait::async_trait;

/// The rows and field names returned by `execute_fetch`. Values are carried
/// as their textual representation; callers that need typed access parse
/// the column they asked for.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub fields: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    pub rows_affected: u64,
}

impl QueryResult {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }
}

/// A connection capable of executing SQL inside explicit transactions.
/// Implementations own reconnection policy: `execute_fetch` may be called
/// after a connection was silently dropped, and is expected to reconnect
/// transparently for connection-lost-class errors.
#[async_trait]
pub trait TransactionalClient: Send {
    async fn connect(&mut self) -> PlayerResult<()>;
    async fn begin(&mut self) -> PlayerResult<()>;
    async fn commit(&mut self) -> PlayerResult<()>;
    async fn rollback(&mut self) -> PlayerResult<()>;
    async fn close(&mut self);
    async fn execute_fetch(
        &mut self,
        query: &str,
        max_rows: usize,
        want_fields: bool,
    ) -> PlayerResult<QueryResult>;
}
