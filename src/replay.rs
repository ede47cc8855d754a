//! Orchestrates the classifier's output: applies a committed transaction's
//! DMLs to the primary database, mirrors the implied index/sequence writes
//! to the lookup database, and advances the recovery checkpoint — all as
//! one atomic unit from the caller's point of view.

use crate::client::TransactionalClient;
use crate::errors::{PlayerError, PlayerResult};
use crate::keyrange::KeyRange;
use crate::lookup;
use crate::metrics::{ReplayMetrics, TxnTimer};
use crate::recovery::{now_unix, RecoveryStore};
use crate::types::{Event, SqlType};
use tracing::{info, warn};

/// A DDL error text that matches one of the two recognized idempotent
/// outcomes: the table already existed (on CREATE) or didn't exist (on
/// DROP). Matched loosely since drivers differ in exact wording.
fn is_idempotent_ddl_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("already exists") || lower.contains("doesn't exist") || lower.contains("does not exist")
}

/// Extracts the table name from a DML's `/* _stream <table> ... */` marker.
/// Returns `None` when the marker is absent, which table-allow-list
/// filtering treats as "does not match" whenever an allow-list is active.
fn stream_table(sql: &[String]) -> Option<String> {
    for stmt in sql {
        if let Some(start) = stmt.find("/* _stream ") {
            let rest = &stmt[start + "/* _stream ".len()..];
            let name: String = rest
                .chars()
                .take_while(|c| !c.is_whitespace())
                .collect();
            if !name.is_empty() {
                return Some(name);
            }
        }
    }
    None
}

fn passes_allow_list(sql: &[String], allow_list: Option<&[String]>) -> bool {
    match allow_list {
        None => true,
        Some(allowed) => match stream_table(sql) {
            Some(table) => allowed.iter().any(|t| t == &table),
            None => false,
        },
    }
}

pub struct ReplayEngine {
    uid: u32,
    keyrange: KeyRange,
    table_allow_list: Option<Vec<String>>,
    primary: Box<dyn TransactionalClient>,
    lookup: Option<Box<dyn TransactionalClient>>,
    recovery: RecoveryStore,
    metrics: ReplayMetrics,
}

impl ReplayEngine {
    pub fn new(
        uid: u32,
        keyrange: KeyRange,
        table_allow_list: Option<Vec<String>>,
        primary: Box<dyn TransactionalClient>,
        lookup: Option<Box<dyn TransactionalClient>>,
        metrics: ReplayMetrics,
    ) -> Self {
        Self {
            uid,
            keyrange,
            table_allow_list,
            primary,
            lookup,
            recovery: RecoveryStore::new(uid),
            metrics,
        }
    }

    pub fn metrics(&self) -> ReplayMetrics {
        self.metrics.clone()
    }

    /// Applies a DDL event outside any transaction, then records the new
    /// position via a degenerate local transaction.
    pub async fn apply_ddl(&mut self, event: Event) -> PlayerResult<()> {
        for stmt in &event.sql {
            if let Err(err) = self.primary.execute_fetch(stmt, 0, false).await {
                let message = err.to_string();
                if is_idempotent_ddl_error(&message) {
                    warn!(statement = %stmt, "idempotent DDL error, continuing");
                } else {
                    return Err(err);
                }
            }
        }

        self.primary.begin().await?;
        let now = now_unix();
        let result = self
            .recovery
            .update(self.primary.as_mut(), &event.position, now, now)
            .await;
        match result {
            Ok(()) => self.primary.commit().await,
            Err(err) => {
                self.primary.rollback().await.ok();
                Err(err)
            }
        }?;
        self.metrics.record_queries(event.sql.len() as u64);
        Ok(())
    }

    /// Applies one completed transaction buffer (BEGIN ..= COMMIT) as
    /// described by the replay procedure: filtered DMLs are applied to the
    /// primary DB, their implied lookup writes committed first, and the
    /// checkpoint only advances when at least one DML matched.
    pub async fn apply_transaction(&mut self, buffer: Vec<Event>) -> PlayerResult<()> {
        let timer = TxnTimer::start();
        let allow_list = self.table_allow_list.clone();

        let mut commit_event: Option<Event> = None;
        let mut primary_open = false;
        let mut index_sql = Vec::new();
        let mut sequence_sql = Vec::new();
        let mut query_count: u64 = 0;

        for event in buffer {
            let Some(kind) = event.parsed_sql_type() else {
                return Err(PlayerError::protocol(format!(
                    "unknown sql_type '{}'",
                    event.sql_type
                )));
            };
            match kind {
                SqlType::Begin => continue,
                SqlType::Commit => {
                    commit_event = Some(event);
                    break;
                }
                _ if kind.is_dml() => {
                    if !passes_allow_list(&event.sql, allow_list.as_deref()) {
                        continue;
                    }
                    if !self.keyrange.contains_decimal(&event.keyspace_id)? {
                        return Err(PlayerError::protocol(format!(
                            "keyspace id '{}' outside configured range",
                            event.keyspace_id
                        )));
                    }
                    if let Some(sql) = lookup::index_sql(&event, kind)? {
                        index_sql.push(sql);
                    }
                    if let Some(sql) = lookup::sequence_sql(&event, kind)? {
                        sequence_sql.push(sql);
                    }
                    if !primary_open {
                        self.primary.begin().await?;
                        primary_open = true;
                    }
                    for stmt in &event.sql {
                        self.primary.execute_fetch(stmt, 0, false).await?;
                        query_count += 1;
                    }
                }
                _ => {}
            }
        }

        let Some(commit_event) = commit_event else {
            return Err(PlayerError::protocol("transaction buffer missing COMMIT"));
        };

        if !primary_open {
            // Nothing in this source transaction matched; the checkpoint
            // stays put and no connection was touched.
            return Ok(());
        }

        if !index_sql.is_empty() || !sequence_sql.is_empty() {
            let lookup_client = self
                .lookup
                .as_deref_mut()
                .ok_or_else(|| PlayerError::config("lookup writes required but no lookup client configured"))?;
            lookup_client.begin().await?;
            let outcome: PlayerResult<()> = async {
                for stmt in index_sql.iter().chain(sequence_sql.iter()) {
                    lookup_client.execute_fetch(stmt, 0, false).await?;
                }
                Ok(())
            }
            .await;
            match outcome {
                Ok(()) => lookup_client.commit().await?,
                Err(err) => {
                    lookup_client.rollback().await.ok();
                    return Err(err);
                }
            }
        }

        let now = now_unix();
        let recovery_result = self
            .recovery
            .update(self.primary.as_mut(), &commit_event.position, now, now)
            .await;
        match recovery_result {
            Ok(()) => self.primary.commit().await?,
            Err(err) => {
                self.primary.rollback().await.ok();
                return Err(err);
            }
        }

        self.metrics.record_queries(query_count);
        self.metrics.record_transaction(timer.elapsed());
        info!(uid = self.uid, position = %commit_event.position, "applied transaction");
        Ok(())
    }

    /// Best-effort rollback used on cancellation: if a primary transaction
    /// is left open when the stream is told to stop, abandon it rather
    /// than commit partial state.
    pub async fn rollback_in_flight(&mut self) {
        self.primary.rollback().await.ok();
        if let Some(lookup) = self.lookup.as_deref_mut() {
            lookup.rollback().await.ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DryRunClient;
    use crate::types::ReplicationCoordinate;

    fn begin() -> Event {
        Event {
            sql_type: "BEGIN".into(),
            sql: vec![],
            position: ReplicationCoordinate::default(),
            keyspace_id: String::new(),
            index_type: String::new(),
            index_id: String::new(),
            user_id: 0,
            seq_name: String::new(),
            seq_id: 0,
            error: String::new(),
        }
    }

    fn commit_at(master_position: u64) -> Event {
        Event {
            sql_type: "COMMIT".into(),
            sql: vec![],
            position: ReplicationCoordinate {
                master_filename: "f".into(),
                master_position,
                relay_filename: String::new(),
                relay_position: 0,
            },
            keyspace_id: String::new(),
            index_type: String::new(),
            index_id: String::new(),
            user_id: 0,
            seq_name: String::new(),
            seq_id: 0,
            error: String::new(),
        }
    }

    fn insert(keyspace_id: &str, table: &str) -> Event {
        Event {
            sql_type: "insert".into(),
            sql: vec![format!(
                "INSERT INTO {table} (id) VALUES (1) /* _stream {table} (id) (1) */"
            )],
            position: ReplicationCoordinate::default(),
            keyspace_id: keyspace_id.into(),
            index_type: "video_id".into(),
            index_id: "55".into(),
            user_id: 7,
            seq_name: "user_id".into(),
            seq_id: 42,
            error: String::new(),
        }
    }

    fn engine(allow_list: Option<Vec<String>>) -> ReplayEngine {
        let keyrange = KeyRange::from_hex("", "100").unwrap();
        ReplayEngine::new(
            1,
            keyrange,
            allow_list,
            Box::new(DryRunClient::new(Vec::new())),
            Some(Box::new(DryRunClient::new(Vec::new()))),
            ReplayMetrics::new(),
        )
    }

    #[tokio::test]
    async fn matching_transaction_commits_primary_and_lookup() {
        let mut e = engine(None);
        let buffer = vec![begin(), insert("1", "y"), commit_at(1000)];
        e.apply_transaction(buffer).await.unwrap();
        assert_eq!(e.metrics().snapshot().transactions, 1);
    }

    #[tokio::test]
    async fn out_of_range_keyspace_id_is_fatal() {
        let mut e = engine(None);
        let buffer = vec![begin(), insert("500", "y"), commit_at(2000)];
        assert!(e.apply_transaction(buffer).await.is_err());
    }

    #[tokio::test]
    async fn allow_list_excluding_all_dmls_performs_no_writes() {
        let mut e = engine(Some(vec!["y".to_string()]));
        let buffer = vec![begin(), insert("1", "x"), commit_at(2000)];
        e.apply_transaction(buffer).await.unwrap();
        assert_eq!(e.metrics().snapshot().transactions, 0);
    }
}
