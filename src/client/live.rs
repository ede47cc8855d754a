//! A `TransactionalClient` backed by a real MySQL connection.

use super::{QueryResult, TransactionalClient};
use crate::config::DbConfig;
use crate::errors::{PlayerError, PlayerResult};
use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Error as MyError, OptsBuilder, Row, Value};
use tracing::warn;

/// The server error code for `ER_QUERY_INTERRUPTED`: a query that was
/// killed mid-flight, not a connection failure, but one that still leaves
/// the session unsafe to reuse without reconnecting.
const QUERY_INTERRUPTED: u16 = 1317;

pub struct LiveClient {
    opts: OptsBuilder,
    conn: Option<Conn>,
}

impl LiveClient {
    pub fn new(config: &DbConfig) -> Self {
        let opts = OptsBuilder::default()
            .ip_or_hostname(config.host.clone())
            .tcp_port(config.port)
            .user(Some(config.uname.clone()))
            .pass(Some(config.pass.clone()))
            .db_name(Some(config.dbname.clone()));
        Self { opts, conn: None }
    }

    fn conn_mut(&mut self) -> PlayerResult<&mut Conn> {
        self.conn
            .as_mut()
            .ok_or_else(|| PlayerError::connect("not connected"))
    }

    /// Mirrors the upstream driver's error classification: errors in the
    /// connection-lost class, or a query killed server-side, leave the
    /// session unusable and must close it so the next statement reconnects.
    /// Returns whether the error fell into that class.
    async fn handle_error(&mut self, err: &MyError) -> bool {
        let should_close = match err {
            MyError::Io(_) | MyError::Driver(_) => true,
            MyError::Server(server_err) => server_err.code == QUERY_INTERRUPTED,
            _ => false,
        };
        if should_close {
            warn!(error = %err, "closing connection after connection-lost class error");
            self.close().await;
        }
        should_close
    }
}

#[async_trait]
impl TransactionalClient for LiveClient {
    async fn connect(&mut self) -> PlayerResult<()> {
        let conn = Conn::new(self.opts.clone())
            .await
            .map_err(|e| PlayerError::connect(e.to_string()))?;
        self.conn = Some(conn);
        Ok(())
    }

    async fn begin(&mut self) -> PlayerResult<()> {
        self.execute_fetch("BEGIN", 0, false).await.map(|_| ())
    }

    async fn commit(&mut self) -> PlayerResult<()> {
        let result = self.execute_fetch("COMMIT", 0, false).await;
        if result.is_err() {
            // The upstream always closes on a failed COMMIT/ROLLBACK: the
            // transaction's fate is unknown and the connection may be left
            // mid-transaction, so the only safe move is to drop it.
            self.close().await;
        }
        result.map(|_| ())
    }

    async fn rollback(&mut self) -> PlayerResult<()> {
        let result = self.execute_fetch("ROLLBACK", 0, false).await;
        if result.is_err() {
            self.close().await;
        }
        result.map(|_| ())
    }

    async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            let _ = conn.disconnect().await;
        }
    }

    async fn execute_fetch(
        &mut self,
        query: &str,
        max_rows: usize,
        want_fields: bool,
    ) -> PlayerResult<QueryResult> {
        let conn = self.conn_mut()?;
        let outcome: Result<Vec<Row>, MyError> = conn.query(query).await;
        let rows = match outcome {
            Ok(rows) => rows,
            Err(err) => {
                return Err(if self.handle_error(&err).await {
                    PlayerError::transient_driver(err.to_string())
                } else {
                    PlayerError::sql(err.to_string(), query)
                });
            }
        };

        let fields = if want_fields {
            rows.first()
                .map(|row| row.columns_ref().iter().map(|c| c.name_str().into_owned()).collect())
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        let limited: Vec<Row> = if max_rows > 0 {
            rows.into_iter().take(max_rows).collect()
        } else {
            rows
        };

        let rows_affected = limited.len() as u64;
        let rows = limited
            .into_iter()
            .map(|row| {
                (0..row.len())
                    .map(|i| match row.as_ref(i) {
                        Some(Value::NULL) | None => None,
                        Some(v) => Some(v.as_sql(false)),
                    })
                    .collect()
            })
            .collect();

        Ok(QueryResult { fields, rows, rows_affected })
    }
}
