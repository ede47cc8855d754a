//! A `TransactionalClient` that never touches a database: every statement
//! is written to a byte sink instead of executed. Used for `--debug` runs
//! so an operator can inspect exactly what would have been applied.

use super::{QueryResult, TransactionalClient};
use crate::errors::{PlayerError, PlayerResult};
use async_trait::async_trait;
use std::io::Write;

pub struct DryRunClient<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> DryRunClient<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    fn write_line(&mut self, line: &str) -> PlayerResult<()> {
        writeln!(self.writer, "{line}").map_err(PlayerError::from)
    }
}

#[async_trait]
impl<W: Write + Send> TransactionalClient for DryRunClient<W> {
    async fn connect(&mut self) -> PlayerResult<()> {
        Ok(())
    }

    async fn begin(&mut self) -> PlayerResult<()> {
        self.write_line("BEGIN;")
    }

    async fn commit(&mut self) -> PlayerResult<()> {
        self.write_line("COMMIT;")
    }

    async fn rollback(&mut self) -> PlayerResult<()> {
        self.write_line("ROLLBACK;")
    }

    async fn close(&mut self) {}

    async fn execute_fetch(
        &mut self,
        query: &str,
        _max_rows: usize,
        _want_fields: bool,
    ) -> PlayerResult<QueryResult> {
        self.write_line(&format!("{query};"))?;
        Ok(QueryResult::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_one_line_per_statement() {
        let mut client = DryRunClient::new(Vec::new());
        client.begin().await.unwrap();
        client
            .execute_fetch("INSERT INTO t VALUES (1)", 0, false)
            .await
            .unwrap();
        client.commit().await.unwrap();
        let out = String::from_utf8(client.into_writer()).unwrap();
        assert_eq!(out, "BEGIN;\nINSERT INTO t VALUES (1);\nCOMMIT;\n");
    }

    #[tokio::test]
    async fn rollback_is_marked_distinctly() {
        let mut client = DryRunClient::new(Vec::new());
        client.begin().await.unwrap();
        client.rollback().await.unwrap();
        let out = String::from_utf8(client.into_writer()).unwrap();
        assert_eq!(out, "BEGIN;\nROLLBACK;\n");
    }
}
