//! The recovery checkpoint: a single row per uid recording how far this
//! player has replayed, so a restart can resume instead of reapplying from
//! the start-position file.

use crate::client::TransactionalClient;
use crate::errors::{PlayerError, PlayerResult};
use crate::types::{RecoveryState, ReplicationCoordinate};

const TABLE_NAME: &str = "vt_blp_recovery";

/// Current time as a unix timestamp, truncated to `u32` to match the
/// recovery row's `txn_timestamp`/`time_updated` columns.
pub(crate) fn now_unix() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Persists and loads the single-row-per-uid checkpoint table.
pub struct RecoveryStore {
    uid: u32,
}

impl RecoveryStore {
    pub fn new(uid: u32) -> Self {
        Self { uid }
    }

    /// Creates the checkpoint table if it does not already exist. Safe to
    /// call on every startup.
    pub async fn ensure_table(&self, client: &mut dyn TransactionalClient) -> PlayerResult<()> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {TABLE_NAME} (
                uid INT NOT NULL,
                host VARCHAR(255) NOT NULL,
                port INT NOT NULL,
                master_filename VARCHAR(255) NOT NULL,
                master_position BIGINT UNSIGNED NOT NULL,
                relay_filename VARCHAR(255) NOT NULL DEFAULT '',
                relay_position BIGINT UNSIGNED NOT NULL DEFAULT 0,
                keyrange_start VARCHAR(32) NOT NULL DEFAULT '',
                keyrange_end VARCHAR(32) NOT NULL DEFAULT '',
                txn_timestamp INT UNSIGNED NOT NULL DEFAULT 0,
                time_updated INT UNSIGNED NOT NULL,
                PRIMARY KEY (uid)
            )"
        );
        client.execute_fetch(&ddl, 0, false).await?;
        Ok(())
    }

    /// Loads the last saved checkpoint for this uid, if one was ever
    /// written.
    pub async fn load(
        &self,
        client: &mut dyn TransactionalClient,
    ) -> PlayerResult<Option<RecoveryState>> {
        let query = format!(
            "SELECT uid, host, port, master_filename, master_position, relay_filename, \
             relay_position, keyrange_start, keyrange_end, txn_timestamp, time_updated \
             FROM {TABLE_NAME} WHERE uid = {}",
            self.uid
        );
        let result = client.execute_fetch(&query, 1, true).await?;
        let Some(row) = result.rows.first() else {
            return Ok(None);
        };
        let col = |name: &str| -> PlayerResult<&Option<String>> {
            let idx = result
                .column(name)
                .ok_or_else(|| PlayerError::protocol(format!("recovery row missing column {name}")))?;
            Ok(&row[idx])
        };
        let text = |name: &str| -> PlayerResult<String> {
            Ok(col(name)?.clone().unwrap_or_default())
        };
        let number = |name: &str| -> PlayerResult<u64> {
            text(name)?
                .parse()
                .map_err(|_| PlayerError::protocol(format!("recovery row has non-numeric {name}")))
        };

        Ok(Some(RecoveryState {
            uid: number("uid")? as u32,
            host: text("host")?,
            port: number("port")? as u16,
            position: ReplicationCoordinate {
                master_filename: text("master_filename")?,
                master_position: number("master_position")?,
                relay_filename: text("relay_filename")?,
                relay_position: number("relay_position")?,
            },
            keyrange_start: text("keyrange_start")?,
            keyrange_end: text("keyrange_end")?,
            txn_timestamp: number("txn_timestamp")? as u32,
            time_updated: number("time_updated")? as u32,
        }))
    }

    /// Writes the initial row for this uid if one does not already exist;
    /// otherwise a no-op, so a restart that skips `--use-checkpoint` does
    /// not collide with a row a previous run already wrote.
    pub async fn initialize(
        &self,
        client: &mut dyn TransactionalClient,
        state: &RecoveryState,
    ) -> PlayerResult<()> {
        if self.load(client).await?.is_some() {
            return Ok(());
        }
        let insert = format!(
            "INSERT INTO {TABLE_NAME} (uid, host, port, master_filename, master_position, \
             relay_filename, relay_position, keyrange_start, keyrange_end, txn_timestamp, \
             time_updated) VALUES ({}, '{}', {}, '{}', {}, '{}', {}, '{}', '{}', {}, {})",
            state.uid,
            escape(&state.host),
            state.port,
            escape(&state.position.master_filename),
            state.position.master_position,
            escape(&state.position.relay_filename),
            state.position.relay_position,
            escape(&state.keyrange_start),
            escape(&state.keyrange_end),
            state.txn_timestamp,
            state.time_updated,
        );
        client.execute_fetch(&insert, 0, false).await?;
        Ok(())
    }

    /// Updates the checkpoint position in place. Issued inside the same
    /// primary-database transaction as the replayed statements, so the
    /// checkpoint never drifts ahead of what was actually committed.
    pub async fn update(
        &self,
        client: &mut dyn TransactionalClient,
        position: &ReplicationCoordinate,
        txn_timestamp: u32,
        time_updated: u32,
    ) -> PlayerResult<()> {
        let update = format!(
            "UPDATE {TABLE_NAME} SET master_filename = '{}', master_position = {}, \
             relay_filename = '{}', relay_position = {}, txn_timestamp = {}, time_updated = {} \
             WHERE uid = {}",
            escape(&position.master_filename),
            position.master_position,
            escape(&position.relay_filename),
            position.relay_position,
            txn_timestamp,
            time_updated,
            self.uid,
        );
        client.execute_fetch(&update, 0, false).await?;
        Ok(())
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DryRunClient;

    #[tokio::test]
    async fn ensure_table_emits_create_statement() {
        let mut client = DryRunClient::new(Vec::new());
        let store = RecoveryStore::new(42);
        store.ensure_table(&mut client).await.unwrap();
        let out = String::from_utf8(client.into_writer()).unwrap();
        assert!(out.contains("CREATE TABLE IF NOT EXISTS vt_blp_recovery"));
    }

    #[tokio::test]
    async fn initialize_inserts_when_no_row_exists() {
        let mut client = DryRunClient::new(Vec::new());
        let store = RecoveryStore::new(7);
        let state = RecoveryState {
            uid: 7,
            host: "h".into(),
            port: 3306,
            position: ReplicationCoordinate::default(),
            keyrange_start: "".into(),
            keyrange_end: "80".into(),
            txn_timestamp: 0,
            time_updated: 0,
        };
        store.initialize(&mut client, &state).await.unwrap();
        let out = String::from_utf8(client.into_writer()).unwrap();
        assert!(out.contains("INSERT INTO vt_blp_recovery"));
    }

    #[tokio::test]
    async fn update_escapes_quotes_in_filename() {
        let mut client = DryRunClient::new(Vec::new());
        let store = RecoveryStore::new(1);
        let position = ReplicationCoordinate {
            master_filename: "bin'log.000001".into(),
            master_position: 5,
            relay_filename: String::new(),
            relay_position: 0,
        };
        store.update(&mut client, &position, 0, 0).await.unwrap();
        let out = String::from_utf8(client.into_writer()).unwrap();
        assert!(out.contains("bin\\'log.000001"));
    }
}
