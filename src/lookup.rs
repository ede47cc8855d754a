//! Produces the lookup-database SQL a DML event implies: an index
//! upsert/delete keyed on `(index_type, index_id)`, and a guarded sequence
//! advance when the event carries a recognized `seq_name`.

use crate::errors::{PlayerError, PlayerResult};
use crate::types::{Event, SqlType};

const SUPPORTED_SEQUENCES: [&str; 3] = ["user_id", "video_id", "set_id"];

/// Builds the index statement for a DML event, if its `index_type` carries
/// one. `video_id` and `set_id` are the only supported index types;
/// `username` and anything else are rejected rather than silently dropped.
pub fn index_sql(event: &Event, kind: SqlType) -> PlayerResult<Option<String>> {
    if event.index_type.is_empty() {
        return Ok(None);
    }
    match event.index_type.as_str() {
        "video_id" | "set_id" => {
            let index_id: u64 = event.index_id.parse().map_err(|_| {
                PlayerError::protocol(format!(
                    "non-integer index_id '{}' for index_type '{}'",
                    event.index_id, event.index_type
                ))
            })?;
            let table = format!("vt_{}_map", event.index_type);
            match kind {
                SqlType::Insert => Ok(Some(format!(
                    "INSERT INTO {table} ({0}, user_id) VALUES ({1}, {2}) \
                     ON DUPLICATE KEY UPDATE user_id = {2}",
                    event.index_type, index_id, event.user_id
                ))),
                SqlType::Delete => Ok(Some(format!(
                    "DELETE FROM {table} WHERE {} = {} AND user_id = {}",
                    event.index_type, index_id, event.user_id
                ))),
                SqlType::Update => Err(PlayerError::protocol(format!(
                    "update is not supported for index_type '{}'",
                    event.index_type
                ))),
                _ => Ok(None),
            }
        }
        "username" => Err(PlayerError::protocol(
            "index_type 'username' is not supported",
        )),
        other => Err(PlayerError::protocol(format!(
            "unsupported index_type '{other}'"
        ))),
    }
}

/// Builds the guarded sequence-advance statement for an insert event, if it
/// names a recognized sequence. The guard `id < seq_id` makes the statement
/// idempotent under redelivery: replaying an already-applied insert leaves
/// the sequence row unchanged once it has advanced past `seq_id`.
pub fn sequence_sql(event: &Event, kind: SqlType) -> PlayerResult<Option<String>> {
    if event.seq_name.is_empty() {
        return Ok(None);
    }
    if kind != SqlType::Insert {
        return Ok(None);
    }
    if !SUPPORTED_SEQUENCES.contains(&event.seq_name.as_str()) {
        return Err(PlayerError::protocol(format!(
            "unsupported seq_name '{}'",
            event.seq_name
        )));
    }
    Ok(Some(format!(
        "UPDATE vt_sequence SET id = {0} WHERE name = '{1}' AND id < {0}",
        event.seq_id, event.seq_name
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReplicationCoordinate;

    fn event() -> Event {
        Event {
            sql_type: "insert".into(),
            sql: vec![],
            position: ReplicationCoordinate::default(),
            keyspace_id: "1".into(),
            index_type: "video_id".into(),
            index_id: "55".into(),
            user_id: 7,
            seq_name: "user_id".into(),
            seq_id: 42,
            error: String::new(),
        }
    }

    #[test]
    fn video_id_insert_produces_upsert() {
        let e = event();
        let sql = index_sql(&e, SqlType::Insert).unwrap().unwrap();
        assert!(sql.contains("INSERT INTO vt_video_id_map"));
        assert!(sql.contains("55"));
        assert!(sql.contains("7"));
    }

    #[test]
    fn video_id_update_is_rejected() {
        let e = event();
        assert!(index_sql(&e, SqlType::Update).is_err());
    }

    #[test]
    fn username_index_is_rejected() {
        let mut e = event();
        e.index_type = "username".into();
        assert!(index_sql(&e, SqlType::Insert).is_err());
    }

    #[test]
    fn non_integer_index_id_is_rejected() {
        let mut e = event();
        e.index_id = "not-a-number".into();
        assert!(index_sql(&e, SqlType::Insert).is_err());
    }

    #[test]
    fn sequence_update_is_guarded_three_argument_form() {
        let e = event();
        let sql = sequence_sql(&e, SqlType::Insert).unwrap().unwrap();
        assert_eq!(sql, "UPDATE vt_sequence SET id = 42 WHERE name = 'user_id' AND id < 42");
    }

    #[test]
    fn sequence_update_only_applies_to_inserts() {
        let e = event();
        assert!(sequence_sql(&e, SqlType::Delete).unwrap().is_none());
    }

    #[test]
    fn unsupported_seq_name_is_rejected() {
        let mut e = event();
        e.seq_name = "other".into();
        assert!(sequence_sql(&e, SqlType::Insert).is_err());
    }
}
