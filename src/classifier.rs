//! Interprets each incoming event as BEGIN/COMMIT/DDL/DML and tracks the
//! in-transaction flag and buffer described by the state table: only a
//! BEGIN may open a transaction, only a COMMIT may close one, and DDL is
//! only legal between transactions.

use crate::errors::{PlayerError, PlayerResult};
use crate::types::{Event, SqlType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    InTxn,
}

/// What the classifier produced after consuming one event.
pub enum Classified {
    /// The event was buffered; no action is due yet.
    Buffered,
    /// A COMMIT closed a transaction; here is its full buffer, BEGIN first.
    Transaction(Vec<Event>),
    /// A DDL event arrived outside any transaction and should be applied
    /// immediately.
    Ddl(Event),
}

pub struct EventClassifier {
    state: State,
    buffer: Vec<Event>,
}

impl Default for EventClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl EventClassifier {
    pub fn new() -> Self {
        Self { state: State::Idle, buffer: Vec::new() }
    }

    pub fn process(&mut self, event: Event) -> PlayerResult<Classified> {
        if !event.error.is_empty() {
            return Err(PlayerError::protocol(format!(
                "event carried error: {}",
                event.error
            )));
        }
        let Some(sql_type) = event.parsed_sql_type() else {
            return Err(PlayerError::protocol(format!(
                "unknown sql_type '{}'",
                event.sql_type
            )));
        };

        match (self.state, sql_type) {
            (State::Idle, SqlType::Begin) => {
                self.buffer.clear();
                self.buffer.push(event);
                self.state = State::InTxn;
                Ok(Classified::Buffered)
            }
            (State::Idle, SqlType::Ddl) => Ok(Classified::Ddl(event)),
            (State::Idle, SqlType::Commit) => {
                Err(PlayerError::protocol("COMMIT received with no open transaction"))
            }
            (State::Idle, kind) if kind.is_dml() => {
                Err(PlayerError::protocol("DML received with no open transaction"))
            }
            (State::InTxn, SqlType::Begin) => {
                Err(PlayerError::protocol("nested BEGIN while a transaction is open"))
            }
            (State::InTxn, kind) if kind.is_dml() => {
                self.buffer.push(event);
                Ok(Classified::Buffered)
            }
            (State::InTxn, SqlType::Commit) => {
                self.buffer.push(event);
                self.state = State::Idle;
                Ok(Classified::Transaction(std::mem::take(&mut self.buffer)))
            }
            (State::InTxn, SqlType::Ddl) => {
                Err(PlayerError::protocol("DDL received inside an open transaction"))
            }
            _ => unreachable!("SqlType covers Begin/Commit/Ddl/dml exhaustively"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReplicationCoordinate;

    fn event(sql_type: &str) -> Event {
        Event {
            sql_type: sql_type.into(),
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

    #[test]
    fn begin_insert_commit_yields_one_transaction() {
        let mut c = EventClassifier::new();
        assert!(matches!(c.process(event("BEGIN")).unwrap(), Classified::Buffered));
        assert!(matches!(c.process(event("insert")).unwrap(), Classified::Buffered));
        match c.process(event("COMMIT")).unwrap() {
            Classified::Transaction(buf) => assert_eq!(buf.len(), 3),
            _ => panic!("expected a completed transaction"),
        }
    }

    #[test]
    fn nested_begin_is_fatal() {
        let mut c = EventClassifier::new();
        c.process(event("BEGIN")).unwrap();
        assert!(c.process(event("BEGIN")).is_err());
    }

    #[test]
    fn commit_without_begin_is_fatal() {
        let mut c = EventClassifier::new();
        assert!(c.process(event("COMMIT")).is_err());
    }

    #[test]
    fn dml_without_begin_is_fatal() {
        let mut c = EventClassifier::new();
        assert!(c.process(event("insert")).is_err());
    }

    #[test]
    fn ddl_outside_transaction_passes_through() {
        let mut c = EventClassifier::new();
        assert!(matches!(c.process(event("DDL")).unwrap(), Classified::Ddl(_)));
    }

    #[test]
    fn ddl_inside_transaction_is_fatal() {
        let mut c = EventClassifier::new();
        c.process(event("BEGIN")).unwrap();
        assert!(c.process(event("DDL")).is_err());
    }

    #[test]
    fn event_with_error_field_is_always_fatal() {
        let mut c = EventClassifier::new();
        let mut e = event("insert");
        e.error = "replication lag".into();
        assert!(c.process(e).is_err());
    }

    #[test]
    fn unknown_sql_type_is_fatal() {
        let mut c = EventClassifier::new();
        assert!(c.process(event("truncate")).is_err());
    }
}
