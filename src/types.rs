//! Core data types shared across the replay engine: replication coordinates,
//! the wire event shape, and the recovery row persisted per uid.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A position in the upstream binlog stream. Ordered by
/// `(master_filename, master_position)`; the relay fields are opaque to the
/// core and persisted verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationCoordinate {
    #[serde(default)]
    pub master_filename: String,
    #[serde(default)]
    pub master_position: u64,
    #[serde(default)]
    pub relay_filename: String,
    #[serde(default)]
    pub relay_position: u64,
}

impl PartialOrd for ReplicationCoordinate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReplicationCoordinate {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.master_filename, self.master_position)
            .cmp(&(&other.master_filename, other.master_position))
    }
}

impl fmt::Display for ReplicationCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} (relay {}:{})",
            self.master_filename, self.master_position, self.relay_filename, self.relay_position
        )
    }
}

/// The kind of a single change-stream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Begin,
    Commit,
    Ddl,
    Insert,
    Update,
    Delete,
}

impl SqlType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "BEGIN" | "begin" => Some(Self::Begin),
            "COMMIT" | "commit" => Some(Self::Commit),
            "DDL" | "ddl" => Some(Self::Ddl),
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn is_dml(self) -> bool {
        matches!(self, Self::Insert | Self::Update | Self::Delete)
    }

    pub fn as_dml_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            _ => "",
        }
    }
}

/// A single event received from the change stream.
#[derive(Debug, Clone)]
pub struct Event {
    pub sql_type: String,
    pub sql: Vec<String>,
    pub position: ReplicationCoordinate,
    pub keyspace_id: String,
    pub index_type: String,
    pub index_id: String,
    pub user_id: u64,
    pub seq_name: String,
    pub seq_id: u64,
    pub error: String,
}

impl Event {
    pub fn parsed_sql_type(&self) -> Option<SqlType> {
        SqlType::parse(&self.sql_type)
    }
}

/// The full recovery row persisted for a given uid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryState {
    pub uid: u32,
    pub host: String,
    pub port: u16,
    pub position: ReplicationCoordinate,
    pub keyrange_start: String,
    pub keyrange_end: String,
    pub txn_timestamp: u32,
    pub time_updated: u32,
}

/// The on-disk shape of the `start-pos-file` JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartPositionFile {
    #[serde(rename = "Uid")]
    pub uid: u32,
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Port")]
    pub port: u16,
    #[serde(rename = "Position")]
    pub position: StartPositionCoordinate,
    #[serde(rename = "KeyrangeStart")]
    pub keyrange_start: String,
    #[serde(rename = "KeyrangeEnd")]
    pub keyrange_end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartPositionCoordinate {
    #[serde(rename = "MasterFilename", default)]
    pub master_filename: String,
    #[serde(rename = "MasterPosition", default)]
    pub master_position: u64,
    #[serde(rename = "RelayFilename", default)]
    pub relay_filename: String,
    #[serde(rename = "RelayPosition", default)]
    pub relay_position: u64,
}

impl From<StartPositionCoordinate> for ReplicationCoordinate {
    fn from(c: StartPositionCoordinate) -> Self {
        Self {
            master_filename: c.master_filename,
            master_position: c.master_position,
            relay_filename: c.relay_filename,
            relay_position: c.relay_position,
        }
    }
}

impl StartPositionFile {
    pub fn validate(&self) -> Result<(), String> {
        if self.uid == 0 {
            return Err("missing Uid".to_string());
        }
        if self.host.is_empty() || self.port == 0 {
            return Err("invalid connection params".to_string());
        }
        if self.keyrange_start.is_empty() && self.keyrange_end.is_empty() {
            return Err("invalid keyrange endpoints: both empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_orders_by_filename_then_position() {
        let a = ReplicationCoordinate {
            master_filename: "bin.000001".into(),
            master_position: 900,
            ..Default::default()
        };
        let b = ReplicationCoordinate {
            master_filename: "bin.000002".into(),
            master_position: 1,
            ..Default::default()
        };
        assert!(a < b);
    }

    #[test]
    fn start_position_requires_nonempty_keyrange() {
        let mut sp = StartPositionFile {
            uid: 1,
            host: "h".into(),
            port: 1,
            position: StartPositionCoordinate {
                master_filename: "f".into(),
                master_position: 1,
                relay_filename: String::new(),
                relay_position: 0,
            },
            keyrange_start: String::new(),
            keyrange_end: String::new(),
        };
        assert!(sp.validate().is_err());
        sp.keyrange_end = "80".into();
        assert!(sp.validate().is_ok());
    }
}
