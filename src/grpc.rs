//! Generated client stubs for the change-stream wire contract. The server
//! side lives outside this crate; only the client is needed here.

pub mod binlogplayer {
    tonic::include_proto!("binlogplayer");
}

use crate::types::{Event, ReplicationCoordinate};
use binlogplayer::{ChangeEvent, ReplicationCoordinate as WireCoordinate};

impl From<WireCoordinate> for ReplicationCoordinate {
    fn from(c: WireCoordinate) -> Self {
        Self {
            master_filename: c.master_filename,
            master_position: c.master_position,
            relay_filename: c.relay_filename,
            relay_position: c.relay_position,
        }
    }
}

impl From<&ReplicationCoordinate> for WireCoordinate {
    fn from(c: &ReplicationCoordinate) -> Self {
        Self {
            master_filename: c.master_filename.clone(),
            master_position: c.master_position,
            relay_filename: c.relay_filename.clone(),
            relay_position: c.relay_position,
        }
    }
}

impl From<ChangeEvent> for Event {
    fn from(e: ChangeEvent) -> Self {
        Self {
            sql_type: e.sql_type,
            sql: e.sql,
            position: e.position.map(ReplicationCoordinate::from).unwrap_or_default(),
            keyspace_id: e.keyspace_id,
            index_type: e.index_type,
            index_id: e.index_id,
            user_id: e.user_id,
            seq_name: e.seq_name,
            seq_id: e.seq_id,
            error: e.error,
        }
    }
}
