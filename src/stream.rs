//! Opens the change-stream RPC to the source and feeds events to the
//! classifier and replay engine in the order received.

use crate::classifier::{Classified, EventClassifier};
use crate::errors::{PlayerError, PlayerResult};
use crate::grpc::binlogplayer::change_stream_client::ChangeStreamClient;
use crate::grpc::binlogplayer::{ChangeStreamRequest, ReplicationCoordinate as WireCoordinate};
use crate::replay::ReplayEngine;
use crate::types::{Event, ReplicationCoordinate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tonic::transport::Channel;
use tracing::{info, warn};

pub struct StreamConsumer {
    client: ChangeStreamClient<Channel>,
}

impl StreamConsumer {
    pub async fn dial(host: &str, port: u16) -> PlayerResult<Self> {
        let endpoint = format!("http://{host}:{port}");
        let client = ChangeStreamClient::connect(endpoint)
            .await
            .map_err(PlayerError::from)?;
        Ok(Self { client })
    }

    /// Runs the receive loop until the stream ends cleanly, a shutdown is
    /// requested, or a fatal error occurs. On shutdown, any open local
    /// transaction is rolled back before returning.
    pub async fn run(
        mut self,
        start_position: &ReplicationCoordinate,
        keyrange_start: &str,
        keyrange_end: &str,
        engine: &mut ReplayEngine,
        shutdown: Arc<AtomicBool>,
    ) -> PlayerResult<()> {
        let request = ChangeStreamRequest {
            start_position: Some(WireCoordinate::from(start_position)),
            keyspace_start: keyrange_start.to_string(),
            keyspace_end: keyrange_end.to_string(),
        };

        let mut stream = self
            .client
            .serve_binlog(request)
            .await
            .map_err(PlayerError::from)?
            .into_inner();

        let mut classifier = EventClassifier::new();

        loop {
            if shutdown.load(Ordering::SeqCst) {
                info!("shutdown requested, rolling back in-flight transaction");
                engine.rollback_in_flight().await;
                return Ok(());
            }

            let next = match stream.message().await {
                Ok(Some(event)) => event,
                Ok(None) => {
                    info!("change stream ended cleanly");
                    return Ok(());
                }
                Err(status) => {
                    warn!(error = %status, "change stream transport error");
                    engine.rollback_in_flight().await;
                    return Err(PlayerError::from(status));
                }
            };

            let event: Event = next.into();
            match classifier.process(event) {
                Ok(Classified::Buffered) => {}
                Ok(Classified::Transaction(buffer)) => {
                    if let Err(err) = engine.apply_transaction(buffer).await {
                        engine.rollback_in_flight().await;
                        return Err(err);
                    }
                }
                Ok(Classified::Ddl(ddl)) => {
                    if let Err(err) = engine.apply_ddl(ddl).await {
                        return Err(err);
                    }
                }
                Err(err) => {
                    engine.rollback_in_flight().await;
                    return Err(err);
                }
            }
        }
    }
}
