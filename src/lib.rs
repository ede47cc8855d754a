//! Library entry point wiring the configuration, clients, classifier, and
//! replay engine together into one running player.

pub mod classifier;
pub mod client;
pub mod config;
pub mod errors;
pub mod grpc;
pub mod keyrange;
pub mod lookup;
pub mod metrics;
pub mod recovery;
pub mod replay;
pub mod status;
pub mod stream;
pub mod types;

use crate::client::{DryRunClient, LiveClient, TransactionalClient};
use crate::config::{load_start_position, resolve_password, Args, DbConfig};
use crate::errors::{PlayerError, PlayerResult};
use crate::keyrange::KeyRange;
use crate::metrics::ReplayMetrics;
use crate::recovery::{now_unix, RecoveryStore};
use crate::replay::ReplayEngine;
use crate::stream::StreamConsumer;
use crate::types::{RecoveryState, ReplicationCoordinate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

async fn build_client(debug: bool, db_config: &DbConfig) -> PlayerResult<Box<dyn TransactionalClient>> {
    if debug {
        return Ok(Box::new(DryRunClient::new(std::io::stdout())));
    }
    let mut client = LiveClient::new(db_config);
    client.connect().await?;
    Ok(Box::new(client))
}

/// Runs the player to completion: loads configuration, connects the
/// primary/lookup clients, resolves the starting position, and streams
/// until shutdown or a fatal error.
pub async fn run(args: Args, shutdown: Arc<AtomicBool>) -> PlayerResult<()> {
    let start_pos = load_start_position(&args.start_pos_file)?;
    let keyrange = KeyRange::from_hex(&start_pos.keyrange_start, &start_pos.keyrange_end)?;

    let db_config: DbConfig = config::load_json(&args.db_config_file)?;
    let db_config = resolve_password(db_config, &args.db_credentials_file)?;

    let lookup_config = if args.lookup_config_file.is_empty() {
        None
    } else {
        let cfg: DbConfig = config::load_json(&args.lookup_config_file)?;
        Some(resolve_password(cfg, &args.db_credentials_file)?)
    };

    let mut primary = build_client(args.debug, &db_config).await?;
    let lookup = match &lookup_config {
        Some(cfg) => Some(build_client(args.debug, cfg).await?),
        None => None,
    };

    let recovery = RecoveryStore::new(start_pos.uid);
    recovery.ensure_table(primary.as_mut()).await?;

    let start_position: ReplicationCoordinate = if args.use_checkpoint {
        let state = recovery
            .load(primary.as_mut())
            .await?
            .ok_or_else(|| PlayerError::config("use-checkpoint set but no recovery row exists"))?;
        state.position
    } else {
        // No checkpoint row exists yet on a fresh start: write one now so
        // every later `update` has a row to land on instead of silently
        // affecting zero rows.
        let now = now_unix();
        let start_state = RecoveryState {
            uid: start_pos.uid,
            host: start_pos.host.clone(),
            port: start_pos.port,
            position: start_pos.position.clone().into(),
            keyrange_start: start_pos.keyrange_start.clone(),
            keyrange_end: start_pos.keyrange_end.clone(),
            txn_timestamp: now,
            time_updated: now,
        };
        recovery.initialize(primary.as_mut(), &start_state).await?;
        start_state.position
    };

    let metrics = ReplayMetrics::new();
    if args.port != 0 {
        let status_metrics = metrics.clone();
        let status_shutdown = shutdown.clone();
        let port = args.port;
        tokio::spawn(async move {
            if let Err(err) = status::serve(port, status_metrics, status_shutdown).await {
                error!(%err, "status endpoint exited");
            }
        });
    }

    let mut engine = ReplayEngine::new(
        start_pos.uid,
        keyrange,
        args.table_allow_list(),
        primary,
        lookup,
        metrics,
    );

    let consumer = StreamConsumer::dial(&start_pos.host, start_pos.port).await?;
    info!(host = %start_pos.host, port = start_pos.port, position = %start_position, "starting replay");

    consumer
        .run(
            &start_position,
            &start_pos.keyrange_start,
            &start_pos.keyrange_end,
            &mut engine,
            shutdown,
        )
        .await
}

pub fn shutdown_on_ctrl_c() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handle = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.store(true, Ordering::SeqCst);
        }
    });
    flag
}
