//! Host wiring: config, logger, contact loading, CRM sink, orchestrator and
//! the stdin replay, plus orderly shutdown.

use crate::cli::Args;
use crate::error::CallbridgeError;
use crate::logger::initialize as LoggerInitialize;
use crate::replay;

use call_core::config::BridgeConfig;
use call_core::contact_index::SharedContactIndex;
use call_core::contacts::{ContactLoader, ContactSource, FileContactSource, HttpContactSource};
use call_core::crm_client::CrmClient;
use call_core::normalizer::PhoneNormalizer;
use call_core::notifier::{LogNotifier, NotificationSink};
use call_core::orchestrator::CallOrchestrator;
use call_core::status::StatusBoard;

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::panic::Location;
use std::sync::Arc;

use log::{info, warn};
use tokio::io::{BufReader, stdin};
use tokio::task::JoinHandle;

pub async fn run(args: Args) -> Result<(), CallbridgeError> {
    let log_dir = args.log_dir_or_default();
    create_dir_all(&log_dir).map_err(|e| CallbridgeError::Callbridge {
        message: format!("Failed to create log directory {}: {e}", log_dir.display()),
        location: ErrorLocation::from(Location::caller()),
    })?;

    LoggerInitialize(&log_dir)?;
    info!("callbridge {} starting", env!("CARGO_PKG_VERSION"));

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => BridgeConfig::default_path()?,
    };
    let mut config = BridgeConfig::load(&config_path)?;
    if let Some(file) = args.contacts_file {
        config.contacts.file = Some(file);
    }

    let status = Arc::new(StatusBoard::new());
    let index = SharedContactIndex::default();

    let sink = notification_sink(&config)?;
    let orchestrator = Arc::new(CallOrchestrator::from_config(
        &config,
        index.clone(),
        sink,
        Arc::clone(&status),
    ));

    let refresh_task = start_contact_loading(&config, index, Arc::clone(&status)).await?;

    let handle = orchestrator.spawn(config.calls.event_queue_capacity, config.sweep_interval());
    let input = BufReader::new(stdin());

    tokio::select! {
        result = replay::run(input, handle.event_sender(), &status) => match result {
            Ok(stats) => info!("Input closed after {} events", stats.accepted),
            Err(e) => warn!("Replay stopped: {e}"),
        },
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("Interrupted, shutting down"),
            Err(e) => warn!("Cannot listen for Ctrl-C, shutting down: {e}"),
        },
    }

    if let Some(task) = refresh_task {
        task.abort();
    }

    let open_calls = handle.orchestrator().active_calls().await.len();
    handle.shutdown().await;

    if open_calls > 0 {
        warn!("{open_calls} calls were still open at shutdown");
    }

    info!("callbridge stopped");
    Ok(())
}

fn notification_sink(config: &BridgeConfig) -> Result<Arc<dyn NotificationSink>, CallbridgeError> {
    match &config.crm.base_url {
        Some(url) => {
            let client = CrmClient::new(url, config.notify_timeout())?;
            info!("Notifying CRM at {}", client.events_url());
            Ok(Arc::new(client))
        }
        None => {
            info!("No CRM configured, notifications are only logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}

/// Load contacts once, then keep refreshing in the background if configured.
///
/// A failed first load is not fatal; calls are tracked unmatched until a
/// refresh succeeds.
async fn start_contact_loading(
    config: &BridgeConfig,
    index: SharedContactIndex,
    status: Arc<StatusBoard>,
) -> Result<Option<JoinHandle<()>>, CallbridgeError> {
    let source: Arc<dyn ContactSource> = match (&config.contacts.file, &config.contacts.source_url) {
        (Some(file), _) => Arc::new(FileContactSource::new(file)),
        (None, Some(url)) => Arc::new(HttpContactSource::new(url, config.fetch_timeout())?),
        (None, None) => {
            warn!("No contact source configured, all calls will be unmatched");
            return Ok(None);
        }
    };

    let loader = ContactLoader::new(
        source,
        config.retry_policy(),
        PhoneNormalizer::new(config.matching.max_compare_length),
        index,
    )
    .with_fetch_timeout(config.fetch_timeout())
    .with_status(status);

    if let Err(e) = loader.refresh().await {
        warn!("Initial contact load failed, starting with an empty directory: {e}");
    }

    Ok(config
        .refresh_interval()
        .map(|every| Arc::new(loader).spawn_refresh_loop(every)))
}
