//! Glue between transports, the contact index, the call tracker and the CRM.
//!
//! [`CallOrchestrator`] holds the single tracker, the shared index and the
//! notification gate, and exposes every call operation as an `async fn`.
//! [`CallOrchestrator::spawn`] puts it behind a dispatcher that gives each
//! call id its own worker task:
//!
//! ```text
//! transports ──► EventSender ──► dispatcher ──┬──► worker(c1) ──┐
//!                                            ├──► worker(c2) ──┼──► handle_event
//!                                            └──► worker(c3) ──┘
//! ```
//!
//! One call's events are applied in arrival order; separate calls run
//! concurrently. Per-call queues are unbounded so a call stuck on a slow CRM
//! send never holds up the dispatcher; backpressure sits on the shared inbox.
//! A worker retires, once its queue is drained, after its call disconnects or
//! is evicted by the sweep or acknowledged.

use crate::call_tracker::{CallChange, CallRecord, CallTracker, CallUpdate, Eviction, PendingCall, TrackerSettings};
use crate::circuit_breaker::CircuitBreaker;
use crate::config::BridgeConfig;
use crate::contact_index::SharedContactIndex;
use crate::error::call::CallError;
use crate::error::orchestrator::OrchestratorError;
use crate::normalizer::PhoneNormalizer;
use crate::notifier::{NotificationSink, Notifier};
use crate::status::StatusBoard;

use common::{ErrorLocation, MaskedNumber};
use models::{CallEvent, CallEventState, NotificationKind, TransportKind};

use std::collections::HashMap;
use std::panic::Location;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use log::{debug, info, warn};
use tokio::sync::{RwLock, mpsc, watch};
use tokio::task::JoinHandle;

pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 256;

pub struct CallOrchestrator {
    normalizer: PhoneNormalizer,
    index: SharedContactIndex,
    tracker: RwLock<CallTracker>,
    notifier: Notifier,
    status: Arc<StatusBoard>,
    /// Call ids whose worker can go, read by the running dispatcher.
    retirements: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl CallOrchestrator {
    pub fn new(
        normalizer: PhoneNormalizer,
        index: SharedContactIndex,
        settings: TrackerSettings,
        notifier: Notifier,
        status: Arc<StatusBoard>,
    ) -> Self {
        Self {
            normalizer,
            index,
            tracker: RwLock::new(CallTracker::new(settings)),
            notifier,
            status,
            retirements: Mutex::new(None),
        }
    }

    /// Wire an orchestrator from configuration around `sink`.
    pub fn from_config(
        config: &BridgeConfig,
        index: SharedContactIndex,
        sink: Arc<dyn NotificationSink>,
        status: Arc<StatusBoard>,
    ) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(
            "crm",
            config.crm.failure_threshold,
            config.open_timeout(),
        ));
        let notifier = Notifier::new(
            sink,
            breaker,
            config.crm.max_concurrent_notifications,
            config.notify_timeout(),
        )
        .with_status(Arc::clone(&status));

        Self::new(
            PhoneNormalizer::new(config.matching.max_compare_length),
            index,
            config.tracker_settings(),
            notifier,
            status,
        )
    }

    pub fn normalizer(&self) -> &PhoneNormalizer {
        &self.normalizer
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn status(&self) -> &Arc<StatusBoard> {
        &self.status
    }

    /// Apply one transport event and send the notifications it produces.
    ///
    /// Protocol violations are logged and returned; the tracker is left as it was.
    pub async fn handle_event(&self, event: &CallEvent) -> Result<CallUpdate, CallError> {
        let number = self.normalizer.normalize(&event.remote_number);
        let candidates = self.index.snapshot().await.lookup(&number).to_vec();

        let result = self
            .tracker
            .write()
            .await
            .apply(event, number, candidates, Instant::now());

        let update = result.inspect_err(|e| {
            warn!(
                "Ignoring {:?} from {} for call {}: {e}",
                event.state, event.transport, event.call_id
            );
        })?;

        self.publish(&update).await;
        Ok(update)
    }

    /// Register an outbound dial that a transport has not confirmed yet.
    pub async fn request_dial(
        &self,
        number: &str,
        contact_id: Option<&str>,
    ) -> Result<PendingCall, CallError> {
        let contact = match contact_id {
            Some(id) => Some(
                self.index
                    .snapshot()
                    .await
                    .get(id)
                    .ok_or_else(|| CallError::unknown_contact(id))?,
            ),
            None => None,
        };

        let normalized = self.normalizer.normalize(number);
        if normalized.is_empty() {
            warn!(
                "Dial requested to {} which has no digits; it can never be confirmed",
                MaskedNumber::from(number)
            );
        }

        Ok(self
            .tracker
            .write()
            .await
            .request_dial(number, normalized, contact, Instant::now()))
    }

    /// Pin a contact to a call explicitly.
    pub async fn select_contact(
        &self,
        call_id: &str,
        contact_id: &str,
    ) -> Result<CallUpdate, CallError> {
        let contact = self
            .index
            .snapshot()
            .await
            .get(contact_id)
            .ok_or_else(|| CallError::unknown_contact(contact_id))?;

        let update = self
            .tracker
            .write()
            .await
            .select_contact(call_id, contact, Instant::now())?;

        self.publish(&update).await;
        Ok(update)
    }

    /// Drop a terminal call whose completion was handled.
    pub async fn acknowledge(&self, call_id: &str) -> Result<CallRecord, CallError> {
        let record = self.tracker.write().await.acknowledge(call_id)?;
        debug!("Call {call_id} acknowledged");
        self.retire_workers([record.call_id.clone()]);
        Ok(record)
    }

    pub async fn sweep(&self) -> Eviction {
        self.sweep_at(Instant::now()).await
    }

    /// Evict everything that is stale as of `now`.
    pub async fn sweep_at(&self, now: Instant) -> Eviction {
        let eviction = self.tracker.write().await.evict_stale(now);

        if !eviction.is_empty() {
            info!(
                "Sweep evicted {} pending dials, {} stale calls, {} finished calls, {} routing entries",
                eviction.pending.len(),
                eviction.stale_calls.len(),
                eviction.expired_terminal.len(),
                eviction.routing_purged
            );
        }

        self.retire_workers(
            eviction
                .stale_calls
                .iter()
                .chain(&eviction.expired_terminal)
                .map(|record| record.call_id.clone()),
        );

        eviction
    }

    pub async fn get_call(&self, call_id: &str) -> Option<CallRecord> {
        self.tracker.read().await.get(call_id).cloned()
    }

    pub async fn active_calls(&self) -> Vec<CallRecord> {
        self.tracker.read().await.active_calls()
    }

    pub async fn terminal_calls(&self) -> Vec<CallRecord> {
        self.tracker
            .read()
            .await
            .terminal_calls()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn report_transport(&self, transport: TransportKind, connected: bool) {
        self.status.set_transport(transport, connected);
    }

    /// Tell a running dispatcher that these calls are gone from the tracker.
    ///
    /// A no-op before `spawn` and after shutdown. Retiring a call id that
    /// gets a new event later is harmless; the next event starts a new worker.
    fn retire_workers(&self, call_ids: impl IntoIterator<Item = String>) {
        let guard = self.retirements.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(retirements) = guard.as_ref() {
            for call_id in call_ids {
                if retirements.send(call_id).is_err() {
                    break;
                }
            }
        }
    }

    fn set_retirements(&self, retirements: Option<mpsc::UnboundedSender<String>>) {
        *self.retirements.lock().unwrap_or_else(PoisonError::into_inner) = retirements;
    }

    async fn publish(&self, update: &CallUpdate) {
        for change in &update.changes {
            let kind = match change {
                CallChange::Started { .. } => NotificationKind::NewCall,
                CallChange::Connected | CallChange::Abandoned => NotificationKind::CallStateChanged,
                CallChange::ContactChanged { .. } => NotificationKind::ContactChanged,
                CallChange::Finished => NotificationKind::NewJournal,
            };

            let notification = update.record.to_notification(kind);
            self.notifier.notify(&notification).await;
        }
    }

    /// Start the dispatcher and the periodic sweep.
    ///
    /// `capacity` bounds the shared inbox; producers wait when it is full.
    pub fn spawn(self: Arc<Self>, capacity: usize, sweep_interval: Duration) -> OrchestratorHandle {
        let (commands_tx, commands_rx) = mpsc::channel(capacity.max(1));
        let (retire_tx, retire_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        self.set_retirements(Some(retire_tx));

        let dispatcher = tokio::spawn(dispatcher(Arc::clone(&self), commands_rx, retire_rx));
        let sweeper = tokio::spawn(sweep_loop(Arc::clone(&self), sweep_interval, shutdown_rx));

        info!("Call orchestrator started (inbox {capacity}, sweep every {sweep_interval:?})");

        OrchestratorHandle {
            events: EventSender { commands: commands_tx },
            orchestrator: self,
            shutdown_tx,
            dispatcher,
            sweeper,
        }
    }
}

#[derive(Debug)]
enum DispatchCommand {
    Event(CallEvent),
    Shutdown,
}

/// Submits transport events to a running orchestrator. One per transport.
#[derive(Debug, Clone)]
pub struct EventSender {
    commands: mpsc::Sender<DispatchCommand>,
}

impl EventSender {
    pub async fn send(&self, event: CallEvent) -> Result<(), OrchestratorError> {
        self.commands
            .send(DispatchCommand::Event(event))
            .await
            .map_err(|e| OrchestratorError::ChannelClosed {
                message: format!("Orchestrator stopped: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

pub struct OrchestratorHandle {
    events: EventSender,
    orchestrator: Arc<CallOrchestrator>,
    shutdown_tx: watch::Sender<bool>,
    dispatcher: JoinHandle<()>,
    sweeper: JoinHandle<()>,
}

impl OrchestratorHandle {
    pub async fn submit(&self, event: CallEvent) -> Result<(), OrchestratorError> {
        self.events.send(event).await
    }

    pub fn event_sender(&self) -> EventSender {
        self.events.clone()
    }

    pub fn orchestrator(&self) -> &Arc<CallOrchestrator> {
        &self.orchestrator
    }

    pub async fn request_dial(
        &self,
        number: &str,
        contact_id: Option<&str>,
    ) -> Result<PendingCall, OrchestratorError> {
        Ok(self.orchestrator.request_dial(number, contact_id).await?)
    }

    pub async fn select_contact(
        &self,
        call_id: &str,
        contact_id: &str,
    ) -> Result<CallUpdate, OrchestratorError> {
        Ok(self.orchestrator.select_contact(call_id, contact_id).await?)
    }

    pub async fn acknowledge(&self, call_id: &str) -> Result<CallRecord, OrchestratorError> {
        Ok(self.orchestrator.acknowledge(call_id).await?)
    }

    /// Process every event submitted so far, then stop all tasks.
    pub async fn shutdown(self) {
        if self.events.commands.send(DispatchCommand::Shutdown).await.is_err() {
            warn!("Dispatcher already stopped");
        }

        if let Err(e) = self.dispatcher.await {
            warn!("Dispatcher task failed: {e}");
        }
        self.orchestrator.set_retirements(None);

        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.sweeper.await {
            warn!("Sweep task failed: {e}");
        }

        info!("Call orchestrator stopped");
    }
}

struct Worker {
    tx: mpsc::UnboundedSender<CallEvent>,
    task: JoinHandle<()>,
}

async fn dispatcher(
    orchestrator: Arc<CallOrchestrator>,
    mut commands: mpsc::Receiver<DispatchCommand>,
    mut retirements: mpsc::UnboundedReceiver<String>,
) {
    let mut workers: HashMap<String, Worker> = HashMap::new();
    // Retired workers still draining their queue.
    let mut retiring: HashMap<String, JoinHandle<()>> = HashMap::new();

    loop {
        let event = tokio::select! {
            command = commands.recv() => match command {
                Some(DispatchCommand::Event(event)) => event,
                Some(DispatchCommand::Shutdown) | None => break,
            },
            Some(call_id) = retirements.recv() => {
                retire(&mut workers, &mut retiring, call_id);
                continue;
            }
        };

        let call_id = event.call_id.clone();
        let disconnected = event.state == CallEventState::Disconnected;

        let undelivered = match workers.get(&call_id) {
            Some(worker) => worker.tx.send(event).err().map(|e| e.0),
            None => Some(event),
        };

        if let Some(event) = undelivered {
            // A worker whose queue is closed has died; its successor still waits for it.
            let previous = match workers.remove(&call_id) {
                Some(dead) => {
                    warn!("Worker for call {call_id} died, starting a new one");
                    Some(dead.task)
                }
                None => retiring.remove(&call_id),
            };

            let worker = spawn_worker(Arc::clone(&orchestrator), call_id.clone(), previous);
            if worker.tx.send(event).is_err() {
                warn!("New worker for call {call_id} stopped before its first event");
            }
            workers.insert(call_id.clone(), worker);
        }

        if disconnected {
            retire(&mut workers, &mut retiring, call_id);
        }
    }

    let tasks: Vec<JoinHandle<()>> = workers
        .into_values()
        .map(|worker| worker.task)
        .chain(retiring.into_values())
        .collect();

    debug!("Dispatcher draining {} workers", tasks.len());
    for result in join_all(tasks).await {
        if let Err(e) = result {
            warn!("Call worker failed: {e}");
        }
    }
}

/// Drop the worker's sender so it exits once its queue is empty.
fn retire(
    workers: &mut HashMap<String, Worker>,
    retiring: &mut HashMap<String, JoinHandle<()>>,
    call_id: String,
) {
    retiring.retain(|_, task| !task.is_finished());

    if let Some(worker) = workers.remove(&call_id) {
        debug!("Retiring worker for call {call_id}");
        retiring.insert(call_id, worker.task);
    }
}

/// A worker that starts consuming only after `previous`, the earlier worker
/// for the same call id, has finished.
fn spawn_worker(
    orchestrator: Arc<CallOrchestrator>,
    call_id: String,
    previous: Option<JoinHandle<()>>,
) -> Worker {
    let (tx, mut rx) = mpsc::unbounded_channel::<CallEvent>();

    let task = tokio::spawn(async move {
        if let Some(previous) = previous {
            let _ = previous.await;
        }

        while let Some(event) = rx.recv().await {
            // Violations are logged inside and change nothing.
            let _ = orchestrator.handle_event(&event).await;
        }

        debug!("Worker for call {call_id} finished");
    });

    Worker { tx, task }
}

async fn sweep_loop(
    orchestrator: Arc<CallOrchestrator>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let every = every.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                orchestrator.sweep().await;
            }
            _ = shutdown.changed() => break,
        }
    }
}
