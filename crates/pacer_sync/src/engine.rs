//! Sync engine orchestration

use crate::{
    action::{PendingAction, QueuedAction},
    cache::ReadModelCache,
    config::SyncConfig,
    connectivity::ConnectivityMonitor,
    coordinator::{SyncCoordinator, SyncReport, SyncSnapshot},
    dispatch::Dispatcher,
    http::{HttpDispatcher, HttpProbe},
    lock::SyncLock,
    queue::ActionQueue,
    store::{FileStore, LocalStore},
};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;

const REPORT_CAPACITY: usize = 16;

/// Outcome of [`SyncEngine::submit`]
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Applied remotely right away
    Sent,
    /// Recorded for the next sync pass
    Queued(QueuedAction),
}

/// Main sync engine
pub struct SyncEngine {
    config: SyncConfig,
    coordinator: SyncCoordinator,
    dispatcher: Arc<dyn Dispatcher>,
    probe: Option<HttpProbe>,
    cache: ReadModelCache,
    reports: broadcast::Sender<SyncReport>,
}

impl SyncEngine {
    /// Create an engine over the file store, probing the API once for the initial state
    pub async fn new(config: SyncConfig) -> crate::Result<Self> {
        config.validate()?;

        let backend = FileStore::new(&config.store_dir).with_capacity(config.capacity_bytes);
        let store = LocalStore::new(Arc::new(backend));

        let probe = HttpProbe::new(&config)?;
        let initial = probe.check().await;
        tracing::info!("API {} is {}", config.base_url, initial);

        let dispatcher = Arc::new(HttpDispatcher::new(&config)?);
        let mut engine = Self::with_parts(config, store, ConnectivityMonitor::new(initial), dispatcher);
        engine.probe = Some(probe);
        Ok(engine)
    }

    /// Assemble an engine from explicit parts; no probe runs
    pub fn with_parts(
        config: SyncConfig,
        store: LocalStore,
        connectivity: ConnectivityMonitor,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        let (reports, _) = broadcast::channel(REPORT_CAPACITY);
        Self {
            config,
            coordinator: SyncCoordinator::new(ActionQueue::new(store.clone()), connectivity),
            dispatcher,
            probe: None,
            cache: ReadModelCache::new(store),
            reports,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn queue(&self) -> &ActionQueue {
        self.coordinator.queue()
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        self.coordinator.connectivity()
    }

    pub fn cache(&self) -> &ReadModelCache {
        &self.cache
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.coordinator.snapshot()
    }

    /// Reports of every pass this engine runs
    pub fn subscribe_reports(&self) -> broadcast::Receiver<SyncReport> {
        self.reports.subscribe()
    }

    /// Run one sync pass now
    ///
    /// With a `lock_path` configured the pass runs under the cross-process
    /// lock; a pass held by another process reports `AlreadyRunning`.
    pub async fn sync_now(&self) -> SyncReport {
        let report = if self.coordinator.is_syncing() {
            SyncReport::already_running(self.coordinator.pending_count())
        } else if let Some(path) = &self.config.lock_path {
            match SyncLock::acquire(path).await {
                Ok(Some(_lock)) => self.run_pass().await,
                Ok(None) => SyncReport::already_running(self.coordinator.pending_count()),
                Err(e) => {
                    tracing::error!("Cannot open sync lock {}: {}", path.display(), e);
                    SyncReport::lock_unavailable(&e)
                }
            }
        } else {
            self.run_pass().await
        };
        let _ = self.reports.send(report.clone());
        report
    }

    async fn run_pass(&self) -> SyncReport {
        self.coordinator
            .process_pending_actions(self.dispatcher.as_ref())
            .await
    }

    /// Apply `action` if online, otherwise queue it
    ///
    /// While earlier actions are still queued the new one goes behind them
    /// and a pass runs, so the server sees them in order. A network failure
    /// while online also queues the action. A server rejection of a direct
    /// send is returned to the caller; there is no point replaying it.
    pub async fn submit(&self, action: PendingAction) -> crate::Result<Submission> {
        if !self.connectivity().is_online() {
            return Ok(Submission::Queued(self.queue().enqueue(action)?));
        }

        let waiting = self.queue().try_list()?.len();
        if waiting > 0 {
            let entry = self.queue().enqueue(action)?;
            tracing::debug!("{} queued behind {} earlier actions", entry.kind(), waiting);
            self.sync_now().await;

            let still_queued = self.queue().list().iter().any(|a| a.id == entry.id);
            return Ok(if still_queued {
                Submission::Queued(entry)
            } else {
                Submission::Sent
            });
        }

        let attempt = QueuedAction::new(action);
        match self.dispatcher.dispatch(&attempt).await {
            Ok(()) => Ok(Submission::Sent),
            Err(e) if e.is_transient() => {
                tracing::warn!("{} failed in transit, queued for later: {}", attempt.kind(), e);
                Ok(Submission::Queued(self.queue().enqueue(attempt.action)?))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Run until `shutdown` flips to true
    ///
    /// Spawns the reachability probe and, with auto-sync on, runs a pass on
    /// every OFFLINE -> ONLINE transition.
    pub async fn start(&self, mut shutdown: watch::Receiver<bool>) {
        let mut events = self.connectivity().subscribe();

        let probe_task = self.probe.clone().map(|probe| {
            let monitor = self.connectivity().clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { probe.run(monitor, shutdown).await })
        });

        // Leftovers from a previous session
        if self.config.auto_sync && self.connectivity().is_online() && !self.queue().is_empty() {
            self.sync_now().await;
        }

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(change) if change.is_reconnect() && self.config.auto_sync => {
                        tracing::info!("Back online, syncing pending actions");
                        self.sync_now().await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("Missed {} connectivity events", missed);
                        if self.config.auto_sync && self.connectivity().is_online() {
                            self.sync_now().await;
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if let Some(task) = probe_task {
            task.abort();
        }
        tracing::debug!("Sync engine stopped");
    }
}
