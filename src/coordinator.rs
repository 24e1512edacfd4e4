use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, trace, warn, Instrument};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::debounce::{spawn_debouncer, DebounceTrigger};
use crate::diff::redact;
use crate::error::ErrorClass;
use crate::journal::{JournalMode, SyncJournal};
use crate::listeners::{ListenerHandle, ListenerRegistry};
use crate::push::{PushBridge, PushEvent, PushMessage};
use crate::remote::{Command, RemoteClient};
use crate::system::TrackedSystem;
use crate::types::System;
use crate::{Error, Result};

/// Value copy of every tracked system at the end of a cycle.
pub type Snapshot = Vec<System>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No full fetch has succeeded yet.
    Cold,
    WarmFull,
    WarmIncremental,
    /// The last cycle failed; the next one is a full resync.
    Backoff,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cold => "cold",
            Self::WarmFull => "warm_full",
            Self::WarmIncremental => "warm_incremental",
            Self::Backoff => "backoff",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    pub next_cycle_full: bool,
    pub next_interval: Duration,
    pub push_attached: bool,
    pub last_update_success: bool,
    pub full_resync_at: Option<DateTime<Utc>>,
    pub push_message_at: Option<DateTime<Utc>>,
    pub energy_refresh_at: Option<DateTime<Utc>>,
}

struct SyncState {
    status: SyncStatus,
    /// Forces the next cycle to be a full resync without touching the
    /// reported schedule. Consumed when that cycle starts.
    resync_requested: bool,
    started: bool,
}

pub struct CoordinatorBuilder<C, B> {
    client: C,
    bridge: B,
    config: SyncConfig,
    listeners: ListenerRegistry,
    journal_mode: Option<JournalMode>,
    journal_path: Option<PathBuf>,
}

impl<C: RemoteClient, B: PushBridge> CoordinatorBuilder<C, B> {
    pub fn new(client: C, bridge: B) -> Self {
        Self {
            client,
            bridge,
            config: SyncConfig::default(),
            listeners: ListenerRegistry::new(),
            journal_mode: None,
            journal_path: None,
        }
    }

    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.config.account = account.into();
        self
    }

    pub fn update_interval(mut self, interval: Duration) -> Self {
        self.config.update_interval = interval;
        self
    }

    pub fn backoff_interval(mut self, interval: Duration) -> Self {
        self.config.backoff_interval = interval;
        self
    }

    pub fn debounce_cooldown(mut self, cooldown: Duration) -> Self {
        self.config.debounce_cooldown = cooldown;
        self
    }

    pub fn push_buffer(mut self, capacity: usize) -> Self {
        self.config.push_buffer = capacity;
        self
    }

    /// Register a change listener before the first cycle runs.
    pub fn on_change(self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.listeners.add(f);
        self
    }

    pub fn journal(mut self, mode: JournalMode, path: impl Into<PathBuf>) -> Self {
        self.journal_mode = Some(mode);
        self.journal_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Coordinator<C, B>> {
        let journal = match (self.journal_mode, self.journal_path) {
            (Some(mode), Some(path)) => Some(SyncJournal::new(mode, &path)?),
            _ => None,
        };

        let (refresh_trigger, refresh_rx) = DebounceTrigger::channel();
        let (push_tx, push_rx) = mpsc::channel(self.config.push_buffer.max(1));

        let status = SyncStatus {
            phase: SyncPhase::Cold,
            next_cycle_full: true,
            next_interval: self.config.update_interval,
            push_attached: false,
            last_update_success: true,
            full_resync_at: None,
            push_message_at: None,
            energy_refresh_at: None,
        };

        Ok(Coordinator {
            inner: Arc::new(Inner {
                config: self.config,
                client: self.client,
                bridge: self.bridge,
                systems: OnceLock::new(),
                state: Mutex::new(SyncState {
                    status,
                    resync_requested: false,
                    started: false,
                }),
                cycle_lock: tokio::sync::Mutex::new(None),
                listeners: self.listeners,
                refresh_trigger,
                refresh_rx: Mutex::new(Some(refresh_rx)),
                push_tx,
                push_rx: Mutex::new(Some(push_rx)),
                reschedule: Arc::new(Notify::new()),
                cancel: CancellationToken::new(),
                tasks: Mutex::new(Vec::new()),
                journal: Mutex::new(journal),
            }),
        })
    }
}

struct Inner<C, B> {
    config: SyncConfig,
    client: C,
    bridge: B,
    systems: OnceLock<Vec<Arc<TrackedSystem>>>,
    state: Mutex<SyncState>,
    /// Serializes cycles and holds the last snapshot handed to listeners.
    cycle_lock: tokio::sync::Mutex<Option<Snapshot>>,
    listeners: ListenerRegistry,
    refresh_trigger: DebounceTrigger,
    refresh_rx: Mutex<Option<mpsc::Receiver<()>>>,
    push_tx: mpsc::Sender<PushEvent>,
    push_rx: Mutex<Option<mpsc::Receiver<PushEvent>>>,
    reschedule: Arc<Notify>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    journal: Mutex<Option<SyncJournal>>,
}

impl<C, B> Drop for Inner<C, B> {
    fn drop(&mut self) {
        // Background tasks only hold weak references; wake them so they exit.
        self.cancel.cancel();
    }
}

/// Keeps one account's systems in sync with the cloud service.
///
/// Polls on a timer (a full resync first and after any failure, energy-only
/// refreshes otherwise), merges push messages as they arrive and fans out
/// change notifications to registered listeners. Cloning is cheap and every
/// clone drives the same state.
pub struct Coordinator<C, B> {
    inner: Arc<Inner<C, B>>,
}

impl<C, B> Clone for Coordinator<C, B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: RemoteClient, B: PushBridge> Coordinator<C, B> {
    pub fn builder(client: C, bridge: B) -> CoordinatorBuilder<C, B> {
        CoordinatorBuilder::new(client, bridge)
    }

    fn upgrade(inner: &Weak<Inner<C, B>>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &C {
        &self.inner.client
    }

    pub fn bridge(&self) -> &B {
        &self.inner.bridge
    }

    pub fn status(&self) -> SyncStatus {
        self.state().status.clone()
    }

    /// Every tracked system; empty until the first full resync succeeds.
    pub fn systems(&self) -> &[Arc<TrackedSystem>] {
        self.inner.systems.get().map_or(&[], Vec::as_slice)
    }

    pub fn lookup_system(&self, serial: &str) -> Option<Arc<TrackedSystem>> {
        self.systems()
            .iter()
            .find(|s| s.serial() == serial)
            .cloned()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.systems().iter().map(|s| s.snapshot()).collect()
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.inner.listeners
    }

    pub fn add_listener(&self, f: impl Fn() + Send + Sync + 'static) -> ListenerHandle {
        self.inner.listeners.add(f)
    }

    /// Run one cycle and return the resulting snapshot. Listeners are not
    /// notified; see [`refresh`](Self::refresh) for that.
    pub async fn run_cycle(&self) -> Result<Snapshot> {
        let _guard = self.inner.cycle_lock.lock().await;
        self.cycle().await
    }

    /// Run one cycle, notify listeners if anything changed and reschedule the
    /// timer with the interval the cycle picked.
    pub async fn refresh(&self) -> Result<()> {
        let mut published = self.inner.cycle_lock.lock().await;
        let result = self.cycle().await;

        let succeeded = result.is_ok();
        let flipped = {
            let mut state = self.state();
            let flipped = state.status.last_update_success != succeeded;
            state.status.last_update_success = succeeded;
            flipped
        };
        let mut changed = false;
        let outcome = result.map(|snapshot| {
            changed = published.as_ref() != Some(&snapshot);
            if changed {
                *published = Some(snapshot);
            }
        });
        drop(published);

        self.inner.reschedule.notify_one();
        if changed || flipped {
            let notified = self.inner.listeners.notify_all();
            trace!(notified, changed, flipped, "listeners notified");
        }
        outcome
    }

    /// Schedule a debounced refresh. Returns false when an already pending
    /// request absorbed this one.
    pub fn request_refresh(&self) -> bool {
        self.inner.refresh_trigger.trigger()
    }

    /// Run the first refresh, then spawn the timer, debouncer and push pump.
    ///
    /// An error from the first refresh is returned and nothing is spawned, so
    /// the caller may retry.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state();
            if state.started {
                return Err(Error::AlreadyStarted);
            }
            state.started = true;
        }

        if let Err(e) = self.refresh().await {
            self.state().started = false;
            return Err(e);
        }

        self.spawn_tasks();
        info!(account = %self.inner.config.account, "coordinator started");
        Ok(())
    }

    /// Stop background tasks and detach the push bridge. A cycle already in
    /// flight runs to completion first.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let attached = std::mem::replace(&mut self.state().status.push_attached, false);
        if attached {
            self.inner.bridge.detach();
            info!("push bridge detached");
        }

        let tasks = std::mem::take(
            &mut *self
                .inner
                .tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            let _ = task.await;
        }
        debug!(account = %self.inner.config.account, "coordinator stopped");
    }

    /// Merge one push message into its system and notify listeners.
    ///
    /// Never fetches and never touches the poll schedule.
    pub fn on_push_message(&self, message: PushMessage) -> Result<()> {
        let Some(tracked) = self.lookup_system(&message.serial) else {
            return Err(Error::UnknownSystem(message.serial));
        };

        tracked.update(|system| self.inner.bridge.merge(&message, system))?;
        self.state().status.push_message_at = Some(Utc::now());
        self.with_journal(|j| j.log_push(&message.payload));

        let notified = self.inner.listeners.notify_all();
        trace!(notified, "push message applied");
        Ok(())
    }

    /// Apply `command` locally, submit it, and schedule a full resync to
    /// reconcile with what the service actually did.
    ///
    /// A rejected submission rolls the local config back right away.
    pub async fn send_command(
        &self,
        serial: &str,
        zone_id: Option<&str>,
        command: Command,
    ) -> Result<()> {
        let tracked = self
            .lookup_system(serial)
            .ok_or_else(|| Error::UnknownSystem(serial.to_string()))?;
        let previous = tracked.read().config.clone();
        tracked.update(|system| {
            command
                .apply_to(system, zone_id)
                .inspect_err(|_| system.config = previous.clone())
        })?;
        self.inner.listeners.notify_all();

        debug!(
            command = command.name(),
            zone = zone_id.unwrap_or("-"),
            "sending command"
        );
        let result = self.inner.client.send_command(serial, zone_id, &command).await;
        if let Err(ref e) = result {
            warn!(command = command.name(), error = %e, "command failed, reverting local config");
            tracked.update(|system| system.config = previous);
            self.inner.listeners.notify_all();
        }

        // Incremental rounds never re-read config.
        self.state().resync_requested = true;
        self.request_refresh();
        result
    }

    fn state(&self) -> MutexGuard<'_, SyncState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn with_journal(&self, f: impl FnOnce(&mut SyncJournal)) {
        if let Some(journal) = self
            .inner
            .journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            f(journal);
        }
    }

    /// One cycle. Callers hold the cycle lock.
    async fn cycle(&self) -> Result<Snapshot> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!(
            "sync_cycle",
            account = %self.inner.config.account,
            %cycle_id
        );

        async move {
            let full = {
                let mut state = self.state();
                let requested = std::mem::take(&mut state.resync_requested);
                self.inner.systems.get().is_none() || state.status.next_cycle_full || requested
            };
            let mode = if full { "full" } else { "incremental" };
            debug!(mode, "cycle starting");

            let outcome = if full {
                self.full_resync().await
            } else {
                self.incremental_refresh().await
            };

            match outcome {
                Ok(()) => {
                    {
                        let mut state = self.state();
                        let status = &mut state.status;
                        status.next_cycle_full = false;
                        status.next_interval = self.inner.config.update_interval;
                        status.phase = if full {
                            SyncPhase::WarmFull
                        } else {
                            SyncPhase::WarmIncremental
                        };
                    }
                    let snapshot = self.snapshot();
                    if let Ok(doc) = serde_json::to_value(&snapshot) {
                        self.with_journal(|j| j.log_cycle(cycle_id, mode, &doc));
                    }
                    debug!(mode, systems = snapshot.len(), "cycle complete");
                    Ok(snapshot)
                }
                Err(e) => {
                    let class = e.class();
                    let interval = match class {
                        ErrorClass::Transport => self.inner.config.backoff_interval,
                        ErrorClass::Unclassified => self.inner.config.update_interval,
                    };
                    {
                        let mut state = self.state();
                        let status = &mut state.status;
                        status.next_cycle_full = true;
                        status.next_interval = interval;
                        status.phase = SyncPhase::Backoff;
                    }
                    warn!(
                        mode,
                        error = %e,
                        class = class.as_str(),
                        retry_in_secs = interval.as_secs(),
                        "cycle failed"
                    );
                    let message = e.to_string();
                    self.with_journal(|j| j.log_failure(cycle_id, class, &message));
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn full_resync(&self) -> Result<()> {
        let fresh = self.inner.client.fetch_full_state().await?;
        for system in &fresh {
            debug!(system = %redacted_json(system), "fetched system");
        }

        match self.inner.systems.get() {
            None => {
                if fresh.is_empty() {
                    warn!("account has no systems");
                }
                let tracked: Vec<_> = fresh
                    .into_iter()
                    .map(|s| Arc::new(TrackedSystem::new(s)))
                    .collect();
                info!(count = tracked.len(), "systems discovered");
                if self.inner.systems.set(tracked).is_err() {
                    warn!("systems already initialized, discarding discovery");
                }
                self.attach_push();
            }
            Some(existing) => merge_full(existing, fresh),
        }

        let now = Utc::now();
        let mut state = self.state();
        state.status.full_resync_at = Some(now);
        state.status.energy_refresh_at = Some(now);
        Ok(())
    }

    async fn incremental_refresh(&self) -> Result<()> {
        for tracked in self.systems() {
            if tracked.is_stale() {
                trace!("skipping stale system");
                continue;
            }
            let energy = self.inner.client.fetch_energy(tracked.serial()).await?;
            tracked.set_energy(energy);
        }
        self.state().status.energy_refresh_at = Some(Utc::now());
        Ok(())
    }

    fn attach_push(&self) {
        {
            let mut state = self.state();
            if state.status.push_attached {
                return;
            }
            state.status.push_attached = true;
        }
        self.inner.bridge.attach(self.inner.push_tx.clone());
        info!("push bridge attached");
    }

    /// Tasks hold weak references, so dropping the last handle stops them
    /// too. Only [`shutdown`](Self::shutdown) detaches the push bridge.
    fn spawn_tasks(&self) {
        let mut handles = Vec::with_capacity(3);
        let weak = Arc::downgrade(&self.inner);

        if let Some(rx) = take(&self.inner.refresh_rx) {
            let weak = weak.clone();
            handles.push(spawn_debouncer(
                rx,
                self.inner.config.debounce_cooldown,
                self.inner.cancel.clone(),
                move || {
                    let coordinator = Self::upgrade(&weak);
                    async move {
                        if let Some(coordinator) = coordinator {
                            // Failures are logged inside the cycle.
                            let _ = coordinator.refresh().await;
                        }
                    }
                },
            ));
        }

        if let Some(rx) = take(&self.inner.push_rx) {
            handles.push(tokio::spawn(push_pump(
                weak.clone(),
                rx,
                self.inner.cancel.clone(),
            )));
        }

        handles.push(tokio::spawn(timer_loop(
            weak,
            Arc::clone(&self.inner.reschedule),
            self.inner.cancel.clone(),
        )));

        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(handles);
    }
}

/// Overwrite known systems in place from a full fetch and update stale flags.
fn merge_full(existing: &[Arc<TrackedSystem>], fresh: Vec<System>) {
    let mut seen = HashSet::new();
    for system in fresh {
        match existing.iter().find(|t| t.serial() == system.serial()) {
            Some(tracked) => {
                seen.insert(tracked.serial().to_string());
                tracked.overwrite(system);
                if tracked.is_stale() {
                    info!(name = %tracked.read().profile.name, "system is back");
                    tracked.set_stale(false);
                }
            }
            None => warn!(
                name = %system.profile.name,
                "fetched system was not present at discovery, skipping"
            ),
        }
    }

    for tracked in existing {
        if !seen.contains(tracked.serial()) && !tracked.is_stale() {
            warn!(
                name = %tracked.read().profile.name,
                "system missing from full fetch, marking stale"
            );
            tracked.set_stale(true);
        }
    }
}

fn redacted_json(system: &System) -> Value {
    serde_json::to_value(system)
        .map(|v| redact(&v))
        .unwrap_or_default()
}

fn take<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

async fn timer_loop<C: RemoteClient, B: PushBridge>(
    inner: Weak<Inner<C, B>>,
    reschedule: Arc<Notify>,
    cancel: CancellationToken,
) {
    loop {
        let Some(interval) = Coordinator::upgrade(&inner).map(|c| c.status().next_interval) else {
            break;
        };
        trace!(secs = interval.as_secs(), "next cycle scheduled");
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = reschedule.notified() => {}
            () = tokio::time::sleep(interval) => {
                let Some(coordinator) = Coordinator::upgrade(&inner) else {
                    break;
                };
                let _ = coordinator.refresh().await;
            }
        }
    }
}

async fn push_pump<C: RemoteClient, B: PushBridge>(
    inner: Weak<Inner<C, B>>,
    mut rx: mpsc::Receiver<PushEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = rx.recv() => event,
        };
        let Some(event) = event else {
            debug!("push channel closed");
            break;
        };
        let Some(coordinator) = Coordinator::upgrade(&inner) else {
            break;
        };
        match event {
            PushEvent::Message(message) => match coordinator.on_push_message(message) {
                Ok(()) => {}
                Err(Error::UnknownSystem(_)) => warn!("push message for unknown system dropped"),
                Err(e) => warn!(error = %e, "push message dropped"),
            },
            PushEvent::Failed(reason) => {
                warn!(%reason, "push transport error, requesting refresh");
                coordinator.request_refresh();
            }
        }
    }
}
