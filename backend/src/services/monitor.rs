//! The monitor runtime.
//!
//! [`QuakeMonitor`] wires the feed connection, the startup bootstrap and the
//! display loop together. The display loop is the only place where feed
//! updates, user commands, countdown ticks and geocode results are applied.
//! It handles them one at a time, so the [`DisplayController`] it owns
//! needs no locking, and a slow geocode lookup never delays a tick or a
//! message because lookups run in their own task and report back.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::export::write_history_export;
use crate::config::MonitorConfig;
use crate::display::{
    CountdownTimer, DisplayController, DisplaySnapshot, RecentEntry, TickOutcome, TimerGeneration,
};
use crate::effects::{
    SideEffect, SideEffectDispatcher, SoundCue, SpeechAnnouncer, SpeechSynthesizer, VoicevoxClient,
};
use crate::error::{ErrorContext, MonitorError, MonitorResult};
use crate::feed::{
    ConnectionOutcome, ConnectionStats, ConnectionStatsSnapshot, FeedConnection, FeedStore,
    FeedTransport, FeedUpdate, HistoryBootstrapper, HistoryEntry, HistoryLimits, HistorySource,
    HttpHistorySource, LatestQuake, WebSocketTransport,
};
use crate::geocode::{GeocodeCache, Geocoder, IntensityMarker, OpenCageGeocoder, PointResolver};
use crate::models::{EarlyWarning, EventIdentity, FeedMessage, QuakeReport};
use crate::storage::{FileStore, KeyValueStore};

type MarkerBatch = (EventIdentity, Vec<IntensityMarker>);

// =============================================================================
// Builder
// =============================================================================

/// Assembles a [`QuakeMonitor`]. Anything not injected is built from the
/// configuration with the production adapters.
pub struct MonitorBuilder {
    config: MonitorConfig,
    transport: Option<Arc<dyn FeedTransport>>,
    history_source: Option<Arc<dyn HistorySource>>,
    store: Option<Arc<dyn KeyValueStore>>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    effects: Option<Vec<Arc<dyn SideEffect>>>,
    geocoder: Option<Option<Arc<dyn Geocoder>>>,
}

impl MonitorBuilder {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            transport: None,
            history_source: None,
            store: None,
            synthesizer: None,
            effects: None,
            geocoder: None,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn transport(mut self, transport: Arc<dyn FeedTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn history_source(mut self, source: Arc<dyn HistorySource>) -> Self {
        self.history_source = Some(source);
        self
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Replace the configured side effects.
    pub fn effects(mut self, effects: Vec<Arc<dyn SideEffect>>) -> Self {
        self.effects = Some(effects);
        self
    }

    /// Override the geocoder. `None` disables uncached lookups.
    pub fn geocoder(mut self, geocoder: Option<Arc<dyn Geocoder>>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    /// Shorthand for [`QuakeMonitor::start`].
    pub fn start(self) -> MonitorResult<QuakeMonitor> {
        QuakeMonitor::start(self)
    }
}

fn default_effects(
    config: &MonitorConfig,
    synthesizer: &Arc<dyn SpeechSynthesizer>,
) -> Vec<Arc<dyn SideEffect>> {
    let mut effects: Vec<Arc<dyn SideEffect>> = Vec::new();
    if config.effects.sound {
        effects.push(Arc::new(SoundCue::new()));
    }
    if config.effects.announce {
        effects.push(Arc::new(SpeechAnnouncer::new(
            Arc::clone(synthesizer),
            config.storage.state_dir.clone(),
            config.effects.player_command.clone(),
            config.effects.speech_delay(),
        )));
    }
    effects
}

fn default_geocoder(config: &MonitorConfig) -> MonitorResult<Option<Arc<dyn Geocoder>>> {
    let Some(api_key) = config.geocode.usable_api_key() else {
        return Ok(None);
    };
    let geocoder: Arc<dyn Geocoder> = Arc::new(OpenCageGeocoder::new(
        config.geocode.url.clone(),
        api_key,
        Duration::from_secs(config.geocode.timeout_secs),
    )?);
    Ok(Some(geocoder))
}

// =============================================================================
// Monitor
// =============================================================================

/// A running monitor. Dropping it without [`QuakeMonitor::stop`] also
/// stops the background tasks, but without waiting for them.
pub struct QuakeMonitor {
    handle: MonitorHandle,
    shutdown: watch::Sender<bool>,
    connection: JoinHandle<ConnectionOutcome>,
    bootstrap: JoinHandle<()>,
    display: JoinHandle<()>,
}

impl QuakeMonitor {
    pub fn builder(config: MonitorConfig) -> MonitorBuilder {
        MonitorBuilder::new(config)
    }

    /// Spawn the feed connection, the history bootstrap and the display
    /// loop. Must be called from within a tokio runtime.
    pub fn start(builder: MonitorBuilder) -> MonitorResult<Self> {
        let MonitorBuilder {
            config,
            transport,
            history_source,
            store,
            synthesizer,
            effects,
            geocoder,
        } = builder;
        config.validate()?;

        let transport: Arc<dyn FeedTransport> = match transport {
            Some(transport) => transport,
            None => Arc::new(WebSocketTransport::new()),
        };
        let history_source: Arc<dyn HistorySource> = match history_source {
            Some(source) => source,
            None => Arc::new(HttpHistorySource::new(
                config.history.url.clone(),
                Duration::from_secs(config.history.timeout_secs),
            )?),
        };
        let kv: Arc<dyn KeyValueStore> = match store {
            Some(store) => store,
            None => Arc::new(FileStore::open_dir(&config.storage.state_dir)?),
        };
        let synthesizer: Arc<dyn SpeechSynthesizer> = match synthesizer {
            Some(synthesizer) => synthesizer,
            None => Arc::new(VoicevoxClient::from_settings(&config.effects)?),
        };
        let effects = match effects {
            Some(effects) => effects,
            None => default_effects(&config, &synthesizer),
        };
        let geocoder = match geocoder {
            Some(geocoder) => geocoder,
            None => default_geocoder(&config)?,
        };

        let feed = FeedStore::new(HistoryLimits {
            max_entries: config.feed.live_max_entries,
            live_window_days: config.feed.live_window_days,
            bootstrap_window_days: config.history.window_days,
        });

        let dispatcher = Arc::new(SideEffectDispatcher::new(Arc::clone(&kv), effects));
        log::info!("Side effects enabled: {:?}", dispatcher.categories());

        let cache = GeocodeCache::new(Arc::clone(&kv), config.geocode.cache_ttl_days);
        let purged = cache.purge_expired(Utc::now());
        if purged > 0 {
            log::info!("Purged {} expired geocode cache entries", purged);
        }
        let resolver = PointResolver::new(cache, geocoder, config.geocode.pacing());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let connection = FeedConnection::new(transport, config.feed.url.clone(), config.feed.reconnect_delay());
        let stats = connection.stats();
        let connection_task = tokio::spawn(connection.run(
            feed.clone(),
            updates_tx.clone(),
            shutdown_rx.clone(),
        ));

        let bootstrapper = HistoryBootstrapper::new(history_source, &config.history);
        let bootstrap_feed = feed.clone();
        let bootstrap_task = tokio::spawn(async move {
            let update = bootstrapper.run(&bootstrap_feed, Utc::now()).await;
            if updates_tx.send(update).is_err() {
                log::debug!("Display loop gone before bootstrap finished");
            }
        });

        let controller = DisplayController::from_settings(&config.display);
        let (snapshots_tx, snapshots_rx) = watch::channel(controller.snapshot());
        let (display, ticks_rx, markers_rx) = DisplayLoop::new(
            feed.clone(),
            controller,
            CountdownTimer::new(config.display.tick()),
            dispatcher,
            resolver,
            snapshots_tx,
        );
        let display_task = tokio::spawn(display.run(updates_rx, commands_rx, ticks_rx, markers_rx, shutdown_rx));

        log::info!("Monitor started, feed {}", config.feed.url);
        Ok(Self {
            handle: MonitorHandle {
                feed,
                commands: commands_tx,
                snapshots: snapshots_rx,
                stats,
                synthesizer,
            },
            shutdown: shutdown_tx,
            connection: connection_task,
            bootstrap: bootstrap_task,
            display: display_task,
        })
    }

    pub fn handle(&self) -> MonitorHandle {
        self.handle.clone()
    }

    /// Close the feed intentionally, cancel pending timers and wait for
    /// the background tasks to finish.
    pub async fn stop(self) {
        log::info!("Stopping monitor");
        self.shutdown.send_replace(true);

        match self.connection.await {
            Ok(outcome) => log::debug!("Feed connection ended: {:?}", outcome),
            Err(e) => log::warn!("Feed connection task failed: {}", e),
        }
        self.bootstrap.abort();
        if let Err(e) = self.display.await {
            log::warn!("Display loop task failed: {}", e);
        }
        log::info!("Monitor stopped");
    }
}

// =============================================================================
// Handle
// =============================================================================

enum Command {
    Select {
        report: QuakeReport,
        reply: oneshot::Sender<DisplaySnapshot>,
    },
    DismissAlert {
        reply: oneshot::Sender<bool>,
    },
    InjectQuake {
        report: QuakeReport,
        reply: oneshot::Sender<FeedUpdate>,
    },
    InjectAlert {
        alert: Option<EarlyWarning>,
        reply: oneshot::Sender<FeedUpdate>,
    },
}

/// Cloneable access to a running monitor.
#[derive(Clone)]
pub struct MonitorHandle {
    feed: FeedStore,
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<DisplaySnapshot>,
    stats: Arc<ConnectionStats>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl MonitorHandle {
    /// The most recently published display state.
    pub fn snapshot(&self) -> DisplaySnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that is notified on every published display state.
    pub fn subscribe(&self) -> watch::Receiver<DisplaySnapshot> {
        self.snapshots.clone()
    }

    pub fn feed(&self) -> &FeedStore {
        &self.feed
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.feed.history()
    }

    pub fn recent(&self) -> Vec<RecentEntry> {
        self.snapshot().recent
    }

    pub fn latest(&self) -> Option<LatestQuake> {
        self.feed.latest()
    }

    pub fn connection_stats(&self) -> ConnectionStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn synthesizer(&self) -> Arc<dyn SpeechSynthesizer> {
        Arc::clone(&self.synthesizer)
    }

    /// Pin a history entry. Fails with `NotFound` when the identity is not
    /// in the buffer.
    pub async fn select_history_entry(&self, identity: &EventIdentity) -> MonitorResult<DisplaySnapshot> {
        let entry = self.feed.find(identity).ok_or_else(|| {
            MonitorError::not_found_with_context(
                format!("No history entry for {}", identity),
                ErrorContext::new("select_history_entry")
                    .with_entity("quake_report")
                    .with_entity_id(identity),
            )
        })?;
        self.request(|reply| Command::Select {
            report: entry.report,
            reply,
        })
        .await
    }

    /// Clear the alert. Returns whether one was present.
    pub async fn dismiss_alert(&self) -> MonitorResult<bool> {
        self.request(|reply| Command::DismissAlert { reply }).await
    }

    /// Feed a quake report through the same path as a live message.
    pub async fn inject_quake(&self, report: QuakeReport) -> MonitorResult<FeedUpdate> {
        self.request(|reply| Command::InjectQuake { report, reply }).await
    }

    /// Replace the alert state as a live early warning would. `None` clears it.
    pub async fn inject_alert(&self, alert: Option<EarlyWarning>) -> MonitorResult<FeedUpdate> {
        self.request(|reply| Command::InjectAlert { alert, reply }).await
    }

    pub fn export_history_json(&self) -> MonitorResult<String> {
        self.feed.export_history_json()
    }

    pub async fn export_history(&self, target: impl AsRef<Path>) -> MonitorResult<PathBuf> {
        write_history_export(&self.feed, target.as_ref()).await
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> MonitorResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| not_running())?;
        response.await.map_err(|_| not_running())
    }
}

fn not_running() -> MonitorError {
    MonitorError::internal("monitor is not running").with_operation("send_command")
}

// =============================================================================
// Display loop
// =============================================================================

struct Geocoding {
    report: QuakeReport,
    task: Option<JoinHandle<()>>,
}

impl Geocoding {
    fn abort(self) {
        if let Some(task) = self.task {
            task.abort();
        }
    }
}

struct DisplayLoop {
    feed: FeedStore,
    controller: DisplayController,
    countdown: CountdownTimer,
    dispatcher: Arc<SideEffectDispatcher>,
    resolver: PointResolver,
    snapshots: watch::Sender<DisplaySnapshot>,
    ticks: mpsc::UnboundedSender<TimerGeneration>,
    markers: mpsc::UnboundedSender<MarkerBatch>,
    geocoding: Option<Geocoding>,
}

impl DisplayLoop {
    fn new(
        feed: FeedStore,
        controller: DisplayController,
        countdown: CountdownTimer,
        dispatcher: Arc<SideEffectDispatcher>,
        resolver: PointResolver,
        snapshots: watch::Sender<DisplaySnapshot>,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<TimerGeneration>,
        mpsc::UnboundedReceiver<MarkerBatch>,
    ) {
        let (ticks, ticks_rx) = mpsc::unbounded_channel();
        let (markers, markers_rx) = mpsc::unbounded_channel();
        let display = Self {
            feed,
            controller,
            countdown,
            dispatcher,
            resolver,
            snapshots,
            ticks,
            markers,
            geocoding: None,
        };
        (display, ticks_rx, markers_rx)
    }

    async fn run(
        mut self,
        mut updates: mpsc::UnboundedReceiver<FeedUpdate>,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut ticks: mpsc::UnboundedReceiver<TimerGeneration>,
        mut markers: mpsc::UnboundedReceiver<MarkerBatch>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                Some(update) = updates.recv() => self.on_feed_update(update),
                Some(command) = commands.recv() => self.on_command(command),
                Some(generation) = ticks.recv() => self.on_tick(generation),
                Some((identity, resolved)) = markers.recv() => self.on_markers(identity, resolved),
                else => break,
            }
        }

        self.countdown.cancel();
        if let Some(geocoding) = self.geocoding.take() {
            geocoding.abort();
        }
        log::debug!("Display loop stopped");
    }

    fn on_feed_update(&mut self, update: FeedUpdate) {
        match update {
            FeedUpdate::Quake { new_latest, .. } | FeedUpdate::Bootstrapped { new_latest, .. } => {
                self.refresh_feed(new_latest)
            }
            FeedUpdate::Alert { .. } => {
                self.controller.set_alert(self.feed.alert());
                self.publish();
            }
            FeedUpdate::StationIntensity { .. } | FeedUpdate::Dropped { .. } => {}
        }
    }

    /// `new_latest` is the report the update itself promoted. The store may
    /// already hold a newer latest by the time the update is handled.
    fn refresh_feed(&mut self, new_latest: Option<QuakeReport>) {
        let latest = self.feed.latest();
        self.controller.set_recent(&self.feed.history());
        self.controller.on_latest_changed(latest.as_ref().map(|l| &l.report));

        if let Some(report) = new_latest {
            let fired = self.dispatcher.observe(&report);
            if !fired.is_empty() {
                log::debug!("Fired {:?} for {}", fired, report.identity());
            }
        }

        self.sync_markers();
        self.publish();
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Select { report, reply } => {
                let generation = self.controller.select(report);
                self.countdown.start(generation, self.ticks.clone());
                self.sync_markers();
                let snapshot = self.publish();
                let _ = reply.send(snapshot);
            }
            Command::DismissAlert { reply } => {
                let dismissed = self.feed.dismiss_alert();
                self.controller.dismiss_alert();
                self.publish();
                let _ = reply.send(dismissed);
            }
            Command::InjectQuake { report, reply } => {
                log::info!("Injecting quake report {}", report.identity());
                let update = self.feed.apply(FeedMessage::QuakeReport(report), Utc::now());
                self.on_feed_update(update.clone());
                let _ = reply.send(update);
            }
            Command::InjectAlert { alert, reply } => {
                let update = self.feed.set_alert(alert);
                self.on_feed_update(update.clone());
                let _ = reply.send(update);
            }
        }
    }

    fn on_tick(&mut self, generation: TimerGeneration) {
        match self.controller.tick(generation) {
            TickOutcome::Ignored => {}
            TickOutcome::Remaining(_) => {
                self.publish();
            }
            TickOutcome::Expired => {
                self.countdown.cancel();
                self.sync_markers();
                self.publish();
            }
        }
    }

    fn on_markers(&mut self, identity: EventIdentity, resolved: Vec<IntensityMarker>) {
        if self.controller.set_markers(identity, resolved) {
            self.publish();
        }
    }

    /// Start resolving markers for the displayed report unless that exact
    /// payload is already being (or has been) resolved.
    fn sync_markers(&mut self) {
        let Some(report) = self.controller.displayed_report().cloned() else {
            if let Some(previous) = self.geocoding.take() {
                previous.abort();
            }
            return;
        };
        if self.geocoding.as_ref().is_some_and(|g| g.report == report) {
            return;
        }
        if let Some(previous) = self.geocoding.take() {
            previous.abort();
        }

        let identity = report.identity();
        if report.points.is_empty() {
            self.controller.set_markers(identity, Vec::new());
            self.geocoding = Some(Geocoding { report, task: None });
            return;
        }

        let resolver = self.resolver.clone();
        let markers = self.markers.clone();
        let points = report.points.clone();
        let task = tokio::spawn(async move {
            let resolved = resolver.resolve(&points).await;
            log::debug!("Resolved {}/{} markers for {}", resolved.len(), points.len(), identity);
            if markers.send((identity, resolved)).is_err() {
                log::debug!("Display loop gone, markers discarded");
            }
        });
        self.geocoding = Some(Geocoding {
            report,
            task: Some(task),
        });
    }

    fn publish(&self) -> DisplaySnapshot {
        let snapshot = self.controller.snapshot();
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }
}
