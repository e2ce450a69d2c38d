use crate::animation::{
    AnimationDriver, AnimationKind, CloseMotion, Easing, ProgressAnimator, TimedDriver,
};
use crate::constants::*;
use crate::events::EngineEvent;
use crate::gesture::{
    GestureOutput, GestureRecognizer, Haptics, NoopHaptics, PointerEvent,
};
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::render::{HeadlessSurface, RenderError, RenderItem, Renderer, Surface};
use crate::state::NotificationStore;
use crate::storage::{StorageManager, StorageTier, TierKind};
use ember_notifications_config::{Settings, SettingsPatch, SettingsSnapshot};
use ember_notifications_util::{
    ActionId, CloseReason, IdAllocator, Notification, NotificationAction, NotificationId,
    Severity, limit_actions,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, timeout};
use tracing::{debug, warn};

/// Per-call options for [`NotificationEngine::show`]. Unset fields fall
/// back to the configured per-severity defaults.
#[derive(Debug, Clone)]
pub struct ShowOptions {
    pub title: Option<String>,
    /// Override in milliseconds; `Some(0)` forces persistence.
    pub duration_ms: Option<u64>,
    pub actions: Vec<NotificationAction>,
    pub closable: bool,
    pub easing: Easing,
    /// Rate limiting bucket; callers that fan out from distinct subsystems
    /// pass a name here so one noisy subsystem cannot starve the others.
    pub source: Option<String>,
}

impl Default for ShowOptions {
    fn default() -> Self {
        Self {
            title: None,
            duration_ms: None,
            actions: Vec::new(),
            closable: true,
            easing: Easing::default(),
            source: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PerformanceMode {
    #[default]
    Normal,
    /// Constrained host; the visible cap is lowered and entry/exit motion
    /// is kept but nothing else changes.
    Reduced,
}

/// Point-in-time counters, cheap enough to poll from a status page.
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub active_notifications: usize,
    pub pending_notifications: usize,
    pub history_entries: usize,
    /// Effective visible cap after the performance mode is applied.
    pub max_concurrent_notifications: usize,
    pub performance_mode: PerformanceMode,
    pub use_virtual_scrolling: bool,
    pub last_cleanup_time: Option<SystemTime>,
    pub event_manager_active: bool,
    pub animation_manager_active: bool,
    pub lazy_loader_active: bool,
    pub render_count: u64,
    pub storage_tier: Option<TierKind>,
}

/// Everything injectable about the engine's environment. Hosts replace the
/// pieces they care about and leave the rest at the defaults.
pub struct EngineContext {
    pub surface: Box<dyn Surface>,
    pub haptics: Arc<dyn Haptics>,
    pub driver: Arc<dyn AnimationDriver>,
    pub tiers: Vec<Arc<dyn StorageTier>>,
    pub settings: Settings,
}

impl EngineContext {
    pub fn new(surface: Box<dyn Surface>) -> Self {
        Self {
            surface,
            haptics: Arc::new(NoopHaptics),
            driver: Arc::new(TimedDriver),
            tiers: StorageManager::default_tiers("ember-notifications"),
            settings: Settings::default(),
        }
    }

    /// Context with an in-memory surface; the usual starting point in
    /// tests and non-graphical hosts.
    pub fn headless() -> Self {
        Self::new(Box::new(HeadlessSurface::default()))
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_driver(mut self, driver: Arc<dyn AnimationDriver>) -> Self {
        self.driver = driver;
        self
    }

    pub fn with_haptics(mut self, haptics: Arc<dyn Haptics>) -> Self {
        self.haptics = haptics;
        self
    }

    pub fn with_tiers(mut self, tiers: Vec<Arc<dyn StorageTier>>) -> Self {
        self.tiers = tiers;
        self
    }
}

/// Live state of one notification: the domain record plus the machines
/// and tasks attached to it while it is on screen.
struct Entry {
    notification: Notification,
    lifecycle: Lifecycle,
    gesture: GestureRecognizer,
    progress: Option<ProgressAnimator>,
    easing: Easing,
    /// Monotonic creation time, for the cleanup sweep
    created: Instant,
    drag_offset: f32,
    /// Close control revealed by a long-press
    quick_close: bool,
    timer: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
    entry_task: Option<JoinHandle<()>>,
    exit_task: Option<JoinHandle<()>>,
    long_press_task: Option<JoinHandle<()>>,
}

impl Entry {
    fn new(notification: Notification, easing: Easing) -> Self {
        let duration_ms = notification.duration_ms;
        Self {
            notification,
            lifecycle: Lifecycle::new(duration_ms),
            gesture: GestureRecognizer::new(NOTIFICATION_WIDTH),
            progress: None,
            easing,
            created: Instant::now(),
            drag_offset: 0.0,
            quick_close: false,
            timer: None,
            ticker: None,
            entry_task: None,
            exit_task: None,
            long_press_task: None,
        }
    }

    fn abort_scheduled(&mut self) {
        for task in [
            self.timer.take(),
            self.ticker.take(),
            self.entry_task.take(),
            self.long_press_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }

    fn abort_all(&mut self) {
        self.abort_scheduled();
        if let Some(task) = self.exit_task.take() {
            task.abort();
        }
    }
}

struct Inner {
    settings: Settings,
    store: NotificationStore,
    entries: HashMap<NotificationId, Entry>,
    ids: IdAllocator,
    renderer: Renderer,
    rate: RateLimiter,
    shown_total: u64,
    performance_mode: PerformanceMode,
    last_cleanup: Option<SystemTime>,
    background: Vec<JoinHandle<()>>,
    initialized: bool,
    destroyed: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    events: broadcast::Sender<EngineEvent>,
    storage: StorageManager,
    haptics: Arc<dyn Haptics>,
    driver: Arc<dyn AnimationDriver>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The service façade: the only type hosts talk to.
///
/// Cheap to clone; every clone shares the same state. Background tasks
/// hold weak references, so dropping the last external handle (or calling
/// [`destroy`](Self::destroy)) winds everything down.
#[derive(Clone)]
pub struct NotificationEngine {
    shared: Arc<Shared>,
}

impl NotificationEngine {
    pub fn new(context: EngineContext) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    settings: context.settings,
                    store: NotificationStore::new(),
                    entries: HashMap::new(),
                    ids: IdAllocator::new(),
                    renderer: Renderer::new(context.surface),
                    rate: RateLimiter::new(),
                    shown_total: 0,
                    performance_mode: PerformanceMode::Normal,
                    last_cleanup: None,
                    background: Vec::new(),
                    initialized: false,
                    destroyed: false,
                }),
                events,
                storage: StorageManager::new(context.tiers),
                haptics: context.haptics,
                driver: context.driver,
            }),
        }
    }

    /// Select the storage tier, load persisted settings, mount the surface
    /// and start the background tasks. Idempotent.
    pub async fn init(&self) -> Result<(), RenderError> {
        self.shared.storage.select_active();
        let stored = self.shared.storage.get(SETTINGS_KEY).await;
        let stored_history = self.shared.storage.get(HISTORY_KEY).await;

        let mut inner = self.shared.lock();
        if inner.initialized || inner.destroyed {
            return Ok(());
        }
        if let Some(value) = stored {
            match serde_json::from_value::<SettingsSnapshot>(value) {
                Ok(snapshot) if snapshot.is_importable() => {
                    inner.settings = snapshot.settings;
                }
                Ok(snapshot) => warn!(
                    "stored settings version {} is not importable, keeping defaults",
                    snapshot.version
                ),
                Err(err) => warn!("stored settings are unreadable, keeping defaults: {err}"),
            }
        }
        if let Some(value) = stored_history {
            match serde_json::from_value::<Vec<Notification>>(value) {
                Ok(entries) => inner.store.restore_history(entries),
                Err(err) => warn!("stored history is unreadable, starting empty: {err}"),
            }
        }
        inner.renderer.mount()?;

        let sweep = self.spawn_cleanup_sweep(inner.settings.auto_cleanup_interval_ms);
        let flush = self.spawn_replication_flush();
        let forward = self.spawn_storage_forwarding();
        inner.background.extend([sweep, flush, forward]);
        inner.initialized = true;
        debug!("notification engine initialized");
        Ok(())
    }

    /// Subscribe to engine events. Slow consumers may observe lag; the
    /// engine never blocks on them.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.shared.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Showing
    // ------------------------------------------------------------------

    pub fn show(
        &self,
        severity: Severity,
        message: impl Into<String>,
        options: ShowOptions,
    ) -> NotificationId {
        let message = message.into();
        let mut inner = self.shared.lock();
        if inner.destroyed {
            warn!("show called after destroy, ignoring");
            return inner.ids.next();
        }

        let source = options
            .source
            .clone()
            .unwrap_or_else(|| "default".to_string());
        inner.shown_total += 1;
        if inner.shown_total % RATE_LIMIT_CLEANUP_INTERVAL == 0 {
            inner.rate.cleanup();
        }
        if !inner.rate.check_and_update(&source) {
            debug!("rate limit exceeded for source '{source}', dropping notification");
            return inner.ids.next();
        }

        // An identical live notification is not repeated
        if let Some(existing) = inner.entries.iter().find_map(|(id, entry)| {
            (entry.lifecycle.is_active()
                && entry.notification.severity == severity
                && entry.notification.message == message
                && entry.notification.title == options.title)
                .then(|| id.clone())
        }) {
            debug!("duplicate of {existing} suppressed");
            return existing;
        }

        let id = inner.ids.next();
        let duration_ms = options
            .duration_ms
            .unwrap_or_else(|| inner.settings.duration_for(severity));
        let notification = Notification {
            id: id.clone(),
            severity,
            title: options.title,
            message,
            actions: limit_actions(&options.actions, MAX_ACTIONS),
            duration_ms,
            created_at: SystemTime::now(),
            closable: options.closable,
        };

        if inner.settings.do_not_disturb && severity != Severity::Error {
            debug!("do-not-disturb active, {id} recorded to history only");
            inner.store.push_history(notification);
            self.persist_history(&inner);
            return id;
        }

        let cap = self.effective_cap(&inner);
        let visible = inner.store.insert(id.clone(), cap);
        inner
            .entries
            .insert(id.clone(), Entry::new(notification, options.easing));
        let _ = self
            .shared
            .events
            .send(EngineEvent::NotificationShowing { id: id.clone() });

        if visible {
            self.start_presentation(&mut inner, &id);
            self.render_locked(&mut inner, true);
        }
        id
    }

    pub fn success(&self, message: impl Into<String>, options: ShowOptions) -> NotificationId {
        self.show(Severity::Success, message, options)
    }

    pub fn info(&self, message: impl Into<String>, options: ShowOptions) -> NotificationId {
        self.show(Severity::Info, message, options)
    }

    pub fn warning(&self, message: impl Into<String>, options: ShowOptions) -> NotificationId {
        self.show(Severity::Warning, message, options)
    }

    pub fn error(&self, message: impl Into<String>, options: ShowOptions) -> NotificationId {
        self.show(Severity::Error, message, options)
    }

    // ------------------------------------------------------------------
    // Closing
    // ------------------------------------------------------------------

    /// Programmatic close; unknown ids are ignored.
    pub fn remove(&self, id: &NotificationId) {
        self.close_with_motion(id, CloseReason::CloseRequested, CloseMotion::Fade);
    }

    /// Close everything, visible and queued.
    pub fn clear(&self) {
        let ids: Vec<NotificationId> = {
            let inner = self.shared.lock();
            inner.entries.keys().cloned().collect()
        };
        for id in &ids {
            self.close_with_motion(id, CloseReason::CloseRequested, CloseMotion::Fade);
        }
    }

    fn close_with_motion(&self, id: &NotificationId, reason: CloseReason, motion: CloseMotion) {
        let animate;
        {
            let mut inner = self.shared.lock();
            let Some(entry) = inner.entries.get_mut(id) else {
                return;
            };
            let prior = entry.lifecycle.state();
            if !entry.lifecycle.begin_exit(reason) {
                return;
            }
            entry.abort_scheduled();

            animate = inner.settings.enable_animations
                && !inner.renderer.prefers_reduced_motion()
                && prior != LifecycleState::Created;
            if animate {
                let task = self.spawn_exit_animation(id.clone(), motion);
                if let Some(entry) = inner.entries.get_mut(id) {
                    entry.exit_task = Some(task);
                }
            }
        }
        if !animate {
            self.finish_removal(id);
        }
    }

    fn spawn_exit_animation(&self, id: NotificationId, motion: CloseMotion) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.shared);
        let driver = self.shared.driver.clone();
        tokio::spawn(async move {
            let duration = Duration::from_millis(EXIT_ANIMATION_MS);
            let deadline = duration + Duration::from_millis(ANIMATION_FALLBACK_GRACE_MS);
            // A driver that never resolves loses to the deadline, so a
            // closing card cannot stay on screen indefinitely
            let _ = timeout(deadline, driver.play(AnimationKind::Exit(motion), duration)).await;
            if let Some(shared) = weak.upgrade() {
                let engine = NotificationEngine { shared };
                engine.finish_removal(&id);
            }
        })
    }

    fn finish_removal(&self, id: &NotificationId) {
        let mut inner = self.shared.lock();
        self.remove_entry_locked(&mut inner, id);
    }

    fn remove_entry_locked(&self, inner: &mut Inner, id: &NotificationId) {
        let Some(mut entry) = inner.entries.remove(id) else {
            return;
        };
        entry.abort_scheduled();
        if !entry.lifecycle.mark_removed() {
            return;
        }
        let reason = entry
            .lifecycle
            .close_reason()
            .unwrap_or(CloseReason::Undefined);

        inner.store.remove(id);
        inner.store.push_history(entry.notification);

        let cap = self.effective_cap(inner);
        let mut promoted = Vec::new();
        while let Some(next) = inner.store.promote(cap) {
            promoted.push(next);
        }
        for next in &promoted {
            self.start_presentation(inner, next);
        }

        let _ = self.shared.events.send(EngineEvent::NotificationClosed {
            id: id.clone(),
            reason,
        });
        self.render_locked(inner, false);
        self.persist_history(inner);
    }

    // ------------------------------------------------------------------
    // Presentation and timing
    // ------------------------------------------------------------------

    fn start_presentation(&self, inner: &mut Inner, id: &NotificationId) {
        let now = Instant::now();
        let animations =
            inner.settings.enable_animations && !inner.renderer.prefers_reduced_motion();
        let animate_entry = {
            let Some(entry) = inner.entries.get_mut(id) else {
                return;
            };
            if entry.lifecycle.state() != LifecycleState::Created {
                return;
            }
            entry.lifecycle.begin_entry(animations, now)
        };

        if animate_entry {
            let task = self.spawn_entry_animation(id.clone());
            if let Some(entry) = inner.entries.get_mut(id) {
                entry.entry_task = Some(task);
            }
        } else {
            self.arm_autoclose(inner, id, now);
        }
    }

    fn spawn_entry_animation(&self, id: NotificationId) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.shared);
        let driver = self.shared.driver.clone();
        tokio::spawn(async move {
            let duration = Duration::from_millis(ENTRY_ANIMATION_MS);
            let deadline = duration + Duration::from_millis(ANIMATION_FALLBACK_GRACE_MS);
            let _ = timeout(deadline, driver.play(AnimationKind::Entry, duration)).await;
            if let Some(shared) = weak.upgrade() {
                let engine = NotificationEngine { shared };
                engine.finish_entry(&id);
            }
        })
    }

    fn finish_entry(&self, id: &NotificationId) {
        let mut inner = self.shared.lock();
        let now = Instant::now();
        {
            let Some(entry) = inner.entries.get_mut(id) else {
                return;
            };
            if entry.lifecycle.state() != LifecycleState::Entering {
                return;
            }
            entry.lifecycle.mark_visible(now);
            entry.entry_task = None;
        }
        self.arm_autoclose(&mut inner, id, now);
        // A press that began during the entry animation is still holding the
        // card; keep the fresh countdown suspended until it releases
        let held = inner
            .entries
            .get(id)
            .is_some_and(|entry| entry.gesture.is_tracking());
        if held {
            self.pause_locked(&mut inner, id, now);
        }
        self.render_locked(&mut inner, false);
    }

    /// Start the countdown for a freshly visible notification: the
    /// progress animator always, plus either the frame ticker (animations
    /// on) or a one-shot expiry timer (animations off).
    fn arm_autoclose(&self, inner: &mut Inner, id: &NotificationId, now: Instant) {
        let animations =
            inner.settings.enable_animations && !inner.renderer.prefers_reduced_motion();
        let Some(entry) = inner.entries.get_mut(id) else {
            return;
        };
        let Some(remaining) = entry.lifecycle.remaining(now) else {
            return;
        };
        entry.progress = Some(ProgressAnimator::new(remaining, entry.easing, now));
        if animations {
            entry.ticker = Some(self.spawn_ticker(id.clone()));
        } else {
            entry.timer = Some(self.spawn_expiry(id.clone(), remaining));
        }
    }

    fn spawn_expiry(&self, id: NotificationId, delay: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                let engine = NotificationEngine { shared };
                engine.close_with_motion(&id, CloseReason::Expired, CloseMotion::Fade);
            }
        })
    }

    fn spawn_ticker(&self, id: NotificationId) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(FRAME_INTERVAL_MS));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                let engine = NotificationEngine { shared };
                if engine.progress_tick(&id) {
                    break;
                }
            }
        })
    }

    /// One frame of the countdown. Returns true when the ticker should
    /// stop.
    fn progress_tick(&self, id: &NotificationId) -> bool {
        let mut inner = self.shared.lock();
        let Some(entry) = inner.entries.get(id) else {
            return true;
        };
        match entry.lifecycle.state() {
            LifecycleState::Exiting | LifecycleState::Removed => true,
            LifecycleState::Visible => {
                let now = Instant::now();
                let complete = entry
                    .progress
                    .as_ref()
                    .is_some_and(|progress| progress.is_complete(now));
                if complete {
                    drop(inner);
                    self.close_with_motion(id, CloseReason::Expired, CloseMotion::Fade);
                    true
                } else {
                    self.render_locked(&mut inner, false);
                    false
                }
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Pause / resume
    // ------------------------------------------------------------------

    pub fn pause(&self, id: &NotificationId) {
        let mut inner = self.shared.lock();
        self.pause_locked(&mut inner, id, Instant::now());
        self.render_locked(&mut inner, false);
    }

    pub fn resume(&self, id: &NotificationId) {
        let mut inner = self.shared.lock();
        self.resume_locked(&mut inner, id, Instant::now());
        self.render_locked(&mut inner, false);
    }

    /// Host lost focus or visibility; freeze every countdown.
    pub fn pause_all(&self) {
        let mut inner = self.shared.lock();
        let now = Instant::now();
        let ids: Vec<NotificationId> = inner.store.visible().to_vec();
        for id in &ids {
            self.pause_locked(&mut inner, id, now);
        }
        self.render_locked(&mut inner, false);
    }

    pub fn resume_all(&self) {
        let mut inner = self.shared.lock();
        let now = Instant::now();
        let ids: Vec<NotificationId> = inner.store.visible().to_vec();
        for id in &ids {
            self.resume_locked(&mut inner, id, now);
        }
        self.render_locked(&mut inner, false);
    }

    fn pause_locked(&self, inner: &mut Inner, id: &NotificationId, now: Instant) {
        let Some(entry) = inner.entries.get_mut(id) else {
            return;
        };
        if !entry.lifecycle.pause(now) {
            return;
        }
        if let Some(timer) = entry.timer.take() {
            timer.abort();
        }
        if let Some(progress) = entry.progress.as_mut() {
            progress.pause(now);
        }
    }

    fn resume_locked(&self, inner: &mut Inner, id: &NotificationId, now: Instant) {
        let Some(entry) = inner.entries.get_mut(id) else {
            return;
        };
        if entry.lifecycle.state() != LifecycleState::Paused {
            return;
        }
        let remaining = entry.lifecycle.resume(now);
        if let Some(progress) = entry.progress.as_mut() {
            progress.resume(now);
        }
        // The frame ticker survives a pause; only the one-shot timer needs
        // rescheduling
        if entry.ticker.is_none() {
            if let Some(remaining) = remaining {
                entry.timer = Some(self.spawn_expiry(id.clone(), remaining));
            }
        }
    }

    // ------------------------------------------------------------------
    // Gestures
    // ------------------------------------------------------------------

    /// Feed one pointer event for a notification card.
    pub fn pointer_event(&self, id: &NotificationId, event: PointerEvent) {
        let mut tapped = false;
        let mut close_request: Option<CloseMotion> = None;
        {
            let mut inner = self.shared.lock();
            if inner.destroyed {
                return;
            }
            let now = Instant::now();
            let outputs = {
                let Some(entry) = inner.entries.get_mut(id) else {
                    return;
                };
                if !entry.lifecycle.is_active() {
                    return;
                }
                entry.gesture.handle(event)
            };

            let mut needs_render = false;
            for output in outputs {
                match output {
                    GestureOutput::PauseTimer => self.pause_locked(&mut inner, id, now),
                    GestureOutput::ResumeTimer => self.resume_locked(&mut inner, id, now),
                    GestureOutput::Tap => tapped = true,
                    GestureOutput::LongPress => {}
                    GestureOutput::DragTo(offset) => {
                        if let Some(entry) = inner.entries.get_mut(id) {
                            entry.drag_offset = offset;
                        }
                        needs_render = true;
                    }
                    GestureOutput::ThresholdReached => {}
                    GestureOutput::Dismiss(direction) => {
                        close_request = Some(direction.into());
                    }
                    GestureOutput::Rebound => {
                        if let Some(entry) = inner.entries.get_mut(id) {
                            entry.drag_offset = 0.0;
                        }
                        if inner.settings.enable_animations {
                            let driver = self.shared.driver.clone();
                            tokio::spawn(async move {
                                driver
                                    .play(
                                        AnimationKind::Rebound,
                                        Duration::from_millis(ENTRY_ANIMATION_MS),
                                    )
                                    .await;
                            });
                        }
                        needs_render = true;
                    }
                    GestureOutput::Haptic(cue) => self.shared.haptics.vibrate(cue),
                }
            }

            if matches!(event, PointerEvent::Down { .. }) {
                self.schedule_long_press(&mut inner, id);
            }
            if needs_render {
                self.render_locked(&mut inner, false);
            }
        }

        if tapped {
            let _ = self.shared.events.send(EngineEvent::ActionInvoked {
                id: id.clone(),
                action: ActionId::Default,
            });
        }
        if let Some(motion) = close_request {
            self.close_with_motion(id, CloseReason::Dismissed, motion);
        }
    }

    /// Report an action button activation on a card.
    pub fn invoke_action(&self, id: &NotificationId, action: ActionId) {
        let known = {
            let inner = self.shared.lock();
            inner.entries.contains_key(id)
        };
        if known {
            let _ = self.shared.events.send(EngineEvent::ActionInvoked {
                id: id.clone(),
                action,
            });
        }
    }

    fn schedule_long_press(&self, inner: &mut Inner, id: &NotificationId) {
        let Some(token) = inner.entries.get(id).map(|entry| entry.gesture.press_token()) else {
            return;
        };
        let weak = Arc::downgrade(&self.shared);
        let id2 = id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(LONG_PRESS_MS)).await;
            if let Some(shared) = weak.upgrade() {
                let engine = NotificationEngine { shared };
                engine.long_press_fire(&id2, token);
            }
        });
        if let Some(entry) = inner.entries.get_mut(id) {
            if let Some(previous) = entry.long_press_task.replace(handle) {
                previous.abort();
            }
        }
    }

    fn long_press_fire(&self, id: &NotificationId, token: u64) {
        let mut inner = self.shared.lock();
        let fired = {
            let Some(entry) = inner.entries.get_mut(id) else {
                return;
            };
            let outputs = entry.gesture.long_press_due(token);
            if outputs.contains(&GestureOutput::LongPress) {
                entry.quick_close = true;
                true
            } else {
                false
            }
        };
        if fired {
            self.render_locked(&mut inner, false);
        }
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Apply a partial settings update. Running countdowns are untouched;
    /// a raised visible cap promotes queued notifications immediately.
    pub fn update_settings(&self, patch: SettingsPatch) {
        let mut inner = self.shared.lock();
        inner.settings.apply(patch);
        self.promote_pending(&mut inner);
        self.render_locked(&mut inner, false);
        self.persist_settings(&inner);
    }

    pub fn export_settings(&self) -> SettingsSnapshot {
        self.shared.lock().settings.snapshot()
    }

    /// Import a previously exported snapshot. Returns false without
    /// touching anything when the snapshot is not importable.
    pub fn import_settings(&self, snapshot: SettingsSnapshot) -> bool {
        if !snapshot.is_importable() {
            warn!(
                "settings snapshot version {} rejected at import",
                snapshot.version
            );
            return false;
        }
        let mut inner = self.shared.lock();
        inner.settings = snapshot.settings;
        self.promote_pending(&mut inner);
        self.render_locked(&mut inner, false);
        self.persist_settings(&inner);
        true
    }

    fn promote_pending(&self, inner: &mut Inner) {
        let cap = self.effective_cap(inner);
        let mut promoted = Vec::new();
        while let Some(id) = inner.store.promote(cap) {
            promoted.push(id);
        }
        for id in &promoted {
            self.start_presentation(inner, id);
        }
    }

    // ------------------------------------------------------------------
    // Modes, stats, maintenance
    // ------------------------------------------------------------------

    pub fn set_performance_mode(&self, mode: PerformanceMode) {
        let mut inner = self.shared.lock();
        inner.performance_mode = mode;
        debug!("performance mode set to {mode:?}");
        // A raised cap takes effect immediately; a lowered one only
        // constrains future insertions
        self.promote_pending(&mut inner);
        self.render_locked(&mut inner, false);
    }

    fn effective_cap(&self, inner: &Inner) -> usize {
        match inner.performance_mode {
            PerformanceMode::Normal => inner.settings.max_visible,
            PerformanceMode::Reduced => inner.settings.max_visible.min(REDUCED_MODE_MAX_VISIBLE),
        }
    }

    pub fn stats(&self) -> EngineStats {
        let inner = self.shared.lock();
        EngineStats {
            active_notifications: inner.store.visible_count(),
            pending_notifications: inner.store.pending_count(),
            history_entries: inner.store.history().len(),
            max_concurrent_notifications: self.effective_cap(&inner),
            performance_mode: inner.performance_mode,
            use_virtual_scrolling: inner.renderer.is_virtualized(),
            last_cleanup_time: inner.last_cleanup,
            event_manager_active: self.shared.events.receiver_count() > 0,
            animation_manager_active: inner.settings.enable_animations,
            lazy_loader_active: inner.renderer.is_virtualized(),
            render_count: inner.renderer.render_count(),
            storage_tier: self.shared.storage.active_kind(),
        }
    }

    pub fn is_active(&self, id: &NotificationId) -> bool {
        let inner = self.shared.lock();
        inner
            .entries
            .get(id)
            .is_some_and(|entry| entry.lifecycle.is_active())
    }

    pub fn visible_count(&self) -> usize {
        self.shared.lock().store.visible_count()
    }

    pub fn pending_count(&self) -> usize {
        self.shared.lock().store.pending_count()
    }

    pub fn history(&self) -> Vec<Notification> {
        self.shared.lock().store.history().iter().cloned().collect()
    }

    /// Drop every history entry and persist the now-empty record.
    pub fn clear_history(&self) {
        let mut inner = self.shared.lock();
        inner.store.clear_history();
        self.persist_history(&inner);
    }

    /// Evict every notification older than `max_age`, bypassing exit
    /// animations so the count returned is exact.
    pub fn cleanup_old_notifications(&self, max_age: Duration) -> usize {
        let mut inner = self.shared.lock();
        let now = Instant::now();
        let stale: Vec<NotificationId> = inner
            .entries
            .iter()
            .filter(|(_, entry)| {
                entry.lifecycle.is_active()
                    && now.saturating_duration_since(entry.created) >= max_age
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            if let Some(entry) = inner.entries.get_mut(id) {
                entry.lifecycle.begin_exit(CloseReason::Expired);
            }
            self.remove_entry_locked(&mut inner, id);
        }
        inner.last_cleanup = Some(SystemTime::now());
        stale.len()
    }

    // ------------------------------------------------------------------
    // Scrolling
    // ------------------------------------------------------------------

    pub fn set_scroll_offset(&self, offset: f32) {
        let mut inner = self.shared.lock();
        inner.renderer.set_scroll_offset(offset);
        self.render_locked(&mut inner, false);
    }

    pub fn set_viewport_height(&self, height: f32) {
        let mut inner = self.shared.lock();
        inner.renderer.set_viewport_height(height);
        self.render_locked(&mut inner, false);
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Cancel every task, unmount the surface and drop all live
    /// notifications without ceremony. The engine is unusable afterwards.
    pub fn destroy(&self) {
        let mut inner = self.shared.lock();
        if inner.destroyed {
            return;
        }
        inner.destroyed = true;
        for task in inner.background.drain(..) {
            task.abort();
        }
        let entries: Vec<Entry> = inner.entries.drain().map(|(_, entry)| entry).collect();
        for mut entry in entries {
            entry.abort_all();
        }
        inner.store = NotificationStore::new();
        inner.renderer.unmount();
        debug!("notification engine destroyed");
    }

    // ------------------------------------------------------------------
    // Rendering and persistence
    // ------------------------------------------------------------------

    fn render_locked(&self, inner: &mut Inner, head_inserted: bool) {
        let now = Instant::now();
        let items: Vec<RenderItem> = inner
            .store
            .visible()
            .iter()
            .filter_map(|id| {
                let entry = inner.entries.get(id)?;
                let n = &entry.notification;
                Some(RenderItem {
                    id: n.id.clone(),
                    severity: n.severity,
                    style_class: format!("toast-{}", n.severity.as_str()),
                    role: n.severity.into(),
                    title: n.title.clone(),
                    message: n.message.clone(),
                    action_labels: n.actions.iter().map(|a| a.label.clone()).collect(),
                    closable: n.closable || entry.quick_close,
                    progress: (!n.is_persistent()).then(|| {
                        entry
                            .progress
                            .as_ref()
                            .map_or(1.0, |p| p.remaining_fraction(now))
                    }),
                    offset_x: entry.drag_offset,
                })
            })
            .collect();
        let anchor = inner.settings.position;
        inner.renderer.render(items, anchor, head_inserted);
    }

    fn persist_settings(&self, inner: &Inner) {
        let snapshot = inner.settings.snapshot();
        let shared = self.shared.clone();
        tokio::spawn(async move {
            match serde_json::to_value(&snapshot) {
                Ok(value) => shared.storage.set(SETTINGS_KEY, value).await,
                Err(err) => warn!("could not serialize settings: {err}"),
            }
        });
    }

    fn persist_history(&self, inner: &Inner) {
        let entries: Vec<Notification> = inner.store.history().iter().cloned().collect();
        let shared = self.shared.clone();
        tokio::spawn(async move {
            match serde_json::to_value(&entries) {
                Ok(value) => shared.storage.set(HISTORY_KEY, value).await,
                Err(err) => warn!("could not serialize history: {err}"),
            }
        });
    }

    // ------------------------------------------------------------------
    // Background tasks
    // ------------------------------------------------------------------

    fn spawn_cleanup_sweep(&self, interval_ms: u64) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick resolves immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                let engine = NotificationEngine { shared };
                let evicted = engine
                    .cleanup_old_notifications(Duration::from_millis(CLEANUP_RETENTION_MS));
                if evicted > 0 {
                    debug!("cleanup sweep evicted {evicted} notifications");
                }
            }
        })
    }

    fn spawn_replication_flush(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(SYNC_FLUSH_INTERVAL_MS));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                shared.storage.flush_replication().await;
            }
        })
    }

    fn spawn_storage_forwarding(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.shared);
        let mut changes = self.shared.storage.subscribe();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        let Some(shared) = weak.upgrade() else {
                            break;
                        };
                        let _ = shared.events.send(EngineEvent::StorageChanged {
                            key: change.key,
                            old: change.old,
                            new: change.new,
                        });
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("storage change stream lagged, {skipped} events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Sliding-window rate limiter keyed by source name.
struct RateLimiter {
    counts: HashMap<String, (Instant, u32)>,
}

impl RateLimiter {
    fn new() -> Self {
        Self {
            counts: HashMap::new(),
        }
    }

    fn window() -> Duration {
        Duration::from_secs(60)
    }

    /// Record one notification from `source`; false means over the limit.
    fn check_and_update(&mut self, source: &str) -> bool {
        let now = Instant::now();
        if self.counts.len() >= RATE_LIMIT_MAX_SOURCES && !self.counts.contains_key(source) {
            self.cleanup();
            if self.counts.len() >= RATE_LIMIT_MAX_SOURCES {
                warn!("rate limiter is tracking too many sources, rejecting '{source}'");
                return false;
            }
        }
        let entry = self.counts.entry(source.to_string()).or_insert((now, 0));
        if now.saturating_duration_since(entry.0) > Self::window() {
            *entry = (now, 0);
        }
        if entry.1 >= RATE_LIMIT_PER_MINUTE {
            return false;
        }
        entry.1 += 1;
        true
    }

    /// Drop sources whose window has fully elapsed.
    fn cleanup(&mut self) {
        let now = Instant::now();
        self.counts
            .retain(|_, (start, _)| now.saturating_duration_since(*start) <= Self::window());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::NoopDriver;
    use crate::storage::MemoryTier;

    fn engine_with_probe() -> (NotificationEngine, HeadlessSurface) {
        let probe = HeadlessSurface::new(600.0);
        let context = EngineContext::new(Box::new(probe.clone()))
            .with_driver(Arc::new(NoopDriver))
            .with_tiers(vec![Arc::new(MemoryTier::new())]);
        (NotificationEngine::new(context), probe)
    }

    async fn settle() {
        // Let spawned entry/exit tasks run on the paused clock
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_show_renders_notification() {
        let (engine, probe) = engine_with_probe();
        engine.init().await.unwrap();

        let id = engine.info("saved", ShowOptions::default());
        settle().await;

        assert!(engine.is_active(&id));
        assert_eq!(engine.visible_count(), 1);
        let frame = probe.last_frame().unwrap();
        assert_eq!(frame.items.len(), 1);
        assert_eq!(frame.items[0].message, "saved");
        assert_eq!(frame.items[0].style_class, "toast-info");
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_live_notification_suppressed() {
        let (engine, _probe) = engine_with_probe();
        engine.init().await.unwrap();

        let first = engine.error("disk full", ShowOptions::default());
        let second = engine.error("disk full", ShowOptions::default());
        assert_eq!(first, second);
        assert_eq!(engine.visible_count(), 1);

        // A different message is not a duplicate
        let third = engine.error("disk gone", ShowOptions::default());
        assert_ne!(first, third);
    }

    #[tokio::test(start_paused = true)]
    async fn test_do_not_disturb_suppresses_non_errors() {
        let (engine, _probe) = engine_with_probe();
        engine.init().await.unwrap();
        engine.update_settings(SettingsPatch {
            do_not_disturb: Some(true),
            ..Default::default()
        });

        engine.info("routine", ShowOptions::default());
        assert_eq!(engine.visible_count(), 0);
        assert_eq!(engine.history().len(), 1);

        // Errors still surface
        engine.error("failed", ShowOptions::default());
        assert_eq!(engine.visible_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_emits_close_event() {
        let (engine, _probe) = engine_with_probe();
        engine.init().await.unwrap();
        let mut events = engine.subscribe();

        let id = engine.info("x", ShowOptions::default());
        settle().await;
        engine.remove(&id);
        settle().await;

        assert!(!engine.is_active(&id));
        let mut closed_reason = None;
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::NotificationClosed { id: closed, reason } = event {
                assert_eq!(closed, id);
                closed_reason = Some(reason);
            }
        }
        assert_eq!(closed_reason, Some(CloseReason::CloseRequested));
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_is_terminal() {
        let (engine, probe) = engine_with_probe();
        engine.init().await.unwrap();
        engine.info("x", ShowOptions::default());
        settle().await;

        engine.destroy();
        assert!(!probe.is_mounted());
        assert_eq!(engine.visible_count(), 0);

        engine.info("after", ShowOptions::default());
        assert_eq!(engine.visible_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_window() {
        let mut limiter = RateLimiter::new();
        for _ in 0..RATE_LIMIT_PER_MINUTE {
            assert!(limiter.check_and_update("src"));
        }
        assert!(!limiter.check_and_update("src"));

        // Another source has its own budget
        assert!(limiter.check_and_update("other"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.check_and_update("src"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_reflect_state() {
        let (engine, _probe) = engine_with_probe();
        engine.init().await.unwrap();
        let _events = engine.subscribe();

        for i in 0..8 {
            engine.info(format!("m{i}"), ShowOptions::default());
        }
        settle().await;

        let stats = engine.stats();
        assert_eq!(stats.active_notifications, 5);
        assert_eq!(stats.pending_notifications, 3);
        assert_eq!(stats.max_concurrent_notifications, 5);
        assert!(stats.event_manager_active);
        assert!(stats.animation_manager_active);
        assert!(!stats.use_virtual_scrolling);
        assert_eq!(stats.storage_tier, Some(TierKind::Memory));
    }
}
