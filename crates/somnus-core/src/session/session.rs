//! The playback session state machine
//!
//! ```text
//!            start()            load ok              IntroFinished
//!   Idle ───────────► (loading) ───────► IntroPlaying ─────────────► Looping
//!    ▲                    │                   │                        │
//!    │                    │ load failed       │ stop() / timer         │ stop() / timer
//!    └────────────────────┴───────────────────┴────────────────────────┘
//! ```
//!
//! Every start allocates a generation token. Loader results and engine
//! events carry the token they were issued under; anything carrying a token
//! other than the live one is dropped. The session runs on the caller's
//! clock: hosts call [`PlaybackSession::tick`] regularly.

use std::time::{Duration, Instant};

use basedrop::Shared;
use serde::{Deserialize, Serialize};

use super::preferences::{MemoryPreferenceStore, PreferenceStore, Preferences};
use super::telemetry::{NullTelemetry, TelemetryEvent, TelemetryKind, TelemetrySink};
use super::timer::{Countdown, TimerError};
use super::wake_lock::{NoWakeLock, WakeLock};

use crate::audio_file::AudioAsset;
use crate::engine::{
    seconds_to_frame, EngineCommand, EngineController, EngineEvent, InvalidWindowError, LoopWindow,
    MixState, Voice,
};
use crate::loader::{AssetLoadResult, AssetLoader, AssetUrls};
use crate::timestamps::{TimestampSeries, INTRO_FALLBACK_SECONDS};

/// Default quiet period before an intensity change is applied
pub const DEFAULT_DEBOUNCE_MS: u64 = 40;

/// Session tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Quiet period after the last intensity change before the loop is rebuilt
    pub debounce_ms: u64,
    /// Intro length when the instructor has no usable manifest
    pub intro_fallback_seconds: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            intro_fallback_seconds: INTRO_FALLBACK_SECONDS,
        }
    }
}

/// Lifecycle state
#[derive(Debug, Clone)]
pub enum SessionState {
    Idle,
    IntroPlaying { token: u64 },
    Looping { token: u64, window: LoopWindow },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::IntroPlaying { .. } => "intro",
            SessionState::Looping { .. } => "looping",
        }
    }

    pub fn token(&self) -> Option<u64> {
        match self {
            SessionState::Idle => None,
            SessionState::IntroPlaying { token } | SessionState::Looping { token, .. } => {
                Some(*token)
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }
}

/// Something the host may want to tell the listener about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Assets loaded, audio running
    Started { token: u64 },
    /// Start aborted; the session is idle again
    StartFailed { message: String },
    /// The intro ended and the loop took over
    LoopStarted { token: u64 },
    /// A debounced intensity change is now audible
    IntensityApplied { token: u64, level: u32 },
    /// The countdown ran out and playback stopped
    TimerExpired,
}

/// Snapshot for status displays
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub state: &'static str,
    pub loading: bool,
    pub remaining_seconds: Option<u64>,
    pub intensity: u32,
    pub max_intensity: u32,
    pub intensity_enabled: bool,
    pub blend_percent: u8,
    pub timer_minutes: u32,
    pub loop_seconds: Option<(f64, f64)>,
    pub last_error: Option<String>,
}

/// Collaborators a session reports to
pub struct SessionServices {
    pub telemetry: Box<dyn TelemetrySink>,
    pub wake_lock: Box<dyn WakeLock>,
    pub preferences: Box<dyn PreferenceStore>,
}

impl Default for SessionServices {
    fn default() -> Self {
        Self {
            telemetry: Box::new(NullTelemetry),
            wake_lock: Box::new(NoWakeLock::default()),
            preferences: Box::new(MemoryPreferenceStore::default()),
        }
    }
}

struct SessionAssets {
    instructor: Shared<AudioAsset>,
    soundscape: Shared<AudioAsset>,
    timestamps: TimestampSeries,
}

/// One listener's playback of an instructor/soundscape pairing
pub struct PlaybackSession {
    config: SessionConfig,
    urls: AssetUrls,
    loader: AssetLoader,
    engine: EngineController,
    services: SessionServices,
    preferences: Preferences,
    mix: MixState,
    state: SessionState,
    assets: Option<SessionAssets>,
    /// Window waiting behind the intro
    queued_window: Option<LoopWindow>,
    last_token: u64,
    pending_start: Option<u64>,
    skip_intro: bool,
    rebuild_deadline: Option<Instant>,
    countdown: Countdown,
    last_error: Option<String>,
}

impl PlaybackSession {
    /// Create an idle session; preferences are read from the store once here
    pub fn new(
        config: SessionConfig,
        urls: AssetUrls,
        loader: AssetLoader,
        engine: EngineController,
        services: SessionServices,
    ) -> Self {
        let preferences = services.preferences.load();
        let mix = MixState::new(preferences.blend_percent as i64);
        log::info!(
            "Session ready: blend {}%, timer {} min, intensity {}",
            mix.blend_percent(),
            preferences.timer_minutes,
            preferences.intensity_level
        );

        Self {
            config,
            urls,
            loader,
            engine,
            services,
            preferences,
            mix,
            state: SessionState::Idle,
            assets: None,
            queued_window: None,
            last_token: 0,
            pending_start: None,
            skip_intro: false,
            rebuild_deadline: None,
            countdown: Countdown::new(),
            last_error: None,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────

    /// Begin loading and playing
    ///
    /// Only acts from Idle with no start in flight. Returns the new token.
    pub fn start(&mut self) -> Option<u64> {
        if !self.state.is_idle() || self.pending_start.is_some() {
            log::debug!("start ignored in state {}", self.state.name());
            return None;
        }

        let token = self.next_token();
        self.last_error = None;

        if let Err(e) = self.loader.request(token, self.urls.clone()) {
            self.fail_start(&e.to_string());
            return None;
        }

        self.pending_start = Some(token);
        log::info!("Starting session (token {})", token);
        Some(token)
    }

    /// Stop playback from any state
    ///
    /// Returns false (and emits nothing) when already idle with nothing in
    /// flight.
    pub fn stop(&mut self) -> bool {
        if self.state.is_idle() && self.pending_start.is_none() {
            return false;
        }

        let was_playing = !self.state.is_idle();
        self.engine.send(EngineCommand::DetachAll);
        self.countdown.cancel();
        self.services.wake_lock.release();
        self.skip_intro = false;
        self.rebuild_deadline = None;
        self.pending_start = None;
        self.queued_window = None;
        self.state = SessionState::Idle;

        // A start that never reached playback sent no `play`
        if was_playing {
            self.emit(TelemetryKind::Pause);
        }
        log::info!("Session stopped");
        true
    }

    /// Stop, report the listener leaving, and free the session's assets
    pub fn close(&mut self) {
        self.stop();
        self.emit(TelemetryKind::Leave);
        self.assets = None;
        self.loader.cache().clear();
    }

    /// Change the blend (clamped to 0-100); returns the applied value
    pub fn set_blend(&mut self, percent: i64) -> u8 {
        self.mix.set_blend(percent);
        self.preferences.blend_percent = self.mix.blend_percent();
        self.persist();

        if !self.state.is_idle() {
            self.send_gains();
        }
        self.mix.blend_percent()
    }

    /// Change the countdown length used by the next start
    pub fn set_timer_minutes(&mut self, minutes: u32) -> Result<(), TimerError> {
        if self.countdown.is_active() {
            return Err(TimerError::CountdownActive);
        }
        self.preferences.timer_minutes = minutes;
        self.persist();
        Ok(())
    }

    /// Change the loop length; returns the applied (clamped) level
    ///
    /// While looping, the instructor stops and the loop is rebuilt once no
    /// further change has arrived for the debounce period. During the intro
    /// only the queued loop is replaced.
    pub fn set_intensity(&mut self, level: u32, now: Instant) -> u32 {
        let previous = self.intensity();
        let level = match &self.assets {
            Some(assets) => assets.timestamps.clamp_intensity(level),
            None => level.max(1),
        };
        self.preferences.intensity_level = level;
        self.persist();

        match &self.state {
            SessionState::Idle => {}
            SessionState::IntroPlaying { token } => {
                let token = *token;
                if level != previous {
                    if let Some(window) = self.build_loop_window() {
                        let voice = self.loop_voice(&window);
                        self.engine.send(EngineCommand::QueueInstructor { token, voice });
                        self.queued_window = Some(window);
                    }
                }
            }
            SessionState::Looping { .. } => {
                if level != previous || self.rebuild_deadline.is_some() {
                    if self.rebuild_deadline.is_none() {
                        self.engine.send(EngineCommand::DetachInstructor);
                    }
                    self.skip_intro = true;
                    self.rebuild_deadline =
                        Some(now + Duration::from_millis(self.config.debounce_ms));
                }
            }
        }
        level
    }

    /// Advance the session to `now`
    ///
    /// Applies finished loads, engine events, a due loop rebuild and the
    /// countdown, in that order.
    pub fn tick(&mut self, now: Instant) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        while let Some(result) = self.loader.try_recv() {
            self.handle_load(result, now, &mut events);
        }

        while let Some(event) = self.engine.poll_event() {
            match event {
                EngineEvent::IntroFinished { token } => self.handle_intro_finished(token, &mut events),
            }
        }

        if self.rebuild_deadline.is_some_and(|deadline| now >= deadline) {
            self.rebuild_deadline = None;
            self.restart_loop(&mut events);
        }

        if self.countdown.tick(now) {
            log::info!("Timer expired");
            self.stop();
            events.push(SessionEvent::TimerExpired);
        }

        events
    }

    // ─────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// A start is waiting for its assets
    pub fn is_loading(&self) -> bool {
        self.pending_start.is_some()
    }

    /// Current intensity, clamped to the loaded manifest
    pub fn intensity(&self) -> u32 {
        match &self.assets {
            Some(assets) => assets.timestamps.clamp_intensity(self.preferences.intensity_level),
            None => self.preferences.intensity_level.max(1),
        }
    }

    pub fn max_intensity(&self) -> u32 {
        self.assets
            .as_ref()
            .map_or(1, |assets| assets.timestamps.max_intensity())
    }

    /// False until a manifest with more than one loop length is loaded
    pub fn intensity_enabled(&self) -> bool {
        self.assets
            .as_ref()
            .is_some_and(|assets| assets.timestamps.has_intensity_control())
    }

    pub fn blend_percent(&self) -> u8 {
        self.mix.blend_percent()
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn remaining_seconds(&self) -> Option<u64> {
        self.countdown.remaining_seconds()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// A debounced loop rebuild is waiting
    pub fn rebuild_pending(&self) -> bool {
        self.rebuild_deadline.is_some()
    }

    pub fn status(&self) -> SessionStatus {
        let loop_seconds = match &self.state {
            SessionState::Looping { window, .. } => Some(window),
            SessionState::IntroPlaying { .. } => self.queued_window.as_ref(),
            SessionState::Idle => None,
        }
        .map(|w| (w.start_seconds(), w.end_seconds()));

        SessionStatus {
            state: self.state.name(),
            loading: self.is_loading(),
            remaining_seconds: self.remaining_seconds(),
            intensity: self.intensity(),
            max_intensity: self.max_intensity(),
            intensity_enabled: self.intensity_enabled(),
            blend_percent: self.blend_percent(),
            timer_minutes: self.preferences.timer_minutes,
            loop_seconds,
            last_error: self.last_error.clone(),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────

    fn handle_load(&mut self, result: AssetLoadResult, now: Instant, events: &mut Vec<SessionEvent>) {
        if self.pending_start != Some(result.token) {
            log::debug!("Discarding stale load result (token {})", result.token);
            return;
        }
        self.pending_start = None;

        let loaded = match result.result {
            Ok(loaded) => loaded,
            Err(e) => {
                let message = self.fail_start(&e.to_string());
                events.push(SessionEvent::StartFailed { message });
                return;
            }
        };

        let timestamps = loaded.timestamps.unwrap_or_else(|e| {
            log::warn!("Intensity control disabled: {}", e);
            TimestampSeries::fallback()
        });

        let clamped = timestamps.clamp_intensity(self.preferences.intensity_level);
        if clamped != self.preferences.intensity_level {
            log::info!(
                "Stored intensity {} exceeds this session's {}, using {}",
                self.preferences.intensity_level,
                timestamps.max_intensity(),
                clamped
            );
            self.preferences.intensity_level = clamped;
            self.persist();
        }

        self.assets = Some(SessionAssets {
            instructor: loaded.instructor,
            soundscape: loaded.soundscape,
            timestamps,
        });

        self.begin_playback(result.token, now, events);
    }

    fn begin_playback(&mut self, token: u64, now: Instant, events: &mut Vec<SessionEvent>) {
        let Some(window) = self.build_loop_window() else {
            let message = self.fail_start("instructor track has no playable samples");
            events.push(SessionEvent::StartFailed { message });
            return;
        };
        let Some(assets) = &self.assets else {
            return;
        };
        let rate = self.engine.output_rate();
        let soundscape = Voice::looping(assets.soundscape.clone(), rate);
        let instructor = &assets.instructor;
        let intro_end = assets.timestamps.intro_end_or(self.config.intro_fallback_seconds);
        let intro_frames =
            seconds_to_frame(intro_end, instructor.sample_rate(), instructor.frame_count());
        let intro = Voice::region(instructor.clone(), 0, intro_frames, false, rate);

        // Whatever a previous generation left behind goes first
        self.engine.send(EngineCommand::DetachAll);
        self.send_gains();
        self.engine.send(EngineCommand::AttachSoundscape { voice: soundscape });

        let loop_voice = self.loop_voice(&window);
        self.engine.send(EngineCommand::AttachInstructor { token, voice: intro });
        self.engine.send(EngineCommand::QueueInstructor {
            token,
            voice: loop_voice,
        });
        self.queued_window = Some(window);
        self.state = SessionState::IntroPlaying { token };

        self.services.wake_lock.acquire();
        self.countdown.start(self.preferences.timer_minutes, now);
        self.emit(TelemetryKind::Play);
        log::info!("Playback started ({}, token {})", self.state.name(), token);
        events.push(SessionEvent::Started { token });
    }

    fn handle_intro_finished(&mut self, token: u64, events: &mut Vec<SessionEvent>) {
        if !matches!(self.state, SessionState::IntroPlaying { token: live } if live == token) {
            log::debug!("Ignoring intro end for stale token {}", token);
            return;
        }
        match self.queued_window.take() {
            Some(window) => {
                log::info!(
                    "Intro finished, looping {:.2}s-{:.2}s",
                    window.start_seconds(),
                    window.end_seconds()
                );
                self.state = SessionState::Looping { token, window };
                events.push(SessionEvent::LoopStarted { token });
            }
            None => log::warn!("Intro finished with no loop queued"),
        }
    }

    /// Rebuild the loop at the current intensity under a new token
    fn restart_loop(&mut self, events: &mut Vec<SessionEvent>) {
        if !matches!(self.state, SessionState::Looping { .. }) || !self.skip_intro {
            return;
        }
        self.skip_intro = false;

        let Some(window) = self.build_loop_window() else {
            return;
        };
        let token = self.next_token();
        let voice = self.loop_voice(&window);
        self.engine.send(EngineCommand::AttachInstructor { token, voice });

        let level = self.intensity();
        log::info!(
            "Intensity {} applied, looping {:.2}s-{:.2}s",
            level,
            window.start_seconds(),
            window.end_seconds()
        );
        self.state = SessionState::Looping { token, window };
        events.push(SessionEvent::IntensityApplied { token, level });
    }

    // ─────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────

    /// Loop window for the current intensity, degrading on empty spans
    ///
    /// `[intro_end, loop_end)` first, then `[intro_end, full)`, then the
    /// whole track.
    fn build_loop_window(&self) -> Option<LoopWindow> {
        let assets = self.assets.as_ref()?;
        let instructor = &assets.instructor;
        let full = instructor.duration_seconds();
        let intro_end = assets.timestamps.intro_end_or(self.config.intro_fallback_seconds);
        let loop_end = assets.timestamps.compute_loop_end(self.intensity(), full);

        let attempt = |start: f64, end: f64, result: Result<LoopWindow, InvalidWindowError>| {
            result.map_err(|e| {
                log::warn!("Loop window {:.2}s-{:.2}s unusable: {}", start, end, e);
                e
            })
        };

        attempt(intro_end, loop_end, LoopWindow::build(instructor, intro_end, loop_end))
            .or_else(|_| attempt(intro_end, full, LoopWindow::build(instructor, intro_end, full)))
            .or_else(|_| attempt(0.0, full, LoopWindow::build(instructor, 0.0, full)))
            .ok()
    }

    fn loop_voice(&self, window: &LoopWindow) -> Voice {
        Voice::looping(window.buffer().clone(), self.engine.output_rate())
    }

    fn send_gains(&mut self) {
        self.engine.send(EngineCommand::SetGains {
            instructor: self.mix.instructor_gain(),
            soundscape: self.mix.soundscape_gain(),
        });
    }

    fn next_token(&mut self) -> u64 {
        self.last_token += 1;
        self.last_token
    }

    /// Record a failed start and return the listener-facing message
    fn fail_start(&mut self, reason: &str) -> String {
        let message = format!("could not start playback: {}", reason);
        log::error!("{}", message);
        self.pending_start = None;
        self.state = SessionState::Idle;
        self.last_error = Some(message.clone());
        message
    }

    fn persist(&mut self) {
        if let Err(e) = self.services.preferences.save(&self.preferences) {
            log::warn!("Failed to save preferences: {:#}", e);
        }
    }

    fn emit(&self, kind: TelemetryKind) {
        self.services.telemetry.emit(TelemetryEvent {
            kind,
            timer_minutes: self.preferences.timer_minutes,
            intensity_segments: self.intensity(),
            crossfade: self.mix.blend_percent(),
        });
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.services.wake_lock.release();
    }
}
