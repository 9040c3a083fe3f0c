//! Playback session: state machine, countdown, wake lock, preferences, telemetry
//!
//! A [`PlaybackSession`] lives on the control thread and drives the mix
//! engine through an [`EngineController`](crate::engine::EngineController).

mod preferences;
mod session;
mod telemetry;
mod timer;
mod wake_lock;

pub use preferences::{
    MemoryPreferenceStore, PreferenceStore, Preferences, YamlPreferenceStore, DEFAULT_TIMER_MINUTES,
};
pub use session::{
    PlaybackSession, SessionConfig, SessionEvent, SessionServices, SessionState, SessionStatus,
    DEFAULT_DEBOUNCE_MS,
};
pub use telemetry::{
    ChannelTelemetry, LogTelemetry, NullTelemetry, TelemetryEvent, TelemetryKind, TelemetrySink,
};
pub use timer::{Countdown, TimerError};
pub use wake_lock::{InhibitWakeLock, NoWakeLock, WakeLock};
