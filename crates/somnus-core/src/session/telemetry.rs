//! Fire-and-forget playback analytics
//!
//! Emitting never blocks and never fails the caller. Sinks drop events
//! they cannot deliver.

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryKind {
    Play,
    Pause,
    Leave,
}

/// One analytics record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryEvent {
    pub kind: TelemetryKind,
    pub timer_minutes: u32,
    pub intensity_segments: u32,
    pub crossfade: u8,
}

/// Destination for telemetry events
pub trait TelemetrySink: Send {
    fn emit(&self, event: TelemetryEvent);
}

/// Discards every event
#[derive(Debug, Default)]
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn emit(&self, _event: TelemetryEvent) {}
}

/// Writes events to the log as JSON
#[derive(Debug, Default)]
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn emit(&self, event: TelemetryEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => log::info!("[TELEMETRY] {}", json),
            Err(e) => log::debug!("Telemetry event not serializable: {}", e),
        }
    }
}

/// Forwards events over a bounded channel, dropping them when it is full
pub struct ChannelTelemetry {
    tx: Sender<TelemetryEvent>,
}

impl ChannelTelemetry {
    /// Create a sink and the receiver that drains it
    pub fn bounded(capacity: usize) -> (Self, Receiver<TelemetryEvent>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx }, rx)
    }
}

impl TelemetrySink for ChannelTelemetry {
    fn emit(&self, event: TelemetryEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                log::debug!("Telemetry queue full, dropping {:?}", event.kind);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: TelemetryKind) -> TelemetryEvent {
        TelemetryEvent {
            kind,
            timer_minutes: 20,
            intensity_segments: 2,
            crossfade: 40,
        }
    }

    #[test]
    fn test_channel_drops_when_full() {
        let (sink, rx) = ChannelTelemetry::bounded(1);
        sink.emit(event(TelemetryKind::Play));
        sink.emit(event(TelemetryKind::Pause));

        assert_eq!(rx.try_recv().unwrap().kind, TelemetryKind::Play);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_disconnected_channel_is_silent() {
        let (sink, rx) = ChannelTelemetry::bounded(4);
        drop(rx);
        sink.emit(event(TelemetryKind::Leave));
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(event(TelemetryKind::Pause)).unwrap();
        assert_eq!(json["kind"], "pause");
        assert_eq!(json["crossfade"], 40);
    }
}
