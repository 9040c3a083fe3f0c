//! Lock-free control link between the session and the audio thread
//!
//! The session pushes [`EngineCommand`]s into one `rtrb` ring buffer; the
//! audio thread drains it at the start of every buffer. The engine answers
//! with [`EngineEvent`]s through a second ring buffer flowing the other
//! way. Neither side ever blocks.
//!
//! ```ignore
//! let (mut controller, mut renderer) = engine_link(48_000);
//!
//! // Control thread
//! controller.send(EngineCommand::DetachAll);
//!
//! // Audio thread
//! renderer.render(&mut buffer);
//! ```

use super::engine::MixEngine;
use super::voice::Voice;
use crate::types::StereoBuffer;

/// Commands sent from the control thread to the audio thread
///
/// Applied in order at buffer boundaries, so a detach queued before an
/// attach always takes effect first.
pub enum EngineCommand {
    /// Replace the soundscape voice
    AttachSoundscape { voice: Voice },
    /// Replace the instructor voice and drop anything queued behind it
    AttachInstructor { token: u64, voice: Voice },
    /// Play `voice` the sample after the current one-shot instructor voice ends
    ///
    /// Replaces any previously queued voice. If no one-shot instructor is
    /// playing any more, the voice starts immediately.
    QueueInstructor { token: u64, voice: Voice },
    /// Stop the instructor voice and drop the queued one
    DetachInstructor,
    /// Stop every voice
    DetachAll,
    /// Ramp to new channel gains over the next buffer
    SetGains { instructor: f32, soundscape: f32 },
}

/// Notifications from the audio thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// The one-shot instructor voice started under `token` played its last sample
    IntroFinished { token: u64 },
}

/// Capacity of the command queue
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Capacity of the event queue
pub const EVENT_QUEUE_CAPACITY: usize = 64;

/// Create a new command channel (producer/consumer pair)
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

/// Create a new event channel (producer/consumer pair)
pub fn event_channel() -> (rtrb::Producer<EngineEvent>, rtrb::Consumer<EngineEvent>) {
    rtrb::RingBuffer::new(EVENT_QUEUE_CAPACITY)
}

/// Control-thread end of the link
pub struct EngineController {
    commands: rtrb::Producer<EngineCommand>,
    events: rtrb::Consumer<EngineEvent>,
    output_rate: u32,
}

impl EngineController {
    /// Sample rate of the device the engine renders for
    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Queue a command; returns false (and logs) if the queue is full
    pub fn send(&mut self, command: EngineCommand) -> bool {
        match self.commands.push(command) {
            Ok(()) => true,
            Err(_) => {
                log::error!("Engine command queue full, command dropped");
                false
            }
        }
    }

    /// Next pending engine event, if any
    pub fn poll_event(&mut self) -> Option<EngineEvent> {
        self.events.pop().ok()
    }
}

/// Audio-thread end of the link: the engine plus its command consumer
pub struct EngineRenderer {
    engine: MixEngine,
    commands: rtrb::Consumer<EngineCommand>,
}

impl EngineRenderer {
    /// Apply pending commands, then render one buffer
    pub fn render(&mut self, out: &mut StereoBuffer) {
        self.engine.process_commands(&mut self.commands);
        self.engine.process(out);
    }

    pub fn engine(&self) -> &MixEngine {
        &self.engine
    }
}

/// Create a connected controller/renderer pair for a device at `output_rate`
pub fn engine_link(output_rate: u32) -> (EngineController, EngineRenderer) {
    let (command_tx, command_rx) = command_channel();
    let (event_tx, event_rx) = event_channel();
    (
        EngineController {
            commands: command_tx,
            events: event_rx,
            output_rate,
        },
        EngineRenderer {
            engine: MixEngine::new(output_rate, event_tx),
            commands: command_rx,
        },
    )
}
