//! Audio engine - loop windows, voices, gains and the mix engine
//!
//! - [`LoopWindow`]: sample-accurate excerpt used as the loop body
//! - [`Voice`]: cursor over a shared asset region, one-shot or looping
//! - [`MixEngine`]: audio-thread owner of the instructor and soundscape voices
//! - [`EngineController`] / [`EngineRenderer`]: the lock-free link between
//!   the control thread and the audio thread

mod command;
mod engine;
pub mod gc;
mod mixer;
mod voice;
mod window;

pub use command::*;
pub use engine::*;
pub use mixer::*;
pub use voice::*;
pub use window::*;
