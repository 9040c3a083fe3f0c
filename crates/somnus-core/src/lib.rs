//! Somnus Core - playback engine for guided relaxation sessions
//!
//! Mixes a spoken instructor track over an ambient soundscape. The
//! instructor plays its intro once and then loops a phrase window whose
//! length follows the listener's intensity setting.

pub mod audio;
pub mod audio_file;
pub mod config;
pub mod engine;
pub mod loader;
pub mod session;
pub mod timestamps;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use types::*;
