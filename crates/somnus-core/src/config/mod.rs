//! Configuration file plumbing shared by Somnus hosts
//!
//! Generic YAML load/save plus the standard locations for the player's
//! config and preference files.
//!
//! ```ignore
//! use somnus_core::config::{default_config_path, load_config, save_config};
//!
//! let path = default_config_path("config.yaml");
//! let config: PlayerConfig = load_config(&path);
//! save_config(&config, &path)?;
//! ```

mod io;
mod paths;

pub use io::{load_config, save_config};
pub use paths::{default_config_dir, default_config_path};
