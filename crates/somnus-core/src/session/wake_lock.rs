//! Keeping the machine awake during playback
//!
//! Best-effort only: failing to take the lock is logged and playback
//! carries on.

use std::process::{Child, Command, Stdio};

/// A lock that keeps the device from idling or sleeping
pub trait WakeLock: Send {
    /// Take the lock; calling again while held does nothing
    fn acquire(&mut self);

    /// Drop the lock; calling again while released does nothing
    fn release(&mut self);

    fn is_held(&self) -> bool;
}

/// Wake lock that does nothing
#[derive(Debug, Default)]
pub struct NoWakeLock {
    held: bool,
}

impl WakeLock for NoWakeLock {
    fn acquire(&mut self) {
        self.held = true;
    }

    fn release(&mut self) {
        self.held = false;
    }

    fn is_held(&self) -> bool {
        self.held
    }
}

/// Holds a `systemd-inhibit` child process for as long as the lock is held
pub struct InhibitWakeLock {
    program: String,
    args: Vec<String>,
    child: Option<Child>,
}

impl InhibitWakeLock {
    pub fn new() -> Self {
        Self::with_command(
            "systemd-inhibit",
            [
                "--what=idle:sleep",
                "--who=somnus",
                "--why=Playback session in progress",
                "--mode=block",
                "sleep",
                "infinity",
            ],
        )
    }

    /// Use a different blocking command
    pub fn with_command<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            child: None,
        }
    }
}

impl Default for InhibitWakeLock {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeLock for InhibitWakeLock {
    fn acquire(&mut self) {
        if self.child.is_some() {
            return;
        }
        match Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => {
                log::debug!("Wake lock acquired ({} pid {})", self.program, child.id());
                self.child = Some(child);
            }
            Err(e) => log::warn!("Wake lock unavailable ({}): {}", self.program, e),
        }
    }

    fn release(&mut self) {
        if let Some(mut child) = self.child.take() {
            // Already exited is fine
            let _ = child.kill();
            let _ = child.wait();
            log::debug!("Wake lock released");
        }
    }

    fn is_held(&self) -> bool {
        self.child.is_some()
    }
}

impl Drop for InhibitWakeLock {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool_is_not_an_error() {
        let mut lock = InhibitWakeLock::with_command("/nonexistent/somnus-inhibit", ["x"]);
        lock.acquire();
        assert!(!lock.is_held());
        lock.release();
    }

    #[test]
    fn test_child_held_until_release() {
        let mut lock = InhibitWakeLock::with_command("sleep", ["30"]);
        lock.acquire();
        assert!(lock.is_held());
        lock.acquire();
        assert!(lock.is_held());
        lock.release();
        assert!(!lock.is_held());
        lock.release();
    }

    #[test]
    fn test_no_wake_lock_tracks_state() {
        let mut lock = NoWakeLock::default();
        lock.acquire();
        assert!(lock.is_held());
        lock.release();
        assert!(!lock.is_held());
    }
}
