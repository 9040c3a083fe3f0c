//! Deferred deallocation for audio buffers
//!
//! Decoded tracks and loop windows are shared with the audio thread as
//! `basedrop::Shared<T>`. When the audio thread drops the last reference
//! (a voice is detached, a window replaced) the free is queued and done on
//! the `audio-gc` thread instead of inside the output callback.
//!
//! ```ignore
//! let window = Shared::new(&gc_handle(), asset);
//! ```

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// Collection interval of the GC thread
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("audio-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it lives and dies on this thread
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }
            log::info!("Audio GC thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("Failed to spawn audio GC thread");

    rx.recv().expect("Audio GC thread exited before handing out its handle")
}

/// Handle for allocating `Shared<T>` values collected on the GC thread
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}
