//! Background purging of expired entries.
//!
//! The reaper stands in for finalization-time cleanup: nothing tells the map
//! the moment a key's last `Arc` is dropped, so a dedicated thread sweeps the
//! table on a fixed cadence. Two rules keep it safe next to live callers:
//! it holds only a `Weak` to the map's shared state, and it never blocks on
//! the map lock. A contended tick is simply deferred to the next one.

use std::hash::Hash;
use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};
use tracing::{debug, trace};

use crate::map::Shared;

pub(crate) struct ReaperHandle {
    shutdown: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

pub(crate) fn spawn<K, V, S>(
    shared: Weak<Shared<K, V, S>>,
    interval: Duration,
) -> std::io::Result<ReaperHandle>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + 'static,
    S: Send + Sync + 'static,
{
    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    let ticker = tick(interval);
    let thread = thread::Builder::new()
        .name("weakmap-reaper".into())
        .spawn(move || loop {
            select! {
                recv(shutdown_rx) -> _ => break,
                recv(ticker) -> _ => {
                    let shared = match shared.upgrade() {
                        Some(shared) => shared,
                        // Map dropped; nothing left to sweep.
                        None => break,
                    };
                    match shared.try_sweep() {
                        Some(0) => {}
                        Some(purged) => debug!(purged, "reaper purged expired entries"),
                        None => {
                            shared.counters.record_deferred_sweep();
                            trace!("map lock contended, deferring sweep to next tick");
                        }
                    }
                }
            }
        })?;
    Ok(ReaperHandle {
        shutdown: shutdown_tx,
        thread: Some(thread),
    })
}
