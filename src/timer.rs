use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use log::{debug, error, trace};

use crate::event::{Event, EventSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickSource {
    AutoSend,
    AutoSave,
}

/// Emits `Event::Tick` at a fixed interval on its own thread.
///
/// At most one tick is outstanding: until the consumer calls
/// [`PeriodicTimer::acknowledge`], later ticks are dropped instead of queued.
/// The gate survives restarts, so a tick queued by a previous run still
/// holds it until acknowledged.
#[derive(Default)]
pub struct PeriodicTimer {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    in_flight: Arc<AtomicBool>,
}

impl PeriodicTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts ticking, restarting with the new interval if already running.
    pub fn start(&mut self, interval: Duration, source: TickSource, events: EventSender) {
        self.stop();

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let in_flight = Arc::clone(&self.in_flight);

        debug!("{:?} timer started, every {:?}", source, interval);
        self.handle = Some(thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if in_flight.swap(true, Ordering::SeqCst) {
                        trace!("{:?} tick dropped, previous one unhandled", source);
                        continue;
                    }
                    if events.send(Event::Tick(source)).is_err() {
                        break;
                    }
                }
                // dropped sender is the stop signal
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }));
        self.stop_tx = Some(stop_tx);
    }

    /// Stops the loop and joins it. Safe to call when never started.
    pub fn stop(&mut self) {
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("timer thread panicked");
            }
            debug!("timer stopped");
        }
    }

    pub fn acknowledge(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
