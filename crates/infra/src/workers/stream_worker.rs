use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use gridcast_core::Horizon;
use gridcast_events::{EventEnvelope, GridEvent, StreamCursor, Subscription};

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Consumer of grid stream envelopes, driven by [`StreamWorker`].
pub trait StreamHandler: Send + 'static {
    type Error: core::fmt::Debug;

    fn handle(&mut self, envelope: EventEnvelope<GridEvent>) -> Result<(), Self::Error>;

    /// Called when no message arrived within one tick.
    fn idle(&mut self) {}
}

/// Generic stream worker loop.
///
/// - Consumes a subscription on its own thread
/// - Skips redelivered envelopes (per-subscription cursor)
/// - Optional horizon filtering for per-horizon workers
/// - Supports graceful shutdown
#[derive(Debug)]
pub struct StreamWorker;

impl StreamWorker {
    /// Spawn a worker thread for `subscription`. Subscribe *before* reading any
    /// state the handler was seeded from, so nothing published in between is lost.
    pub fn spawn<H>(
        name: impl Into<String>,
        subscription: Subscription<EventEnvelope<GridEvent>>,
        horizon: Option<Horizon>,
        handler: H,
    ) -> io::Result<WorkerHandle>
    where
        H: StreamHandler,
    {
        let name = name.into();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread_name = name.clone();
        let join = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(&thread_name, subscription, shutdown_rx, horizon, handler))?;

        Ok(WorkerHandle {
            name,
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop<H>(
    name: &str,
    sub: Subscription<EventEnvelope<GridEvent>>,
    shutdown_rx: mpsc::Receiver<()>,
    horizon: Option<Horizon>,
    mut handler: H,
) where
    H: StreamHandler,
{
    let tick = Duration::from_millis(250);
    let mut cursor = StreamCursor::new();

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(envelope) => {
                if horizon.is_some_and(|h| envelope.horizon() != h) {
                    continue;
                }
                if cursor.advance(envelope.sequence_number()).is_err() {
                    debug!(worker = name, sequence = envelope.sequence_number(), "duplicate envelope skipped");
                    continue;
                }
                if let Err(err) = handler.handle(envelope) {
                    warn!(worker = name, error = ?err, "stream worker handler failed");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => handler.idle(),
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}
