//! Background flush loop for the event queue.
//!
//! Runs [`EventInteractor::send_events`] on a fixed interval, on manual
//! flush requests, and once more (forced) on shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::interval;

use crate::error::{ErrorCode, FlagwireError, Result};
use crate::event::interactor::EventInteractor;

pub struct EventScheduler {
    interactor: Arc<EventInteractor>,
    flush_interval: Duration,
    shutdown_tx: Option<mpsc::Sender<()>>,
    flush_tx: Option<mpsc::Sender<()>>,
    is_running: Arc<AtomicBool>,
}

impl EventScheduler {
    pub fn new(interactor: Arc<EventInteractor>, flush_interval: Duration) -> Self {
        Self {
            interactor,
            flush_interval,
            shutdown_tx: None,
            flush_tx: None,
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn the background flush task. Idempotent while running.
    pub fn start(&mut self) {
        if self.is_running.load(Ordering::SeqCst) {
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (flush_tx, mut flush_rx) = mpsc::channel::<()>(10);
        self.shutdown_tx = Some(shutdown_tx);
        self.flush_tx = Some(flush_tx);
        self.is_running.store(true, Ordering::SeqCst);

        let interactor = Arc::clone(&self.interactor);
        let is_running = Arc::clone(&self.is_running);
        let flush_interval = self.flush_interval;

        tokio::spawn(async move {
            let mut ticker = interval(flush_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("Event scheduler shutting down");
                        if let Err(e) = interactor.send_events(true).await {
                            tracing::error!(error = %e, "Final event flush failed");
                        }
                        break;
                    }
                    request = flush_rx.recv() => {
                        // A closed channel means the scheduler was dropped.
                        if request.is_none() {
                            break;
                        }
                        if let Err(e) = interactor.send_events(true).await {
                            tracing::error!(error = %e, "Manual event flush failed");
                        }
                    }
                    _ = ticker.tick() => {
                        if !is_running.load(Ordering::SeqCst) {
                            break;
                        }
                        if let Err(e) = interactor.send_events(false).await {
                            tracing::error!(error = %e, "Scheduled event flush failed");
                        }
                    }
                }
            }

            is_running.store(false, Ordering::SeqCst);
        });
    }

    /// Request an immediate forced flush.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler is not running.
    pub async fn flush(&self) -> Result<()> {
        match &self.flush_tx {
            Some(tx) => tx.send(()).await.map_err(|_| {
                FlagwireError::new(ErrorCode::EventFlushFailed, "Flush channel closed")
            }),
            None => Err(FlagwireError::new(
                ErrorCode::EventFlushFailed,
                "Event scheduler is not running",
            )),
        }
    }

    /// Stop the scheduler after one final forced flush.
    pub async fn stop(&mut self) {
        self.is_running.store(false, Ordering::SeqCst);
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        self.flush_tx = None;
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }
}

impl Drop for EventScheduler {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::SeqCst);
    }
}
