//! In-process scan queue.
//!
//! One scan at a time; a submission while a scan runs is rejected so the
//! UI can tell the user instead of silently piling work up. Events fan
//! out over a broadcast channel to every socket subscriber.

use std::sync::Mutex;
use std::time::Duration;

use cart_shared::scan::{EVENT_SCAN_DONE_KO, ScanRequest, SocketMessage};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::scanner::ScanError;
use crate::scanner::scan::{ScanContext, run_scan};

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct ScanQueue {
    ctx: ScanContext,
    events: broadcast::Sender<SocketMessage>,
    current: Mutex<Option<JoinHandle<()>>>,
}

impl ScanQueue {
    pub fn new(ctx: ScanContext) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            ctx,
            events,
            current: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SocketMessage> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        let current = self.current.lock().expect("scan queue lock poisoned");
        current.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Starts a scan in the background. Errors with
    /// [`ScanError::AlreadyRunning`] while one is in flight.
    pub fn submit(&self, request: ScanRequest) -> Result<(), ScanError> {
        let mut current = self.current.lock().expect("scan queue lock poisoned");
        if current.as_ref().map(|h| !h.is_finished()).unwrap_or(false) {
            return Err(ScanError::AlreadyRunning);
        }

        info!("Scanning ({})", request.scan_type.as_str());
        let ctx = self.ctx.clone();
        let events = self.events.clone();
        let timeout = Duration::from_secs(ctx.config.scan_timeout_secs);

        *current = Some(tokio::spawn(async move {
            if tokio::time::timeout(timeout, run_scan(&ctx, &request, &events))
                .await
                .is_err()
            {
                warn!("Scan timed out after {:?}", timeout);
                let _ = events.send(SocketMessage::new(EVENT_SCAN_DONE_KO, "Scan timed out"));
            }
        }));
        Ok(())
    }

    /// Cancels the running scan, if any. The job is dropped at its next
    /// await point, same as the old worker queue killing the job.
    pub fn stop(&self) {
        let mut current = self.current.lock().expect("scan queue lock poisoned");
        if let Some(handle) = current.take() {
            if !handle.is_finished() {
                info!("Stopping scan");
                handle.abort();
                let _ = self
                    .events
                    .send(SocketMessage::new(EVENT_SCAN_DONE_KO, "manually stopped"));
            }
        }
    }
}
