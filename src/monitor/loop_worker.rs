use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::controller::{CycleMode, CycleOutcome, ExamMonitor};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Handle to a running polling task. Dropping it does not stop the task;
/// call [`PollingSchedule::cancel`].
pub struct PollingSchedule {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

impl PollingSchedule {
    pub fn spawn(monitor: ExamMonitor, generation: u64, interval: Duration) -> Self {
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(polling_loop(
            monitor,
            generation,
            interval,
            cancel_token.clone(),
        ));

        Self {
            handle,
            cancel_token,
        }
    }

    /// Stops scheduling new cycles. A cycle already awaiting the classifier
    /// runs to completion and is discarded by the monitor.
    pub fn cancel(self) {
        self.cancel_token.cancel();
        drop(self.handle);
    }

    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

pub async fn polling_loop(
    monitor: ExamMonitor,
    generation: u64,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    // first tick completes immediately, giving the initial cycle on start
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("polling loop for session {} shutting down", generation);
                break;
            }
            _ = ticker.tick() => {
                match monitor.run_cycle(CycleMode::Polling { generation }).await {
                    CycleOutcome::Completed(result) => {
                        log::debug!("session {} cycle complete: {:?}", generation, result);
                    }
                    CycleOutcome::Busy => {
                        log_warn!("session {} tick skipped; previous analysis still running", generation);
                    }
                    CycleOutcome::Skipped => {
                        log::debug!("session {} tick skipped; no camera stream", generation);
                    }
                    CycleOutcome::CaptureFailed(message) => {
                        log_warn!("session {} capture failed: {}", generation, message);
                    }
                    CycleOutcome::Discarded => {
                        log_info!("session {} is over; polling loop exiting", generation);
                        break;
                    }
                }
            }
        }
    }
}
