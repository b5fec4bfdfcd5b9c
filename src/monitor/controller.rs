use std::{sync::Arc, time::Duration};

use log::debug;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    analysis::{analyze_behavior, AnalysisInput, AnalysisResult, Classifier},
    camera::{capture_frame, CameraDevice, CameraError, CameraRequest, CameraStream},
    notify::{Notifier, Toast},
    settings::MonitorSettings,
};

use super::loop_worker::PollingSchedule;
use super::state::{AnalysisEvent, CyclePhase, MonitorSnapshot, MonitorState, MonitorStatus};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("camera is not ready")]
    CameraNotReady,
    #[error("monitoring already active")]
    AlreadyMonitoring,
    #[error("an analysis is already in progress")]
    Busy,
    #[error("could not capture a frame: {0}")]
    Capture(String),
    #[error("superseded by a teardown before it completed")]
    Discarded,
    #[error(transparent)]
    Camera(#[from] CameraError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub interval: Duration,
    pub analysis_timeout: Duration,
    pub jpeg_quality: u8,
    pub camera: CameraRequest,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::from(&MonitorSettings::default())
    }
}

impl From<&MonitorSettings> for MonitorConfig {
    fn from(settings: &MonitorSettings) -> Self {
        Self {
            interval: settings.interval(),
            analysis_timeout: settings.analysis_timeout(),
            jpeg_quality: settings.jpeg_quality,
            camera: CameraRequest::default(),
        }
    }
}

/// Receives a fresh snapshot after every transition.
pub trait StateEmitter: Send + Sync {
    fn emit(&self, snapshot: &MonitorSnapshot);
}

pub struct NoopEmitter;

impl StateEmitter for NoopEmitter {
    fn emit(&self, _snapshot: &MonitorSnapshot) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleMode {
    /// Button press; result overwrites the last-result slot only.
    SingleShot,
    /// Timer tick belonging to the session with this generation.
    Polling { generation: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Completed(AnalysisResult),
    /// No live camera stream.
    Skipped,
    /// Another cycle still awaits the classifier.
    Busy,
    CaptureFailed(String),
    /// Session ended or restarted while the cycle was running.
    Discarded,
}

/// Owns the camera session, the polling schedule and the verdict log.
#[derive(Clone)]
pub struct ExamMonitor {
    state: Arc<Mutex<MonitorState>>,
    camera: Arc<Mutex<Option<Box<dyn CameraStream>>>>,
    device: Arc<dyn CameraDevice>,
    classifier: Arc<Mutex<Arc<dyn Classifier>>>,
    notifier: Arc<dyn Notifier>,
    emitter: Arc<dyn StateEmitter>,
    config: Arc<Mutex<MonitorConfig>>,
    schedule: Arc<Mutex<Option<PollingSchedule>>>,
}

impl ExamMonitor {
    pub fn new(
        device: Arc<dyn CameraDevice>,
        classifier: Arc<dyn Classifier>,
        notifier: Arc<dyn Notifier>,
        settings: &MonitorSettings,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(MonitorState::new(
                settings.default_head_movement.clone(),
                settings.default_contextual_cues.clone(),
            ))),
            camera: Arc::new(Mutex::new(None)),
            device,
            classifier: Arc::new(Mutex::new(classifier)),
            notifier,
            emitter: Arc::new(NoopEmitter),
            config: Arc::new(Mutex::new(MonitorConfig::from(settings))),
            schedule: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn StateEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = Arc::new(Mutex::new(config));
        self
    }

    pub async fn snapshot(&self) -> MonitorSnapshot {
        let interval_secs = self.config.lock().await.interval.as_secs();
        self.state.lock().await.snapshot(interval_secs)
    }

    /// Acquires the camera when the page appears.
    pub async fn mount(&self) -> Result<(), MonitorError> {
        log_info!("exam monitor mounted");
        self.start_camera().await
    }

    /// Unconditional teardown: cancels the schedule and releases the camera
    /// whatever the current state.
    pub async fn unmount(&self) {
        self.cancel_schedule().await;

        {
            let mut state = self.state.lock().await;
            state.invalidate_in_flight();
            state.status = MonitorStatus::CameraUninitialized;
        }

        self.release_camera().await;
        log_info!("exam monitor unmounted");
        self.emit_state().await;
    }

    pub async fn start_camera(&self) -> Result<(), MonitorError> {
        let generation = {
            let state = self.state.lock().await;
            if state.status.camera_on() {
                return Ok(());
            }
            state.generation
        };

        let request = self.config.lock().await.camera;
        let mut camera = self.camera.lock().await;
        if let Some(mut stale) = camera.take() {
            stale.release();
        }

        let opened = self.device.open(request).await;

        // a teardown while the device was opening wins over the open
        let superseded = {
            let mut state = self.state.lock().await;
            if state.generation != generation {
                true
            } else {
                match &opened {
                    Ok(_) => {
                        state.has_camera_permission = true;
                        state.status = MonitorStatus::CameraReady;
                    }
                    Err(err) => {
                        state.has_camera_permission = false;
                        state.status = MonitorStatus::CameraError {
                            message: err.to_string(),
                        };
                    }
                }
                false
            }
        };

        match opened {
            Ok(mut stream) if superseded => {
                stream.release();
                drop(camera);
                log_info!("camera opened after teardown; released");
                Err(MonitorError::Discarded)
            }
            Ok(stream) => {
                *camera = Some(stream);
                drop(camera);
                log_info!("camera acquired ({}x{})", request.width, request.height);
                self.emit_state().await;
                Ok(())
            }
            Err(err) => {
                drop(camera);
                log_error!("Error accessing camera: {err}");
                if superseded {
                    return Err(MonitorError::Camera(err));
                }

                self.notifier.notify(Toast::destructive(
                    "Camera Error",
                    "Could not access the camera. Please check permissions and try again.",
                ));
                self.emit_state().await;
                Err(MonitorError::Camera(err))
            }
        }
    }

    pub async fn stop_camera(&self) {
        self.cancel_schedule().await;

        {
            let mut state = self.state.lock().await;
            // also supersedes an open that is still pending
            state.invalidate_in_flight();
            if state.status.camera_on() {
                state.status = MonitorStatus::CameraOff;
            }
        }

        self.release_camera().await;
        self.emit_state().await;
    }

    /// Returns whether the camera is on afterwards.
    pub async fn toggle_camera(&self) -> Result<bool, MonitorError> {
        if self.state.lock().await.status.camera_on() {
            self.stop_camera().await;
            Ok(false)
        } else {
            self.start_camera().await?;
            Ok(true)
        }
    }

    pub async fn set_descriptions(&self, head_movement: String, contextual_cues: String) {
        {
            let mut state = self.state.lock().await;
            state.head_movement = head_movement;
            state.contextual_cues = contextual_cues;
        }
        self.emit_state().await;
    }

    pub async fn set_classifier(&self, classifier: Arc<dyn Classifier>) {
        log_info!("classifier switched to {}", classifier.name());
        *self.classifier.lock().await = classifier;
    }

    /// Quality and timeout apply from the next cycle. A new interval only
    /// applies from the next monitoring session.
    pub async fn set_config(&self, config: MonitorConfig) {
        *self.config.lock().await = config;
    }

    /// Clears the log, runs a cycle right away and then one per interval.
    pub async fn start_monitoring(&self) -> Result<(), MonitorError> {
        let generation = {
            let mut state = self.state.lock().await;
            match state.status {
                MonitorStatus::CameraReady => {}
                MonitorStatus::Monitoring { .. } => return Err(MonitorError::AlreadyMonitoring),
                _ => return Err(MonitorError::CameraNotReady),
            }
            state.begin_session()
        };

        let interval = self.config.lock().await.interval;
        {
            let mut schedule = self.schedule.lock().await;
            if let Some(previous) = schedule.take() {
                previous.cancel();
            }
            *schedule = Some(PollingSchedule::spawn(self.clone(), generation, interval));
        }

        log_info!(
            "monitoring session {} started (every {}ms)",
            generation,
            interval.as_millis()
        );
        self.emit_state().await;
        Ok(())
    }

    /// Cancels the schedule. A response still in flight is dropped on arrival.
    pub async fn stop_monitoring(&self) {
        self.cancel_schedule().await;

        {
            let mut state = self.state.lock().await;
            if !state.status.is_monitoring() {
                return;
            }
            state.invalidate_in_flight();
            state.status = MonitorStatus::CameraReady;
            log_info!(
                "monitoring stopped with {} events recorded",
                state.events.len()
            );
        }

        self.emit_state().await;
    }

    /// Manual single-shot analysis. Rejected while another cycle is running.
    pub async fn analyze_now(&self) -> Result<AnalysisResult, MonitorError> {
        match self.run_cycle(CycleMode::SingleShot).await {
            CycleOutcome::Completed(result) => Ok(result),
            CycleOutcome::Skipped => Err(MonitorError::CameraNotReady),
            CycleOutcome::Busy => Err(MonitorError::Busy),
            CycleOutcome::CaptureFailed(message) => Err(MonitorError::Capture(message)),
            CycleOutcome::Discarded => Err(MonitorError::Discarded),
        }
    }

    /// One capture, classify, record sequence.
    pub(crate) async fn run_cycle(&self, mode: CycleMode) -> CycleOutcome {
        let (generation, head_movement, contextual_cues) = {
            let mut state = self.state.lock().await;

            if let CycleMode::Polling { generation } = mode {
                if state.generation != generation || !state.status.is_monitoring() {
                    return CycleOutcome::Discarded;
                }
            }
            if !state.status.camera_on() {
                return CycleOutcome::Skipped;
            }
            if state.in_flight.is_some() {
                debug!("cycle skipped; previous analysis still outstanding");
                return CycleOutcome::Busy;
            }

            let generation = state.generation;
            state.in_flight = Some(generation);
            state.set_phase(CyclePhase::Analyzing);
            if mode == CycleMode::SingleShot {
                state.last_result = None;
            }
            (
                generation,
                state.head_movement.clone(),
                state.contextual_cues.clone(),
            )
        };
        self.emit_state().await;

        let config = self.config.lock().await.clone();

        let captured = {
            let mut camera = self.camera.lock().await;
            match camera.as_mut() {
                Some(stream) if stream.is_active() => {
                    Some(capture_frame(stream.as_mut(), config.jpeg_quality).await)
                }
                _ => None,
            }
        };

        let capture = match captured {
            Some(Ok(capture)) => capture,
            None => {
                self.finish_without_result(generation, false).await;
                return CycleOutcome::Skipped;
            }
            Some(Err(err)) => {
                log_warn!("frame capture failed: {err}");
                let first_in_session = self.finish_without_result(generation, true).await;
                if mode == CycleMode::SingleShot || first_in_session {
                    self.notifier.notify(Toast::destructive(
                        "Error",
                        "Could not capture a frame from the camera.",
                    ));
                }
                return CycleOutcome::CaptureFailed(err.to_string());
            }
        };

        let captured_at = capture.captured_at;
        let input = AnalysisInput {
            video_data_uri: capture.data_uri,
            head_movement_description: head_movement,
            contextual_cues,
        };

        let classifier = self.classifier.lock().await.clone();
        let result = analyze_behavior(classifier.as_ref(), input, config.analysis_timeout).await;

        let accepted = {
            let mut state = self.state.lock().await;
            state.in_flight = None;

            if state.generation != generation {
                false
            } else {
                state.set_phase(CyclePhase::Waiting);
                state.last_result = Some(result.clone());
                if let (CycleMode::Polling { .. }, AnalysisResult::Success(output)) =
                    (mode, &result)
                {
                    state.record(AnalysisEvent::new(output, captured_at));
                }
                true
            }
        };
        self.emit_state().await;

        if !accepted {
            log_info!("discarding analysis result from ended session {generation}");
            return CycleOutcome::Discarded;
        }

        self.announce(mode, &result);
        CycleOutcome::Completed(result)
    }

    fn announce(&self, mode: CycleMode, result: &AnalysisResult) {
        match result {
            AnalysisResult::Failure(message) => {
                self.notifier
                    .notify(Toast::destructive("Analysis Failed", message.clone()));
            }
            AnalysisResult::Success(output) if output.is_suspicious => {
                log_warn!("suspicious behavior flagged: {}", output.reason);
                self.notifier.notify(Toast::destructive(
                    "Suspicious Behavior Detected!",
                    output.reason.clone(),
                ));
            }
            AnalysisResult::Success(_) => {
                if mode == CycleMode::SingleShot {
                    self.notifier.notify(Toast::info(
                        "Analysis Complete",
                        "No suspicious behavior was detected.",
                    ));
                }
            }
        }
    }

    /// Clears the in-flight marker after a cycle that produced no verdict.
    /// Returns true when `capture_failed` is the first capture failure of
    /// the session.
    async fn finish_without_result(&self, generation: u64, capture_failed: bool) -> bool {
        let first = {
            let mut state = self.state.lock().await;
            state.in_flight = None;
            if state.generation != generation {
                false
            } else {
                state.set_phase(CyclePhase::Waiting);
                if capture_failed {
                    let first = !state.capture_error_reported;
                    state.capture_error_reported = true;
                    first
                } else {
                    false
                }
            }
        };
        self.emit_state().await;
        first
    }

    async fn cancel_schedule(&self) {
        if let Some(schedule) = self.schedule.lock().await.take() {
            schedule.cancel();
        }
    }

    async fn release_camera(&self) {
        if let Some(mut stream) = self.camera.lock().await.take() {
            stream.release();
            log_info!("camera released");
        }
    }

    async fn emit_state(&self) {
        let snapshot = self.snapshot().await;
        self.emitter.emit(&snapshot);
    }
}
