//! Fakes shared by the unit tests.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use tokio::sync::Semaphore;

use crate::analysis::{AnalysisInput, AnalysisOutput, Classifier, ClassifierError};
use crate::camera::{CameraDevice, CameraError, CameraRequest, CameraStream};
use crate::notify::{Notifier, Toast};

pub fn sample_input() -> AnalysisInput {
    AnalysisInput {
        video_data_uri: "data:image/jpeg;base64,/9j/4AAQ".into(),
        head_movement_description: "Looking around the room frequently.".into(),
        contextual_cues: "Candidate is alone in a quiet room.".into(),
    }
}

/// Polls `check` until it returns true; panics after five seconds.
pub async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check().await {
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within 5s");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

enum Behavior {
    Respond,
    Fail(String),
    Hang,
}

pub struct FakeClassifier {
    behavior: Behavior,
    is_suspicious: bool,
    reason: Mutex<String>,
    gate: Option<Semaphore>,
    last_input: Mutex<Option<AnalysisInput>>,
    calls: AtomicUsize,
    completed: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeClassifier {
    fn with(behavior: Behavior, is_suspicious: bool, reason: &str) -> Self {
        Self {
            behavior,
            is_suspicious,
            reason: Mutex::new(reason.to_string()),
            gate: None,
            last_input: Mutex::new(None),
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn suspicious(reason: &str) -> Self {
        Self::with(Behavior::Respond, true, reason)
    }

    pub fn clean(reason: &str) -> Self {
        Self::with(Behavior::Respond, false, reason)
    }

    pub fn failing(message: &str) -> Self {
        Self::with(Behavior::Fail(message.to_string()), false, "")
    }

    pub fn hanging() -> Self {
        Self::with(Behavior::Hang, false, "")
    }

    /// Each call waits for a permit handed out by [`FakeClassifier::release`].
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn set_reason(&self, reason: &str) {
        *self.reason.lock().unwrap() = reason.to_string();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn last_input(&self) -> Option<AnalysisInput> {
        self.last_input.lock().unwrap().clone()
    }
}

#[async_trait]
impl Classifier for FakeClassifier {
    async fn classify(&self, input: &AnalysisInput) -> Result<AnalysisOutput, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        *self.last_input.lock().unwrap() = Some(input.clone());
        let reason = self.reason.lock().unwrap().clone();

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        let outcome = match &self.behavior {
            Behavior::Respond => Ok(AnalysisOutput {
                is_suspicious: self.is_suspicious,
                reason,
            }),
            Behavior::Fail(message) => Err(ClassifierError::Flow(message.clone())),
            Behavior::Hang => std::future::pending().await,
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Shared view of a [`FakeCamera`] that stays with the test after the
/// camera is handed to the monitor.
#[derive(Clone)]
pub struct CameraProbe {
    allowed: Arc<AtomicBool>,
    live: Arc<AtomicUsize>,
    suspended: Arc<AtomicBool>,
    broken: Arc<AtomicBool>,
}

impl CameraProbe {
    pub fn allow(&self) {
        self.allowed.store(true, Ordering::SeqCst);
    }

    pub fn live_streams(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Open streams report themselves inactive while suspended.
    pub fn set_suspended(&self, suspended: bool) {
        self.suspended.store(suspended, Ordering::SeqCst);
    }

    /// Open streams fail every frame read while broken.
    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }
}

pub struct FakeCamera {
    frame: RgbImage,
    open_delay: Duration,
    allowed: Arc<AtomicBool>,
    live: Arc<AtomicUsize>,
    suspended: Arc<AtomicBool>,
    broken: Arc<AtomicBool>,
}

impl FakeCamera {
    pub fn working() -> Self {
        Self {
            frame: RgbImage::from_pixel(32, 24, Rgb([90, 120, 150])),
            open_delay: Duration::ZERO,
            allowed: Arc::new(AtomicBool::new(true)),
            live: Arc::new(AtomicUsize::new(0)),
            suspended: Arc::new(AtomicBool::new(false)),
            broken: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn denied() -> Self {
        let camera = Self::working();
        camera.allowed.store(false, Ordering::SeqCst);
        camera
    }

    /// Opens fine but every frame is empty.
    pub fn blank() -> Self {
        Self {
            frame: RgbImage::new(0, 0),
            ..Self::working()
        }
    }

    /// Takes `delay` to hand out a stream.
    pub fn slow(delay: Duration) -> Self {
        Self {
            open_delay: delay,
            ..Self::working()
        }
    }

    pub fn probe(&self) -> CameraProbe {
        CameraProbe {
            allowed: self.allowed.clone(),
            live: self.live.clone(),
            suspended: self.suspended.clone(),
            broken: self.broken.clone(),
        }
    }
}

#[async_trait]
impl CameraDevice for FakeCamera {
    async fn open(&self, _request: CameraRequest) -> Result<Box<dyn CameraStream>, CameraError> {
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        if !self.allowed.load(Ordering::SeqCst) {
            return Err(CameraError::PermissionDenied);
        }
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            frame: self.frame.clone(),
            active: true,
            live: Some(self.live.clone()),
            suspended: self.suspended.clone(),
            broken: self.broken.clone(),
        }))
    }
}

pub struct FakeStream {
    frame: RgbImage,
    active: bool,
    live: Option<Arc<AtomicUsize>>,
    suspended: Arc<AtomicBool>,
    broken: Arc<AtomicBool>,
}

impl FakeStream {
    pub fn new(frame: RgbImage) -> Self {
        Self {
            frame,
            active: true,
            live: None,
            suspended: Arc::new(AtomicBool::new(false)),
            broken: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl CameraStream for FakeStream {
    async fn frame(&mut self) -> Result<RgbImage, CameraError> {
        if !self.active {
            return Err(CameraError::Frame("stream released".into()));
        }
        if self.broken.load(Ordering::SeqCst) {
            return Err(CameraError::Frame("sensor fault".into()));
        }
        Ok(self.frame.clone())
    }

    fn is_active(&self) -> bool {
        self.active && !self.suspended.load(Ordering::SeqCst)
    }

    fn release(&mut self) {
        if self.active {
            self.active = false;
            if let Some(live) = &self.live {
                live.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.release();
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingNotifier {
    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, toast: Toast) {
        self.toasts.lock().unwrap().push(toast);
    }
}
