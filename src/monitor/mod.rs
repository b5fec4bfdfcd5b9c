#[cfg(feature = "desktop")]
pub mod commands;
pub mod controller;
pub mod loop_worker;
pub mod state;

pub use controller::{
    CycleMode, CycleOutcome, ExamMonitor, MonitorConfig, MonitorError, NoopEmitter, StateEmitter,
};
pub use state::{AnalysisEvent, CyclePhase, MonitorSnapshot, MonitorStatus};
