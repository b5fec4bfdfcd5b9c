use tauri::{AppHandle, Emitter};

use super::{LogNotifier, Notifier, Toast};
use crate::monitor::{MonitorSnapshot, StateEmitter};

pub const TOAST_EVENT: &str = "toast";
pub const STATE_CHANGED_EVENT: &str = "monitor-state-changed";

/// Forwards toasts and monitor snapshots to the webview.
pub struct TauriNotifier {
    app_handle: AppHandle,
}

impl TauriNotifier {
    pub fn new(app_handle: AppHandle) -> Self {
        Self { app_handle }
    }
}

impl Notifier for TauriNotifier {
    fn notify(&self, toast: Toast) {
        LogNotifier.notify(toast.clone());
        if let Err(err) = self.app_handle.emit(TOAST_EVENT, &toast) {
            log::error!("failed to emit toast '{}': {err}", toast.title);
        }
    }
}

impl StateEmitter for TauriNotifier {
    fn emit(&self, snapshot: &MonitorSnapshot) {
        let _ = self.app_handle.emit(STATE_CHANGED_EVENT, snapshot);
    }
}
