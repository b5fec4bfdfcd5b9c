#[cfg(feature = "desktop")]
mod tauri_notifier;

#[cfg(feature = "desktop")]
pub use tauri_notifier::TauriNotifier;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ToastVariant {
    Default,
    Destructive,
}

/// Transient user-facing notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub variant: ToastVariant,
    pub title: String,
    pub description: String,
}

impl Toast {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            variant: ToastVariant::Default,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            variant: ToastVariant::Destructive,
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Channel for toasts; injected into the monitor.
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Writes toasts to the log. `TauriNotifier` mirrors every toast through it.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, toast: Toast) {
        match toast.variant {
            ToastVariant::Default => log::info!("[toast] {}: {}", toast.title, toast.description),
            ToastVariant::Destructive => {
                log::warn!("[toast] {}: {}", toast.title, toast.description)
            }
        }
    }
}
