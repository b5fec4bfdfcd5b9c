use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

pub const FLOW_URL_ENV: &str = "VIGILANT_FLOW_URL";
pub const FLOW_API_KEY_ENV: &str = "VIGILANT_FLOW_API_KEY";

const DEFAULT_HEAD_MOVEMENT: &str = "Looking around the room frequently.";
const DEFAULT_CONTEXTUAL_CUES: &str =
    "Candidate is alone in a quiet room, but seems to be looking at something off-screen.";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifierSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorSettings {
    pub interval_secs: u64,
    pub analysis_timeout_secs: u64,
    pub jpeg_quality: u8,
    pub default_head_movement: String,
    pub default_contextual_cues: String,
    pub classifier: ClassifierSettings,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            analysis_timeout_secs: 30,
            jpeg_quality: 80,
            default_head_movement: DEFAULT_HEAD_MOVEMENT.into(),
            default_contextual_cues: DEFAULT_CONTEXTUAL_CUES.into(),
            classifier: ClassifierSettings::default(),
        }
    }
}

impl MonitorSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.analysis_timeout_secs.max(1))
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(anyhow!("interval_secs must be greater than zero"));
        }
        if self.analysis_timeout_secs == 0 {
            return Err(anyhow!("analysis_timeout_secs must be greater than zero"));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(anyhow!("jpeg_quality must be between 1 and 100"));
        }
        Ok(())
    }

    /// Copy safe to hand to the page: the API key never leaves the backend.
    pub fn without_secret(mut self) -> Self {
        self.classifier.api_key = None;
        self
    }

    /// Environment variables win over the file for the classifier endpoint.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(FLOW_URL_ENV).filter(|url| !url.trim().is_empty()) {
            self.classifier.endpoint = Some(url);
        }
        if let Some(key) = lookup(FLOW_API_KEY_ENV).filter(|key| !key.trim().is_empty()) {
            self.classifier.api_key = Some(key);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct UserSettings {
    monitor: MonitorSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring unreadable settings at {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Effective settings: the file with environment overrides applied.
    /// Never persist or return this to the page.
    pub fn monitor(&self) -> MonitorSettings {
        self.monitor_with(|name| std::env::var(name).ok())
    }

    fn monitor_with(&self, lookup: impl Fn(&str) -> Option<String>) -> MonitorSettings {
        let mut settings = self.stored_monitor();
        settings.apply_overrides(lookup);
        settings
    }

    /// Settings exactly as they are on disk.
    pub fn stored_monitor(&self) -> MonitorSettings {
        self.data
            .read()
            .map(|guard| guard.monitor.clone())
            .unwrap_or_default()
    }

    /// Persists `settings`. A missing API key keeps the stored one; an
    /// empty key clears it.
    pub fn update_monitor(&self, mut settings: MonitorSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow!("settings lock poisoned"))?;
        if settings.classifier.api_key.is_none() {
            settings.classifier.api_key = guard.monitor.classifier.api_key.clone();
        }
        guard.monitor = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
