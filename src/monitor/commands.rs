use std::sync::Arc;

use tauri::State;

use crate::{
    analysis::{AnalysisResult, FlowClassifier},
    monitor::{ExamMonitor, MonitorConfig, MonitorSnapshot},
    settings::MonitorSettings,
};

use crate::AppState;

fn monitor_from_state(state: &State<'_, AppState>) -> ExamMonitor {
    state.monitor.clone()
}

#[tauri::command]
pub async fn get_monitor_state(state: State<'_, AppState>) -> Result<MonitorSnapshot, String> {
    let monitor = monitor_from_state(&state);
    Ok(monitor.snapshot().await)
}

/// Called by the page when it appears; acquires the camera.
#[tauri::command]
pub async fn mount_monitor(state: State<'_, AppState>) -> Result<MonitorSnapshot, String> {
    let monitor = monitor_from_state(&state);
    // a denied camera is a state, not a command failure
    let _ = monitor.mount().await;
    Ok(monitor.snapshot().await)
}

#[tauri::command]
pub async fn unmount_monitor(state: State<'_, AppState>) -> Result<(), String> {
    let monitor = monitor_from_state(&state);
    monitor.unmount().await;
    Ok(())
}

#[tauri::command]
pub async fn start_camera(state: State<'_, AppState>) -> Result<MonitorSnapshot, String> {
    let monitor = monitor_from_state(&state);
    monitor.start_camera().await.map_err(|e| e.to_string())?;
    Ok(monitor.snapshot().await)
}

#[tauri::command]
pub async fn stop_camera(state: State<'_, AppState>) -> Result<MonitorSnapshot, String> {
    let monitor = monitor_from_state(&state);
    monitor.stop_camera().await;
    Ok(monitor.snapshot().await)
}

#[tauri::command]
pub async fn toggle_camera(state: State<'_, AppState>) -> Result<bool, String> {
    let monitor = monitor_from_state(&state);
    monitor.toggle_camera().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn set_descriptions(
    state: State<'_, AppState>,
    head_movement: String,
    contextual_cues: String,
) -> Result<(), String> {
    let monitor = monitor_from_state(&state);
    monitor.set_descriptions(head_movement, contextual_cues).await;
    Ok(())
}

#[tauri::command]
pub async fn start_monitoring(state: State<'_, AppState>) -> Result<MonitorSnapshot, String> {
    let monitor = monitor_from_state(&state);
    monitor.start_monitoring().await.map_err(|e| e.to_string())?;
    Ok(monitor.snapshot().await)
}

#[tauri::command]
pub async fn stop_monitoring(state: State<'_, AppState>) -> Result<MonitorSnapshot, String> {
    let monitor = monitor_from_state(&state);
    monitor.stop_monitoring().await;
    Ok(monitor.snapshot().await)
}

/// Single-shot "Analyze Behavior" button.
#[tauri::command]
pub async fn analyze_behavior(state: State<'_, AppState>) -> Result<AnalysisResult, String> {
    let monitor = monitor_from_state(&state);
    monitor.analyze_now().await.map_err(|e| e.to_string())
}

/// Stored settings without the API key; environment overrides stay backend-side.
#[tauri::command]
pub fn get_monitor_settings(state: State<'_, AppState>) -> Result<MonitorSettings, String> {
    Ok(state.settings.stored_monitor().without_secret())
}

#[tauri::command]
pub async fn set_monitor_settings(
    state: State<'_, AppState>,
    settings: MonitorSettings,
) -> Result<(), String> {
    state
        .settings
        .update_monitor(settings)
        .map_err(|e| e.to_string())?;

    // re-read so environment overrides still apply
    let effective = state.settings.monitor();
    let classifier = FlowClassifier::new(
        effective.classifier.endpoint.clone(),
        effective.classifier.api_key.clone(),
        effective.analysis_timeout(),
    )
    .map_err(|e| e.to_string())?;

    let monitor = monitor_from_state(&state);
    monitor.set_classifier(Arc::new(classifier)).await;
    monitor.set_config(MonitorConfig::from(&effective)).await;
    Ok(())
}
