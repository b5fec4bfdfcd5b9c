pub mod analysis;
pub mod camera;
pub mod monitor;
pub mod notify;
pub mod settings;
pub mod utils;

#[cfg(test)]
mod test_support;

#[cfg(feature = "desktop")]
pub use desktop::run;

#[cfg(feature = "desktop")]
mod desktop {
    use std::sync::Arc;

    use log::warn;
    use tauri::{Manager, RunEvent};

    use crate::{
        analysis::FlowClassifier,
        camera::default_camera,
        monitor::{
            commands::{
                analyze_behavior, get_monitor_settings, get_monitor_state, mount_monitor,
                set_descriptions, set_monitor_settings, start_camera, start_monitoring,
                stop_camera, stop_monitoring, toggle_camera, unmount_monitor,
            },
            ExamMonitor,
        },
        notify::TauriNotifier,
        settings::SettingsStore,
        utils::logging::init_logging,
    };

    pub(crate) struct AppState {
        pub(crate) monitor: ExamMonitor,
        pub(crate) settings: SettingsStore,
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        init_logging();

        log::info!("Vigilant Exam starting up...");

        let app = tauri::Builder::default()
            .plugin(tauri_plugin_opener::init())
            .setup(|app| {
                let result = (|| -> anyhow::Result<()> {
                    let app_data_dir = app
                        .path()
                        .app_data_dir()
                        .map_err(|err| anyhow::anyhow!(err))?;
                    std::fs::create_dir_all(&app_data_dir)?;

                    let settings_store = SettingsStore::new(app_data_dir.join("settings.json"))?;
                    let settings = settings_store.monitor();
                    if settings.classifier.endpoint.is_none() {
                        warn!(
                            "No classifier endpoint configured; set {} or update settings",
                            crate::settings::FLOW_URL_ENV
                        );
                    }

                    let classifier = FlowClassifier::new(
                        settings.classifier.endpoint.clone(),
                        settings.classifier.api_key.clone(),
                        settings.analysis_timeout(),
                    )?;
                    let bridge = Arc::new(TauriNotifier::new(app.handle().clone()));

                    let monitor = ExamMonitor::new(
                        default_camera(),
                        Arc::new(classifier),
                        bridge.clone(),
                        &settings,
                    )
                    .with_emitter(bridge);

                    app.manage(AppState {
                        monitor,
                        settings: settings_store,
                    });

                    Ok(())
                })();

                result.map_err(|err| err.into())
            })
            .invoke_handler(tauri::generate_handler![
                get_monitor_state,
                mount_monitor,
                unmount_monitor,
                start_camera,
                stop_camera,
                toggle_camera,
                set_descriptions,
                start_monitoring,
                stop_monitoring,
                analyze_behavior,
                get_monitor_settings,
                set_monitor_settings,
            ])
            .build(tauri::generate_context!())
            .expect("error while building tauri application");

        app.run(|app_handle, event| {
            if let RunEvent::Exit = event {
                // release the camera even if the page never unmounted
                let monitor = app_handle.state::<AppState>().monitor.clone();
                tauri::async_runtime::block_on(monitor.unmount());
                log::info!("Vigilant Exam shut down");
            }
        });
    }
}

#[cfg(feature = "desktop")]
pub(crate) use desktop::AppState;
