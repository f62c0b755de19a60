pub mod config;
pub mod db;
pub mod doc_processor;
pub mod llm;
pub mod pipeline;
pub mod prompt;

#[cfg(feature = "desktop")]
mod commands;

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use config::ConfigStore;
    use db::Database;
    use llm::http::HttpGateway;
    use pipeline::Pipeline;
    use std::sync::Arc;
    use tauri::Manager;
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let app_dir = app.path().app_data_dir()?;
            let database = Arc::new(Database::new(&app_dir)?);
            let config = ConfigStore::new(database);
            let gateway_settings = config.gateway_settings()?;
            let gateway = HttpGateway::new(&gateway_settings)?;
            tracing::info!(base_url = gateway.base_url(), "prompt service configured");
            let pipeline = Pipeline::new(config, Arc::new(gateway))
                .with_call_timeout(gateway_settings.timeout);
            app.manage(pipeline);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::settings::get_settings,
            commands::settings::set_api_key,
            commands::settings::clear_api_key,
            commands::settings::set_model,
            commands::settings::set_generation_params,
            commands::settings::list_models,
            commands::pipeline::get_run,
            commands::pipeline::select_document,
            commands::pipeline::clear_document,
            commands::pipeline::update_prompt_spec,
            commands::pipeline::apply_dictation,
            commands::pipeline::apply_preset,
            commands::pipeline::start_analysis,
            commands::pipeline::generate_response,
            commands::pipeline::optimize_response,
            commands::pipeline::edit_buffer,
            commands::pipeline::apply_optimized_response,
            commands::pipeline::export_buffer,
            commands::pipeline::clear_all,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
