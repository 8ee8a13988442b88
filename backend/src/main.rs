use std::env;
use std::path::PathBuf;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use backend::config::{AppConfig, DEFAULT_CONFIG_PATH};
use backend::provision::{ensure_models, load_ensemble};
use backend::routes::{UploadLimits, configure_routes};

fn startup_error(stage: &str, e: impl std::fmt::Display) -> std::io::Error {
    log::error!("{} failed: {}", stage, e);
    std::io::Error::other(format!("{} failed: {}", stage, e))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    }

    let config_path =
        PathBuf::from(env::var("APP_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()));
    let config = AppConfig::load(&config_path).map_err(|e| startup_error("Config loading", e))?;
    log::info!(
        "Loaded config from {} ({} model(s) in {})",
        config_path.display(),
        config.models.members.len(),
        config.models.dir.display()
    );

    let client = reqwest::Client::new();
    let artifacts = ensure_models(&config.models, &client)
        .await
        .map_err(|e| startup_error("Model provisioning", e))?;

    let ensemble = web::block(move || load_ensemble(&artifacts))
        .await
        .map_err(|e| startup_error("Model loading", e))?
        .map_err(|e| startup_error("Model loading", e))?;
    log::info!("{} ensemble model(s) loaded", ensemble.len());

    let ensemble = web::Data::new(ensemble);
    let limits = web::Data::new(UploadLimits {
        max_bytes: config.server.max_upload_bytes,
    });

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(ensemble.clone())
            .app_data(limits.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
