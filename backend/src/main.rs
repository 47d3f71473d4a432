use actix_cors::Cors;
use actix_files::Files;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use log::{error, info};

use diabetes_risk::config::Settings;
use diabetes_risk::inference::ModelSlot;
use diabetes_risk::rate_limit::RateLimiter;
use diabetes_risk::routes::{self, AppState};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .format_module_path(false)
        .init();

    let settings = Settings::from_env().context("invalid configuration")?;

    info!("Starting diabetes risk predictor");

    // Load eagerly so a bad model file shows up in the startup log. A failure
    // does not stop the server; every page then shows the error instead.
    let model = ModelSlot::new(settings.model_path.clone());
    match model.get() {
        Ok(predictor) => info!("Model ready: {}", predictor.model_info().source),
        Err(e) => error!("Serving without a model: {}", e),
    }

    let state = web::Data::new(AppState::new(
        model,
        RateLimiter::per_minute(settings.rate_limit_per_minute),
        settings.analysis_delay,
    ));

    let bind_address = settings.bind_address();
    let static_dir = settings.static_dir.clone();
    let origins = settings.allowed_origins();

    info!("Listening on http://{}", bind_address);
    info!("Workers: {}", settings.workers);
    info!("Endpoints:");
    info!("   GET  /                - Prediction form");
    info!("   POST /analyze         - Form submission");
    info!("   GET  /api/health      - Health check");
    info!("   GET  /api/model-info  - Model information");
    info!("   POST /api/predict     - JSON prediction");

    HttpServer::new(move || {
        let cors = origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![actix_web::http::header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(DefaultHeaders::new().add(("X-Content-Type-Options", "nosniff")))
            .wrap(cors)
            .app_data(state.clone())
            .configure(routes::configure)
            .service(Files::new("/static", static_dir.clone()).prefer_utf8(true))
            .default_service(web::route().to(routes::not_found))
    })
    .workers(settings.workers)
    .bind(&bind_address)
    .with_context(|| format!("cannot bind {}", bind_address))?
    .run()
    .await
    .context("server error")
}
