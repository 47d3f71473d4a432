use std::time::{Duration, Instant};

use actix_web::http::header::ContentType;
use actix_web::{get, post, web, HttpRequest, HttpResponse, ResponseError};
use log::{error, info, warn};

use crate::error::AppError;
use crate::inference::{ModelSlot, Predictor};
use crate::models::{ApiResponse, PredictionRequest, PredictionResult};
use crate::page::{render, PageView};
use crate::rate_limit::RateLimiter;

/// Shared by every worker for the life of the server.
pub struct AppState {
    pub model: ModelSlot,
    pub limiter: RateLimiter,
    pub analysis_delay: Duration,
}

impl AppState {
    pub fn new(model: ModelSlot, limiter: RateLimiter, analysis_delay: Duration) -> Self {
        AppState { model, limiter, analysis_delay }
    }

    /// Requests without a peer address are not counted.
    fn allow(&self, request: &HttpRequest) -> bool {
        match request.peer_addr() {
            Some(addr) => {
                let client = addr.ip().to_string();
                let allowed = self.limiter.allow(&client);
                if !allowed {
                    warn!("Rate limit exceeded for {}", client);
                }
                allowed
            }
            None => true,
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(64 * 1024)
            .error_handler(|err, _req| AppError::InvalidInput(err.to_string()).into()),
    )
    .service(index)
    .service(analyze)
    .service(health)
    .service(model_info)
    .service(predict);
}

fn html(status: actix_web::http::StatusCode, body: String) -> HttpResponse {
    HttpResponse::build(status)
        .content_type(ContentType::html())
        .body(body)
}

fn failure(err: &AppError, started: Instant) -> HttpResponse {
    HttpResponse::build(err.status_code())
        .json(ApiResponse::<PredictionResult>::error(&err.to_string()).with_elapsed(started))
}

/// One inference call, off the async workers.
async fn run_prediction(
    predictor: Predictor,
    request: PredictionRequest,
) -> Result<PredictionResult, AppError> {
    match web::block(move || predictor.predict(&request)).await {
        Ok(result) => result,
        Err(e) => {
            error!("Blocking execution failed: {}", e);
            Err(AppError::Inference(e.to_string()))
        }
    }
}

#[get("/")]
async fn index(state: web::Data<AppState>) -> HttpResponse {
    let model_error = state.model.get().err().map(|e| e.to_string());
    let page = render(&PageView {
        model_error: model_error.as_deref(),
        ..Default::default()
    });
    html(actix_web::http::StatusCode::OK, page)
}

#[post("/analyze")]
async fn analyze(
    state: web::Data<AppState>,
    form: Result<web::Form<PredictionRequest>, actix_web::Error>,
    request: HttpRequest,
) -> HttpResponse {
    use actix_web::http::StatusCode;

    if !state.allow(&request) {
        let page = render(&PageView {
            request: form.map(|f| f.into_inner()).unwrap_or_default(),
            input_error: Some("Too many requests. Please wait a minute and try again."),
            ..Default::default()
        });
        return html(StatusCode::TOO_MANY_REQUESTS, page);
    }

    let predictor = match state.model.get() {
        Ok(predictor) => predictor.clone(),
        Err(e) => {
            let message = e.to_string();
            let page = render(&PageView {
                model_error: Some(&message),
                ..Default::default()
            });
            return html(StatusCode::SERVICE_UNAVAILABLE, page);
        }
    };

    let submitted = match form {
        Ok(form) => form.into_inner(),
        Err(e) => {
            warn!("Unparsable form submission: {}", e);
            let message = AppError::InvalidInput(e.to_string()).to_string();
            let page = render(&PageView {
                input_error: Some(&message),
                ..Default::default()
            });
            return html(StatusCode::BAD_REQUEST, page);
        }
    };

    info!("Analyze request received");
    let outcome = run_prediction(predictor, submitted).await;

    if !state.analysis_delay.is_zero() {
        actix_web::rt::time::sleep(state.analysis_delay).await;
    }

    match outcome {
        Ok(result) => {
            info!("Prediction: {:?} (label {})", result.outcome, result.label);
            let page = render(&PageView {
                request: submitted,
                result: Some(&result),
                ..Default::default()
            });
            html(StatusCode::OK, page)
        }
        Err(e) => {
            warn!("Prediction rejected: {}", e);
            let message = e.to_string();
            let page = render(&PageView {
                request: submitted,
                input_error: Some(&message),
                ..Default::default()
            });
            html(e.status_code(), page)
        }
    }
}

#[get("/api/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::success("Diabetes risk API is running"))
}

#[get("/api/model-info")]
async fn model_info(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let predictor = state.model.get()?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(predictor.model_info())))
}

#[post("/api/predict")]
async fn predict(
    state: web::Data<AppState>,
    body: web::Json<PredictionRequest>,
    request: HttpRequest,
) -> HttpResponse {
    let started = Instant::now();

    if !state.allow(&request) {
        return HttpResponse::TooManyRequests().json(
            ApiResponse::<PredictionResult>::error("rate limit exceeded").with_elapsed(started),
        );
    }

    let predictor = match state.model.get() {
        Ok(predictor) => predictor.clone(),
        Err(e) => return failure(&e, started),
    };

    match run_prediction(predictor, body.into_inner()).await {
        Ok(result) => {
            info!("Prediction: {:?} (label {})", result.outcome, result.label);
            HttpResponse::Ok().json(ApiResponse::success(result).with_elapsed(started))
        }
        Err(e) => {
            match &e {
                AppError::InvalidInput(_) => warn!("Validation failed: {}", e),
                _ => error!("Prediction failed: {}", e),
            }
            failure(&e, started)
        }
    }
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ApiResponse::<()>::error("endpoint not found"))
}
