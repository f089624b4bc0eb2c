use actix_web::{middleware, web, App, HttpMessage, HttpRequest, HttpResponse, HttpServer};
use serde::Serialize;
use tracing::info;

use crate::analytics;
use crate::config::ServerSettings;
use crate::data::{read_batch_ids, BatchFormat};
use crate::error::AppError;
use crate::model::{FeatureVector, ModelInfo};
use crate::report::batch_csv_string;
use crate::scoring::Scorer;

const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
const BATCH_FILE_NAME: &str = "batch_predictions.csv";

#[derive(Serialize)]
struct ModelInfoResponse {
    model: ModelInfo,
    bands: String,
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().body("GPA Predictor API is running!")
}

async fn get_model_info(scorer: web::Data<Scorer>) -> HttpResponse {
    HttpResponse::Ok().json(ModelInfoResponse {
        model: scorer.model().info(),
        bands: scorer.bands().name().to_string(),
    })
}

async fn get_bands(scorer: web::Data<Scorer>) -> HttpResponse {
    HttpResponse::Ok().json(scorer.bands())
}

async fn get_student(
    id: web::Path<String>,
    scorer: web::Data<Scorer>,
) -> Result<HttpResponse, AppError> {
    let assessment = scorer.lookup(id.trim())?;
    Ok(HttpResponse::Ok().json(assessment))
}

async fn predict(
    req: web::Json<FeatureVector>,
    scorer: web::Data<Scorer>,
) -> Result<HttpResponse, AppError> {
    let response = scorer.predict(req.into_inner())?;
    Ok(HttpResponse::Ok().json(response))
}

// CSV unless the Content-Type names a spreadsheet
fn upload_format(req: &HttpRequest) -> BatchFormat {
    BatchFormat::from_content_type(req.content_type())
}

// Uploads are scored sequentially on the blocking pool
async fn batch_predict(
    req: HttpRequest,
    body: web::Bytes,
    scorer: web::Data<Scorer>,
) -> actix_web::Result<HttpResponse> {
    let format = upload_format(&req);
    let report = web::block(move || {
        let ids = read_batch_ids(&body, format)?;
        info!(rows = ids.len(), "batch prediction requested");
        Ok::<_, AppError>(scorer.score_batch(&ids))
    })
    .await??;

    Ok(HttpResponse::Ok().json(report))
}

async fn batch_predict_csv(
    req: HttpRequest,
    body: web::Bytes,
    scorer: web::Data<Scorer>,
) -> actix_web::Result<HttpResponse> {
    let format = upload_format(&req);
    let csv = web::block(move || {
        let ids = read_batch_ids(&body, format)?;
        info!(rows = ids.len(), "batch CSV export requested");
        batch_csv_string(&scorer.score_batch(&ids).rows)
    })
    .await??;

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{BATCH_FILE_NAME}\""),
        ))
        .body(csv))
}

async fn get_analytics(scorer: web::Data<Scorer>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(analytics::analyze(&scorer)?))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_UPLOAD_BYTES))
        .route("/health", web::get().to(health_check))
        .route("/model/info", web::get().to(get_model_info))
        .route("/bands", web::get().to(get_bands))
        .route("/students/{id}", web::get().to(get_student))
        .route("/predict", web::post().to(predict))
        .route("/batch-predict", web::post().to(batch_predict))
        .route("/batch-predict/csv", web::post().to(batch_predict_csv))
        .route("/analytics", web::get().to(get_analytics));
}

pub async fn start_api(scorer: Scorer, settings: &ServerSettings) -> std::io::Result<()> {
    let scorer_data = web::Data::new(scorer);

    info!(bind = %settings.bind, port = settings.port, "starting GPA predictor API");
    HttpServer::new(move || {
        App::new()
            .app_data(scorer_data.clone())
            .wrap(middleware::Logger::default())
            .configure(configure)
    })
    .bind((settings.bind.as_str(), settings.port))?
    .run()
    .await
}
