use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, web};
use futures::TryStreamExt;
use log::{error, info};
use shared::{ErrorResponse, HealthResponse, PredictionResponse, format_confidence};
use uuid::Uuid;

use crate::inference::{Ensemble, EnsemblePrediction, InferenceError, PreprocessError, preprocess};

/// Multipart field the image must be uploaded under.
pub const FILE_FIELD: &str = "file";

/// Settings the upload handler needs at request time.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_bytes: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No se encontró la parte del archivo")]
    MissingFile,
    #[error("No se seleccionó ningún archivo")]
    EmptyFilename,
    #[error("El archivo supera el tamaño máximo de {0} bytes")]
    TooLarge(usize),
    #[error("Error durante el procesamiento: {0}")]
    Processing(String),
}

impl From<PreprocessError> for ApiError {
    fn from(err: PreprocessError) -> Self {
        ApiError::Processing(err.to_string())
    }
}

impl From<InferenceError> for ApiError {
    fn from(err: InferenceError) -> Self {
        ApiError::Processing(err.to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingFile | ApiError::EmptyFilename => StatusCode::BAD_REQUEST,
            ApiError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/predict").route(web::post().to(handle_predict)))
        .service(web::resource("/health").route(web::get().to(health)));
}

/// Reads the `file` part of the form, rejecting forms without a named upload.
async fn read_upload(mut payload: Multipart, max_bytes: usize) -> Result<Vec<u8>, ApiError> {
    loop {
        let mut field = match payload.try_next().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(ApiError::MissingFile),
            Err(e) => {
                info!("Rejected malformed multipart body: {}", e);
                return Err(ApiError::MissingFile);
            }
        };

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_owned);
        let is_file_part = field.name() == Some(FILE_FIELD) && filename.is_some();

        if !is_file_part {
            // Drain so the next part can be read.
            while let Ok(Some(_)) = field.try_next().await {}
            continue;
        }

        if filename.as_deref().is_some_and(str::is_empty) {
            return Err(ApiError::EmptyFilename);
        }

        let mut image_data = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| ApiError::Processing(e.to_string()))?
        {
            if image_data.len() + chunk.len() > max_bytes {
                return Err(ApiError::TooLarge(max_bytes));
            }
            image_data.extend_from_slice(&chunk);
        }
        return Ok(image_data);
    }
}

async fn handle_predict(
    ensemble: web::Data<Ensemble>,
    limits: web::Data<UploadLimits>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let image_data = read_upload(payload, limits.max_bytes).await?;
    let request_id = Uuid::new_v4();

    let ensemble = ensemble.into_inner();
    let outcome = web::block(move || -> Result<EnsemblePrediction, ApiError> {
        let tensor = preprocess(&image_data)?;
        Ok(ensemble.predict(&tensor)?)
    })
    .await
    .map_err(|e| ApiError::Processing(e.to_string()))
    .and_then(|result| result);

    match outcome {
        Ok(result) => {
            info!(
                "Prediction {}: {} ({:.4}) from {} model(s)",
                request_id,
                result.prediction.label,
                result.prediction.confidence,
                result.contributors
            );
            Ok(HttpResponse::Ok().json(PredictionResponse {
                prediction: result.prediction.label.to_string(),
                confidence: format_confidence(result.prediction.confidence),
                failed_models: result.failed,
            }))
        }
        Err(e) => {
            error!("Prediction {} failed: {}", request_id, e);
            Err(e)
        }
    }
}

async fn health(ensemble: web::Data<Ensemble>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        models: ensemble.member_names(),
    })
}
