pub mod earnings;
pub mod event;
pub mod metrics;

pub use earnings::creator_earnings_handler;
pub use event::ad_event_handler;
pub use metrics::metrics_handler;

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use whistle_ads_domain::storage::StorageError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unknown campaign: {0}")]
    UnknownCampaign(String),
    #[error("creator not found")]
    NotFound,
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::UnknownCampaign(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            success: false,
            error: self.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

/// Payload extraction rejections use the same body shape as [`ApiError`].
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(json_error_handler)
}

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = HttpResponse::BadRequest().json(ErrorBody {
        success: false,
        error: err.to_string(),
    });
    InternalError::from_response(err, response).into()
}
