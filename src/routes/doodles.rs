use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;

use crate::errors::ApiError;
use crate::models::doodle::{self, MIME_TYPE};
use crate::store::BlobStore;

#[derive(Deserialize)]
pub struct SubmitReq {
    #[serde(rename = "imageData")]
    pub image_data: Option<String>,
}

pub async fn submit(
    store: web::Data<dyn BlobStore>,
    body: web::Json<SubmitReq>,
) -> Result<HttpResponse, ApiError> {
    let image_data = body
        .into_inner()
        .image_data
        .filter(|d| !d.is_empty())
        .ok_or_else(|| {
            log::error!("submit without imageData");
            ApiError::MissingPayload
        })?;

    let bytes = doodle::decode_image_data(&image_data);
    let name = doodle::generate_name(Utc::now());
    store
        .put(bytes, &name)
        .await
        .map_err(|e| ApiError::from_store(e, ApiError::SaveFailed))?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("Saved successfully!"))
}

pub async fn delete(
    store: web::Data<dyn BlobStore>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    store
        .delete(&id)
        .await
        .map_err(|e| ApiError::from_store(e, ApiError::DeleteFailed))?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("Deleted successfully!"))
}

// Gallery image source for Drive files that aren't shared publicly.
pub async fn image(
    store: web::Data<dyn BlobStore>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let bytes = store
        .fetch(&id)
        .await
        .map_err(|e| ApiError::from_store(e, ApiError::FetchFailed))?;
    Ok(HttpResponse::Ok().content_type(MIME_TYPE).body(bytes))
}
