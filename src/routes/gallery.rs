use actix_web::{web, HttpResponse};
use askama::Template;

use crate::auth::LoggedIn;
use crate::errors::ApiError;
use crate::gallery::GalleryView;
use crate::store::BlobStore;

pub async fn gallery(
    _user: LoggedIn,
    store: web::Data<dyn BlobStore>,
) -> Result<HttpResponse, ApiError> {
    log::debug!("handling gallery request");
    let doodles = store
        .list()
        .await
        .map_err(|e| ApiError::from_store(e, ApiError::ListFailed))?;

    let html = GalleryView::new(&doodles).render().map_err(|e| {
        log::error!("gallery render failed: {e}");
        ApiError::ListFailed
    })?;
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(html))
}
