pub mod auth;
pub mod doodles;
pub mod gallery;
pub mod health;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::error::JsonPayloadError;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpRequest};

use crate::auth::SessionStore;
use crate::config::Config;
use crate::credentials::GoogleCredentials;
use crate::errors::ApiError;
use crate::store::BlobStore;

/// Everything the handlers pull out of app data.
#[derive(Clone)]
pub struct AppState {
    pub cfg: web::Data<Config>,
    pub store: web::Data<dyn BlobStore>,
    pub credentials: web::Data<GoogleCredentials>,
    pub sessions: web::Data<SessionStore>,
}

// Oversized bodies keep the framework's 413; anything else unreadable counts as no payload.
fn json_error(e: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    match e {
        JsonPayloadError::OverflowKnownLength { .. } | JsonPayloadError::Overflow { .. } => e.into(),
        other => {
            log::error!("unreadable submit body: {other}");
            ApiError::MissingPayload.into()
        }
    }
}

pub fn build_app(
    state: AppState,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let json_cfg = web::JsonConfig::default()
        .limit(state.cfg.max_body_size)
        .content_type_required(false)
        .error_handler(json_error);
    let static_dir = state
        .cfg
        .backend
        .serves_local_files()
        .then(|| state.cfg.data_dir.clone());

    App::new()
        .wrap(Logger::default())
        .wrap(Cors::permissive().max_age(3600))
        .app_data(json_cfg)
        .app_data(state.cfg)
        .app_data(state.store)
        .app_data(state.credentials)
        .app_data(state.sessions)
        .configure(|app| configure(app, static_dir))
}

fn configure(app: &mut web::ServiceConfig, static_dir: Option<String>) {
    app.route("/", web::get().to(gallery::gallery))
        .route("/gallery", web::get().to(gallery::gallery))
        .route("/submit", web::post().to(doodles::submit))
        .route("/delete/{id}", web::delete().to(doodles::delete))
        .route("/image/{id}", web::get().to(doodles::image))
        .route("/test", web::get().to(health::alive))
        .route("/auth/google", web::get().to(auth::google_login))
        .route("/oauth2callback", web::get().to(auth::oauth_callback));
    if let Some(dir) = static_dir {
        app.service(Files::new("/data", dir));
    }
}
