mod auth;
mod config;
mod credentials;
mod errors;
mod gallery;
mod models;
mod routes;
mod store;

use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, HttpServer};
use env_logger::Env;

use crate::auth::SessionStore;
use crate::config::Config;
use crate::credentials::GoogleCredentials;
use crate::routes::AppState;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Init logger to show info by default, but can be overridden by RUST_LOG
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cfg = Config::from_env_config()?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let credentials = Arc::new(GoogleCredentials::from_config(&cfg.google, http.clone()));
    let store = store::build_store(&cfg, credentials.clone(), http).await?;

    let state = AppState {
        cfg: web::Data::new(cfg.clone()),
        store: web::Data::from(store),
        credentials: web::Data::from(credentials),
        sessions: web::Data::new(SessionStore::default()),
    };

    log::info!("server is running on {}", cfg.listen);
    HttpServer::new(move || routes::build_app(state.clone()))
        .bind(&cfg.listen)?
        .run()
        .await?;
    Ok(())
}
