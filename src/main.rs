mod auth;
mod config;
mod middleware;

mod db;
mod engine;
mod error;
mod models;
mod notify;
mod routes;
mod store;

use std::sync::Arc;

use crate::{config::Config, models::AppState};
use crate::engine::executor::AppointmentActionExecutor;
use crate::notify::dispatcher::NotificationDispatcher;
use crate::notify::handlers::HandlerRegistry;
use crate::notify::recipients::RecipientResolver;
use crate::store::pg::PgStore;
use crate::store::{AppointmentStore, NotificationStore, UserDirectory};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg.database_url, cfg.max_db_connections).await?;

    // One Postgres-backed store serves all three persistence seams; the
    // engine pieces are wired explicitly, no globals.
    let pg = Arc::new(PgStore::new(pool.clone()));
    let appointments: Arc<dyn AppointmentStore> = pg.clone();
    let notifications: Arc<dyn NotificationStore> = pg.clone();
    let directory: Arc<dyn UserDirectory> = pg;

    let dispatcher = Arc::new(NotificationDispatcher::new(
        HandlerRegistry::standard(),
        appointments.clone(),
        notifications.clone(),
        RecipientResolver::new(directory),
    ));
    let executor = Arc::new(AppointmentActionExecutor::new(
        appointments.clone(),
        dispatcher.clone(),
    ));

    let state = AppState {
        db: pool,
        session_ttl_hours: cfg.session_ttl_hours,
        appointments,
        notifications,
        dispatcher,
        executor,
    };

    // DEV ONLY: allow browser/WebView clients to call the API.
    // This fixes OPTIONS preflight (CORS) that otherwise returns 405.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
