use std::sync::Arc;

use care_booking::{config::Config, db, models::AppState, notify::Notifier, routes};

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
    let pool = db::connect_pg(&cfg.database_url, cfg.db_max_connections).await?;

    tracing::info!(
        email = cfg.email.is_some(),
        telegram = cfg.telegram.is_some(),
        "notification channels"
    );
    let notifier = Notifier::new(cfg.email.clone(), cfg.telegram.clone(), cfg.notify_timeout)?;

    let state = AppState {
        db: pool,
        notifier: Arc::new(notifier),
    };

    // The dashboard and the intake form are served from a separate static origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
