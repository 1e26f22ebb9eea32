mod clock;
mod config;
mod db;
mod frame;
mod money;
mod rate_limit;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use services::mail::{Mailer, ResendMailer};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env().expect("invalid configuration");

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");

    // Password reset is optional; the rest of the clinic runs without it.
    let mailer: Option<Arc<dyn Mailer>> = match &config.mail {
        Some(mail) => {
            tracing::info!(from = %mail.from, "resend mailer configured");
            Some(Arc::new(ResendMailer::new(mail)))
        }
        None => {
            tracing::warn!("RESEND_API_KEY/RESEND_FROM not set, password reset email disabled");
            None
        }
    };

    let port = config.port;
    let clinic = config.clinic.name.clone();
    let state = state::AppState::new(pool, config, mailer);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, %clinic, "clinic server listening");
    axum::serve(listener, app).await.expect("server failed");
}
