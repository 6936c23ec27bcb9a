mod config;
mod routes;
mod services;
mod state;

#[tokio::main]
async fn main() {
    // A missing .env file is fine; the process environment still applies.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::ServerConfig::from_env().expect("invalid configuration");
    let port = config.port;
    let state = state::AppState::new(config);

    // Spawn background idle-room eviction (no-op unless ROOM_IDLE_TTL_SECS is set).
    let _eviction = services::sweeper::spawn_eviction_task(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "whiteboard listening");
    axum::serve(listener, app).await.expect("server failed");
}
