use trailhead_api::config::AppConfig;
use trailhead_api::database::manager;
use trailhead_api::routes;
use trailhead_api::services::email::Mailer;
use trailhead_api::state::AppState;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env();
    tracing::info!("starting trailhead-api in {:?} mode", config.environment);

    let pool = manager::connect(&config.database)
        .await
        .unwrap_or_else(|e| panic!("failed to connect to {}: {}", config.database.url, e));
    manager::run_migrations(&pool)
        .await
        .unwrap_or_else(|e| panic!("failed to run migrations: {}", e));

    let mailer = Mailer::new(&config.email)
        .unwrap_or_else(|e| panic!("failed to initialize mailer: {}", e));

    let bind_addr = format!("{}:{}", config.server.bind, config.server.port);
    let state = AppState::new(pool, config, mailer);
    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("listening on http://{}", bind_addr);
    axum::serve(listener, app).await.expect("server");
}
