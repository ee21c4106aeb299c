// src/main.rs

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use backend::config::Config;
use backend::routes;
use backend::seed;
use backend::services::feedback::{FeedbackGenerator, GeminiFeedback, TemplateFeedback};
use backend::sessions::SessionRegistry;
use backend::state::AppState;
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!(
                    "Database not ready, retrying in 2s... (Attempt {})",
                    retry_count
                );
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    // Seed learning paths, topics and the question bank
    if let Err(e) = seed::seed_reference_data(&pool).await {
        tracing::error!("Failed to seed reference data: {:?}", e);
    }

    // Select the feedback generator: Gemini-backed when a key is configured,
    // local templates otherwise.
    let feedback: Arc<dyn FeedbackGenerator> = match &config.gemini_api_key {
        Some(key) => {
            let client = GeminiFeedback::new(
                key.clone(),
                config.gemini_model.clone(),
                Duration::from_secs(config.feedback_timeout_secs),
            )
            .expect("Failed to build feedback HTTP client");
            tracing::info!("Feedback generator: {}", config.gemini_model);
            Arc::new(client)
        }
        None => {
            tracing::warn!("GEMINI_API_KEY not set; using local feedback templates");
            Arc::new(TemplateFeedback)
        }
    };

    // Create AppState
    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
        feedback,
        sessions: SessionRegistry::new(),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    // Start the server
    axum::serve(listener, app).await.unwrap();
}
