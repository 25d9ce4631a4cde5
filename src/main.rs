// src/main.rs

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use quizer_backend::config::Config;
use quizer_backend::engine::refill::spawn_refill_worker;
use quizer_backend::routes;
use quizer_backend::state::AppState;
use quizer_backend::utils::hash::hash_password;
use quizer_backend::utils::mailer::Mailer;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load configuration from environment (.env included)
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

    // Initialize Database Pool.
    // WAL keeps readers unblocked while the engine writes; the busy
    // timeout covers writer contention on the single database file.
    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .expect("Invalid DATABASE_URL")
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(connect_options)
        .await
        .expect("Failed to open database");

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    // Seed Admin User
    if let Err(e) = seed_admin_user(&pool, &config).await {
        tracing::error!("Failed to seed admin user: {:?}", e);
    }

    // Background star refill worker
    spawn_refill_worker(
        pool.clone(),
        Duration::from_secs(config.refill_interval_secs),
    );

    // Create AppState
    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
        mailer: Mailer::from_config(&config),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    // ConnectInfo is required by the rate limiter on the auth routes.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}

async fn seed_admin_user(pool: &SqlitePool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let (Some(email), Some(username), Some(password)) = (
        &config.admin_email,
        &config.admin_username,
        &config.admin_password,
    ) {
        let user_exists = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(pool)
            .await?;

        if user_exists.is_none() {
            tracing::info!("Seeding admin user: {}", username);
            let hashed_password = hash_password(password)?;

            sqlx::query(
                r#"
                INSERT INTO users (email, username, password, role, account_status, created_at)
                VALUES (?, ?, ?, 'admin', 'active', ?)
                "#,
            )
            .bind(email)
            .bind(username)
            .bind(hashed_password)
            .bind(Utc::now().timestamp())
            .execute(pool)
            .await?;
            tracing::info!("Admin user created successfully.");
        }
    }
    Ok(())
}
