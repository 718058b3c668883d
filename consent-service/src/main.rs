use consent_service::{
    build_router,
    config::{ConsentConfig, StoreBackend},
    db,
    services::{ConsentStore, Database, LogNotifier, MemoryStore, SystemClock},
    AppState,
};
use service_core::error::AppError;
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = ConsentConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    consent_service::services::metrics::init_metrics()?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        store = ?config.store,
        "Starting consent service"
    );

    let store: Arc<dyn ConsentStore> = match config.store {
        StoreBackend::Postgres => {
            tracing::info!("Initializing database connection pool");
            let pool = db::create_pool(&config.database).await?;
            db::run_migrations(&pool)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
            tracing::info!("Database initialized successfully");
            Arc::new(Database::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; state is lost on restart");
            Arc::new(demo_fixture())
        }
    };

    let public_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.public_token_limit,
        config.rate_limit.public_token_window_seconds,
    );

    let state = AppState::new(
        store,
        Arc::new(SystemClock),
        Arc::new(LogNotifier),
        &config.share_base_url,
        public_rate_limiter,
        config.security.allowed_origins.clone(),
    );
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(config.common.shutdown_grace_seconds))
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

/// Seed a storyteller, a site, and a small gallery so the memory backend is
/// usable without a directory service.
fn demo_fixture() -> MemoryStore {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let story = store.add_story(owner);
    let site = store.add_site("Demo Partner", Some("partner.example"));
    let gallery = store.add_gallery(owner, "Demo Gallery");
    for _ in 0..3 {
        store.add_media(owner, Some(gallery.gallery_id));
    }

    tracing::info!(
        owner_id = %owner,
        story_id = %story.story_id,
        site_id = %site.site_id,
        gallery_id = %gallery.gallery_id,
        "Seeded demo fixture"
    );
    store
}

async fn shutdown_signal(grace_seconds: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    // Give in-flight requests time to complete
    tokio::time::sleep(Duration::from_secs(grace_seconds)).await;
}
