use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use toonmill_core::{
    create_audit_system, load_config, validate_config, ArtifactStore, AuditEvent, AuditStore,
    Collaborators, ComicOrchestrator, Config, ContentAnalyzer, FsArtifactStore, GeminiAnalyzer,
    GeminiImageGenerator, ImageGenerator, NoopNotifier, Notification, NotificationSink,
    SqliteAuditStore, SqliteTaskStore, TaskStore, TelegramNotifier,
};

use toonmill_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for audit event channel
const AUDIT_BUFFER_SIZE: usize = 1000;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("TOONMILL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!(
        "Analyzer model: {}, image model: {}",
        config.analyzer.model, config.image.model
    );

    // Compute config hash for audit
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = &config_hash[..16];

    // Create SQLite audit store
    let audit_store: Arc<dyn AuditStore> = Arc::new(
        SqliteAuditStore::new(&config.database.path).context("Failed to create audit store")?,
    );
    info!("Audit store initialized");

    // Create SQLite task store
    let task_store: Arc<dyn TaskStore> = Arc::new(
        SqliteTaskStore::new(&config.database.path).context("Failed to create task store")?,
    );
    info!("Task store initialized");

    // Create audit system
    let (audit_handle, audit_writer) =
        create_audit_system(Arc::clone(&audit_store), AUDIT_BUFFER_SIZE);

    // Spawn audit writer task
    let writer_handle = tokio::spawn(audit_writer.run());

    // Emit ServiceStarted event
    audit_handle
        .emit(AuditEvent::ServiceStarted {
            version: VERSION.to_string(),
            config_hash: config_hash_short.to_string(),
        })
        .await;
    info!("Emitted ServiceStarted audit event");

    let collaborators = build_collaborators(&config);
    collaborators.notifier.notify(Notification::ServiceStarted {
        version: VERSION.to_string(),
    });

    let orchestrator = Arc::new(ComicOrchestrator::new(
        config.orchestrator.clone(),
        task_store,
        collaborators,
        Some(audit_handle.clone()),
    ));

    // Tasks left processing by a previous process can never finish now
    match orchestrator.recover_interrupted() {
        Ok(ids) if !ids.is_empty() => {
            warn!("Marked {} interrupted task(s) as failed", ids.len());
        }
        Ok(_) => {}
        Err(e) => error!("Failed to recover interrupted tasks: {}", e),
    }

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&orchestrator),
        audit_store,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Stopping orchestrator...");
    orchestrator.shutdown().await;
    info!("Orchestrator stopped");

    // Emit ServiceStopped event
    info!("Server shutting down...");
    audit_handle
        .emit(AuditEvent::ServiceStopped {
            reason: "graceful_shutdown".to_string(),
        })
        .await;

    // The orchestrator and its fan-out engine hold AuditHandle clones; the
    // writer only stops once every handle is gone.
    drop(orchestrator);
    drop(audit_handle);

    // Wait for writer to finish processing remaining events
    let _ = writer_handle.await;
    info!("Audit writer stopped");

    Ok(())
}

fn build_collaborators(config: &Config) -> Collaborators {
    let analyzer_config = &config.analyzer;
    let mut analyzer = GeminiAnalyzer::new(
        analyzer_config.api_key.clone(),
        analyzer_config.model.clone(),
        Duration::from_secs(analyzer_config.timeout_secs),
    )
    .with_temperature(analyzer_config.temperature)
    .with_max_input_chars(config.orchestrator.max_input_chars);
    if let Some(ref api_base) = analyzer_config.api_base {
        analyzer = analyzer.with_api_base(api_base.clone());
    }
    let analyzer: Arc<dyn ContentAnalyzer> = Arc::new(analyzer);

    let image_config = &config.image;
    let image_generator = |model: &str| {
        let generator = GeminiImageGenerator::new(
            image_config.api_key.clone(),
            model.to_string(),
            Duration::from_secs(image_config.timeout_secs),
        );
        match image_config.api_base {
            Some(ref api_base) => generator.with_api_base(api_base.clone()),
            None => generator,
        }
    };
    let generator: Arc<dyn ImageGenerator> = Arc::new(image_generator(&image_config.model));
    let sheet_generator = image_config.sheet_model.as_deref().map(|model| {
        info!("Character sheets use model {}", model);
        Arc::new(image_generator(model)) as Arc<dyn ImageGenerator>
    });

    let artifacts: Arc<dyn ArtifactStore> = Arc::new(FsArtifactStore::new(
        config.storage.root.clone(),
        config.storage.public_base_url.clone(),
    ));
    info!("Artifacts stored under {:?}", config.storage.root);

    let notifier: Arc<dyn NotificationSink> = match config.notifier.telegram {
        Some(ref telegram) => {
            info!("Telegram notifications enabled");
            let notifier = TelegramNotifier::new(telegram.bot_token.clone(), telegram.chat_id.clone());
            match telegram.api_base {
                Some(ref api_base) => Arc::new(notifier.with_api_base(api_base.clone())),
                None => Arc::new(notifier),
            }
        }
        None => {
            info!("No notifier configured");
            Arc::new(NoopNotifier)
        }
    };

    Collaborators {
        analyzer,
        generator,
        sheet_generator,
        artifacts,
        notifier,
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
