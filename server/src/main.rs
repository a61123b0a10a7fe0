//! ctxtransd entry point — loads configuration, wires the persistence,
//! application, and HTTP layers, starts the scheduler and queue workers,
//! then serves the HTTP surface until shutdown.

use std::sync::Arc;
use std::time::Duration;

use ctxtransd::application::services::agent_loop::AgentLoop;
use ctxtransd::application::{
    JobQueue, LibraryScanner, MediaRootConfig, Scheduler, ScannerTtls, SourceConfig, TermMapGenerator, TermMapStore,
    TranslationPipeline, Translator,
};
use ctxtransd::domain::repositories::PersistenceStore;
use ctxtransd::infrastructure::database::{ConnectionPool, ConnectionPoolConfig};
use ctxtransd::infrastructure::external::ffmpeg::{FfprobeAdapter, VideoProbe};
use ctxtransd::infrastructure::external::llm::{ChatCompletionClient, HttpChatClient};
use ctxtransd::infrastructure::external::search::{HttpSearchProvider, SearchProvider};
use ctxtransd::infrastructure::persistence::SqlitePersistenceStore;
use ctxtransd::presentation::http::router::build_router;
use ctxtransd::presentation::http::state::AppState;
use ctxtransd::shared::config::AppConfig;
use ctxtransd::shared::settings::{RuntimeSettings, SettingsStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "startup configuration failed");
            std::process::exit(1);
        }
    };

    if let Err(err) = tokio::fs::create_dir_all(&config.data_dir).await {
        tracing::error!(error = %err, dir = %config.data_dir, "failed to create data directory");
        std::process::exit(1);
    }

    let pool = match ConnectionPool::create(ConnectionPoolConfig::new(format!("sqlite://{}", config.database_path())))
        .await
    {
        Ok(pool) => pool,
        Err(err) => {
            tracing::error!(error = %err, "failed to open database");
            std::process::exit(1);
        }
    };

    if let Err(err) = ctxtransd::infrastructure::database::initialize_schema(pool.inner()).await {
        tracing::error!(error = %err, "schema initialization failed");
        std::process::exit(1);
    }

    let store: Arc<dyn PersistenceStore> = Arc::new(SqlitePersistenceStore::new(pool.inner().clone()));

    let settings_defaults = RuntimeSettings {
        llm_api_url: config.llm_api_url.clone(),
        llm_api_key: config.llm_api_key.clone(),
        llm_model: config.llm_model.clone(),
        cron_expr: config.cron_expr.clone(),
        target_language: config.target_language.clone(),
    };
    let settings = Arc::new(SettingsStore::load_or_default(config.settings_file.clone(), settings_defaults).await);
    let runtime_settings = settings.get().await;

    let chat_client: Arc<dyn ChatCompletionClient> = Arc::new(HttpChatClient::new(
        runtime_settings.llm_api_url.clone(),
        runtime_settings.llm_api_key.clone(),
        runtime_settings.llm_model.clone(),
        config.llm_max_tokens,
        config.llm_temperature,
        config.llm_timeout,
    ));

    let search_provider: Option<Arc<dyn SearchProvider>> = config.search_api_key.clone().map(|api_key| {
        Arc::new(HttpSearchProvider::new(config.search_api_url.clone(), api_key, config.llm_timeout))
            as Arc<dyn SearchProvider>
    });

    let video_probe: Arc<dyn VideoProbe> = Arc::new(FfprobeAdapter::new(config.llm_timeout));

    let translator_agent = AgentLoop::new(chat_client.clone(), search_provider.clone());
    let translator = Arc::new(Translator::new(translator_agent, config.agent_max_iterations));

    let term_map_store = Arc::new(TermMapStore::new());
    let term_map_generator = Arc::new(TermMapGenerator::new(chat_client.clone(), search_provider.clone()));

    let pipeline = Arc::new(TranslationPipeline::new(
        Some(store.clone()),
        video_probe.clone(),
        translator,
        term_map_store,
        term_map_generator,
        runtime_settings.target_language.clone(),
        search_provider.is_some(),
    ));

    let queue = Arc::new(JobQueue::new(config.queue_workers, Some(store.clone())).await);
    queue.start(pipeline.clone()).await;

    let source_configs: Vec<SourceConfig> = config
        .media_roots
        .iter()
        .map(|root| SourceConfig { id: root.id.clone(), name: root.name.clone(), path: root.path.clone() })
        .collect();
    let scanner = Arc::new(LibraryScanner::new(
        source_configs,
        runtime_settings.target_language.clone(),
        ScannerTtls {
            sources: Duration::from_secs(config.scanner_source_ttl_secs),
            items: Duration::from_secs(config.scanner_item_ttl_secs),
            episodes: Duration::from_secs(config.scanner_episode_ttl_secs),
        },
        config.scanner_max_concurrency,
        video_probe.clone(),
        Some(store.clone()),
    ));

    let root_configs: Vec<MediaRootConfig> = config
        .media_roots
        .iter()
        .map(|root| MediaRootConfig { id: root.id.clone(), path: root.path.clone() })
        .collect();
    let scheduler = Scheduler::new(
        root_configs,
        runtime_settings.target_language.clone(),
        Some(store.clone()),
        video_probe.clone(),
        queue.clone(),
        config.agent_bundle_concurrency,
    );

    let cancellation = CancellationToken::new();
    if let Err(err) = scheduler.register(&runtime_settings.cron_expr, cancellation.child_token()).await {
        tracing::error!(error = %err, "failed to register cron schedule");
        std::process::exit(1);
    }

    let state = AppState {
        queue: queue.clone(),
        scanner,
        scheduler,
        pipeline,
        store,
        settings,
        ui_static_dir: config.ui_static_dir.clone().map(std::path::PathBuf::from),
        cancellation: cancellation.clone(),
    };

    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %addr, "failed to bind HTTP listener");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "ctxtransd listening");

    let shutdown_signal = async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        cancellation.cancel();
    };

    if let Err(err) = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal).await {
        tracing::error!(error = %err, "HTTP server error");
    }

    queue.stop().await;
}
