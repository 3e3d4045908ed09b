use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use careloop_server::{
    ai::GroqResponder,
    build_router,
    channel::TwilioWhatsApp,
    config::AppConfig,
    db::{migrations, ConversationStore, MemoryStore, PgConversationStore, PgJobQueue},
    notify::EmailNotifier,
    scheduler::{FollowUpScheduler, FollowUpWorker, JobQueue, MemoryJobQueue},
    webhook::{InboundDispatcher, WebhookProcessor},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    let in_memory = std::env::args().any(|a| a == "--memory");

    let (store, queue): (Arc<dyn ConversationStore>, Arc<dyn JobQueue>) = if in_memory {
        tracing::warn!("⚠ Running with in-memory store and queue; nothing is persisted");
        let store: Arc<dyn ConversationStore> = Arc::new(MemoryStore::new());
        let queue: Arc<dyn JobQueue> = Arc::new(MemoryJobQueue::new(config.scheduler.retry));
        (store, queue)
    } else {
        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(&config.database.connection_string())
            .await
            .context("Failed to connect to database")?;
        tracing::info!("✓ Database connected successfully");

        migrations::run_migrations(&pool)
            .await
            .context("Failed to run migrations")?;

        let store: Arc<dyn ConversationStore> = Arc::new(PgConversationStore::new(pool.clone()));
        let queue: Arc<dyn JobQueue> = Arc::new(PgJobQueue::new(
            pool,
            config.scheduler.retry,
            config.scheduler.visibility_timeout,
        ));
        (store, queue)
    };

    let channel = Arc::new(TwilioWhatsApp::new(config.twilio.clone())?);
    let responder = Arc::new(GroqResponder::new(config.groq.clone())?);
    let notifier = Arc::new(EmailNotifier::new(config.mail.clone())?);
    let scheduler = FollowUpScheduler::new(queue.clone());

    let processor = Arc::new(WebhookProcessor::new(
        store.clone(),
        scheduler.clone(),
        channel.clone(),
        responder,
        notifier,
        config.processor.clone(),
    ));
    let (dispatcher, dispatch_loop) = InboundDispatcher::new(processor, config.dispatch_concurrency);
    let dispatch_task = tokio::spawn(dispatch_loop);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = Arc::new(FollowUpWorker::new(
        store.clone(),
        channel,
        queue,
        config.scheduler.poll_interval,
    ));
    let worker_task = tokio::spawn(worker.run(shutdown_rx));

    let app = build_router(AppState {
        store,
        scheduler,
        dispatcher,
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    tracing::info!("🚀 Server running on http://{}", config.bind_addr);
    tracing::info!("📨 WhatsApp webhook at http://{}/webhook/whatsapp", config.bind_addr);

    // The router owns the last dispatcher handle; once serving stops the
    // dispatch loop drains and exits.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Err(e) = dispatch_task.await {
        tracing::error!(error = %e, "Inbound dispatcher task failed");
    }

    shutdown_tx.send(true).ok();
    if let Err(e) = worker_task.await {
        tracing::error!(error = %e, "Follow-up worker task failed");
    }

    tracing::info!("✓ Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
