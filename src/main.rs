use anyhow::anyhow;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vigil::app::moderation::{ModerationService, ModerationSettings};
use vigil::app::notifications::AlertNotifier;
use vigil::config::AppConfig;
use vigil::infra::{
    classifier::RekognitionClassifier, mailer::SmtpMailer, queue::QueueClient,
    records::MetadataTable, storage::ObjectStorage,
};
use vigil::{http, jobs, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let storage = ObjectStorage::new(&config).await?;
    let classifier = RekognitionClassifier::new(&config).await?;
    let records = MetadataTable::new(&config).await?;
    let mailer = SmtpMailer::new(&config)?;

    let notifier = AlertNotifier::new(
        Arc::new(mailer),
        config.alert_sender.clone(),
        config.alert_recipient.clone(),
    );
    let moderation = ModerationService::new(
        Arc::new(storage),
        Arc::new(classifier),
        Arc::new(records),
        notifier,
        ModerationSettings::from_config(&config),
    );

    tracing::info!(
        safe_bucket = %config.safe_bucket,
        violent_bucket = %config.violent_bucket,
        table = %config.metadata_table,
        denylist_size = config.denylist.len(),
        "moderation pipeline configured"
    );

    let state = AppState { moderation };

    match config.app_mode.as_str() {
        "api" => {
            let app: Router = http::router(state).layer(TraceLayer::new_for_http());
            let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
            tracing::info!("listening on {}", config.http_addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        "worker" => {
            tracing::info!("starting worker mode");
            let queue = QueueClient::new(&config).await?;
            tokio::select! {
                result = jobs::upload_processor::run(state.moderation.clone(), queue) => {
                    result?;
                }
                _ = shutdown_signal() => {}
            }
        }
        other => return Err(anyhow!("unknown APP_MODE: {}", other)),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
