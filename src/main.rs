use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use courier::config::{self, Config};
use courier::notification::slack::SlackNotifier;
use courier::notification::webhook::WebhookNotifier;
use courier::notification::{LogNotifier, Notifier};
use courier::scheduler::TokioScheduler;
use courier::{api, AppState};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "courier"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "courier=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::CheckConfig) => check_config(&cfg),
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn check_config(cfg: &Config) -> anyhow::Result<()> {
    let yaml = serde_yaml::to_string(&cfg.courier).context("failed to render configuration")?;
    println!("# port: {}", cfg.port);
    println!("# api key: {}", if cfg.api_key.is_some() { "set" } else { "not set" });
    println!("# transport: {}", transport_name(cfg));
    print!("{}", yaml);
    Ok(())
}

fn transport_name(cfg: &Config) -> &'static str {
    if cfg.webhook_url.is_some() {
        "webhook"
    } else if cfg.slack_webhook_url.is_some() {
        "slack"
    } else {
        "log"
    }
}

fn build_notifier(cfg: &Config) -> anyhow::Result<Arc<dyn Notifier>> {
    if let Some(url) = &cfg.webhook_url {
        return Ok(Arc::new(WebhookNotifier::new(
            url.clone(),
            cfg.webhook_secret.clone(),
        )?));
    }
    if let Some(url) = &cfg.slack_webhook_url {
        return Ok(Arc::new(SlackNotifier::new(url.clone())));
    }
    tracing::warn!("no transport configured, notifications will only be logged");
    Ok(Arc::new(LogNotifier))
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    tracing::info!(transport = transport_name(&cfg), "Initializing courier...");
    let notifier = build_notifier(&cfg)?;
    let state = Arc::new(AppState::build(cfg, notifier, Arc::new(TokioScheduler::new()))?);
    state.batcher.start_window_timer();

    let app = api::app(state.clone())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("courier listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let cancelled = state.approvals.shutdown();
    match state.batcher.shutdown().await {
        Ok(report) => tracing::info!(
            cancelled_approvals = cancelled,
            delivered = report.delivered,
            "courier stopped"
        ),
        Err(e) => tracing::warn!(error = %e, "final batch flush failed"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
