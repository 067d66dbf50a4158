use crankshaft::config::AppConfig;
use crankshaft::handlers::status_router;
use crankshaft::pipeline::{monitor_clusters, PipelineMetrics};
use crankshaft::sinks::{SinkError, SinkRegistry};
use crankshaft::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Usage errors: bad configuration or an unknown backend.
const EXIT_USAGE: i32 = 2;

fn usage_exit(message: &str) -> ! {
    eprintln!("Error: {message}");
    eprintln!(
        "usage: crankshaft (configure via config.toml, APP_CONFIG_FILE or APP_<SECTION>__<KEY>)"
    );
    std::process::exit(EXIT_USAGE);
}

async fn setup_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {}", e);
                None
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
            }
            () = async {
                if let Some(ref mut sigterm) = sigterm {
                    if sigterm.recv().await.is_none() {
                        warn!("SIGTERM signal stream closed unexpectedly");
                    }
                }
            } => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            return;
        }
        info!("Received Ctrl+C, shutting down");
    }
}

fn setup_logging(config: &AppConfig) {
    let filter = EnvFilter::try_new(format!(
        "{level},hyper=info,reqwest=info",
        level = config.log.level
    ))
    .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    match config.log.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(false)
                        .with_file(true)
                        .with_line_number(true)
                        .with_current_span(true)
                        .with_span_list(true),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .init();
        }
    }
}

async fn bind_status_listener(host: &str, port: u16) -> anyhow::Result<tokio::net::TcpListener> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid status address {host}:{port}: {e}"))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind status server on {addr}: {e}"))?;
    info!("Status server listening on {addr}");
    Ok(listener)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match AppConfig::new() {
        Ok(config) => Arc::new(config),
        Err(e) => usage_exit(&format!("Failed to load configuration: {e}")),
    };

    setup_logging(&config);

    info!("Starting crankshaft v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Config loaded: Turbine={}:{} tls={} clusters={:?} backend={}",
        config.turbine.host,
        config.turbine.port,
        config.turbine.tls_enabled,
        config.turbine.clusters,
        config.backend.kind
    );

    let sink = match SinkRegistry::new().build(&config.backend.kind, &config) {
        Ok(sink) => sink,
        Err(e @ (SinkError::UnknownBackend(_) | SinkError::Config(_))) => {
            error!("{e}");
            usage_exit(&e.to_string());
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to initialize sink: {e}")),
    };

    let metrics = Arc::new(PipelineMetrics::new());

    if config.status.enabled {
        let state = AppState {
            config: config.clone(),
            metrics: metrics.clone(),
            backend: sink.name(),
        };
        let listener = bind_status_listener(&config.status.host, config.status.port).await?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, status_router(state)).await {
                error!("Status server failed: {e}");
            }
        });
    }

    tokio::select! {
        result = monitor_clusters(config.clone(), sink, metrics) => {
            let dispatched = result.map_err(|e| anyhow::anyhow!("Pipeline failed to start: {e}"))?;
            warn!("All cluster supervisors stopped after {} events", dispatched);
        }
        () = setup_shutdown_signal() => {}
    }

    Ok(())
}
