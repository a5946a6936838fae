use std::future::IntoFuture;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::Notify;

use markitdown_server::{
    build_router,
    config::Config,
    converter::{AdapterOptions, ConverterAdapter},
    lifecycle::{self, RequestBudget},
    AppState,
};

fn main() -> ExitCode {
    let config = Config::from_env();

    let default_level = config
        .as_ref()
        .map(|c| c.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .init();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .thread_name("markitdown-worker")
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let graceful_timeout = config.graceful_timeout;
    let result = runtime.block_on(serve(config));
    // Detached conversions that outlived their request are abandoned here.
    runtime.shutdown_timeout(graceful_timeout);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: Config) -> std::io::Result<()> {
    tracing::info!(
        "Server configuration: MAX_FILE_SIZE={}MB, REQUEST_TIMEOUT={}s, ENABLE_PLUGINS={}",
        config.max_file_size_mb,
        config.request_timeout.as_secs(),
        config.enable_plugins
    );
    tracing::debug!(?config, "full configuration");

    let budget = RequestBudget::new(config.max_requests, config.max_requests_jitter).map(Arc::new);
    if let Some(budget) = &budget {
        tracing::info!(limit = budget.limit(), "process will recycle after request limit");
    }

    let state = AppState::new(&config).with_budget(budget.clone());

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(
        workers = config.workers,
        keepalive_secs = config.keepalive.as_secs(),
        "listening on {}",
        listener.local_addr()?
    );

    // Serve immediately; /health reports "not ready" until this finishes.
    let options = AdapterOptions::from(&config);
    let ready_state = state.clone();
    tokio::spawn(async move {
        match tokio::task::spawn_blocking(move || ConverterAdapter::new(options)).await {
            Ok(adapter) => {
                ready_state.install_converter(Arc::new(adapter));
                tracing::info!("service ready");
            }
            Err(e) => tracing::error!("converter construction failed: {}", e),
        }
    });

    let shutdown_started = Arc::new(Notify::new());
    let signal = {
        let started = shutdown_started.clone();
        async move {
            lifecycle::shutdown_signal(budget).await;
            started.notify_one();
        }
    };

    let server = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(signal)
        .into_future();

    let drain_deadline = async {
        shutdown_started.notified().await;
        tokio::time::sleep(config.graceful_timeout).await;
    };

    tokio::select! {
        result = server => result?,
        _ = drain_deadline => {
            tracing::warn!(
                timeout_secs = config.graceful_timeout.as_secs(),
                "graceful shutdown timed out, dropping open connections"
            );
        }
    }

    tracing::info!("server stopped");
    Ok(())
}
