//! antman-proxy - An on-demand image resizing proxy.
//!
//! This binary starts the HTTP server and configures all components.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use antman_proxy::{
    cache::ImageCache,
    config::Config,
    gateway::{GatewaySettings, ResizeGateway},
    limit::RateLimiter,
    pipeline::{HttpImageSource, ImagePipeline},
    pool::WorkerPool,
    server::{create_router, ClientIdentity, RouterConfig},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    run(config).await
}

async fn run(config: Config) -> ExitCode {
    // validate() has already checked these
    let (formats, identity) = match (config.output_formats(), config.client_identity()) {
        (Ok(formats), Ok(identity)) => (formats, identity),
        (Err(e), _) | (_, Err(e)) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("antman-proxy v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Allowed domains: {}", config.allow_list().domains().join(", "));
    info!(
        "  Formats: {}",
        formats
            .iter()
            .map(|format| format.name())
            .collect::<Vec<_>>()
            .join(", ")
    );
    info!(
        "  Cache: {} (max age {}s)",
        config.cache_dir.display(),
        config.cache_max_age
    );
    info!(
        "  Rate limit: {} requests burst, {}/s refill, {}",
        config.request_capacity,
        config.request_refill_rate,
        match &identity {
            ClientIdentity::Header(name) => format!("keyed by {}", name),
            _ => "keyed by client IP".to_string(),
        }
    );
    info!(
        "  Workers: {}, fetch timeout {}s, job timeout {}s",
        config.workers, config.fetch_timeout, config.job_timeout
    );

    let cache = match ImageCache::open(&config.cache_dir, config.cache_max_age()).await {
        Ok(cache) => cache,
        Err(e) => {
            error!("Failed to open cache: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let source = match HttpImageSource::new(config.fetch_timeout()) {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let allow_list = config.allow_list();
    let pipeline =
        ImagePipeline::new(source, cache, allow_list.clone()).with_job_timeout(config.job_timeout());
    let pool = Arc::new(WorkerPool::new(config.workers));
    let settings = GatewaySettings::new(allow_list)
        .with_valid_formats(formats)
        .with_default_quality(config.default_quality);
    let gateway = ResizeGateway::new(pipeline, Arc::clone(&pool), settings);

    let limiter = RateLimiter::new(config.rate_limit_config());
    let router = create_router(gateway, limiter, build_router_config(&config, identity));

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on: http://{}", addr);
    info!("  curl 'http://{}/resize?url=<image-url>&width=300'", addr);

    let served = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    info!("Waiting for in-flight resize jobs");
    pool.shutdown_and_join().await;

    if let Err(e) = served {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Shutdown complete");
    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "antman_proxy=debug,tower_http=debug"
    } else {
        "antman_proxy=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config, identity: ClientIdentity) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.http_cache_max_age)
        .with_client_identity(identity)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
