use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::info;

mod analysis;
mod api;
mod asset;
mod config;
mod error;
mod overlay;
mod page_source;
mod raster;
mod review;
mod storage;

use crate::config::StaticConfig;
use crate::review::ReviewService;

// Re-export config crate types to avoid namespace collision
use ::config::{Config as ConfigBuilder, Environment, File};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    info!(
        "Starting document review service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let static_config: StaticConfig = ConfigBuilder::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix("DOCREVIEW")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    info!(
        host = %static_config.server.host,
        port = static_config.server.port,
        pdf_render_scale = static_config.review.pdf_render_scale,
        field_colors = static_config.palette.fields.len(),
        "Configuration loaded"
    );

    let metrics = PrometheusBuilder::new().install_recorder()?;

    let service = Arc::new(ReviewService::new(&static_config));
    let app = api::router(service, metrics);

    let addr = format!(
        "{}:{}",
        static_config.server.host, static_config.server.port
    );
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("docreview_service=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
