//! ConvertKit server binary.

use std::net::SocketAddr;

use clap::Parser;
use convertkit_server::{router, AppState, Args};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = AppState::from(&args);
    let app = router(state);

    let addr: SocketAddr = args.bind_addr().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Upload limit: {} MB", args.max_upload_mb);
    info!("Processing timeout: {}ms", args.timeout_ms);

    axum::serve(listener, app).await?;

    Ok(())
}
