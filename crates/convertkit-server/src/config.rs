//! Command-line and environment configuration.

use clap::Parser;

/// Command-line arguments for the ConvertKit server
#[derive(Parser, Debug, Clone)]
#[command(name = "convertkit-server")]
#[command(about = "HTTP endpoints for image and PDF conversion tools")]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "CONVERTKIT_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "CONVERTKIT_PORT", default_value = "5000")]
    pub port: u16,

    /// Largest accepted request body, in megabytes
    #[arg(long, env = "CONVERTKIT_MAX_UPLOAD_MB", default_value = "25")]
    pub max_upload_mb: usize,

    /// Per-request processing timeout in milliseconds
    #[arg(long, env = "CONVERTKIT_TIMEOUT_MS", default_value = "30000")]
    pub timeout_ms: u64,

    /// Background removal model: a cached model id or a model directory
    #[arg(long, env = "CONVERTKIT_BG_MODEL", default_value = crate::background::DEFAULT_BG_MODEL)]
    pub bg_model: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// `host:port` string suitable for parsing into a socket address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Upload limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
