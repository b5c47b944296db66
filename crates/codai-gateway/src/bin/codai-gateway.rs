//! Codai Gateway Binary
//!
//! Serves the Codai stores and feature flags over HTTP.
//!
//! # Usage
//! ```bash
//! codai-gateway [--port 8787] [--host 127.0.0.1] [--config codai.toml]
//!               [--service dashboard] [--no-fixtures] [--verbose]
//! ```

use anyhow::Context;
use clap::Parser;
use codai_core::CodaiConfig;
use codai_gateway::{Gateway, GatewayConfig, DEFAULT_PORT};
use std::path::PathBuf;

/// Codai Gateway - HTTP access to memories, MCP connections, positions and flags
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Core configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Service name flags are scoped against (overrides the config file)
    #[arg(short, long)]
    service: Option<String>,

    /// Start with empty stores instead of demo fixtures
    #[arg(long)]
    no_fixtures: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_target(false)
            .init();
    }

    let mut core = CodaiConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(service) = args.service {
        core = core.with_service_name(service);
    }
    if args.no_fixtures {
        core = core.with_fixtures(false);
    }

    let config = GatewayConfig::default()
        .with_host(args.host.clone())
        .with_port(args.port)
        .with_core(core);

    let gateway = Gateway::new(config).context("starting services")?;
    print_banner(&args.host, args.port, &gateway);

    gateway.start().await?;

    Ok(())
}

fn print_banner(host: &str, port: u16, gateway: &Gateway) {
    let state = gateway.state();
    let services = &state.services;

    println!();
    println!("Codai Gateway v{}", codai_gateway::VERSION);
    println!("   └─ http://{}:{}", host, port);
    println!();
    println!("Service: {}", services.flags.service_name());
    println!("   ├─ memories:        {}", services.memory.len());
    println!("   ├─ MCP connections: {}", services.mcp.len());
    println!("   ├─ positions:       {}", services.positions.len());
    println!("   └─ feature flags:   {}", services.flags.len());
    println!();
    println!("HTTP Endpoints");
    println!("   ├─ GET    /health");
    println!("   ├─ GET    /status");
    println!("   ├─ POST   /rpc");
    println!("   ├─ POST   /api/memories");
    println!("   ├─ GET    /api/memories?query=&kind=&owner=&limit=");
    println!("   ├─ GET    /api/memories/stats");
    println!("   ├─ GET    /api/memories/:id   (PATCH, DELETE)");
    println!("   ├─ GET    /api/flags");
    println!("   └─ GET    /api/flags/:name/evaluate?user_id=&service=");
    println!();
}
