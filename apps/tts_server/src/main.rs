mod config;
use config::TtsServerConfig;
use tokio::signal;
use tracing::{error, info};
use tts_mcp_core::TtsRuntime;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is optional
    let _ = dotenvy::dotenv();

    // Logging / tracing; stdout carries the protocol, so log to stderr
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,tts_mcp_core=info,tts_mcp_server=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    info!(target: "tts_server", version = env!("CARGO_PKG_VERSION"), "Starting TTS MCP server");

    // Load configuration (defaults + env + optional TOML overlay)
    let cfg = TtsServerConfig::load();
    info!(
        target: "tts_server",
        model = %cfg.tts.provider.model,
        cache_enabled = cfg.tts.cache.enabled,
        output_dir = %cfg.tts.server.output_dir.display(),
        "Configuration loaded"
    );

    let runtime = match TtsRuntime::new(cfg.tts).await {
        Ok(rt) => rt,
        Err(e) => {
            error!(target: "tts_server", error = %e, "Failed to initialize runtime");
            return Err(e.into());
        }
    };
    runtime.start().await?;

    let server = runtime.mcp_server();
    tokio::select! {
        res = server.serve_stdio() => {
            if let Err(e) = res {
                error!(target: "tts_server", error = %e, "MCP server stopped with error");
                return Err(e.into());
            }
        }
        _ = signal::ctrl_c() => {
            info!(target: "tts_server", "Ctrl-C received");
        }
    }

    info!(target: "tts_server", "TTS MCP server shut down");
    Ok(())
}
