use rmcp::{ServiceExt, transport::stdio};

use quickprompts::config::Config;
use quickprompts::server::QuickPromptsServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    // MCP clients may start us from any CWD: prefer a .env next to the binary.
    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(".env")))
        .filter(|path| path.exists());
    match beside_exe {
        Some(path) => {
            dotenvy::from_path(&path).ok();
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    let config = Config::load();
    tracing::info!(
        data_dir = %config.data_dir.display(),
        api_base = %config.api_base,
        "quickprompts starting"
    );

    let server = QuickPromptsServer::new(config);
    server.store().initialize().await?;

    let service = server
        .serve(stdio())
        .await
        .inspect_err(|e| tracing::error!("serving error: {e:?}"))?;

    service.waiting().await?;

    tracing::info!("quickprompts shutting down");
    Ok(())
}
