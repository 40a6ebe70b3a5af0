use anyhow::{Context, Result, anyhow};
use clap::Parser;
use docsum::{
    api,
    config::{self, Config},
    extraction::CommandExtractor,
    logging,
    pipeline::SummaryPipeline,
    summarization::GeminiSummarizationClient,
    upload::UploadReceiver,
};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "docsum", about = "Summarize uploaded PDFs and images over HTTP")]
struct Cli {
    /// Port to listen on (overrides `PORT`).
    #[arg(long)]
    port: Option<u16>,
    /// Directory for in-flight uploads (overrides `UPLOAD_DIR`).
    #[arg(long)]
    upload_dir: Option<PathBuf>,
    /// Load environment variables from this file instead of `.env`.
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let dotenv_loaded = config::load_dotenv(cli.env_file.as_deref());
    logging::init_tracing();

    let mut config = Config::from_env().context("failed to load configuration")?;
    if let Some(port) = cli.port {
        config.server_port = port;
    }
    if let Some(upload_dir) = cli.upload_dir {
        config.upload_dir = upload_dir;
    }
    tracing::debug!(
        dotenv_loaded,
        port = config.server_port,
        upload_dir = %config.upload_dir.display(),
        extractor = ?config.extractor_command,
        model = %config.gemini_model,
        "Loaded configuration"
    );

    let pipeline = build_pipeline(&config)?;
    let app = api::create_router(Arc::new(pipeline), config.max_upload_bytes);

    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.server_port))
        .await
        .with_context(|| format!("failed to bind port {}", config.server_port))?;
    tracing::info!("Server listening at http://localhost:{}", config.server_port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server terminated unexpectedly")?;
    Ok(())
}

fn build_pipeline(config: &Config) -> Result<SummaryPipeline> {
    let extractor =
        CommandExtractor::from_command_line(&config.extractor_command, config.extraction_timeout)
            .ok_or_else(|| anyhow!("EXTRACTOR_COMMAND is empty"))?;
    let summarizer = GeminiSummarizationClient::from_config(config)
        .context("failed to initialize summarization client")?;
    Ok(SummaryPipeline::new(
        UploadReceiver::new(config.upload_dir.clone()),
        Arc::new(extractor),
        Arc::new(summarizer),
        config.gemini_model.clone(),
    ))
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
