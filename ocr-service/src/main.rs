mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ocr_service::api::{create_router, AppState};
use ocr_service::config::{Config, DEFAULT_CONFIG_FILE};
use ocr_service::ocr::{default_factory, Device, ModelManager, ServiceStats};
use ocr_service::services::RecognitionService;

use crate::cli::{Input, OutputFormat};

#[derive(Parser)]
#[command(name = "ocr-service", version)]
#[command(about = "Multi-language OCR service")]
struct Args {
    /// Optional YAML/TOML/JSON file merged over the defaults
    #[arg(long, global = true, env = "OCR_CONFIG_FILE", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Skip loading `preload_models` at startup
        #[arg(long)]
        no_preload: bool,
    },
    /// Recognize a single image and print the result
    Recognize {
        #[arg(long, conflicts_with = "url", required_unless_present = "url")]
        file: Option<PathBuf>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        lang: Option<String>,
        #[arg(long)]
        gpu: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        output: OutputFormat,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ocr_service=info,tower_http=debug".into());

    // Logs go to stderr so `recognize` output on stdout stays clean
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.log_json);

    let mut config = Config::load(&args.config)?;
    let stats = Arc::new(ServiceStats::new());
    let models = Arc::new(ModelManager::new(default_factory(), &config.ocr, stats));
    tracing::info!(backend = models.backend_name(), "OCR backend selected");

    match args.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
        no_preload: false,
    }) {
        Command::Serve {
            host,
            port,
            no_preload,
        } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config, models, !no_preload).await
        }
        Command::Recognize {
            file,
            url,
            lang,
            gpu,
            output,
        } => {
            let service = RecognitionService::new(&config, models);
            let lang = service.language_or_default(lang.as_deref());
            let device = service.device_or_default(gpu.then_some(true));

            let input = match (&file, &url) {
                (Some(path), _) => Input::File(path),
                (None, Some(url)) => Input::Url(url),
                (None, None) => anyhow::bail!("either --file or --url is required"),
            };

            cli::recognize(&service, input, &lang, device, output).await?;
            Ok(())
        }
    }
}

async fn serve(config: Config, models: Arc<ModelManager>, preload: bool) -> anyhow::Result<()> {
    let cancel_token = CancellationToken::new();

    if preload && !config.performance.preload_models.is_empty() {
        let languages = config.performance.preload_models.clone();
        let device = Device::from_use_gpu(config.ocr.use_gpu);
        let manager = Arc::clone(&models);
        let token = cancel_token.child_token();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Model preload cancelled");
                }
                _ = manager.preload(&languages, device) => {}
            }
        });
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, models);
    let app = create_router(state);

    tracing::info!("OCR service starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/api/v1/health", addr);
    tracing::info!("  API docs:     http://{}/api/v1/docs", addr);
    tracing::info!("  OpenAPI spec: http://{}/api/v1/openapi.json", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token))
        .await?;

    Ok(())
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    tracing::info!("Shutdown signal received, cancelling background tasks...");
    cancel_token.cancel();
}
