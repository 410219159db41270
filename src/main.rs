use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use linda_server::pipeline::VisionMode;
use linda_server::{
    ApiServer, ApiState, Config, ConfiguredEngines, EngineKind, ModelRegistry,
    RequestOrchestrator,
};

/// Linda - voice and vision assistant server
#[derive(Parser)]
#[command(name = "linda", version, about)]
struct Cli {
    /// Address to bind
    #[arg(long, env = "LINDA_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "LINDA_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Build every engine before accepting requests
        #[arg(long, env = "LINDA_PRELOAD")]
        preload: bool,
    },
    /// Build every configured engine once and report which fail
    Prefetch,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG wins when set
    let filter = match cli.verbose {
        0 => "info,linda_server=info",
        1 => "info,linda_server=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let registry = Arc::new(ModelRegistry::new(Arc::new(ConfiguredEngines::new(
        config.clone(),
    ))));

    match cli.command.unwrap_or(Command::Serve { preload: false }) {
        Command::Prefetch => prefetch(&registry, config.vision.mode).await,
        Command::Serve { preload } => serve(config, registry, preload).await,
    }
}

async fn serve(config: Config, registry: Arc<ModelRegistry>, preload: bool) -> anyhow::Result<()> {
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        speech = ?config.speech.engine,
        vision = %config.vision.mode,
        tts = ?config.tts.engine,
        "starting linda server"
    );

    if preload {
        let failures = registry.preload(&EngineKind::ALL).await;
        if !failures.is_empty() {
            tracing::warn!(failed = failures.len(), "some engines failed to preload");
        }
    }

    if let Some(dir) = &config.server.reply_dir {
        tokio::fs::create_dir_all(dir).await?;
        tracing::info!(path = %dir.display(), "keeping reply clips");
    }

    let orchestrator = Arc::new(RequestOrchestrator::from_config(&registry, &config));
    let state = ApiState::new(orchestrator, registry);
    ApiServer::new(state, &config.server).run().await?;
    Ok(())
}

/// Warm every engine once, the way a deployment would before going live
async fn prefetch(registry: &ModelRegistry, mode: VisionMode) -> anyhow::Result<()> {
    let failures = registry.preload(&EngineKind::ALL).await;

    for kind in EngineKind::ALL {
        let state = if registry.is_loaded(kind) { "ready" } else { "failed" };
        println!("{:<16} {state}", kind.as_str());
    }

    // The captioner only matters when the deployment captions
    let required_failures: Vec<_> = failures
        .iter()
        .filter(|e| match e {
            linda_server::Error::EngineConstruction { kind: EngineKind::Captioner, .. } => {
                mode == VisionMode::CaptionAndDetection
            }
            linda_server::Error::EngineConstruction { kind, .. } => kind.is_required(),
            _ => false,
        })
        .collect();

    if required_failures.is_empty() {
        println!("\nAll required engines are ready.");
        Ok(())
    } else {
        for e in &required_failures {
            eprintln!("  {e}");
        }
        anyhow::bail!("{} required engine(s) failed to load", required_failures.len())
    }
}
