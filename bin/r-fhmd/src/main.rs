//! ---
//! fhm_section: "01-core-functionality"
//! fhm_subsection: "binary"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Binary entrypoint for the R-FHM daemon."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use r_fhm_api::{spawn_api_server, ApiServer, ApiState};
use r_fhm_common::config::{AppConfig, Mode};
use r_fhm_common::logging::init_tracing;
use r_fhm_common::version::VersionInfo;
use r_fhm_core::{retrain_from_log, AlertDispatcher, StreamRunner, TelemetryPipeline};
use r_fhm_metrics::{
    new_registry, spawn_http_server, DaemonMetrics, PipelineMetrics, SharedRegistry,
};
use r_fhm_model::{ModelArtifact, ModelStore};
use r_fhm_persistence::{TankRegistry, TelemetryLog};
use r_fhm_transport::build_transport;
use tokio::signal;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    version = concat!("R-FHM ", env!("CARGO_PKG_VERSION")),
    about = "R-FHM fuel health monitoring daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print extended version information and exit"
    )]
    version: bool,

    #[arg(long, value_enum, help = "Override application mode")]
    mode: Option<CliMode>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMode {
    Production,
    Simulation,
}

impl From<CliMode> for Mode {
    fn from(value: CliMode) -> Self {
        match value {
            CliMode::Production => Mode::Production,
            CliMode::Simulation => Mode::Simulation,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the monitoring daemon")]
    Run,
    #[command(about = "Fit the anomaly model from the stored telemetry and exit")]
    Train {
        #[arg(
            long,
            value_name = "FILE",
            help = "Write the model artifact here instead of the configured path"
        )]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let version = VersionInfo::current();
    if cli.version {
        println!("{}", version.extended());
        return Ok(());
    }
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/example.prod.toml"));
    candidates.push(PathBuf::from("configs/example.dev.toml"));

    let load_started = Instant::now();
    let loaded_config = AppConfig::load_with_source(&candidates)?;
    let mut config = loaded_config.config;
    let config_path = loaded_config.source;
    let load_duration = load_started.elapsed();

    let metrics_registry = new_registry();
    let daemon_metrics = DaemonMetrics::new(metrics_registry.clone())?;
    daemon_metrics.observe_config_load(load_duration.as_secs_f64());
    daemon_metrics.inc_start();
    daemon_metrics.set_build_info(&version.semver, &version.profile);

    if let Some(mode) = cli.mode {
        config.mode = mode.into();
    }
    init_tracing("r-fhmd", &config.logging)?;
    info!(source = %config_path.display(), mode = ?config.mode, "configuration loaded");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            run_daemon(config, Some(metrics_registry.clone()), version.clone()).await?
        }
        Commands::Train { output } => run_train(&config, output)?,
    }

    Ok(())
}

fn run_train(config: &AppConfig, output: Option<PathBuf>) -> Result<()> {
    let log = TelemetryLog::open(&config.storage.telemetry_path())?;
    let store = ModelStore::empty();
    let artifact_path = output.unwrap_or_else(|| config.model.artifact_path.clone());
    let outcome = retrain_from_log(&config.model, &log, &store, &artifact_path)?;
    println!(
        "Trained on {} telemetry rows; artifact written to {}",
        outcome.trained_rows,
        outcome.artifact_path.display()
    );
    Ok(())
}

async fn run_daemon(
    config: AppConfig,
    mut metrics_registry: Option<SharedRegistry>,
    version: VersionInfo,
) -> Result<()> {
    let metrics_settings = config.metrics.clone();
    let api_settings = config.api.clone();

    let metrics_server = if metrics_settings.enabled {
        match metrics_registry.clone() {
            Some(registry) => {
                info!(address = %metrics_settings.listen, "metrics exporter enabled");
                Some(spawn_http_server(registry, metrics_settings.listen)?)
            }
            None => {
                warn!("metrics exporter requested but no registry available");
                None
            }
        }
    } else {
        metrics_registry = None;
        info!("metrics exporter disabled by configuration");
        None
    };
    let pipeline_metrics = match &metrics_registry {
        Some(registry) => Some(PipelineMetrics::new(registry.clone())?),
        None => None,
    };

    let log = Arc::new(TelemetryLog::open(&config.storage.telemetry_path())?);
    let tanks = Arc::new(TankRegistry::open(&config.storage.tank_path())?);

    let store = match ModelArtifact::load_if_present(&config.model.artifact_path)? {
        Some(artifact) => {
            info!(path = %config.model.artifact_path.display(), "model artifact loaded");
            Arc::new(ModelStore::with_model(artifact.forest))
        }
        None => {
            warn!(
                path = %config.model.artifact_path.display(),
                "no model artifact found; scoring disabled until retrain"
            );
            Arc::new(ModelStore::empty())
        }
    };
    if let Some(metrics) = &pipeline_metrics {
        metrics.set_model_loaded(store.is_loaded());
    }

    let pipeline = Arc::new(TelemetryPipeline::from_config(
        &config.simulator,
        Arc::clone(&store),
        pipeline_metrics.clone(),
    ));
    let dispatcher = Arc::new(AlertDispatcher::from_config(&config.alerts)?);

    let stream_handle = if config.stream.enabled {
        let transport = build_transport(&config.transport);
        let runner = StreamRunner::new(
            Arc::clone(&pipeline),
            Arc::clone(&log),
            transport,
            config.transport.topic.clone(),
            config.stream.tick_interval,
            pipeline_metrics.clone(),
        );
        Some(runner.spawn())
    } else {
        info!("streaming loop disabled by configuration");
        None
    };

    let mut api_server: Option<ApiServer> = None;
    if api_settings.enabled {
        let state = Arc::new(ApiState::new(
            Arc::clone(&pipeline),
            Arc::clone(&store),
            Arc::clone(&log),
            Arc::clone(&tanks),
            Arc::clone(&dispatcher),
            config.model.clone(),
            pipeline_metrics.clone(),
            config.mode,
            version.clone(),
        ));
        match spawn_api_server(state, api_settings.listen) {
            Ok(server) => {
                info!(address = %server.addr(), "api server listening");
                api_server = Some(server);
            }
            Err(err) => {
                warn!(error = %err, "failed to start api server");
            }
        }
    } else {
        info!("api server disabled by configuration");
    }

    info!(mode = ?config.mode, "daemon running; waiting for termination signal");
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");

    if let Some(handle) = stream_handle {
        handle.shutdown().await?;
    }

    if let Some(server) = metrics_server {
        server.shutdown().await?;
    }

    if let Some(server) = api_server {
        server.shutdown().await?;
    }

    Ok(())
}
