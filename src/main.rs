use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use surveycam::{
    CaptureController, DeviceProvider, ImageEnhancer, LocalObjectStore, NullSurface,
    SurveyRepository, SurveycamConfig,
};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "surveycam")]
#[command(about = "Field-survey photo capture and survey API")]
#[command(version)]
#[command(long_about = "Serves the survey REST API (surveys, environments, photo records) \
and the stored survey photos. Can also take a single enhanced snapshot from a local camera \
or remove stored photos that no record references.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "surveycam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the server")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Capture one enhanced JPEG from the camera and exit
    #[arg(long, value_name = "OUT", help = "Capture one enhanced JPEG to OUT and exit")]
    snapshot: Option<String>,

    /// Delete stored photos no record references, then exit
    #[arg(long, help = "Delete stored photos that no photo record references and exit")]
    sweep_orphans: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting surveycam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match SurveycamConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    if let Some(out) = args.snapshot.as_deref() {
        return snapshot(&config, out).await;
    }

    let repository = Arc::new(open_repository(&config).await?);

    if args.sweep_orphans {
        return sweep(&config, repository).await;
    }

    serve(config, repository).await
}

async fn open_repository(config: &SurveycamConfig) -> Result<SurveyRepository> {
    match config.api.data_file.as_deref() {
        Some(path) => SurveyRepository::open(path)
            .await
            .with_context(|| format!("Failed to open data file {}", path)),
        None => {
            warn!("No api.data_file configured, survey data will not survive a restart");
            Ok(SurveyRepository::in_memory())
        }
    }
}

#[cfg(feature = "api")]
async fn serve(config: SurveycamConfig, repository: Arc<SurveyRepository>) -> Result<()> {
    use surveycam::ApiServer;

    if config.auth.tokens.is_empty() {
        warn!("No API tokens configured, every API request will be rejected");
    }

    let server = ApiServer::new(config.api.clone(), repository, config.auth.tokens.clone())
        .with_files(&config.storage.path);

    server
        .start(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutdown requested");
        })
        .await?;

    Ok(())
}

#[cfg(not(feature = "api"))]
async fn serve(_config: SurveycamConfig, _repository: Arc<SurveyRepository>) -> Result<()> {
    anyhow::bail!("surveycam was built without the `api` feature")
}

async fn sweep(config: &SurveycamConfig, repository: Arc<SurveyRepository>) -> Result<()> {
    let store = LocalObjectStore::new(&config.storage.path, &config.storage.public_url);
    let report = surveycam::sweep_orphans(&store, repository.as_ref(), "").await?;

    println!(
        "Scanned {} objects, deleted {} orphans, {} errors",
        report.scanned,
        report.deleted.len(),
        report.errors.len()
    );
    for key in &report.deleted {
        println!("  deleted {}", key);
    }
    for failure in &report.errors {
        eprintln!("  failed {}", failure);
    }

    Ok(())
}

async fn snapshot(config: &SurveycamConfig, out: &str) -> Result<()> {
    let provider = camera_provider(config)?;
    let mut camera = CaptureController::new(config.camera.clone(), provider);

    camera
        .open(Box::new(NullSurface), config.camera.facing, None)
        .await?;
    let frame = camera.capture_frame().await;
    camera.close();

    let image = ImageEnhancer::new(config.enhance.clone()).process(frame?)?;
    tokio::fs::write(out, &image.bytes)
        .await
        .with_context(|| format!("Failed to write {}", out))?;

    info!(
        "Wrote {}x{} snapshot ({} bytes) to {}",
        image.width,
        image.height,
        image.len(),
        out
    );
    println!("✓ Snapshot saved to {}", out);
    Ok(())
}

#[cfg(all(target_os = "linux", feature = "camera"))]
fn camera_provider(config: &SurveycamConfig) -> Result<Arc<dyn DeviceProvider>> {
    let provider = surveycam::GstDeviceProvider::new(config.camera.clone())?;
    Ok(Arc::new(provider))
}

#[cfg(not(all(target_os = "linux", feature = "camera")))]
fn camera_provider(_config: &SurveycamConfig) -> Result<Arc<dyn DeviceProvider>> {
    anyhow::bail!("no camera backend: surveycam was built without the `camera` feature")
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("surveycam={},tower_http={}", log_level, log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Surveycam Configuration File");
    println!("# This is the default configuration with all available options");
    println!("#");
    println!("# API tokens are listed as:");
    println!("# [[auth.tokens]]");
    println!("# token = \"change-me\"");
    println!("# user_id = 1");
    println!("# username = \"surveyor\"");
    println!("# admin = false");
    println!();

    let rendered = toml::to_string_pretty(&SurveycamConfig::default())
        .context("Failed to render default configuration")?;
    println!("{}", rendered);
    Ok(())
}
