use anyhow::{Context, Result};
use devdb::cli::commands::{ConfigCommand, UpCommand};
use devdb::cli::output::{style, ConsoleReporter, INFO};
use devdb::cli::terminal_output::TerminalLogSink;
use devdb::cli::{Cli, Command};
use devdb::core::PipelineConfig;
use devdb::execution::DeploymentPipeline;
use devdb::tooling::{ComposeOrchestrator, DockerImageBuilder};
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Up(cmd) => run_up(cmd, &cli).await,
        Command::Config(cmd) => show_config(cmd, &cli),
    }
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    PipelineConfig::load(cli.config.as_deref().map(Path::new))
        .context("Failed to load configuration")
}

async fn run_up(cmd: &UpCommand, cli: &Cli) -> Result<ExitCode> {
    let config = cmd.apply(load_config(cli)?);
    config.validate().context("Invalid configuration")?;
    debug!("Resolved configuration: {:?}", config);

    let reporter = Arc::new(ConsoleReporter::new());

    let builder = DockerImageBuilder::from_config(&config.tooling).with_progress(reporter.clone());
    let orchestrator = ComposeOrchestrator::from_config(&config.tooling);
    let mut pipeline = DeploymentPipeline::new(builder, orchestrator);
    pipeline.add_event_handler(move |event| reporter.handle(&event));

    let sink = TerminalLogSink::new(cmd.timestamps);

    // Polled only once following starts; until then SIGINT keeps its default behaviour
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for interrupts: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let status = pipeline.run_to_exit(&config, &sink, shutdown).await;
    Ok(status.into())
}

fn show_config(cmd: &ConfigCommand, cli: &Cli) -> Result<ExitCode> {
    let config = load_config(cli)?;
    let mut out = std::io::stdout().lock();

    if cmd.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&config)?)?;
    } else {
        writeln!(out, "{} Resolved configuration:", INFO)?;
        writeln!(out, "  Image: {}", style(&config.image_tag).bold())?;
        writeln!(out, "  Dockerfile: {}", style(config.dockerfile.display()).cyan())?;
        writeln!(out, "  Context: {}", style(config.build_context.display()).cyan())?;
        writeln!(out, "  Service: {}", style(&config.service_name).bold())?;
        writeln!(out, "  Compose: {}", style(config.tooling.compose.join(" ")).dim())?;
        if let Some(file) = &config.tooling.compose_file {
            writeln!(out, "  Compose file: {}", style(file.display()).dim())?;
        }
        writeln!(
            out,
            "  Stream errors: {}",
            style(format!("{:?}", config.stream_error_policy).to_lowercase()).dim()
        )?;
    }

    Ok(ExitCode::SUCCESS)
}
