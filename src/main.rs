use abuser_recurrence_forecast::{
    analytics::{render, ReportFilter, ReportFormat, DEFAULT_MIN_SEVERITY},
    config::Config,
    pipeline::{ForecastRun, Pipeline},
    store::{CsvIncidentStore, StagedArtifact},
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "recurrence-forecast")]
#[command(about = "Per-abuser incident metrics and next-incident forecasts", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file layered over the built-in defaults
    #[arg(short, long, global = true, env = "RECURRENCE_CONFIG")]
    config: Option<PathBuf>,

    /// Incident table (CSV)
    #[arg(short, long, global = true)]
    incidents: Option<PathBuf>,

    /// Metrics table location
    #[arg(long, global = true)]
    metrics_output: Option<PathBuf>,

    /// Forecast table location
    #[arg(long, global = true)]
    forecast_output: Option<PathBuf>,

    /// Write Prometheus metrics in text format to this file after the run
    #[arg(long, global = true)]
    metrics_export: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the per-abuser metrics table
    Metrics,

    /// Train on incidents plus an existing metrics table and write forecasts
    Forecast,

    /// Compute metrics and forecasts, writing both tables together
    Run,

    /// Summarize high-risk abusers from the persisted tables
    Report {
        /// Restrict to one oblast
        #[arg(short, long)]
        oblast: Option<String>,

        /// Minimum severity for a case to count as high risk
        #[arg(short = 's', long, default_value_t = DEFAULT_MIN_SEVERITY)]
        min_severity: u8,

        /// Output format: markdown or json
        #[arg(short, long, default_value = "markdown")]
        format: ReportFormat,

        /// Write the report to a file instead of stdout
        #[arg(short = 'O', long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(path) = cli.incidents {
        config.paths.incidents = path;
    }
    if let Some(path) = cli.metrics_output {
        config.paths.metrics_output = path;
    }
    if let Some(path) = cli.forecast_output {
        config.paths.forecast_output = path;
    }
    if let Some(path) = cli.metrics_export {
        config.paths.metrics_export = Some(path);
    }
    config.validate().context("Invalid configuration")?;

    init_tracing(&config);
    tracing::info!(
        "Starting recurrence-forecast v{}",
        env!("CARGO_PKG_VERSION")
    );

    if config.observability.prometheus_enabled {
        if let Err(e) = abuser_recurrence_forecast::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
        }
    }

    let store = CsvIncidentStore::new(&config.paths.incidents);
    let pipeline = Pipeline::new(config);

    match cli.command {
        Commands::Metrics => {
            let metrics = pipeline
                .run_metrics(&store)
                .context("Metrics run failed")?;
            println!(
                "Wrote {} abuser rows to {}",
                metrics.len(),
                pipeline.config().paths.metrics_output.display()
            );
        }
        Commands::Forecast => {
            let forecast = pipeline
                .run_forecast(&store)
                .context("Forecast run failed")?;
            print_forecast_summary(&pipeline, &forecast)?;
        }
        Commands::Run => {
            let output = pipeline.run(&store).context("Pipeline run failed")?;
            println!(
                "Wrote {} abuser rows to {}",
                output.metrics.len(),
                pipeline.config().paths.metrics_output.display()
            );
            print_forecast_summary(&pipeline, &output.forecast)?;
        }
        Commands::Report {
            oblast,
            min_severity,
            format,
            output,
        } => {
            let filter = ReportFilter {
                oblast,
                min_severity,
            };
            let report = pipeline
                .report(&store, &filter)
                .context("Failed to build report")?;
            let rendered = render(&report, format)?;

            match output {
                Some(path) => {
                    StagedArtifact::from_bytes(&path, rendered.as_bytes())?
                        .commit()
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }
                None => println!("{}", rendered),
            }
        }
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    if config.observability.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_forecast_summary(pipeline: &Pipeline, forecast: &ForecastRun) -> anyhow::Result<()> {
    println!(
        "Wrote {} forecasts to {}",
        forecast.forecasts.len(),
        pipeline.config().paths.forecast_output.display()
    );
    if !forecast.unseen_categories.is_empty() {
        println!(
            "{} category values were unseen during training and used the unknown code",
            forecast.unseen_categories.len()
        );
    }
    println!("{}", serde_json::to_string_pretty(&forecast.training)?);
    Ok(())
}
