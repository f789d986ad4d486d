use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use phpshield::{report, Config, Engine, Task};

#[derive(Parser, Debug)]
#[command(name = "phpshield", version)]
#[command(about = "Static PHP webshell scanner with ML-assisted risk scoring")]
struct Args {
    /// Comma-separated files or directories to scan
    #[arg(long, value_delimiter = ',', required = true)]
    path: Vec<String>,

    /// Comma-separated files or directories to exclude
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Path to configuration file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output format (console, json, html); overrides the config file
    #[arg(long)]
    format: Option<String>,

    /// Report file path; the extension decides the format
    #[arg(long)]
    output: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output logs as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if args.json {
        subscriber.json().init();
    } else {
        subscriber.with_target(false).init();
    }

    let mut config = Config::load(&args.config);
    if let Some(format) = &args.format {
        config.output.format = format.clone();
    }

    let engine = Engine::new(config.clone())?;
    info!("active analyzers: {:?}", engine.analyzer_names());

    let task = Task {
        paths: args.path.iter().map(|p| p.trim().to_string()).collect(),
        exclusions: args.exclude.iter().map(|p| p.trim().to_string()).collect(),
        report_path: args.output.clone(),
        format: config.output.format.clone(),
    };

    let results = engine.scan(&task).await;

    let reporter = report::select(&task.format, task.report_path.as_deref());
    reporter.generate(&results, task.report_path.as_deref())?;
    if let Some(path) = &task.report_path {
        println!("Report generated: {}", path.display());
    }

    Ok(())
}
