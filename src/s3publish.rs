use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use s3_publish::s3::{S3Client, UploadResult, UploadStatus};
use s3_publish::{Config, Dispatcher, Matcher, RunReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "s3publish",
    version = env!("CARGO_PKG_VERSION"),
    about = "Upload files matching a glob pattern to an S3 bucket in parallel",
    long_about = "Mirrors local files selected by a glob pattern (with exclusions) into an S3 or \
                  S3-compatible bucket. Uploads run on a fixed pool of workers; a failed file never \
                  stops the others, and the exit status is non-zero if any upload failed. \
                  Configure via PLUGIN_* environment variables or a .env file; flags override them.",
    after_help = "Examples:\n  \
                  s3publish --source 'dist/**' --strip-prefix dist/ --target site\n  \
                  s3publish --source 'build/*.{tar.gz,zip}' --exclude 'build/*-debug.*'\n  \
                  s3publish --source release/app.zip --target-key latest/app.zip --checksum\n\n\
                  Configuration (.env):\n  \
                  PLUGIN_BUCKET=my-bucket\n  \
                  PLUGIN_REGION=us-west-2\n  \
                  PLUGIN_ENDPOINT=http://minio:9000\n  \
                  PLUGIN_PATH_STYLE=true\n  \
                  PLUGIN_ACCESS_KEY=...\n  \
                  PLUGIN_SECRET_KEY=..."
)]
struct Cli {
    /// Glob pattern selecting files to upload (overrides PLUGIN_SOURCE)
    #[arg(long, short = 's')]
    source: Option<String>,

    /// Glob pattern to exclude, repeatable (overrides PLUGIN_EXCLUDE)
    #[arg(long, short = 'x')]
    exclude: Vec<String>,

    /// Key prefix in the bucket (overrides PLUGIN_TARGET)
    #[arg(long, short = 't')]
    target: Option<String>,

    /// Upload every matched file to this exact key (single-file rename)
    #[arg(long)]
    target_key: Option<String>,

    /// Prefix removed from local paths before building keys
    #[arg(long)]
    strip_prefix: Option<String>,

    /// Number of concurrent uploads (0 = number of CPUs)
    #[arg(long, short = 'p')]
    parallel: Option<usize>,

    /// Show what would be uploaded without uploading
    #[arg(long)]
    dry_run: bool,

    /// Send a Content-MD5 checksum with each upload
    #[arg(long)]
    checksum: bool,

    /// Result output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Hide the progress bar
    #[arg(long, short = 'q')]
    quiet: bool,
}

impl Cli {
    /// Apply flags on top of the environment configuration
    fn apply(&self, config: &mut Config) {
        if let Some(source) = &self.source {
            config.source = source.clone();
        }
        if !self.exclude.is_empty() {
            config.exclude = self.exclude.clone();
        }
        if let Some(target) = &self.target {
            config.target = target.clone();
        }
        if let Some(key) = &self.target_key {
            config.target_key = Some(key.clone());
        }
        if let Some(strip) = &self.strip_prefix {
            config.strip_prefix = strip.clone();
        }
        if let Some(parallel) = self.parallel {
            config.parallel = parallel;
        }
        config.dry_run |= self.dry_run;
        config.checksum |= self.checksum;
    }
}

/// One JSON line per upload result
#[derive(Serialize)]
struct ReportLine<'a> {
    path: &'a str,
    key: Option<&'a str>,
    status: &'static str,
    elapsed_ms: u64,
    error: Option<String>,
}

impl<'a> From<&'a UploadResult> for ReportLine<'a> {
    fn from(result: &'a UploadResult) -> Self {
        Self {
            path: &result.path,
            key: result.key.as_deref(),
            status: result.status.as_str(),
            elapsed_ms: result.elapsed.as_millis() as u64,
            error: result.error.as_ref().map(|e| e.to_string()),
        }
    }
}

#[derive(Serialize)]
struct SummaryLine {
    total: usize,
    succeeded: usize,
    failed: usize,
    elapsed_ms: u64,
    success: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file early to get LOG_LEVEL
    dotenv::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("S3 Publish v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::from_env()?;
    cli.apply(&mut config);
    config.validate()?;

    let text = cli.format == OutputFormat::Text;

    let matches = Matcher::new(config.source.clone(), config.exclude.clone())
        .resolve()
        .map_err(|e| anyhow::anyhow!(e.user_message()))
        .context("Could not match files")?;

    let upload_config = config.upload_config();

    if text {
        println!(
            "{}",
            style(format!(
                "📦 Attempting to upload files, region: {}, bucket: {}",
                config.region, config.bucket
            ))
            .cyan()
            .bold()
        );
        if matches.is_empty() {
            println!(
                "{}",
                style(format!("No files matched {}", config.source)).yellow()
            );
        }
        for path in &matches {
            println!("{:<48} --> {}", path, upload_config.keys.derive_key(path));
        }
        if config.dry_run {
            println!(
                "{}",
                style("🔍 DRY RUN MODE - No files will be uploaded")
                    .yellow()
                    .bold()
            );
        }
        println!();
    }

    let client = S3Client::new(&config).await?;
    let mut dispatcher = Dispatcher::new(Arc::new(client), upload_config);

    let progress = if text && !cli.quiet {
        let pb = ProgressBar::new(matches.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        dispatcher = dispatcher.with_progress(pb.clone());
        Some(pb)
    } else {
        None
    };

    let cancel = dispatcher.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight uploads and skipping the rest");
            cancel.cancel();
        }
    });

    let report = dispatcher.run(matches).await;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    if text {
        print_text_report(&report);
    } else {
        print_json_report(&report)?;
    }

    if !report.is_success() {
        anyhow::bail!(
            "{} of {} upload(s) failed",
            report.failed(),
            report.results.len()
        );
    }

    Ok(())
}

fn print_text_report(report: &RunReport) {
    println!();
    for result in &report.results {
        let key = result.key.as_deref().unwrap_or("-");
        let elapsed = style(format!("{:.2?}", result.elapsed)).dim();
        match result.status {
            UploadStatus::Uploaded => {
                println!("{} {:<48} → {} {}", style("✓").green(), result.path, key, elapsed)
            }
            UploadStatus::DryRun => println!(
                "{} {:<48} → {} {}",
                style("~").yellow(),
                result.path,
                key,
                style("(dry run)").dim()
            ),
            UploadStatus::SkippedDirectory => println!(
                "{} {:<48} {}",
                style("↻").dim(),
                style(&result.path).dim(),
                style("(directory)").dim()
            ),
            UploadStatus::Failed => {
                let message = result
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                println!(
                    "{} {:<48} {} {}",
                    style("✗").red(),
                    style(&result.path).red(),
                    elapsed,
                    style(message).red()
                );
            }
        }
    }

    println!("\n{}", style("═".repeat(70)).dim());
    println!(
        "{}",
        style(format!(
            "Summary: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        ))
        .bold()
    );
    println!(
        "{}",
        style(format!("Time: {:.2}s", report.elapsed.as_secs_f64())).dim()
    );
}

fn print_json_report(report: &RunReport) -> Result<()> {
    for result in &report.results {
        println!("{}", serde_json::to_string(&ReportLine::from(result))?);
    }

    let summary = SummaryLine {
        total: report.results.len(),
        succeeded: report.succeeded(),
        failed: report.failed(),
        elapsed_ms: report.elapsed.as_millis() as u64,
        success: report.is_success(),
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
