//! trip-tally CLI
//!
//! Scans receipt photos and prints the extracted fields as JSON. Stands in
//! for the web upload glue: it feeds images to the core pipeline and hands
//! the results to whatever wants to store them.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use trip_tally::config::{self, AppConfig};
use trip_tally::ocr::OcrLine;
use trip_tally::parse::ParsedFields;
use trip_tally::{Pipeline, ReceiptScan};

/// trip-tally - receipt scanner
#[derive(Parser, Debug)]
#[command(name = "trip-tally")]
#[command(about = "Rectify receipt photos, run cloud OCR, and extract fields")]
struct Args {
    /// Receipt image files to scan (jpg/png/webp/bmp/tiff)
    #[arg(required_unless_present = "show_config")]
    images: Vec<PathBuf>,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Recognition service endpoint (overrides config and environment)
    #[arg(long)]
    endpoint: Option<String>,

    /// Recognition service access key (overrides config and environment)
    #[arg(long)]
    key: Option<String>,

    /// Directory to save the rectified and binarized images into
    #[arg(long)]
    save_processed: Option<PathBuf>,

    /// Print the resolved configuration (key masked) and exit
    #[arg(long)]
    show_config: bool,
}

/// Per-image report printed as JSON.
#[derive(Serialize)]
struct ScanReport {
    file: String,
    quad_detected: bool,
    fields: ParsedFields,
    lines: Vec<OcrLine>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = resolve_config(&args)?;

    if args.show_config {
        print_config(&config);
        return Ok(());
    }

    if !config.ocr.is_configured() {
        bail!(
            "recognition service is not configured; set {} and {} or pass --endpoint/--key",
            config::ENDPOINT_ENV,
            config::KEY_ENV
        );
    }

    let pipeline = Pipeline::new(config)?;

    // Each scan's poll loop suspends independently, so the images are
    // processed concurrently on one runtime.
    let scans = futures_util::future::join_all(
        args.images
            .iter()
            .map(|path| scan_one(&pipeline, path, args.save_processed.as_deref())),
    )
    .await;

    let mut failures = 0;
    for (path, outcome) in args.images.iter().zip(scans) {
        match outcome {
            Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
            Err(err) => {
                failures += 1;
                eprintln!("{}: {err:#}", path.display());
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} images failed", args.images.len());
    }
    Ok(())
}

async fn scan_one(
    pipeline: &Pipeline,
    path: &Path,
    save_dir: Option<&Path>,
) -> Result<ScanReport> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;

    info!("scanning {}", path.display());
    let scan = pipeline
        .process(&bytes)
        .await
        .with_context(|| format!("scanning {}", path.display()))?;

    if let Some(dir) = save_dir {
        save_processed(dir, path, &scan)
            .with_context(|| format!("saving processed images to {}", dir.display()))?;
    }

    Ok(ScanReport {
        file: path.display().to_string(),
        quad_detected: scan.quad_detected,
        fields: scan.fields,
        lines: scan.lines,
    })
}

/// Load the config file, then layer environment and CLI overrides on top.
fn resolve_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => config::load_config(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => load_or_create_default_config(),
    };

    config.ocr.apply_overrides(
        std::env::var(config::ENDPOINT_ENV).ok(),
        std::env::var(config::KEY_ENV).ok(),
    );
    config
        .ocr
        .apply_overrides(args.endpoint.clone(), args.key.clone());

    Ok(config)
}

fn load_or_create_default_config() -> AppConfig {
    if let Ok(config_dir) = config::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            if let Ok(config) = config::load_config(&config_path) {
                info!("Loaded configuration from {:?}", config_path);
                return config;
            }
        }
    }
    info!("Using default configuration");
    AppConfig::default()
}

fn print_config(config: &AppConfig) {
    let masked_key = if config.ocr.key.len() > 4 {
        format!("***{}", &config.ocr.key[config.ocr.key.len() - 4..])
    } else if config.ocr.key.is_empty() {
        "NOT SET".to_string()
    } else {
        "***".to_string()
    };

    let endpoint = if config.ocr.endpoint.is_empty() {
        "NOT SET"
    } else {
        config.ocr.endpoint.as_str()
    };
    println!("endpoint:       {endpoint}");
    println!("key:            {masked_key}");
    println!("api version:    {}", config.ocr.api_version);
    println!("poll interval:  {:?}", config.ocr.poll_interval());
    println!("poll budget:    {:?}", config.ocr.max_poll_duration());
}

/// Save the rectified/binarized images next to the report when requested.
fn save_processed(dir: &Path, source: &Path, scan: &ReceiptScan) -> Result<()> {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "receipt".to_string());
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join(format!("{stem}_rectified.png")), &scan.rectified_png)?;
    std::fs::write(dir.join(format!("{stem}_binarized.png")), &scan.binarized_png)?;
    Ok(())
}
