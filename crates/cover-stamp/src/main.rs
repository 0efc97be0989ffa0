//! cover-stamp: prepend a fixed cover image to PDF and EPUB files.
//!
//! `cover-stamp book.epub` writes `modified_book.epub` next to the input,
//! using the cover image named in the config (default `./cover.jpg`).

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use cover_core::asset::CoverAsset;
use cover_core::dispatch;
use cover_core::document::{DocumentFormat, SourceDocument};
use cover_core::error::CoverError;
use cover_core::options::Settings;
use cover_core::pipeline::{Pipeline, PipelineBuilder};
use cover_epub::EpubCoverInserter;
use cover_pdf::PdfCoverInserter;

#[derive(Parser, Debug)]
#[command(
    name = "cover-stamp",
    version,
    about = "Prepend a cover image to PDF and EPUB files"
)]
struct Cli {
    /// Input document (PDF or EPUB)
    input: Option<PathBuf>,

    /// Output file (default: <prefix><input name> next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Cover image (JPEG or PNG)
    #[arg(long)]
    cover: Option<PathBuf>,

    /// Input format: pdf or epub (detected from the extension if omitted)
    #[arg(long)]
    format: Option<String>,

    /// Give up after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Title of the EPUB cover page and its TOC entry
    #[arg(long)]
    title: Option<String>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Dump effective merged config as TOML and exit
    #[arg(long)]
    dump_config: bool,
}

/// Global config first, then the project-local file.
fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("cover-stamp").join("config.toml"));
    }
    paths.push(PathBuf::from(".cover-stamp.toml"));
    paths
}

/// Load settings from TOML files. Later files override earlier ones;
/// missing files are silently ignored, unparsable ones are skipped with a warning.
fn load_config(paths: &[PathBuf]) -> Settings {
    let mut settings = Settings::default();

    for path in paths {
        let Ok(contents) = std::fs::read_to_string(path) else {
            continue;
        };
        match Settings::from_toml_str(&contents) {
            Ok(parsed) => {
                log::debug!("Loaded config from {}", path.display());
                settings = parsed;
            }
            Err(e) => log::warn!("Failed to parse {}: {}", path.display(), e),
        }
    }

    settings
}

/// Apply CLI flags on top of config-loaded settings.
fn apply_cli_overrides(settings: &mut Settings, cli: &Cli) {
    if cli.verbose > 0 {
        settings.verbose = cli.verbose;
    }
    if let Some(ref cover) = cli.cover {
        settings.cover_path = cover.clone();
    }
    if let Some(secs) = cli.timeout {
        settings.timeout_secs = secs;
    }
    if let Some(ref title) = cli.title {
        settings.cover_title = title.clone();
    }
}

fn main() {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let mut settings = load_config(&config_paths());
    apply_cli_overrides(&mut settings, &cli);

    if cli.dump_config {
        match settings.to_toml_string() {
            Ok(s) => {
                println!("{}", s);
                process::exit(0);
            }
            Err(e) => {
                eprintln!("Error serializing config: {}", e);
                process::exit(1);
            }
        }
    }

    let Some(input) = cli.input.as_deref() else {
        eprintln!("Usage: cover-stamp <input> [-o output] [--cover image] [options]");
        process::exit(2);
    };

    if let Err(e) = run(input, cli.output.as_deref(), cli.format.as_deref(), &settings) {
        match e.downcast_ref::<CoverError>() {
            Some(cover_err) => {
                if cover_err.is_internal() {
                    log::error!("{:#}", e);
                }
                eprintln!(
                    "Error ({:?}): {}",
                    cover_err.kind(),
                    cover_err.user_message(settings.max_detail_len)
                );
            }
            None => eprintln!("Error: {:#}", e),
        }
        process::exit(1);
    }
}

fn run(
    input: &Path,
    output: Option<&Path>,
    format_tag: Option<&str>,
    settings: &Settings,
) -> Result<PathBuf> {
    let format = detect_format(input, format_tag)?;

    // A broken cover is a setup problem; report it before touching the input.
    let cover = CoverAsset::load(&settings.cover_path)
        .with_context(|| format!("Invalid cover image {}", settings.cover_path.display()))?;
    log::info!(
        "Cover {}: {} {}x{}",
        settings.cover_path.display(),
        cover.format(),
        cover.width(),
        cover.height()
    );

    let pipeline = Arc::new(build_pipeline(Arc::new(cover), settings)?);

    let bytes =
        std::fs::read(input).with_context(|| format!("Cannot read {}", input.display()))?;
    let mut source = SourceDocument::new(bytes, format);
    if let Some(name) = input.file_name().and_then(|n| n.to_str()) {
        source = source.with_file_name(name);
    }

    log::info!("Stamping {} ({})", input.display(), format);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let result = runtime.block_on(dispatch::transform_with_timeout(
        pipeline,
        source,
        settings.timeout(),
    ));
    // A timed-out worker may still be running; don't wait for it.
    runtime.shutdown_background();
    let doc = result?;

    let out_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_file_name(&doc.file_name));
    write_atomically(&out_path, &doc.bytes)?;

    log::info!("Wrote {} ({} bytes)", out_path.display(), doc.bytes.len());
    Ok(out_path)
}

fn build_pipeline(cover: Arc<CoverAsset>, settings: &Settings) -> Result<Pipeline> {
    let pipeline = PipelineBuilder::new()
        .cover(cover)
        .inserter(Box::new(PdfCoverInserter))
        .inserter(Box::new(EpubCoverInserter::new(settings.cover_title.as_str())))
        .output_prefix(settings.output_prefix.as_str())
        .progress_reporter(Box::new(|frac, msg| {
            if frac < 1.0 {
                log::info!("[{:3.0}%] {}", frac * 100.0, msg);
            } else {
                log::info!("Done!");
            }
        }))
        .build()?;
    Ok(pipeline)
}

/// `--format` wins; otherwise the input's extension decides.
fn detect_format(input: &Path, format_tag: Option<&str>) -> Result<DocumentFormat> {
    if let Some(tag) = format_tag {
        return Ok(tag.parse::<DocumentFormat>()?);
    }
    input
        .extension()
        .and_then(|e| e.to_str())
        .and_then(DocumentFormat::from_extension)
        .ok_or_else(|| {
            CoverError::UnsupportedInputFormat(format!(
                "cannot detect format of {}; use --format",
                input.display()
            ))
            .into()
        })
}

/// Write through a temporary file in the destination directory, so a failed
/// run never leaves a partial output behind.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Cannot create a temporary file in {}", dir.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("Cannot write {}", path.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("Cannot flush {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("Cannot move output into place at {}", path.display()))?;
    Ok(())
}
