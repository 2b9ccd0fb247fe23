use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use imstack_core::frame::{DType, ImageFormat, ReferenceFrame};
use imstack_core::io::fits::write_fits;
use imstack_core::io::image_io::save_preview;
use imstack_core::io::registry::DecoderRegistry;
use imstack_core::loader::{LoadedStack, Loader, LoaderConfig};
use imstack_core::progress::ProgressSink;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use crate::summary::print_load_summary;

#[derive(Args)]
pub struct LoadArgs {
    /// Sample directory, or any file inside it
    #[arg(short, long)]
    pub sample: Option<PathBuf>,

    /// Loader config file (TOML); replaces the other load options
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Flat-field directory
    #[arg(long)]
    pub flat: Option<PathBuf>,

    /// Dark-field directory
    #[arg(long)]
    pub dark: Option<PathBuf>,

    /// Image format token (fits, fit, tif, tiff, ser, nxs)
    #[arg(short, long, default_value = "fits")]
    pub format: ImageFormat,

    /// Element type of the sample stack
    #[arg(long, default_value = "float32")]
    pub dtype: DType,

    /// Worker threads for multi-frame sources
    #[arg(short, long, default_value = "1")]
    pub workers: usize,

    /// Frames per worker task
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Write the sample stack as FITS
    #[arg(long)]
    pub save_sample: Option<PathBuf>,

    /// Write the averaged flat (.fits, .png or .tiff)
    #[arg(long)]
    pub save_flat: Option<PathBuf>,

    /// Write the averaged dark (.fits, .png or .tiff)
    #[arg(long)]
    pub save_dark: Option<PathBuf>,
}

pub fn run(args: &LoadArgs) -> Result<()> {
    let config = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        toml::from_str(&contents).context("Invalid loader config")?
    } else {
        build_config_from_args(args)?
    };

    debug!(?config, "Loader config");

    let registry = DecoderRegistry::with_defaults();
    debug!(?registry, "Registered decoders");
    let progress = BarProgress::new()?;
    let loader = Loader::new(&registry, &progress);

    let start = Instant::now();
    let loaded = loader.load_dynamic(&config)?;
    let elapsed = start.elapsed();

    print_load_summary(&config, &loaded, elapsed);

    if let Some(ref path) = args.save_sample {
        save_sample(&loaded, path)?;
        println!("Sample saved to {}", path.display());
    }
    if let Some(ref path) = args.save_flat {
        let flat = loaded.flat().context("No flat frame was loaded")?;
        save_reference(flat, path)?;
        println!("Flat saved to {}", path.display());
    }
    if let Some(ref path) = args.save_dark {
        let dark = loaded.dark().context("No dark frame was loaded")?;
        save_reference(dark, path)?;
        println!("Dark saved to {}", path.display());
    }

    Ok(())
}

fn build_config_from_args(args: &LoadArgs) -> Result<LoaderConfig> {
    let sample = args
        .sample
        .clone()
        .context("--sample is required unless --config is given")?;

    let mut config = LoaderConfig::new(sample, args.format)
        .with_dtype(args.dtype)
        .with_workers(args.workers, args.chunk_size);
    if let Some(ref flat) = args.flat {
        config = config.with_flat(flat);
    }
    if let Some(ref dark) = args.dark {
        config = config.with_dark(dark);
    }
    Ok(config)
}

fn is_fits(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("fits" | "fit" | "fts")
    )
}

fn save_sample(loaded: &LoadedStack, path: &Path) -> Result<()> {
    match loaded {
        LoadedStack::Uint8(r) => write_fits(path, &r.sample)?,
        LoadedStack::Uint16(r) => write_fits(path, &r.sample)?,
        LoadedStack::Int16(r) => write_fits(path, &r.sample)?,
        LoadedStack::Int32(r) => write_fits(path, &r.sample)?,
        LoadedStack::Float32(r) => write_fits(path, &r.sample)?,
        LoadedStack::Float64(r) => write_fits(path, &r.sample)?,
    }
    Ok(())
}

fn save_reference(frame: &ReferenceFrame, path: &Path) -> Result<()> {
    if is_fits(path) {
        write_fits(path, frame)?;
    } else {
        save_preview(frame, path)?;
    }
    Ok(())
}

/// Progress bar fed by the loader, one bar per phase.
struct BarProgress {
    style: ProgressStyle,
    bar: Mutex<Option<ProgressBar>>,
}

impl BarProgress {
    fn new() -> Result<Self> {
        let style = ProgressStyle::default_bar()
            .template("{msg:20} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> ");
        Ok(Self {
            style,
            bar: Mutex::new(None),
        })
    }
}

impl ProgressSink for BarProgress {
    fn init(&self, total_steps: usize, label: &str) {
        let bar = ProgressBar::new(total_steps as u64);
        bar.set_style(self.style.clone());
        bar.set_message(label.to_string());
        if let Ok(mut current) = self.bar.lock() {
            *current = Some(bar);
        }
    }

    fn advance(&self, n: usize) {
        if let Ok(current) = self.bar.lock() {
            if let Some(bar) = current.as_ref() {
                bar.inc(n as u64);
            }
        }
    }

    fn close(&self) {
        if let Ok(mut current) = self.bar.lock() {
            if let Some(bar) = current.take() {
                bar.finish();
            }
        }
    }
}
