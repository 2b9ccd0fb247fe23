use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use imstack_core::frame::ImageFormat;
use imstack_core::io::enumerate::get_file_names;
use imstack_core::io::registry::{DecoderRegistry, Ingestion};

#[derive(Args)]
pub struct InfoArgs {
    /// Image directory, or any file inside it
    pub path: PathBuf,

    /// Format token; defaults to the extension of `path`
    #[arg(short, long)]
    pub format: Option<ImageFormat>,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let format = match args.format {
        Some(format) => format,
        None => args
            .path
            .extension()
            .and_then(|e| e.to_str())
            .context("Cannot infer the format from the path; pass --format")?
            .parse::<ImageFormat>()
            .map_err(anyhow::Error::msg)?,
    };

    let registry = DecoderRegistry::with_defaults();
    let ingestion = registry.ingestion(format)?;
    let files = get_file_names(&args.path, format.extension())?;
    let first = &files[0];

    println!("Format:      {}", format);
    println!("Files:       {}", files.len());
    for file in &files {
        println!("  {}", file.display());
    }

    match ingestion {
        Ingestion::PerFile(decoder) => {
            let shape = decoder.probe(first)?;
            println!("Decoder:     {}", decoder.name());
            println!("First shape: {}", shape);
            if shape.is_stack() && files.len() > 1 {
                println!("Note:        only the first file is loaded for stacked input");
            }
        }
        Ingestion::Container(decoder) => {
            let source = decoder.open(first)?;
            let frame = source.frame_shape();
            println!("Decoder:     {}", decoder.name());
            println!("Frames:      {}", source.frame_count());
            println!("Frame shape: {}", frame);
            if source.frame_count() > 0 {
                println!("Pixel type:  {}", source.frame(0)?.type_name());
            }
        }
    }

    Ok(())
}
