use anyhow::Result;
use imstack_core::frame::ImageFormat;
use imstack_core::io::registry::{DecoderRegistry, Ingestion};

pub fn run() -> Result<()> {
    let registry = DecoderRegistry::with_defaults();

    for format in ImageFormat::ALL {
        match registry.ingestion(format) {
            Ok(Ingestion::PerFile(decoder)) => {
                println!("  {:<6}{} (one image or stack per file)", format, decoder.name());
            }
            Ok(Ingestion::Container(decoder)) => {
                println!("  {:<6}{} (sample, flat and dark in one file)", format, decoder.name());
            }
            Err(_) => println!("  {:<6}not available in this build", format),
        }
    }

    Ok(())
}
