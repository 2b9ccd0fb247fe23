mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "imstack", about = "Load image stacks with flat and dark reference frames")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the image formats this build can read
    Formats,
    /// Show the shape and pixel type of an image file
    Info(commands::info::InfoArgs),
    /// Load a sample stack with optional flat and dark frames
    Load(commands::load::LoadArgs),
    /// Print a default loader config (TOML)
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Formats => commands::formats::run(),
        Commands::Info(args) => commands::info::run(args),
        Commands::Load(args) => commands::load::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
