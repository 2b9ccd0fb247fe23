pub mod config;
pub mod facade;

pub use config::LoaderConfig;
pub use facade::{LoadedStack, Loader};
