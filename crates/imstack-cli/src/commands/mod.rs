pub mod config;
pub mod formats;
pub mod info;
pub mod load;
