pub mod consts;
pub mod error;
pub mod frame;
pub mod io;
pub mod loader;
pub mod progress;
pub mod stack;
