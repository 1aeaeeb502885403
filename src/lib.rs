pub mod config;
pub mod dataset;
pub mod errors;
pub mod loader;
pub mod utils;
