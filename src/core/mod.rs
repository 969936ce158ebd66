pub mod cancel;
pub mod config;
pub mod dataset;
pub mod download;
pub mod extract;
pub mod progress;
pub mod registry;
