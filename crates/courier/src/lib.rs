pub mod cli;
pub mod config;
pub mod service;

pub use cli::{Cli, Mode};
pub use config::CourierConfig;
