//! Shared utilities for stock-analyst
//!
//! This crate provides common functionality used across the workspace:
//! tracing subscriber setup and `.env` / environment variable loading.

pub mod config;
pub mod logging;

pub use config::{env_or, load_dotenv};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
