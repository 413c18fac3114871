pub mod cli;
pub mod config;
pub mod error;
pub mod paths;
pub mod pdf;
pub mod pipeline;
pub mod server;
pub mod services;
