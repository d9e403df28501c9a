pub mod auth;
pub mod completions;
pub mod config;
pub mod files;
pub mod ingest;
