//! Use cases (interactors) for SourceBridge
//!
//! This module contains the application use cases that orchestrate
//! domain entities and port interfaces. Use cases are thin coordinators
//! that delegate business rules to domain methods and I/O to ports.
//!
//! ## Use Cases
//!
//! - [`ProviderConnector`] - OAuth connection lifecycle for one provider
//! - [`ListFilesUseCase`] - Cached remote file listing
//! - [`DownloadFilesUseCase`] - Single and concurrent multi-file download

pub mod connect;
pub mod download;
pub mod list_files;


pub use connect::ProviderConnector;
pub use download::{DownloadFilesUseCase, DownloadReport};
pub use list_files::ListFilesUseCase;
