//! SourceBridge Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Credential`, `RemoteFile`, `DownloadedFile`, `UploadTask`, `BatchResult`
//! - **Use cases** - `ProviderConnector`, `ListFilesUseCase`, `DownloadFilesUseCase`
//! - **Port definitions** - Traits for adapters: `IStorageProvider`, `IOAuthFlow`,
//!   `ICredentialStore`, `IObjectStorage`, `IIndexingService`, `INotificationService`
//! - **Configuration** - YAML-backed [`config::Config`]
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement.
//! Use cases orchestrate domain entities through port interfaces.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
