//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IStorageProvider`] - Listing and downloading files from a provider (Dropbox, Google Drive)
//! - [`IOAuthFlow`] - Interactive authorization producing a [`Credential`](crate::domain::Credential)
//! - [`ICredentialStore`] - Persistent storage for provider credentials
//! - [`IObjectStorage`] / [`IIndexingService`] - The ingestion backend
//! - [`INotificationService`] - User-facing notifications and progress

pub mod credential_store;
pub mod ingestion;
pub mod notification;
pub mod oauth;
pub mod storage_provider;

pub use credential_store::{ICredentialStore, InMemoryCredentialStore};
pub use ingestion::{IIndexingService, IObjectStorage, IndexingRequest, StoredObject, UploadContext};
pub use notification::{
    INotificationService, Notification, NotificationAction, NotificationPriority,
    NotificationTopic,
};
pub use oauth::IOAuthFlow;
pub use storage_provider::IStorageProvider;
