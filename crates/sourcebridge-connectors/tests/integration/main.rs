//! Integration tests for sourcebridge-connectors
//!
//! Uses wiremock to simulate the Dropbox and Google Drive APIs, the OAuth
//! token endpoint and the ingestion backend, and verifies the adapters
//! end to end over real HTTP.


mod test_auth;
mod test_backend;
mod test_dropbox;
mod test_gdrive;
