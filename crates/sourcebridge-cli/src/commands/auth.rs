//! Auth commands - Connect, disconnect, reconnect and status per provider
//!
//! Provides the `sourcebridge auth` CLI subcommands which:
//! 1. `connect`    - Runs the OAuth2 PKCE flow unless a stored credential
//!    already exists, and stores the result in the system keyring.
//! 2. `disconnect` - Clears the stored credential.
//! 3. `reconnect`  - Discards the credential and authorizes again.
//! 4. `status`     - Shows which providers are connected in the profile.

use anyhow::Result;
use clap::Subcommand;
use sourcebridge_core::domain::{Credential, ProviderKind};
use tracing::info;

use crate::{
    context::{parse_provider, AppContext},
    output::{get_formatter, print_hint, OutputFormat, OutputFormatter},
};

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Connect a provider account via OAuth2
    Connect {
        /// dropbox or google_drive
        #[arg(value_parser = parse_provider)]
        provider: ProviderKind,
    },
    /// Remove the stored credential
    Disconnect {
        #[arg(value_parser = parse_provider)]
        provider: ProviderKind,
    },
    /// Discard the credential and authorize again
    Reconnect {
        #[arg(value_parser = parse_provider)]
        provider: ProviderKind,
    },
    /// Show connection status for every provider
    Status,
}

impl AuthCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format.is_json());
        match self {
            AuthCommand::Connect { provider } => execute_connect(ctx, *provider, &*fmt).await,
            AuthCommand::Disconnect { provider } => execute_disconnect(ctx, *provider, &*fmt).await,
            AuthCommand::Reconnect { provider } => execute_reconnect(ctx, *provider, &*fmt).await,
            AuthCommand::Status => execute_status(ctx, &*fmt, format).await,
        }
    }
}

async fn execute_connect(
    ctx: &AppContext,
    provider: ProviderKind,
    fmt: &dyn OutputFormatter,
) -> Result<()> {
    let connector = ctx.connector(provider).await?;
    if connector.is_connected().await {
        fmt.success(&format!(
            "{} is already connected (profile '{}')",
            provider.display_name(),
            ctx.profile
        ));
        return Ok(());
    }

    fmt.info(&format!("Opening browser for {} authorization...", provider.display_name()));
    match connector.connect().await {
        Ok(credential) => {
            info!(provider = %provider, profile = %ctx.profile, "Connected");
            fmt.success(&format!("Connected to {}", provider.display_name()));
            print_expiry(fmt, &credential);
            Ok(())
        }
        Err(e) => {
            print_hint(fmt, &e, provider.as_str());
            Err(e.into())
        }
    }
}

async fn execute_disconnect(
    ctx: &AppContext,
    provider: ProviderKind,
    fmt: &dyn OutputFormatter,
) -> Result<()> {
    let connector = ctx.connector(provider).await?;
    connector.disconnect().await?;
    fmt.success(&format!("Disconnected from {}", provider.display_name()));
    Ok(())
}

async fn execute_reconnect(
    ctx: &AppContext,
    provider: ProviderKind,
    fmt: &dyn OutputFormatter,
) -> Result<()> {
    let connector = ctx.connector(provider).await?;
    fmt.info(&format!("Opening browser for {} authorization...", provider.display_name()));
    match connector.force_reconnect().await {
        Ok(credential) => {
            fmt.success(&format!("Reconnected to {}", provider.display_name()));
            print_expiry(fmt, &credential);
            Ok(())
        }
        Err(e) => {
            print_hint(fmt, &e, provider.as_str());
            Err(e.into())
        }
    }
}

async fn execute_status(
    ctx: &AppContext,
    fmt: &dyn OutputFormatter,
    format: OutputFormat,
) -> Result<()> {
    let mut entries = Vec::new();
    for provider in ProviderKind::ALL {
        let connector = ctx.connector(provider).await?;
        let credential = connector.credential().await;
        entries.push((provider, credential));
    }

    if format.is_json() {
        let providers: Vec<_> = entries
            .iter()
            .map(|(provider, credential)| {
                serde_json::json!({
                    "provider": provider.as_str(),
                    "connected": credential.is_some(),
                    "expires_at": credential.as_ref().and_then(Credential::expires_at),
                    "has_refresh_token": credential
                        .as_ref()
                        .is_some_and(|c| c.refresh_token().is_some()),
                })
            })
            .collect();
        fmt.print_json(&serde_json::json!({
            "profile": ctx.profile,
            "providers": providers,
        }));
        return Ok(());
    }

    fmt.info(&format!("Profile: {}", ctx.profile));
    for (provider, credential) in &entries {
        match credential {
            Some(credential) => {
                fmt.success(&format!("{}: connected", provider.display_name()));
                print_expiry(fmt, credential);
            }
            None => fmt.warn(&format!("{}: not connected", provider.display_name())),
        }
    }
    Ok(())
}

fn print_expiry(fmt: &dyn OutputFormatter, credential: &Credential) {
    if let Some(expires_at) = credential.expires_at() {
        let state = if credential.is_expired() {
            "expired"
        } else {
            "expires"
        };
        fmt.info(&format!(
            "Access token {state} {}",
            expires_at.format("%Y-%m-%d %H:%M UTC")
        ));
    }
}
