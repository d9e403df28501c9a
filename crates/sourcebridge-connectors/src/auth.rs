//! OAuth2 PKCE authentication flow for Dropbox and Google Drive
//!
//! Implements the Authorization Code flow with PKCE (RFC 7636) for native
//! applications. The consent page redirects to a loopback server owned by
//! this process, so no client secret or hosted redirect page is required.
//!
//! ## Components
//!
//! - [`OAuth2Config`] - Endpoints, client id and scopes for one provider
//! - [`PKCEFlow`] - OAuth2 PKCE challenge/exchange logic
//! - [`LocalCallbackServer`] - Minimal HTTP server for the OAuth redirect
//! - [`PkceAuthorizer`] - [`IOAuthFlow`] implementation tying it together
//! - [`KeyringCredentialStore`] - [`ICredentialStore`] backed by the system keyring

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use http_body_util::Full;
use hyper::{
    body::Bytes,
    header::{HeaderValue, CONTENT_TYPE},
    server::conn::http1,
    service::service_fn,
    Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken,
    Scope, TokenResponse, TokenUrl,
};
use sourcebridge_core::{
    config::{AuthConfig, Config, ProviderConfig},
    domain::{Credential, IngestError, ProviderKind},
    ports::{ICredentialStore, IOAuthFlow},
};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
};
use tracing::{debug, info, warn};

/// Keyring service name for storing credentials
const KEYRING_SERVICE: &str = "sourcebridge";

/// Path the provider redirects to
const CALLBACK_PATH: &str = "/callback";

// ============================================================================
// OAuth2Config
// ============================================================================

/// Configuration for one provider's OAuth2 PKCE flow
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    pub provider: ProviderKind,
    /// Application (client) ID registered with the provider
    pub client_id: String,
    /// Client secret, only for applications registered as confidential
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    /// OAuth scopes to request
    pub scopes: Vec<String>,
    /// Extra authorization parameters, e.g. `token_access_type=offline`
    pub extra_params: Vec<(String, String)>,
    /// Loopback port; `0` lets the OS choose
    pub callback_port: u16,
    /// How long to wait for the redirect
    pub callback_timeout: Duration,
    /// Open the consent page in the system browser
    pub open_browser: bool,
}

impl OAuth2Config {
    /// Dropbox settings: offline access so a refresh token is issued
    pub fn dropbox(client_id: impl Into<String>) -> Self {
        Self::from_section(
            ProviderKind::Dropbox,
            client_id.into(),
            &ProviderConfig::dropbox(),
            &AuthConfig::default(),
        )
    }

    /// Google settings: offline access with forced consent so a refresh
    /// token is issued on every authorization
    pub fn google_drive(client_id: impl Into<String>) -> Self {
        Self::from_section(
            ProviderKind::GoogleDrive,
            client_id.into(),
            &ProviderConfig::google_drive(),
            &AuthConfig::default(),
        )
    }

    /// Builds the flow configuration for `provider` from the application config
    ///
    /// # Errors
    /// `MissingConfiguration` when the provider section has no client id.
    pub fn from_config(provider: ProviderKind, config: &Config) -> Result<Self, IngestError> {
        let section = config.provider(provider);
        let client_id = section
            .client_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                IngestError::MissingConfiguration(format!(
                    "{}.client_id is not set",
                    provider.as_str()
                ))
            })?;
        Ok(Self::from_section(provider, client_id, section, &config.auth))
    }

    fn from_section(
        provider: ProviderKind,
        client_id: String,
        section: &ProviderConfig,
        auth: &AuthConfig,
    ) -> Self {
        let extra_params = match provider {
            ProviderKind::Dropbox => vec![("token_access_type", "offline")],
            ProviderKind::GoogleDrive => vec![("access_type", "offline"), ("prompt", "consent")],
        };
        Self {
            provider,
            client_id,
            client_secret: section.client_secret.clone(),
            auth_url: section.auth_url.clone(),
            token_url: section.token_url.clone(),
            scopes: section.scopes.clone(),
            extra_params: extra_params
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            callback_port: auth.callback_port,
            callback_timeout: Duration::from_secs(auth.callback_timeout_secs),
            open_browser: auth.open_browser,
        }
    }

    /// Overrides the token endpoint
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn with_callback_port(mut self, port: u16) -> Self {
        self.callback_port = port;
        self
    }

    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    pub fn with_open_browser(mut self, open: bool) -> Self {
        self.open_browser = open;
        self
    }
}

// ============================================================================
// PKCEFlow
// ============================================================================

/// OAuth2 PKCE flow implementation using the `oauth2` crate
///
/// Handles generating authorization URLs with PKCE challenges and
/// exchanging authorization codes for credentials.
pub struct PKCEFlow {
    provider: ProviderKind,
    client: BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>,
    scopes: Vec<String>,
    extra_params: Vec<(String, String)>,
}

impl PKCEFlow {
    /// Creates a new PKCEFlow redirecting to `redirect_uri`
    pub fn new(config: &OAuth2Config, redirect_uri: &str) -> Result<Self, IngestError> {
        let mut flow = Self::without_redirect(config)?;
        flow.client = flow.client.set_redirect_uri(
            RedirectUrl::new(redirect_uri.to_string())
                .map_err(|e| invalid_config("redirect URI", e))?,
        );
        Ok(flow)
    }

    /// Creates a flow that can only refresh tokens
    pub fn without_redirect(config: &OAuth2Config) -> Result<Self, IngestError> {
        let mut client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_auth_uri(
                AuthUrl::new(config.auth_url.clone())
                    .map_err(|e| invalid_config("authorization URL", e))?,
            )
            .set_token_uri(
                TokenUrl::new(config.token_url.clone())
                    .map_err(|e| invalid_config("token URL", e))?,
            );
        if let Some(secret) = &config.client_secret {
            client = client.set_client_secret(ClientSecret::new(secret.clone()));
        }

        Ok(Self {
            provider: config.provider,
            client,
            scopes: config.scopes.clone(),
            extra_params: config.extra_params.clone(),
        })
    }

    /// Generates an authorization URL with a PKCE challenge
    ///
    /// # Returns
    /// A tuple of `(authorization_url, csrf_token, pkce_verifier)`.
    /// The `pkce_verifier` must be kept until the code exchange step.
    pub fn generate_auth_url(&self) -> (String, CsrfToken, PkceCodeVerifier) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut auth_request = self.client.authorize_url(CsrfToken::new_random);

        for scope in &self.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }
        for (name, value) in &self.extra_params {
            auth_request = auth_request.add_extra_param(name.as_str(), value.as_str());
        }

        let (auth_url, csrf_token) = auth_request.set_pkce_challenge(pkce_challenge).url();

        debug!(provider = %self.provider, "Generated authorization URL");
        (auth_url.to_string(), csrf_token, pkce_verifier)
    }

    /// Exchanges an authorization code for a credential
    ///
    /// # Arguments
    /// * `code` - The authorization code received from the callback
    /// * `pkce_verifier` - The PKCE verifier generated alongside the auth URL
    /// * `http` - Client used for the token request
    pub async fn exchange_code(
        &self,
        code: String,
        pkce_verifier: PkceCodeVerifier,
        http: &reqwest::Client,
    ) -> Result<Credential, IngestError> {
        info!(provider = %self.provider, "Exchanging authorization code");

        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(http)
            .await
            .map_err(|e| IngestError::TokenExchangeFailed(e.to_string()))?;

        let credential = self.credential_from(&token_result, None);
        info!(provider = %self.provider, "Obtained access token");
        Ok(credential)
    }

    /// Exchanges a refresh token for a new access token
    ///
    /// Providers that do not rotate refresh tokens omit one from the
    /// response; the old token is kept in that case.
    ///
    /// # Errors
    /// `CredentialExpired` when the provider rejects the refresh token.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        http: &reqwest::Client,
    ) -> Result<Credential, IngestError> {
        info!(provider = %self.provider, "Refreshing access token");

        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(http)
            .await
            .map_err(|e| IngestError::CredentialExpired(format!("token refresh failed: {e}")))?;

        let credential = self.credential_from(&token_result, Some(refresh_token));
        info!(provider = %self.provider, "Refreshed access token");
        Ok(credential)
    }

    fn credential_from(
        &self,
        token_result: &impl TokenResponse,
        previous_refresh: Option<&str>,
    ) -> Credential {
        let mut credential =
            Credential::new(self.provider, token_result.access_token().secret().clone());
        let refresh = token_result
            .refresh_token()
            .map(|t| t.secret().as_str())
            .or(previous_refresh);
        if let Some(refresh) = refresh {
            credential = credential.with_refresh_token(refresh);
        }
        if let Some(expires_in) = token_result.expires_in() {
            let expires_in = chrono::Duration::from_std(expires_in)
                .unwrap_or_else(|_| chrono::Duration::hours(1));
            credential = credential.with_expires_at(Utc::now() + expires_in);
        }
        credential
    }
}

fn invalid_config(what: &str, e: url::ParseError) -> IngestError {
    IngestError::MissingConfiguration(format!("invalid {what}: {e}"))
}

// ============================================================================
// LocalCallbackServer
// ============================================================================

/// What the provider sent back to the redirect URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackParams {
    /// The user approved; carries the code and the CSRF state
    Authorized { code: String, state: String },
    /// The provider redirected with `error=...`
    Denied {
        error: String,
        description: Option<String>,
    },
}

/// Minimal HTTP server that listens on localhost for the OAuth2 redirect callback.
///
/// Binding happens before the browser is opened so the redirect URI (and
/// its port) is known up front. The server keeps accepting connections
/// until a request carries either a code or an error; stray requests such
/// as `/favicon.ico` get a 404.
pub struct LocalCallbackServer {
    listener: TcpListener,
    port: u16,
}

impl LocalCallbackServer {
    /// Binds the server on `127.0.0.1:<port>`
    pub async fn bind(port: u16) -> Result<Self, IngestError> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await.map_err(|e| {
            IngestError::Network(format!("failed to bind callback server on port {port}: {e}"))
        })?;
        let port = listener
            .local_addr()
            .map_err(|e| IngestError::Network(format!("callback server address: {e}")))?
            .port();

        debug!(port, "OAuth callback server listening");
        Ok(Self { listener, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The redirect URI to register with the provider
    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}{}", self.port, CALLBACK_PATH)
    }

    /// Waits for the provider redirect
    ///
    /// # Errors
    /// `AuthCancelled` when nothing arrives within `timeout`.
    pub async fn wait_for_callback(self, timeout: Duration) -> Result<CallbackParams, IngestError> {
        let (tx, mut rx) = mpsc::channel::<CallbackParams>(1);

        let wait = async {
            loop {
                tokio::select! {
                    Some(params) = rx.recv() => return Ok(params),
                    accepted = self.listener.accept() => match accepted {
                        Ok((stream, addr)) => {
                            debug!(%addr, "Callback connection accepted");
                            tokio::spawn(serve_connection(stream, tx.clone()));
                        }
                        Err(e) => {
                            return Err(IngestError::AuthCancelled(format!(
                                "callback server failed: {e}"
                            )));
                        }
                    },
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(IngestError::AuthCancelled(format!(
                "no authorization received within {}s",
                timeout.as_secs()
            ))),
        }
    }
}

async fn serve_connection(stream: TcpStream, tx: mpsc::Sender<CallbackParams>) {
    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
        let tx = tx.clone();
        async move {
            let uri = req.uri().to_string();
            let response = match parse_callback_params(&uri) {
                Some(params) => {
                    let page = match &params {
                        CallbackParams::Authorized { .. } => html_response(
                            StatusCode::OK,
                            success_html(),
                        ),
                        CallbackParams::Denied { error, .. } => html_response(
                            StatusCode::OK,
                            error_html(&format!(
                                "Authorization was not granted ({}).",
                                escape_html(error)
                            )),
                        ),
                    };
                    let _ = tx.send(params).await;
                    page
                }
                None if req.uri().path() == CALLBACK_PATH => html_response(
                    StatusCode::BAD_REQUEST,
                    error_html("Missing authorization code in callback"),
                ),
                None => html_response(StatusCode::NOT_FOUND, error_html("Not found")),
            };
            Ok::<_, hyper::Error>(response)
        }
    });

    if let Err(e) = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        warn!("Callback server connection error: {}", e);
    }
}

fn html_response(status: StatusCode, html: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(html)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

/// Parses the outcome of an authorization from a callback URI
///
/// Returns `None` for requests that are not the callback or carry neither
/// a code nor an error.
fn parse_callback_params(uri: &str) -> Option<CallbackParams> {
    let url = url::Url::parse(&format!("http://localhost{}", uri)).ok()?;
    if url.path() != CALLBACK_PATH {
        return None;
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut description = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.to_string()),
            "state" => state = Some(value.to_string()),
            "error" => error = Some(value.to_string()),
            "error_description" => description = Some(value.to_string()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Some(CallbackParams::Denied { error, description });
    }

    Some(CallbackParams::Authorized {
        code: code?,
        state: state.unwrap_or_default(),
    })
}

/// Returns the HTML for a successful authorization page
fn success_html() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>SourceBridge - Connected</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Connected</h1>
    <p>SourceBridge can now read your files.</p>
    <p>You can close this window and return to the terminal.</p>
    <script>setTimeout(function() { window.close(); }, 3000);</script>
</body>
</html>"#
        .to_string()
}

/// Escapes text for inclusion in an HTML element body
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Returns the HTML for an authorization error page
///
/// `message` is inserted verbatim and must already be escaped.
fn error_html(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>SourceBridge - Authorization Error</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authorization Error</h1>
    <p>{}</p>
    <p>Please close this window and try again.</p>
</body>
</html>"#,
        message
    )
}

// ============================================================================
// PkceAuthorizer
// ============================================================================

/// Callback receiving the authorization URL before the wait starts
pub type AuthUrlSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Interactive authorization: browser, loopback redirect, code exchange
///
/// 1. Binds the loopback callback server
/// 2. Generates a PKCE-secured authorization URL
/// 3. Opens the user's browser (and hands the URL to the sink)
/// 4. Waits for the redirect and verifies the CSRF state
/// 5. Exchanges the authorization code for a credential
pub struct PkceAuthorizer {
    config: Result<OAuth2Config, IngestError>,
    provider: ProviderKind,
    http: reqwest::Client,
    url_sink: Option<AuthUrlSink>,
}

impl PkceAuthorizer {
    pub fn new(config: OAuth2Config, http: reqwest::Client) -> Self {
        Self {
            provider: config.provider,
            config: Ok(config),
            http,
            url_sink: None,
        }
    }

    /// Builds the authorizer from application config
    ///
    /// A missing client id is not reported here but by
    /// [`IOAuthFlow::authorize`], before any browser is opened.
    pub fn from_config(provider: ProviderKind, config: &Config, http: reqwest::Client) -> Self {
        Self {
            provider,
            config: OAuth2Config::from_config(provider, config),
            http,
            url_sink: None,
        }
    }

    /// Receives the authorization URL, e.g. to print it for the user
    pub fn with_url_sink(mut self, sink: AuthUrlSink) -> Self {
        self.url_sink = Some(sink);
        self
    }
}

#[async_trait::async_trait]
impl IOAuthFlow for PkceAuthorizer {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    async fn authorize(&self) -> Result<Credential, IngestError> {
        let config = self.config.as_ref().map_err(|e| e.clone())?;
        info!(provider = %self.provider, "Starting OAuth2 PKCE authorization");

        let server = LocalCallbackServer::bind(config.callback_port).await?;
        let flow = PKCEFlow::new(config, &server.redirect_uri())?;
        let (auth_url, csrf_token, pkce_verifier) = flow.generate_auth_url();

        if let Some(sink) = &self.url_sink {
            sink(&auth_url);
        }
        if config.open_browser {
            if let Err(e) = webbrowser::open(&auth_url) {
                warn!(error = %e, "Failed to open browser; open the authorization URL manually");
            }
        }

        match server.wait_for_callback(config.callback_timeout).await? {
            CallbackParams::Denied { error, description } => {
                warn!(provider = %self.provider, %error, "Authorization denied");
                let message = match description {
                    Some(d) => format!("{error}: {d}"),
                    None => error,
                };
                Err(IngestError::AuthDenied(message))
            }
            CallbackParams::Authorized { state, .. } if state != *csrf_token.secret() => {
                warn!(provider = %self.provider, "CSRF state mismatch in callback");
                Err(IngestError::TokenExchangeFailed(
                    "CSRF state mismatch".to_string(),
                ))
            }
            CallbackParams::Authorized { code, .. } => {
                flow.exchange_code(code, pkce_verifier, &self.http).await
            }
        }
    }

    async fn refresh(&self, credential: &Credential) -> Result<Credential, IngestError> {
        let config = self.config.as_ref().map_err(|e| e.clone())?;
        let refresh_token = credential.refresh_token().ok_or_else(|| {
            IngestError::CredentialExpired(format!(
                "{} issued no refresh token",
                self.provider.display_name()
            ))
        })?;
        PKCEFlow::without_redirect(config)?
            .refresh_token(refresh_token, &self.http)
            .await
    }
}

// ============================================================================
// KeyringCredentialStore
// ============================================================================

/// Stores and retrieves credentials from the system keyring
///
/// Uses the `keyring` crate to store credentials in the OS credential
/// store (e.g., GNOME Keyring, KDE Wallet, macOS Keychain). Credentials are
/// serialized as JSON under the service name "sourcebridge" with
/// `<profile>:<provider>` as the username.
pub struct KeyringCredentialStore {
    profile: String,
}

impl KeyringCredentialStore {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
        }
    }

    /// Keyring username for `provider` in this profile
    pub fn account_key(&self, provider: ProviderKind) -> String {
        format!("{}:{}", self.profile, provider.as_str())
    }

    fn entry(&self, provider: ProviderKind) -> Result<keyring::Entry, IngestError> {
        keyring::Entry::new(KEYRING_SERVICE, &self.account_key(provider)).map_err(|e| {
            IngestError::CredentialStore(format!("failed to create keyring entry: {e}"))
        })
    }
}

#[async_trait::async_trait]
impl ICredentialStore for KeyringCredentialStore {
    async fn load(&self, provider: ProviderKind) -> Result<Option<Credential>, IngestError> {
        let entry = self.entry(provider)?;

        match entry.get_password() {
            Ok(json) => {
                let credential: Credential = serde_json::from_str(&json).map_err(|e| {
                    IngestError::CredentialStore(format!(
                        "stored credential is unreadable: {e}"
                    ))
                })?;
                debug!(key = %self.account_key(provider), "Loaded credential from keyring");
                Ok(Some(credential))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(key = %self.account_key(provider), "No credential in keyring");
                Ok(None)
            }
            Err(e) => Err(IngestError::CredentialStore(format!(
                "failed to read from keyring: {e}"
            ))),
        }
    }

    async fn save(&self, credential: &Credential) -> Result<(), IngestError> {
        let entry = self.entry(credential.provider())?;
        let json = serde_json::to_string(credential).map_err(|e| {
            IngestError::CredentialStore(format!("failed to serialize credential: {e}"))
        })?;

        entry.set_password(&json).map_err(|e| {
            IngestError::CredentialStore(format!("failed to store credential in keyring: {e}"))
        })?;

        debug!(key = %self.account_key(credential.provider()), "Stored credential in keyring");
        Ok(())
    }

    async fn clear(&self, provider: ProviderKind) -> Result<(), IngestError> {
        let entry = self.entry(provider)?;

        match entry.delete_credential() {
            Ok(()) => {
                info!(key = %self.account_key(provider), "Cleared credential from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(IngestError::CredentialStore(format!(
                "failed to delete from keyring: {e}"
            ))),
        }
    }
}
