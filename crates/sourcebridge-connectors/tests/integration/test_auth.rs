//! Full PKCE authorization against a mocked token endpoint
//!
//! The browser is replaced by the URL sink: the test reads the
//! authorization URL, then plays the provider by calling the loopback
//! redirect URI itself.

use std::{sync::Arc, time::Duration};

use sourcebridge_connectors::auth::{OAuth2Config, PkceAuthorizer};
use sourcebridge_core::{
    domain::{Credential, IngestError, ProviderKind},
    ports::{ICredentialStore, IOAuthFlow, InMemoryCredentialStore},
    usecases::ProviderConnector,
};
use tokio::sync::mpsc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// The pieces of the authorization URL the provider would act on
struct AuthRequest {
    redirect_uri: String,
    state: String,
    url: url::Url,
}

impl AuthRequest {
    fn parse(raw: &str) -> Self {
        let url = url::Url::parse(raw).unwrap();
        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.to_string())
                .unwrap()
        };
        Self {
            redirect_uri: param("redirect_uri"),
            state: param("state"),
            url: url.clone(),
        }
    }

    fn has_param(&self, name: &str, value: &str) -> bool {
        self.url.query_pairs().any(|(k, v)| k == name && v == value)
    }
}

fn authorizer(
    provider: ProviderKind,
    token_server: &MockServer,
) -> (PkceAuthorizer, mpsc::UnboundedReceiver<String>) {
    let base = match provider {
        ProviderKind::Dropbox => OAuth2Config::dropbox("test-client"),
        ProviderKind::GoogleDrive => OAuth2Config::google_drive("test-client"),
    };
    let config = base
        .with_token_url(format!("{}/oauth2/token", token_server.uri()))
        .with_callback_port(0)
        .with_callback_timeout(Duration::from_secs(10))
        .with_open_browser(false);

    let (tx, rx) = mpsc::unbounded_channel();
    let authorizer = PkceAuthorizer::new(config, reqwest::Client::new())
        .with_url_sink(Arc::new(move |url: &str| {
            let _ = tx.send(url.to_string());
        }));
    (authorizer, rx)
}

async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code-1"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-1",
            "token_type": "bearer",
            "expires_in": 14400,
            "refresh_token": "refresh-1"
        })))
        .expect(1)
        .mount(server)
        .await;
}

/// Runs `authorize` in the background and answers the redirect with `query`
async fn authorize_with_redirect(
    authorizer: PkceAuthorizer,
    mut urls: mpsc::UnboundedReceiver<String>,
    query: impl FnOnce(&AuthRequest) -> String,
) -> (AuthRequest, Result<Credential, IngestError>) {
    let task = tokio::spawn(async move { authorizer.authorize().await });

    let request = AuthRequest::parse(&urls.recv().await.unwrap());
    let callback = format!("{}?{}", request.redirect_uri, query(&request));
    let response = reqwest::get(&callback).await.unwrap();
    assert!(response.status().is_success());

    (request, task.await.unwrap())
}

#[tokio::test]
async fn test_dropbox_authorization_code_flow() {
    let token_server = MockServer::start().await;
    mount_token_endpoint(&token_server).await;
    let (authorizer, urls) = authorizer(ProviderKind::Dropbox, &token_server);

    let (request, result) = authorize_with_redirect(authorizer, urls, |r| {
        format!("code=auth-code-1&state={}", r.state)
    })
    .await;

    let credential = result.unwrap();
    assert_eq!(credential.provider(), ProviderKind::Dropbox);
    assert_eq!(credential.access_token(), "access-1");
    assert_eq!(credential.refresh_token(), Some("refresh-1"));
    assert!(credential.expires_at().is_some());

    assert!(request.redirect_uri.starts_with("http://127.0.0.1:"));
    assert!(request.has_param("token_access_type", "offline"));
    assert!(request.has_param("code_challenge_method", "S256"));
    assert!(request.has_param("client_id", "test-client"));
}

#[tokio::test]
async fn test_google_authorization_requests_offline_consent() {
    let token_server = MockServer::start().await;
    mount_token_endpoint(&token_server).await;
    let (authorizer, urls) = authorizer(ProviderKind::GoogleDrive, &token_server);

    let (request, result) = authorize_with_redirect(authorizer, urls, |r| {
        format!("code=auth-code-1&state={}", r.state)
    })
    .await;

    assert_eq!(result.unwrap().provider(), ProviderKind::GoogleDrive);
    assert!(request.has_param("access_type", "offline"));
    assert!(request.has_param("prompt", "consent"));
}

#[tokio::test]
async fn test_user_denial() {
    let token_server = MockServer::start().await;
    let (authorizer, urls) = authorizer(ProviderKind::Dropbox, &token_server);

    let (_, result) = authorize_with_redirect(authorizer, urls, |r| {
        format!(
            "error=access_denied&error_description=The+user+chose+not+to+give+access&state={}",
            r.state
        )
    })
    .await;

    assert!(matches!(result, Err(IngestError::AuthDenied(ref m)) if m.starts_with("access_denied")));
    assert!(token_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_state_mismatch_is_rejected() {
    let token_server = MockServer::start().await;
    let (authorizer, urls) = authorizer(ProviderKind::Dropbox, &token_server);

    let (_, result) =
        authorize_with_redirect(authorizer, urls, |_| "code=auth-code-1&state=forged".into())
            .await;

    assert!(matches!(result, Err(IngestError::TokenExchangeFailed(_))));
    assert!(token_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_token_endpoint_rejection() {
    let token_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "code doesn't exist or has expired"
        })))
        .mount(&token_server)
        .await;
    let (authorizer, urls) = authorizer(ProviderKind::Dropbox, &token_server);

    let (_, result) = authorize_with_redirect(authorizer, urls, |r| {
        format!("code=auth-code-1&state={}", r.state)
    })
    .await;

    assert!(matches!(result, Err(IngestError::TokenExchangeFailed(_))));
}

#[tokio::test]
async fn test_denial_page_escapes_provider_error() {
    let token_server = MockServer::start().await;
    let (authorizer, mut urls) = authorizer(ProviderKind::Dropbox, &token_server);
    let task = tokio::spawn(async move { authorizer.authorize().await });

    let request = AuthRequest::parse(&urls.recv().await.unwrap());
    let callback = format!(
        "{}?error=%3Cscript%3Ealert(1)%3C%2Fscript%3E&state={}",
        request.redirect_uri, request.state
    );
    let page = reqwest::get(&callback).await.unwrap().text().await.unwrap();

    assert!(!page.contains("<script>"));
    assert!(page.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    assert!(matches!(task.await.unwrap(), Err(IngestError::AuthDenied(_))));
}

async fn mount_refresh_endpoint(server: &MockServer, response: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .expect(1)
        .mount(server)
        .await;
}

fn stored_credential(expires_in_minutes: i64) -> Credential {
    Credential::new(ProviderKind::Dropbox, "access-1")
        .with_refresh_token("refresh-1")
        .with_expires_at(chrono::Utc::now() + chrono::Duration::minutes(expires_in_minutes))
}

#[tokio::test]
async fn test_refresh_keeps_unrotated_refresh_token() {
    let token_server = MockServer::start().await;
    mount_refresh_endpoint(
        &token_server,
        serde_json::json!({
            "access_token": "access-2",
            "token_type": "bearer",
            "expires_in": 14400
        }),
    )
    .await;
    let (authorizer, _) = authorizer(ProviderKind::Dropbox, &token_server);

    let refreshed = authorizer.refresh(&stored_credential(-1)).await.unwrap();
    assert_eq!(refreshed.access_token(), "access-2");
    assert_eq!(refreshed.refresh_token(), Some("refresh-1"));
    assert!(!refreshed.is_expired());
}

#[tokio::test]
async fn test_refresh_rejected_by_provider() {
    let token_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "refresh token is invalid"
        })))
        .mount(&token_server)
        .await;
    let (authorizer, _) = authorizer(ProviderKind::Dropbox, &token_server);

    let err = authorizer.refresh(&stored_credential(-1)).await.unwrap_err();
    assert!(matches!(err, IngestError::CredentialExpired(_)));
}

#[tokio::test]
async fn test_refresh_without_refresh_token_skips_provider() {
    let token_server = MockServer::start().await;
    let (authorizer, _) = authorizer(ProviderKind::Dropbox, &token_server);

    let err = authorizer
        .refresh(&Credential::new(ProviderKind::Dropbox, "access-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::CredentialExpired(_)));
    assert!(token_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_connector_refreshes_expiring_stored_credential() {
    let token_server = MockServer::start().await;
    mount_refresh_endpoint(
        &token_server,
        serde_json::json!({
            "access_token": "access-2",
            "token_type": "bearer",
            "expires_in": 14400,
            "refresh_token": "refresh-2"
        }),
    )
    .await;
    let (authorizer, _) = authorizer(ProviderKind::Dropbox, &token_server);
    let store = Arc::new(InMemoryCredentialStore::with_credential(stored_credential(2)));
    let connector = ProviderConnector::new(Arc::new(authorizer), store.clone());

    assert!(connector.check_existing_connection().await.unwrap());
    let credential = connector.require_credential().await.unwrap();
    assert_eq!(credential.access_token(), "access-2");
    assert_eq!(credential.refresh_token(), Some("refresh-2"));

    let saved = store.load(ProviderKind::Dropbox).await.unwrap().unwrap();
    assert_eq!(saved.access_token(), "access-2");
}
