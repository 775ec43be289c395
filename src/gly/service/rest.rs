//! REST client for the managed identity backend.
//!
//! Accounts go through the identity toolkit (`accounts:*`), token refresh
//! through the secure-token endpoint and profile documents through the
//! document store's `PATCH` (full overwrite, so it doubles as an upsert).
//!
//! The API key travels in the query string; errors are stripped of their URL
//! before they are logged or shown.

use super::{store::SessionStore, Document, FieldValue, IdentityService, ServiceError};
use crate::{
    gly::session::{Session, SessionTokens},
    APP_USER_AGENT,
};
use async_trait::async_trait;
use reqwest::{Client, Method, Request, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Map, Value};
use std::{
    path::PathBuf,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tracing::{debug, info_span, warn, Instrument};
use url::Url;

pub const DEFAULT_AUTH_URL: &str = "https://identitytoolkit.googleapis.com";
pub const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com";
pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com";

/// Request timeout for every backend call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Maximum number of error body characters kept in a `Protocol` error.
const MAX_ERROR_CHARS: usize = 200;

#[derive(Clone, Debug)]
pub struct RestConfig {
    pub api_key: SecretString,
    pub project_id: String,
    pub auth_url: String,
    pub token_url: String,
    pub firestore_url: String,
    pub session_file: Option<PathBuf>,
}

impl RestConfig {
    #[must_use]
    pub fn new(api_key: SecretString, project_id: impl Into<String>) -> Self {
        Self {
            api_key,
            project_id: project_id.into(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            firestore_url: DEFAULT_FIRESTORE_URL.to_string(),
            session_file: None,
        }
    }

    #[must_use]
    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    #[must_use]
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    #[must_use]
    pub fn with_firestore_url(mut self, url: impl Into<String>) -> Self {
        self.firestore_url = url.into();
        self
    }

    #[must_use]
    pub fn with_session_file(mut self, path: Option<PathBuf>) -> Self {
        self.session_file = path;
        self
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    local_id: String,
    email: Option<String>,
    id_token: String,
    refresh_token: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    id_token: String,
    refresh_token: String,
    user_id: String,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
    status: Option<String>,
}

pub struct RestIdentityService {
    client: Client,
    config: RestConfig,
    store: Option<SessionStore>,
    current: Mutex<Option<Session>>,
}

impl RestIdentityService {
    /// Build the client and restore a stored session if one is configured.
    ///
    /// # Errors
    /// Returns `Network` if the HTTP client cannot be built.
    pub fn new(config: RestConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ServiceError::Network(err.to_string()))?;

        let store = config.session_file.clone().map(SessionStore::new);
        let current = store.as_ref().and_then(|store| {
            store.load().unwrap_or_else(|err| {
                warn!("ignoring stored session: {err}");
                None
            })
        });

        Ok(Self {
            client,
            config,
            store,
            current: Mutex::new(current),
        })
    }

    fn current(&self) -> MutexGuard<'_, Option<Session>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remember(&self, session: &Session) {
        *self.current() = Some(session.clone());
        if let Some(store) = &self.store {
            if let Err(err) = store.save(session) {
                warn!("could not persist session: {err}");
            }
        }
    }

    fn forget(&self) {
        *self.current() = None;
        if let Some(store) = &self.store {
            if let Err(err) = store.clear() {
                warn!("could not remove stored session: {err}");
            }
        }
    }

    fn with_key(&self, mut url: Url) -> Url {
        url.query_pairs_mut()
            .append_pair("key", self.config.api_key.expose_secret());
        url
    }

    fn accounts_url(&self, method: &str) -> Result<Url, ServiceError> {
        let method = format!("accounts:{method}");
        let url = endpoint(&self.config.auth_url, &["v1", method.as_str()])?;
        Ok(self.with_key(url))
    }

    fn refresh_url(&self) -> Result<Url, ServiceError> {
        let url = endpoint(&self.config.token_url, &["v1", "token"])?;
        Ok(self.with_key(url))
    }

    fn document_url(&self, collection: &str, key: &str) -> Result<Url, ServiceError> {
        endpoint(
            &self.config.firestore_url,
            &[
                "v1",
                "projects",
                self.config.project_id.as_str(),
                "databases",
                "(default)",
                "documents",
                collection,
                key,
            ],
        )
    }

    async fn lookup(&self, id_token: &str) -> Result<LookupUser, ServiceError> {
        let url = self.accounts_url("lookup")?;
        let response: LookupResponse = send(
            self.client.post(url).json(&json!({ "idToken": id_token })),
            "lookup",
        )
        .await?;

        response
            .users
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::rejected("USER_NOT_FOUND"))
    }

    async fn send_oob_code(&self, op: &'static str, body: Value) -> Result<(), ServiceError> {
        let url = self.accounts_url("sendOobCode")?;
        let _: Value = send(self.client.post(url).json(&body), op).await?;
        Ok(())
    }
}

#[async_trait]
impl IdentityService for RestIdentityService {
    async fn create_account(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, ServiceError> {
        let url = self.accounts_url("signUp")?;
        let response: AuthResponse = send(
            self.client.post(url).json(&json!({
                "email": email,
                "password": password.expose_secret(),
                "returnSecureToken": true,
            })),
            "sign_up",
        )
        .await?;

        let session = Session::new(
            response.local_id,
            response.email.unwrap_or_else(|| email.to_string()),
            false,
        )
        .with_tokens(SessionTokens::new(response.id_token, response.refresh_token));

        self.remember(&session);
        Ok(session)
    }

    async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, ServiceError> {
        let url = self.accounts_url("signInWithPassword")?;
        let response: AuthResponse = send(
            self.client.post(url).json(&json!({
                "email": email,
                "password": password.expose_secret(),
                "returnSecureToken": true,
            })),
            "sign_in",
        )
        .await?;

        // Sign-in does not report the verification flag; ask for it.
        let user = self.lookup(&response.id_token).await?;

        let session = Session::new(
            response.local_id,
            user.email
                .or(response.email)
                .unwrap_or_else(|| email.to_string()),
            user.email_verified,
        )
        .with_tokens(SessionTokens::new(response.id_token, response.refresh_token));

        self.remember(&session);
        Ok(session)
    }

    async fn send_verification_email(&self, session: &Session) -> Result<(), ServiceError> {
        let tokens = session
            .tokens
            .as_ref()
            .ok_or_else(|| ServiceError::rejected("INVALID_ID_TOKEN"))?;

        self.send_oob_code(
            "send_verification",
            json!({
                "requestType": "VERIFY_EMAIL",
                "idToken": tokens.id_token.expose_secret(),
            }),
        )
        .await
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), ServiceError> {
        self.send_oob_code(
            "send_password_reset",
            json!({
                "requestType": "PASSWORD_RESET",
                "email": email,
            }),
        )
        .await
    }

    async fn sign_out(&self, session: &Session) {
        let signed_in = self
            .current()
            .as_ref()
            .is_some_and(|current| current.same_user(session));
        if signed_in {
            self.forget();
        }
    }

    fn current_session(&self) -> Option<Session> {
        self.current().clone()
    }

    async fn reload_session(&self, session: &Session) -> Result<Session, ServiceError> {
        let tokens = session
            .tokens
            .as_ref()
            .ok_or_else(|| ServiceError::rejected("INVALID_REFRESH_TOKEN"))?;

        let url = self.refresh_url()?;
        let refreshed: TokenResponse = send(
            self.client.post(url).form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", tokens.refresh_token.expose_secret()),
            ]),
            "refresh",
        )
        .await?;

        let user = self.lookup(&refreshed.id_token).await?;
        if user.local_id != refreshed.user_id {
            return Err(ServiceError::Protocol(
                "token refresh returned a different user".to_string(),
            ));
        }

        let fresh = Session::new(
            user.local_id,
            user.email.unwrap_or_else(|| session.email.clone()),
            user.email_verified,
        )
        .with_tokens(SessionTokens::new(
            refreshed.id_token,
            refreshed.refresh_token,
        ));

        let is_current = self
            .current()
            .as_ref()
            .is_some_and(|current| current.same_user(&fresh));
        if is_current {
            self.remember(&fresh);
        }

        Ok(fresh)
    }

    async fn upsert_document(
        &self,
        session: &Session,
        collection: &str,
        key: &str,
        fields: &Document,
    ) -> Result<(), ServiceError> {
        let tokens = session
            .tokens
            .as_ref()
            .ok_or_else(|| ServiceError::rejected("INVALID_ID_TOKEN"))?;

        let url = self.document_url(collection, key)?;
        let _: Value = send(
            self.client
                .patch(url)
                .bearer_auth(tokens.id_token.expose_secret())
                .json(&encode_document(fields)),
            "upsert_document",
        )
        .await?;

        Ok(())
    }
}

/// Join path segments onto a base URL, percent-encoding each segment.
fn endpoint(base: &str, segments: &[&str]) -> Result<Url, ServiceError> {
    let mut url = Url::parse(base.trim())
        .map_err(|err| ServiceError::Protocol(format!("invalid base URL {base}: {err}")))?;

    url.path_segments_mut()
        .map_err(|()| ServiceError::Protocol(format!("base URL cannot have a path: {base}")))?
        .pop_if_empty()
        .extend(segments);

    Ok(url)
}

/// Document store wire format: `{"fields": {"name": {"stringValue": "…"}}}`.
fn encode_document(fields: &Document) -> Value {
    let encoded: Map<String, Value> = fields
        .iter()
        .map(|(name, value)| {
            let value = match value {
                FieldValue::String(s) => json!({ "stringValue": s }),
                // 64-bit integers are sent as strings.
                FieldValue::Integer(n) => json!({ "integerValue": n.to_string() }),
            };
            (name.clone(), value)
        })
        .collect();

    json!({ "fields": encoded })
}

async fn send<T: DeserializeOwned>(
    request: RequestBuilder,
    op: &'static str,
) -> Result<T, ServiceError> {
    let (client, request) = request.build_split();
    let request =
        request.map_err(|err| ServiceError::Protocol(format!("{op}: {}", err.without_url())))?;
    let (method, path) = method_and_path(&request);
    let span = info_span!("identity.request", op, http.method = %method, path = %path);

    async move {
        let response = client
            .execute(request)
            .await
            .map_err(|err| ServiceError::Network(err.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ServiceError::Network(err.without_url().to_string()))?;

        if !status.is_success() {
            let err = rejection(status, &body);
            debug!(status = status.as_u16(), "request rejected: {err}");
            return Err(err);
        }

        let body = if body.trim().is_empty() { "null" } else { &body };
        serde_json::from_str(body).map_err(|err| ServiceError::Protocol(format!("{op}: {err}")))
    }
    .instrument(span)
    .await
}

fn method_and_path(request: &Request) -> (Method, String) {
    (request.method().clone(), request.url().path().to_string())
}

/// Map an error response to a `ServiceError`. Identity endpoints send codes
/// (`EMAIL_EXISTS`), the document store sends sentences plus a status name.
fn rejection(status: StatusCode, body: &str) -> ServiceError {
    let error = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|body| body.error);

    match error {
        Some(ApiError {
            message: Some(message),
            ..
        }) if looks_like_code(&message) => ServiceError::rejected(&message),
        Some(ApiError {
            message: Some(message),
            status: api_status,
        }) => ServiceError::Rejected {
            code: api_status.unwrap_or_else(|| status.as_u16().to_string()),
            message,
        },
        _ => {
            let trimmed: String = body.trim().chars().take(MAX_ERROR_CHARS).collect();
            ServiceError::Protocol(format!("{status}: {trimmed}"))
        }
    }
}

fn looks_like_code(message: &str) -> bool {
    let code = message.split(':').next().unwrap_or_default().trim();
    !code.is_empty()
        && code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
