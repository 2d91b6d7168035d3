use std::{fmt, sync::Arc, time::Duration};

use jsonwebtoken::{decode, DecodingKey, Validation};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{normalize_role, Role, TellerId, UserId},
    error::ApiError,
    protocol::{LoginRequest, LoginResponse, TillAudit, TokenClaims},
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub mod error;
pub mod reference_data;
pub mod sections;
pub mod transfer;
pub mod wizard;

pub use error::{ClientError, UserAction};
pub use reference_data::{
    DependentField, GeoCascade, GeoLevel, GeoSelection, LoadState, ReferenceData,
};
pub use sections::{FieldError, FieldProblem, SectionKey, SectionRecord};
pub use transfer::{
    format_amount, parse_amount_input, TransferDesk, TransferLedger, TransferRequest,
    TransferViolation,
};
pub use wizard::{
    split_record, ClientDirectory, SectionTrigger, WizardLayout, WizardMode, WizardSession,
};

/// Till name used when the token carries none.
const DEFAULT_TELLER_NAME: &str = "Cajero 01";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Signed-in user: the bearer token plus the claims decoded from it.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSession {
    token: String,
    claims: TokenClaims,
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("token", &"<redacted>")
            .field("claims", &self.claims)
            .finish()
    }
}

impl AuthSession {
    /// Reads the claims out of a backend-issued token. The signature is not
    /// checked here; the backend verifies it on every request.
    pub fn from_token(token: impl Into<String>) -> Result<Self, ClientError> {
        let token = token.into();
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        let data = decode::<TokenClaims>(&token, &DecodingKey::from_secret(&[]), &validation)?;
        Ok(Self {
            token,
            claims: data.claims,
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn claims(&self) -> &TokenClaims {
        &self.claims
    }

    pub fn user_id(&self) -> UserId {
        self.claims.id_usuario
    }

    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.claims.rol)
    }

    pub fn has_role(&self, role: &str) -> bool {
        normalize_role(&self.claims.rol) == normalize_role(role)
    }

    /// Till this user operates; the identity used by the transfer handshake.
    pub fn teller(&self) -> TellerId {
        let name = self
            .claims
            .nombre_caja
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_TELLER_NAME);
        TellerId::new(name)
    }

    pub fn audit(&self) -> TillAudit {
        TillAudit {
            id_usuario: Some(self.claims.id_usuario),
            id_caja: self.claims.id_caja,
            nombre_caja: self.claims.nombre_caja.clone(),
        }
    }
}

/// HTTP access to the back-office API. Cheap to clone; clones share the
/// signed-in session.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<RwLock<Option<AuthSession>>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(DEFAULT_REQUEST_TIMEOUT).build()?;
        Ok(Self::with_http_client(base_url, http))
    }

    pub fn with_http_client(base_url: impl Into<String>, http: Client) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session: Arc::new(RwLock::new(None)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<AuthSession, ClientError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            role: role.as_str().to_string(),
        };
        let response: LoginResponse = self
            .send_json(Method::POST, "/auth/login", &request)
            .await?;
        let token = match (response.success, response.token) {
            (true, Some(token)) => token,
            (_, _) => {
                warn!(email, role = role.as_str(), "auth: login rejected");
                return Err(ClientError::Rejected {
                    message: response.message,
                });
            }
        };

        let session = AuthSession::from_token(token)?;
        info!(
            user_id = session.user_id().0,
            role = %session.claims().rol,
            "auth: signed in"
        );
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    /// Adopts a token obtained elsewhere (for example a previous login).
    pub async fn restore_session(&self, token: &str) -> Result<AuthSession, ClientError> {
        let session = AuthSession::from_token(token)?;
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    pub async fn session(&self) -> Option<AuthSession> {
        self.session.read().await.clone()
    }

    pub async fn require_session(&self) -> Result<AuthSession, ClientError> {
        self.session().await.ok_or(ClientError::NotAuthenticated)
    }

    pub async fn logout(&self) {
        if self.session.write().await.take().is_some() {
            info!("auth: signed out");
        }
    }

    pub async fn has_role(&self, role: &str) -> bool {
        self.session
            .read()
            .await
            .as_ref()
            .is_some_and(|session| session.has_role(role))
    }

    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.read().await.as_ref() {
            Some(session) => request.bearer_auth(session.token()),
            None => request,
        }
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "http: GET");
        let request = self.authorize(self.http.get(&url).query(query)).await;
        read_json(request.send().await?).await
    }

    pub(crate) async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, %method, "http: request");
        let request = self
            .authorize(self.http.request(method, &url).json(body))
            .await;
        read_json(request.send().await?).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        let text = String::from_utf8_lossy(&body);
        return Err(ClientError::Http {
            status: status.as_u16(),
            error: ApiError::from_response(status.as_u16(), &text),
        });
    }
    Ok(serde_json::from_slice(&body)?)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
