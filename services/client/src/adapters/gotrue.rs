//! services/client/src/adapters/gotrue.rs
//!
//! This module contains the auth adapter, the concrete implementation of the
//! `AuthService` port. It talks to the backend's auth REST API (`/auth/v1`) with
//! `reqwest`, keeps the session in a `SessionStore`, and broadcasts auth-state
//! changes to subscribers.

use crate::adapters::response::{endpoint, ensure_success, read_json, transport_error};
use crate::adapters::session_store::SessionStore;
use crate::config::Config;
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, TimeZone, Utc};
use egolay_core::domain::{
    AssuranceLevel, AuthEvent, FactorList, FactorStatus, FactorType, MfaChallenge, MfaFactor,
    NewAccount, Session, TotpEnrollment, User, VerificationCode,
};
use egolay_core::ports::{AuthEventStream, AuthService, PortError, PortResult};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Buffered auth events per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 16;
/// Lifetime assumed when the backend reports neither `expires_at` nor `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An auth adapter that implements the `AuthService` port.
#[derive(Clone)]
pub struct GoTrueAdapter {
    http: Client,
    auth_url: String,
    anon_key: String,
    sessions: Arc<SessionStore>,
    events: broadcast::Sender<AuthEvent>,
}

impl GoTrueAdapter {
    /// Creates a new `GoTrueAdapter`.
    pub fn new(http: Client, config: &Config, sessions: Arc<SessionStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            http,
            auth_url: config.auth_url(),
            anon_key: config.anon_key.clone(),
            sessions,
            events,
        }
    }

    fn request(&self, method: Method, segments: &[&str]) -> PortResult<RequestBuilder> {
        let url = endpoint(&self.auth_url, segments)?;
        Ok(self.http.request(method, url).header("apikey", &self.anon_key))
    }

    /// A request carrying the current access token.
    async fn authorized(&self, method: Method, segments: &[&str]) -> PortResult<RequestBuilder> {
        let token = self
            .sessions
            .access_token()
            .await
            .ok_or(PortError::Unauthorized)?;
        Ok(self.request(method, segments)?.bearer_auth(token))
    }

    fn publish(&self, event: AuthEvent) {
        info!(event = event.name(), "Auth state changed");
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    async fn grant(&self, grant_type: &str, body: serde_json::Value) -> PortResult<Session> {
        let response = self
            .request(Method::POST, &["token"])?
            .query(&[("grant_type", grant_type)])
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let record: SessionRecord = read_json(response).await?;
        Ok(record.to_domain())
    }

    async fn establish(&self, session: Session) -> Session {
        self.sessions.replace(session.clone()).await;
        self.publish(AuthEvent::SignedIn(session.clone()));
        session
    }
}

//=========================================================================================
// Wire Records
//=========================================================================================

/// The token response of the auth API; also the persisted session format.
#[derive(Serialize, Deserialize)]
pub(crate) struct SessionRecord {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Unix seconds.
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserRecord,
}

impl SessionRecord {
    pub(crate) fn to_domain(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(|| {
                Utc::now() + Duration::seconds(self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS))
            });
        Session {
            assurance: assurance_from_token(&self.access_token),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user.to_domain(),
        }
    }

    pub(crate) fn from_domain(session: &Session) -> Self {
        Self {
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            expires_in: None,
            expires_at: Some(session.expires_at.timestamp()),
            user: UserRecord::from_domain(&session.user),
        }
    }
}

#[derive(Serialize, Deserialize, Default)]
struct AppMetadata {
    #[serde(default)]
    providers: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct UserRecord {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    app_metadata: AppMetadata,
    #[serde(default)]
    factors: Option<Vec<FactorRecord>>,
}

impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            email: self.email.filter(|e| !e.is_empty()),
            providers: self.app_metadata.providers,
            factors: self
                .factors
                .unwrap_or_default()
                .into_iter()
                .map(FactorRecord::to_domain)
                .collect(),
        }
    }

    fn from_domain(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            app_metadata: AppMetadata {
                providers: user.providers.clone(),
            },
            factors: Some(user.factors.iter().map(FactorRecord::from_domain).collect()),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct FactorRecord {
    id: Uuid,
    #[serde(default)]
    friendly_name: Option<String>,
    factor_type: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl FactorRecord {
    fn to_domain(self) -> MfaFactor {
        MfaFactor {
            id: self.id,
            friendly_name: self.friendly_name,
            factor_type: FactorType::parse(&self.factor_type),
            status: FactorStatus::parse(&self.status),
            created_at: self.created_at,
        }
    }

    fn from_domain(factor: &MfaFactor) -> Self {
        Self {
            id: factor.id,
            friendly_name: factor.friendly_name.clone(),
            factor_type: factor.factor_type.as_str().to_string(),
            status: factor.status.as_str().to_string(),
            created_at: factor.created_at,
        }
    }
}

#[derive(Deserialize)]
struct TotpRecord {
    qr_code: String,
    secret: String,
    #[serde(default)]
    uri: String,
}

#[derive(Deserialize)]
struct EnrollRecord {
    id: Uuid,
    totp: TotpRecord,
}

#[derive(Deserialize)]
struct ChallengeRecord {
    id: Uuid,
    #[serde(default)]
    expires_at: Option<i64>,
}

#[derive(Deserialize)]
struct Claims {
    aal: Option<String>,
}

/// Reads the `aal` claim from an access token's payload. No signature check:
/// the backend verifies tokens, the client only needs the level.
fn assurance_from_token(token: &str) -> AssuranceLevel {
    token
        .split('.')
        .nth(1)
        .and_then(|payload| URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok())
        .and_then(|bytes| serde_json::from_slice::<Claims>(&bytes).ok())
        .and_then(|claims| claims.aal)
        .map(|aal| AssuranceLevel::from_claim(&aal))
        .unwrap_or_default()
}

//=========================================================================================
// `AuthService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthService for GoTrueAdapter {
    async fn current_session(&self) -> PortResult<Option<Session>> {
        let Some(session) = self.sessions.load().await else {
            return Ok(None);
        };
        if !session.is_expired(Utc::now()) {
            return Ok(Some(session));
        }

        debug!("Stored session expired, refreshing");
        let refreshed = self
            .grant(
                "refresh_token",
                json!({ "refresh_token": session.refresh_token }),
            )
            .await;
        match refreshed {
            Ok(fresh) => {
                self.sessions.replace(fresh.clone()).await;
                Ok(Some(fresh))
            }
            Err(e) => {
                warn!(error = %e, "Session refresh failed, signing out");
                self.sessions.clear().await;
                self.publish(AuthEvent::SignedOut);
                Ok(None)
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> PortResult<Session> {
        let session = self
            .grant("password", json!({ "email": email, "password": password }))
            .await?;
        Ok(self.establish(session).await)
    }

    async fn sign_up(&self, account: &NewAccount) -> PortResult<()> {
        let body = json!({
            "email": account.email,
            "password": account.password,
            "data": { "name": account.name, "age": account.age },
        });
        let response = self
            .request(Method::POST, &["signup"])?
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response).await?;
        info!(email = %account.email, "Account created");
        Ok(())
    }

    async fn sign_out(&self) -> PortResult<()> {
        if let Ok(request) = self.authorized(Method::POST, &["logout"]).await {
            let outcome = match request.send().await {
                Ok(response) => ensure_success(response).await.map(|_| ()),
                Err(e) => Err(transport_error(e)),
            };
            if let Err(e) = outcome {
                warn!(error = %e, "Remote sign-out failed, clearing the local session anyway");
            }
        }
        self.sessions.clear().await;
        self.publish(AuthEvent::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> AuthEventStream {
        let mut receiver = self.events.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Auth event subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn list_factors(&self) -> PortResult<FactorList> {
        let response = self
            .authorized(Method::GET, &["user"])
            .await?
            .send()
            .await
            .map_err(transport_error)?;
        let user: UserRecord = read_json(response).await?;
        Ok(FactorList::from_factors(user.to_domain().factors))
    }

    async fn enroll_totp(&self) -> PortResult<TotpEnrollment> {
        let response = self
            .authorized(Method::POST, &["factors"])
            .await?
            .json(&json!({ "factor_type": "totp" }))
            .send()
            .await
            .map_err(transport_error)?;
        let record: EnrollRecord = read_json(response).await?;
        debug!(factor_id = %record.id, "TOTP enrollment started");
        Ok(TotpEnrollment {
            factor_id: record.id,
            qr_code: record.totp.qr_code,
            secret: record.totp.secret,
            uri: record.totp.uri,
        })
    }

    async fn challenge(&self, factor_id: Uuid) -> PortResult<MfaChallenge> {
        let response = self
            .authorized(Method::POST, &["factors", factor_id.to_string().as_str(), "challenge"])
            .await?
            .send()
            .await
            .map_err(transport_error)?;
        let record: ChallengeRecord = read_json(response).await?;
        Ok(MfaChallenge {
            id: record.id,
            factor_id,
            expires_at: record
                .expires_at
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        })
    }

    async fn verify_challenge(
        &self,
        factor_id: Uuid,
        challenge_id: Uuid,
        code: &VerificationCode,
    ) -> PortResult<Session> {
        let response = self
            .authorized(Method::POST, &["factors", factor_id.to_string().as_str(), "verify"])
            .await?
            .json(&json!({ "challenge_id": challenge_id, "code": code.as_str() }))
            .send()
            .await
            .map_err(transport_error)?;
        let record: SessionRecord = read_json(response).await?;
        Ok(self.establish(record.to_domain()).await)
    }

    async fn verify_enrollment(&self, factor_id: Uuid, code: &VerificationCode) -> PortResult<()> {
        let challenge = self.challenge(factor_id).await?;
        self.verify_challenge(factor_id, challenge.id, code).await?;
        info!(factor_id = %factor_id, "TOTP factor verified");
        Ok(())
    }

    async fn unenroll(&self, factor_id: Uuid) -> PortResult<()> {
        let response = self
            .authorized(Method::DELETE, &["factors", factor_id.to_string().as_str()])
            .await?
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response).await?;
        info!(factor_id = %factor_id, "Factor removed");
        Ok(())
    }
}
