//! services/client/src/app/auth_flow.rs
//!
//! The sign-in / sign-up state machine, including the second-factor branch.
//!
//! Steps: `Credentials` -> `MfaChallenge` -> `Authenticated`, with `back`
//! returning from the challenge to the credentials step. Failures never move
//! the machine; they are kept as a display string for the form.

use crate::app::state::AppState;
use egolay_core::domain::{NewAccount, Session, User, ValidationError, VerificationCode};
use egolay_core::ports::PortResult;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_SIGN_UP_AGE: u32 = 13;
pub const MAX_SIGN_UP_AGE: u32 = 120;

#[derive(Debug, Clone, PartialEq)]
pub enum AuthStep {
    Credentials,
    /// Waiting for the one-time code answering `challenge_id`.
    MfaChallenge { factor_id: Uuid, challenge_id: Uuid },
    Authenticated(User),
}

/// The raw sign-up form, as typed by the user.
#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub age: String,
}

impl SignUpForm {
    pub fn validate(&self) -> Result<NewAccount, ValidationError> {
        let name = self.name.trim();
        let email = self.email.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("Name"));
        }
        if email.is_empty() {
            return Err(ValidationError::MissingField("Email"));
        }
        if !email.contains('@') {
            return Err(ValidationError::InvalidEmail);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort(MIN_PASSWORD_LEN));
        }
        let age = self
            .age
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|a| (MIN_SIGN_UP_AGE..=MAX_SIGN_UP_AGE).contains(a))
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "age",
                reason: format!("must be a number from {MIN_SIGN_UP_AGE} to {MAX_SIGN_UP_AGE}"),
            })?;

        Ok(NewAccount {
            email: email.to_string(),
            password: self.password.clone(),
            name: name.to_string(),
            age,
        })
    }
}

pub struct AuthFlow {
    app: Arc<AppState>,
    step: AuthStep,
    error: Option<String>,
    loading: bool,
}

impl AuthFlow {
    pub fn new(app: Arc<AppState>) -> Self {
        Self {
            app,
            step: AuthStep::Credentials,
            error: None,
            loading: false,
        }
    }

    pub fn step(&self) -> &AuthStep {
        &self.step
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.step, AuthStep::Authenticated(_))
    }

    /// Submits sign-in credentials.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> &AuthStep {
        if self.step != AuthStep::Credentials {
            warn!("Sign-in ignored outside the credentials step");
            return &self.step;
        }

        self.begin();
        let outcome = async {
            let session = self.app.auth.sign_in(email, password).await?;
            self.second_factor_step(session).await
        }
        .await;
        self.finish(outcome.map_err(|e| e.to_string()))
    }

    /// Creates the account, then signs in with the same credentials.
    pub async fn sign_up(&mut self, form: &SignUpForm) -> &AuthStep {
        if self.step != AuthStep::Credentials {
            warn!("Sign-up ignored outside the credentials step");
            return &self.step;
        }
        let account = match form.validate() {
            Ok(account) => account,
            Err(e) => {
                self.error = Some(e.to_string());
                return &self.step;
            }
        };

        self.begin();
        let outcome = async {
            self.app.auth.sign_up(&account).await?;
            let session = self
                .app
                .auth
                .sign_in(&account.email, &account.password)
                .await?;
            self.second_factor_step(session).await
        }
        .await;
        self.finish(outcome.map_err(|e| e.to_string()))
    }

    /// Answers the pending challenge with a one-time code.
    pub async fn submit_code(&mut self, code: &str) -> &AuthStep {
        let AuthStep::MfaChallenge {
            factor_id,
            challenge_id,
        } = self.step.clone()
        else {
            warn!("Verification code ignored outside the challenge step");
            return &self.step;
        };
        let code = match VerificationCode::parse(code) {
            Ok(code) => code,
            Err(e) => {
                self.error = Some(e.to_string());
                return &self.step;
            }
        };

        self.begin();
        let outcome = self
            .app
            .auth
            .verify_challenge(factor_id, challenge_id, &code)
            .await
            .map(|session| AuthStep::Authenticated(session.user))
            .map_err(|e| e.to_string());
        self.finish(outcome)
    }

    /// Leaves the challenge step for the credentials step.
    pub fn back(&mut self) {
        if matches!(self.step, AuthStep::MfaChallenge { .. }) {
            self.step = AuthStep::Credentials;
            self.error = None;
        }
    }

    pub fn reset(&mut self) {
        self.step = AuthStep::Credentials;
        self.error = None;
        self.loading = false;
    }

    /// Decides where a fresh password session goes next.
    ///
    /// A verified factor on the session's user always leads to a challenge,
    /// whatever the provider list says; the session listener applies the same
    /// rule through `Session::is_fully_authenticated`.
    async fn second_factor_step(&self, session: Session) -> PortResult<AuthStep> {
        if session.is_fully_authenticated() && !session.user.has_second_factor_provider() {
            return Ok(AuthStep::Authenticated(session.user));
        }

        let factors = self.app.auth.list_factors().await?;
        let factor_id = factors
            .totp
            .first()
            .or_else(|| session.user.factors.iter().find(|f| f.is_verified_totp()))
            .map(|f| f.id);
        let Some(factor_id) = factor_id else {
            warn!(user_id = %session.user.id, "Second factor listed but none is verified");
            return Ok(AuthStep::Authenticated(session.user));
        };

        let challenge = self.app.auth.challenge(factor_id).await?;
        info!(factor_id = %factor_id, "Second factor required, challenge issued");
        Ok(AuthStep::MfaChallenge {
            factor_id,
            challenge_id: challenge.id,
        })
    }

    fn begin(&mut self) {
        self.loading = true;
        self.error = None;
    }

    fn finish(&mut self, outcome: Result<AuthStep, String>) -> &AuthStep {
        self.loading = false;
        match outcome {
            Ok(step) => self.step = step,
            Err(message) => self.error = Some(message),
        }
        &self.step
    }
}
