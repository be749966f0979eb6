//! services/client/src/app/mfa_flow.rs
//!
//! Managing second factors for the signed-in user: list, enroll + verify,
//! and remove.

use crate::app::state::AppState;
use egolay_core::domain::{MfaFactor, TotpEnrollment, VerificationCode};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

pub const REMOVE_PROMPT: &str =
    "Are you sure you want to remove this MFA factor? This will make your account less secure.";

/// Asks the user to confirm a destructive action.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MfaStep {
    List,
    /// Enrollment started; holds the only pending factor.
    Setup(TotpEnrollment),
}

/// One line describing the account's second-factor status.
pub fn security_summary(factor_count: usize) -> String {
    match factor_count {
        0 => "Add an extra layer of security to your account".to_string(),
        1 => "You have 1 MFA factor configured".to_string(),
        n => format!("You have {} MFA factors configured", n),
    }
}

pub struct MfaManager {
    app: Arc<AppState>,
    step: MfaStep,
    factors: Vec<MfaFactor>,
    code: String,
    error: Option<String>,
    success: Option<String>,
    loading: bool,
}

impl MfaManager {
    pub fn new(app: Arc<AppState>) -> Self {
        Self {
            app,
            step: MfaStep::List,
            factors: Vec::new(),
            code: String::new(),
            error: None,
            success: None,
            loading: false,
        }
    }

    pub fn step(&self) -> &MfaStep {
        &self.step
    }

    /// Verified TOTP factors, as of the last refresh.
    pub fn factors(&self) -> &[MfaFactor] {
        &self.factors
    }

    pub fn pending_enrollment(&self) -> Option<&TotpEnrollment> {
        match &self.step {
            MfaStep::Setup(enrollment) => Some(enrollment),
            MfaStep::List => None,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn success(&self) -> Option<&str> {
        self.success.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub async fn refresh(&mut self) {
        self.loading = true;
        self.error = None;
        match self.app.auth.list_factors().await {
            Ok(list) => self.factors = list.totp,
            Err(e) => {
                error!("Failed to load MFA factors: {}", e);
                self.error = Some(format!("Failed to load MFA factors: {}", e));
            }
        }
        self.loading = false;
    }

    /// Requests a new TOTP factor. Any enrollment already pending is replaced.
    pub async fn start_enrollment(&mut self) -> bool {
        self.loading = true;
        self.error = None;
        self.success = None;

        let started = match self.app.auth.enroll_totp().await {
            Ok(enrollment) => {
                info!(factor_id = %enrollment.factor_id, "MFA setup started");
                self.step = MfaStep::Setup(enrollment);
                self.code.clear();
                true
            }
            Err(e) => {
                self.error = Some(format!("Failed to start MFA setup: {}", e));
                false
            }
        };
        self.loading = false;
        started
    }

    pub fn set_code(&mut self, code: impl Into<String>) {
        self.code = code.into();
    }

    /// Verifies the pending enrollment with the entered code.
    ///
    /// On failure the step and the entered code are kept for correction.
    pub async fn verify(&mut self) -> bool {
        let MfaStep::Setup(enrollment) = &self.step else {
            return false;
        };
        let factor_id = enrollment.factor_id;

        if self.code.trim().is_empty() {
            self.error = Some("Please enter the verification code".to_string());
            return false;
        }
        let code = match VerificationCode::parse(&self.code) {
            Ok(code) => code,
            Err(e) => {
                self.error = Some(e.to_string());
                return false;
            }
        };

        self.loading = true;
        self.error = None;
        let result = self.app.auth.verify_enrollment(factor_id, &code).await;
        self.loading = false;

        match result {
            Ok(()) => {
                self.success =
                    Some("MFA has been successfully enabled for your account!".to_string());
                self.step = MfaStep::List;
                self.code.clear();
                self.refresh().await;
                true
            }
            Err(e) => {
                self.error = Some(e.to_string());
                false
            }
        }
    }

    /// Abandons the pending enrollment.
    pub fn cancel(&mut self) {
        self.step = MfaStep::List;
        self.code.clear();
        self.error = None;
    }

    /// Removes a factor after the user confirms.
    pub async fn remove(&mut self, factor_id: Uuid, confirm: &impl Confirm) -> bool {
        if !confirm.confirm(REMOVE_PROMPT) {
            return false;
        }

        self.loading = true;
        self.error = None;
        self.success = None;
        let result = self.app.auth.unenroll(factor_id).await;
        self.loading = false;

        match result {
            Ok(()) => {
                self.success = Some("MFA factor removed successfully".to_string());
                self.refresh().await;
                true
            }
            Err(e) => {
                self.error = Some(format!("Failed to remove MFA factor: {}", e));
                false
            }
        }
    }

    /// Resets everything but the factor list.
    pub fn close(&mut self) {
        self.step = MfaStep::List;
        self.code.clear();
        self.error = None;
        self.success = None;
    }
}
