//! crates/egolay_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! The remote backend is the only external boundary; these traits let the
//! application layer stay independent of the concrete HTTP adapters.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{
    AuthEvent, Book, FactorList, MfaChallenge, NewAccount, Recommendation, Session,
    TotpEnrollment, UserProfile, VerificationCode,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// The backend refused the request and explained why.
    #[error("{0}")]
    Rejected(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// The auth-state-change notification stream.
pub type AuthEventStream = Pin<Box<dyn Stream<Item = AuthEvent> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait AuthService: Send + Sync {
    // --- Session ---
    /// Returns the stored session, if one exists and is still valid.
    async fn current_session(&self) -> PortResult<Option<Session>>;

    async fn sign_in(&self, email: &str, password: &str) -> PortResult<Session>;

    async fn sign_up(&self, account: &NewAccount) -> PortResult<()>;

    async fn sign_out(&self) -> PortResult<()>;

    /// Subscribes to `SIGNED_IN` / `SIGNED_OUT` notifications.
    fn subscribe(&self) -> AuthEventStream;

    // --- Multi-factor ---
    async fn list_factors(&self) -> PortResult<FactorList>;

    async fn enroll_totp(&self) -> PortResult<TotpEnrollment>;

    async fn challenge(&self, factor_id: Uuid) -> PortResult<MfaChallenge>;

    /// Answers a challenge. On success the upgraded session is returned.
    async fn verify_challenge(
        &self,
        factor_id: Uuid,
        challenge_id: Uuid,
        code: &VerificationCode,
    ) -> PortResult<Session>;

    /// Activates a pending enrollment.
    async fn verify_enrollment(&self, factor_id: Uuid, code: &VerificationCode) -> PortResult<()>;

    async fn unenroll(&self, factor_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait LibraryService: Send + Sync {
    // --- Profile ---
    async fn get_profile(&self) -> PortResult<Option<UserProfile>>;

    async fn update_profile(&self, profile: &UserProfile) -> PortResult<UserProfile>;

    // --- Wishlist ---
    async fn get_wishlist(&self) -> PortResult<Vec<Book>>;

    async fn add_to_wishlist(&self, book_id: &str, book: Option<&Book>) -> PortResult<()>;

    async fn remove_from_wishlist(&self, book_id: &str) -> PortResult<()>;

    // --- Reading History ---
    async fn get_reading_history(&self) -> PortResult<Vec<Book>>;

    async fn add_to_reading_history(&self, book: &Book) -> PortResult<()>;

    // --- Recommendations ---
    /// Ranking happens on the backend; the client only renders the result.
    async fn get_recommendations(&self) -> PortResult<Vec<Recommendation>>;
}
