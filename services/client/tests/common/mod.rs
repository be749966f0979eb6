//! In-memory fakes of the service ports, recording every call in one shared log.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use client_lib::app::{AppState, StoreHandle, AppStore};
use egolay_core::domain::{
    AssuranceLevel, AuthEvent, Book, FactorList, FactorStatus, FactorType, MfaChallenge,
    MfaFactor, NewAccount, Recommendation, Session, TotpEnrollment, User, UserProfile,
    VerificationCode, TOTP_PROVIDER,
};
use egolay_core::ports::{AuthEventStream, AuthService, LibraryService, PortError, PortResult};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;

pub const VALID_CODE: &str = "123456";
pub const PASSWORD: &str = "secret1";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SignIn(String),
    SignUp(String),
    SignOut,
    ListFactors,
    EnrollTotp,
    Challenge(Uuid),
    VerifyChallenge { factor_id: Uuid, challenge_id: Uuid, code: String },
    VerifyEnrollment { factor_id: Uuid, code: String },
    Unenroll(Uuid),
    GetProfile,
    UpdateProfile(UserProfile),
    GetWishlist,
    AddToWishlist(String),
    RemoveFromWishlist(String),
    GetReadingHistory,
    AddToReadingHistory(String),
    GetRecommendations,
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<Call> {
    log.lock().unwrap().clone()
}

pub fn verified_totp(id: Uuid) -> MfaFactor {
    MfaFactor {
        id,
        friendly_name: None,
        factor_type: FactorType::Totp,
        status: FactorStatus::Verified,
        created_at: Utc::now(),
    }
}

//=========================================================================================
// Fake AuthService
//=========================================================================================

struct AuthInner {
    user_id: Uuid,
    providers: Vec<String>,
    factors: Vec<MfaFactor>,
    session: Option<Session>,
    challenges: Vec<Uuid>,
}

pub struct FakeAuth {
    log: CallLog,
    inner: Mutex<AuthInner>,
    events: broadcast::Sender<AuthEvent>,
}

impl FakeAuth {
    /// An account without a second factor.
    pub fn new(log: CallLog) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            log,
            inner: Mutex::new(AuthInner {
                user_id: Uuid::new_v4(),
                providers: vec!["email".to_string()],
                factors: Vec::new(),
                session: None,
                challenges: Vec::new(),
            }),
            events,
        }
    }

    /// An account with one verified TOTP factor.
    pub fn with_totp(log: CallLog, factor_id: Uuid) -> Self {
        let fake = Self::new(log);
        {
            let mut inner = fake.inner.lock().unwrap();
            inner.providers.push(TOTP_PROVIDER.to_string());
            inner.factors.push(verified_totp(factor_id));
        }
        fake
    }

    /// A verified TOTP factor that the provider list does not mention.
    pub fn with_unlisted_totp(log: CallLog, factor_id: Uuid) -> Self {
        let fake = Self::new(log);
        fake.inner.lock().unwrap().factors.push(verified_totp(factor_id));
        fake
    }

    /// Lists `totp` as a provider while no factor is verified.
    pub fn with_stale_totp_provider(log: CallLog) -> Self {
        let fake = Self::new(log);
        fake.inner
            .lock()
            .unwrap()
            .providers
            .push(TOTP_PROVIDER.to_string());
        fake
    }

    /// Starts with a fully authenticated stored session.
    pub fn signed_in(self) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            let session = session_for(&inner, AssuranceLevel::Aal2);
            inner.session = Some(session);
        }
        self
    }

    pub fn factors(&self) -> Vec<MfaFactor> {
        self.inner.lock().unwrap().factors.clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.lock().unwrap().session.clone()
    }

    /// Pushes an event to subscribers as the backend would.
    pub fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }

    pub fn aal2_session(&self) -> Session {
        session_for(&self.inner.lock().unwrap(), AssuranceLevel::Aal2)
    }

    pub fn aal1_session(&self) -> Session {
        session_for(&self.inner.lock().unwrap(), AssuranceLevel::Aal1)
    }

    fn record(&self, call: Call) {
        self.log.lock().unwrap().push(call);
    }
}

fn session_for(inner: &AuthInner, assurance: AssuranceLevel) -> Session {
    Session {
        access_token: format!("token-{}", assurance.as_str()),
        refresh_token: "refresh".to_string(),
        expires_at: Utc::now() + Duration::hours(1),
        assurance,
        user: User {
            id: inner.user_id,
            email: Some("a@b.com".to_string()),
            providers: inner.providers.clone(),
            factors: inner.factors.clone(),
        },
    }
}

#[async_trait]
impl AuthService for FakeAuth {
    async fn current_session(&self) -> PortResult<Option<Session>> {
        Ok(self.session())
    }

    async fn sign_in(&self, email: &str, password: &str) -> PortResult<Session> {
        self.record(Call::SignIn(email.to_string()));
        if password != PASSWORD {
            return Err(PortError::Rejected("Invalid login credentials".to_string()));
        }
        let session = {
            let mut inner = self.inner.lock().unwrap();
            let session = session_for(&inner, AssuranceLevel::Aal1);
            inner.session = Some(session.clone());
            session
        };
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, account: &NewAccount) -> PortResult<()> {
        self.record(Call::SignUp(account.email.clone()));
        Ok(())
    }

    async fn sign_out(&self) -> PortResult<()> {
        self.record(Call::SignOut);
        self.inner.lock().unwrap().session = None;
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> AuthEventStream {
        let mut receiver = self.events.subscribe();
        Box::pin(async_stream::stream! {
            while let Ok(event) = receiver.recv().await {
                yield event;
            }
        })
    }

    async fn list_factors(&self) -> PortResult<FactorList> {
        self.record(Call::ListFactors);
        Ok(FactorList::from_factors(self.factors()))
    }

    async fn enroll_totp(&self) -> PortResult<TotpEnrollment> {
        self.record(Call::EnrollTotp);
        let factor_id = Uuid::new_v4();
        self.inner.lock().unwrap().factors.push(MfaFactor {
            id: factor_id,
            friendly_name: None,
            factor_type: FactorType::Totp,
            status: FactorStatus::Unverified,
            created_at: Utc::now(),
        });
        Ok(TotpEnrollment {
            factor_id,
            qr_code: format!("data:image/svg+xml;{factor_id}"),
            secret: format!("SECRET-{factor_id}"),
            uri: format!("otpauth://totp/Egolay:a@b.com?secret={factor_id}"),
        })
    }

    async fn challenge(&self, factor_id: Uuid) -> PortResult<MfaChallenge> {
        self.record(Call::Challenge(factor_id));
        let id = Uuid::new_v4();
        self.inner.lock().unwrap().challenges.push(id);
        Ok(MfaChallenge {
            id,
            factor_id,
            expires_at: None,
        })
    }

    async fn verify_challenge(
        &self,
        factor_id: Uuid,
        challenge_id: Uuid,
        code: &VerificationCode,
    ) -> PortResult<Session> {
        self.record(Call::VerifyChallenge {
            factor_id,
            challenge_id,
            code: code.as_str().to_string(),
        });
        if code.as_str() != VALID_CODE {
            return Err(PortError::Rejected("Invalid TOTP code entered".to_string()));
        }
        let session = {
            let mut inner = self.inner.lock().unwrap();
            if !inner.challenges.contains(&challenge_id) {
                return Err(PortError::NotFound(format!("challenge {challenge_id}")));
            }
            let session = session_for(&inner, AssuranceLevel::Aal2);
            inner.session = Some(session.clone());
            session
        };
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn verify_enrollment(&self, factor_id: Uuid, code: &VerificationCode) -> PortResult<()> {
        self.record(Call::VerifyEnrollment {
            factor_id,
            code: code.as_str().to_string(),
        });
        if code.as_str() != VALID_CODE {
            return Err(PortError::Rejected("Invalid TOTP code entered".to_string()));
        }
        let mut inner = self.inner.lock().unwrap();
        let factor = inner
            .factors
            .iter_mut()
            .find(|f| f.id == factor_id)
            .ok_or_else(|| PortError::NotFound(format!("factor {factor_id}")))?;
        factor.status = FactorStatus::Verified;
        if !inner.providers.iter().any(|p| p == TOTP_PROVIDER) {
            inner.providers.push(TOTP_PROVIDER.to_string());
        }
        Ok(())
    }

    async fn unenroll(&self, factor_id: Uuid) -> PortResult<()> {
        self.record(Call::Unenroll(factor_id));
        self.inner.lock().unwrap().factors.retain(|f| f.id != factor_id);
        Ok(())
    }
}

//=========================================================================================
// Fake LibraryService
//=========================================================================================

#[derive(Default)]
struct LibraryInner {
    profile: Option<UserProfile>,
    wishlist: Vec<Book>,
    history: Vec<Book>,
    recommendations: Vec<Recommendation>,
    failing: HashSet<&'static str>,
}

pub struct FakeLibrary {
    log: CallLog,
    inner: Mutex<LibraryInner>,
}

impl FakeLibrary {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            inner: Mutex::new(LibraryInner::default()),
        }
    }

    pub fn with_profile(self, profile: UserProfile) -> Self {
        self.inner.lock().unwrap().profile = Some(profile);
        self
    }

    pub fn with_wishlist(self, books: Vec<Book>) -> Self {
        self.inner.lock().unwrap().wishlist = books;
        self
    }

    pub fn with_history(self, books: Vec<Book>) -> Self {
        self.inner.lock().unwrap().history = books;
        self
    }

    pub fn with_recommendations(self, items: Vec<Recommendation>) -> Self {
        self.inner.lock().unwrap().recommendations = items;
        self
    }

    /// Makes the named operation fail, e.g. `"get_wishlist"`.
    pub fn failing(self, operation: &'static str) -> Self {
        self.inner.lock().unwrap().failing.insert(operation);
        self
    }

    pub fn set_failing(&self, operation: &'static str, fail: bool) {
        let mut inner = self.inner.lock().unwrap();
        if fail {
            inner.failing.insert(operation);
        } else {
            inner.failing.remove(operation);
        }
    }

    pub fn wishlist(&self) -> Vec<Book> {
        self.inner.lock().unwrap().wishlist.clone()
    }

    pub fn history(&self) -> Vec<Book> {
        self.inner.lock().unwrap().history.clone()
    }

    fn enter(&self, call: Call, operation: &'static str) -> PortResult<()> {
        self.log.lock().unwrap().push(call);
        if self.inner.lock().unwrap().failing.contains(operation) {
            return Err(PortError::Unexpected(format!("{operation} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl LibraryService for FakeLibrary {
    async fn get_profile(&self) -> PortResult<Option<UserProfile>> {
        self.enter(Call::GetProfile, "get_profile")?;
        Ok(self.inner.lock().unwrap().profile.clone())
    }

    async fn update_profile(&self, profile: &UserProfile) -> PortResult<UserProfile> {
        self.enter(Call::UpdateProfile(profile.clone()), "update_profile")?;
        self.inner.lock().unwrap().profile = Some(profile.clone());
        Ok(profile.clone())
    }

    async fn get_wishlist(&self) -> PortResult<Vec<Book>> {
        self.enter(Call::GetWishlist, "get_wishlist")?;
        Ok(self.wishlist())
    }

    async fn add_to_wishlist(&self, book_id: &str, book: Option<&Book>) -> PortResult<()> {
        self.enter(Call::AddToWishlist(book_id.to_string()), "add_to_wishlist")?;
        let entry = book.cloned().unwrap_or_else(|| Book::stub(book_id));
        self.inner.lock().unwrap().wishlist.push(entry);
        Ok(())
    }

    async fn remove_from_wishlist(&self, book_id: &str) -> PortResult<()> {
        self.enter(
            Call::RemoveFromWishlist(book_id.to_string()),
            "remove_from_wishlist",
        )?;
        self.inner.lock().unwrap().wishlist.retain(|b| b.id != book_id);
        Ok(())
    }

    async fn get_reading_history(&self) -> PortResult<Vec<Book>> {
        self.enter(Call::GetReadingHistory, "get_reading_history")?;
        Ok(self.history())
    }

    async fn add_to_reading_history(&self, book: &Book) -> PortResult<()> {
        self.enter(
            Call::AddToReadingHistory(book.id.clone()),
            "add_to_reading_history",
        )?;
        self.inner.lock().unwrap().history.push(book.clone());
        Ok(())
    }

    async fn get_recommendations(&self) -> PortResult<Vec<Recommendation>> {
        self.enter(Call::GetRecommendations, "get_recommendations")?;
        Ok(self.inner.lock().unwrap().recommendations.clone())
    }
}

//=========================================================================================
// Wiring
//=========================================================================================

pub fn app_state(auth: Arc<FakeAuth>, library: Arc<FakeLibrary>) -> Arc<AppState> {
    Arc::new(AppState {
        auth,
        library,
    })
}

pub fn book(id: &str, title: &str) -> Book {
    Book {
        title: title.to_string(),
        author: "Someone".to_string(),
        genres: vec!["Fiction".to_string()],
        ..Book::stub(id)
    }
}

/// Polls the store until `check` holds, failing the test after two seconds.
pub async fn wait_for(store: &StoreHandle, check: impl Fn(&AppStore) -> bool) {
    let result = tokio::time::timeout(std::time::Duration::from_secs(2), async {
        loop {
            if check(&*store.lock().await) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "store never reached the expected state");
}
