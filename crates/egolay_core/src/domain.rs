//! crates/egolay_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any transport or serialization format;
//! adapters convert their wire records into these types at the API boundary.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

//=========================================================================================
// Validation
//=========================================================================================

/// Errors raised when user input or backend data fails boundary validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter the 6-digit verification code")]
    InvalidCode,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Password must be at least {0} characters")]
    PasswordTooShort(usize),
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

//=========================================================================================
// Identity & Session
//=========================================================================================

/// The provider name the backend lists once a TOTP factor is configured.
pub const TOTP_PROVIDER: &str = "totp";

/// Represents the authenticated user as reported by the auth backend.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    /// Sign-in providers attached to the account (`email`, `totp`, ...).
    pub providers: Vec<String>,
    pub factors: Vec<MfaFactor>,
}

impl User {
    /// Whether the account's provider list indicates a configured second factor.
    pub fn has_second_factor_provider(&self) -> bool {
        self.providers.iter().any(|p| p == TOTP_PROVIDER)
    }

    pub fn has_verified_totp(&self) -> bool {
        self.factors.iter().any(MfaFactor::is_verified_totp)
    }
}

/// Authenticator assurance level of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssuranceLevel {
    /// Password only.
    #[default]
    Aal1,
    /// Password plus a verified second factor.
    Aal2,
}

impl AssuranceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssuranceLevel::Aal1 => "aal1",
            AssuranceLevel::Aal2 => "aal2",
        }
    }

    /// Parses the `aal` claim. Unknown values fall back to `Aal1`.
    pub fn from_claim(claim: &str) -> Self {
        match claim {
            "aal2" => AssuranceLevel::Aal2,
            _ => AssuranceLevel::Aal1,
        }
    }
}

/// The server-recognized authenticated state for a user.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub assurance: AssuranceLevel,
    pub user: User,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// A session that still owes a second factor is not a signed-in session.
    pub fn is_fully_authenticated(&self) -> bool {
        self.assurance == AssuranceLevel::Aal2 || !self.user.has_verified_totp()
    }
}

/// Notifications delivered by the auth-state-change stream.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
}

impl AuthEvent {
    /// The backend's event name.
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::SignedIn(_) => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
        }
    }
}

// Only used for sign-up - contains the plain password
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub name: String,
    pub age: u32,
}

//=========================================================================================
// Multi-factor Authentication
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactorType {
    Totp,
    Other(String),
}

impl FactorType {
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("totp") {
            FactorType::Totp
        } else {
            FactorType::Other(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FactorType::Totp => "totp",
            FactorType::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorStatus {
    Unverified,
    Verified,
}

impl FactorStatus {
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("verified") {
            FactorStatus::Verified
        } else {
            FactorStatus::Unverified
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FactorStatus::Unverified => "unverified",
            FactorStatus::Verified => "verified",
        }
    }
}

/// A registered second authentication method.
#[derive(Debug, Clone, PartialEq)]
pub struct MfaFactor {
    pub id: Uuid,
    pub friendly_name: Option<String>,
    pub factor_type: FactorType,
    pub status: FactorStatus,
    pub created_at: DateTime<Utc>,
}

impl MfaFactor {
    pub fn is_verified_totp(&self) -> bool {
        self.factor_type == FactorType::Totp && self.status == FactorStatus::Verified
    }

    /// The name shown to the user, falling back to the factor type.
    pub fn display_name(&self) -> &str {
        self.friendly_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.factor_type.as_str())
    }
}

/// All factors of the current user, plus the verified TOTP subset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactorList {
    pub all: Vec<MfaFactor>,
    pub totp: Vec<MfaFactor>,
}

impl FactorList {
    pub fn from_factors(all: Vec<MfaFactor>) -> Self {
        let totp = all.iter().filter(|f| f.is_verified_totp()).cloned().collect();
        Self { all, totp }
    }
}

/// The provisioning material returned when a TOTP enrollment starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotpEnrollment {
    pub factor_id: Uuid,
    /// A displayable image (SVG data URI) encoding `uri`.
    pub qr_code: String,
    pub secret: String,
    pub uri: String,
}

/// A short-lived server-issued request for a one-time code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfaChallenge {
    pub id: Uuid,
    pub factor_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A one-time code: exactly six ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationCode(String);

impl VerificationCode {
    pub const LENGTH: usize = 6;

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let code = input.trim();
        if code.len() != Self::LENGTH || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidCode);
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//=========================================================================================
// Reading Profile
//=========================================================================================

pub const GENRES: [&str; 16] = [
    "Fiction",
    "Non-Fiction",
    "Mystery",
    "Romance",
    "Sci-Fi",
    "Fantasy",
    "Biography",
    "History",
    "Philosophy",
    "Psychology",
    "Business",
    "Self-Help",
    "Travel",
    "Cooking",
    "Art",
    "Poetry",
];

pub const MOODS: [&str; 10] = [
    "Adventurous",
    "Contemplative",
    "Escapist",
    "Educational",
    "Inspiring",
    "Relaxing",
    "Challenging",
    "Nostalgic",
    "Romantic",
    "Thrilling",
];

pub const DEFAULT_THEME: &str = "default";
pub const MIN_PREFERRED_LENGTH: u32 = 100;
pub const MAX_PREFERRED_LENGTH: u32 = 500;
pub const PREFERRED_LENGTH_STEP: u32 = 50;
pub const MAX_AGE: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingLevel {
    /// 1-5 books a year.
    Casual,
    /// 6-20 books a year.
    Regular,
    /// More than 20 books a year.
    Avid,
}

impl ReadingLevel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "casual" => Some(ReadingLevel::Casual),
            "regular" => Some(ReadingLevel::Regular),
            "avid" => Some(ReadingLevel::Avid),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingLevel::Casual => "casual",
            ReadingLevel::Regular => "regular",
            ReadingLevel::Avid => "avid",
        }
    }
}

/// The user's reading preferences.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub name: String,
    pub age: u32,
    pub reading_level: Option<ReadingLevel>,
    /// Preferred book length in pages.
    pub preferred_length: u32,
    pub favorite_genres: Vec<String>,
    pub current_moods: Vec<String>,
    pub favorite_authors: String,
    pub recent_favorite: String,
    pub looking_for: String,
    pub theme: String,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: String::new(),
            age: 0,
            reading_level: None,
            preferred_length: 250,
            favorite_genres: Vec::new(),
            current_moods: Vec::new(),
            favorite_authors: String::new(),
            recent_favorite: String::new(),
            looking_for: String::new(),
            theme: DEFAULT_THEME.to_string(),
        }
    }
}

impl UserProfile {
    pub fn toggle_genre(&mut self, genre: &str) {
        toggle(&mut self.favorite_genres, genre);
    }

    pub fn toggle_mood(&mut self, mood: &str) {
        toggle(&mut self.current_moods, mood);
    }

    /// Clamps a slider value into the preferred-length range, on the slider's step.
    pub fn snap_preferred_length(pages: u32) -> u32 {
        let clamped = pages.clamp(MIN_PREFERRED_LENGTH, MAX_PREFERRED_LENGTH);
        let offset = clamped - MIN_PREFERRED_LENGTH;
        let steps = (offset + PREFERRED_LENGTH_STEP / 2) / PREFERRED_LENGTH_STEP;
        MIN_PREFERRED_LENGTH + steps * PREFERRED_LENGTH_STEP
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.age > MAX_AGE {
            return Err(ValidationError::InvalidValue {
                field: "age",
                reason: format!("must be at most {MAX_AGE}"),
            });
        }
        if !(MIN_PREFERRED_LENGTH..=MAX_PREFERRED_LENGTH).contains(&self.preferred_length)
            || (self.preferred_length - MIN_PREFERRED_LENGTH) % PREFERRED_LENGTH_STEP != 0
        {
            return Err(ValidationError::InvalidValue {
                field: "preferred length",
                reason: format!(
                    "must be between {MIN_PREFERRED_LENGTH} and {MAX_PREFERRED_LENGTH} pages in steps of {PREFERRED_LENGTH_STEP}"
                ),
            });
        }
        if let Some(genre) = self.favorite_genres.iter().find(|g| !GENRES.contains(&g.as_str())) {
            return Err(ValidationError::InvalidValue {
                field: "favorite genres",
                reason: format!("unknown genre '{genre}'"),
            });
        }
        if let Some(mood) = self.current_moods.iter().find(|m| !MOODS.contains(&m.as_str())) {
            return Err(ValidationError::InvalidValue {
                field: "current moods",
                reason: format!("unknown mood '{mood}'"),
            });
        }
        Ok(())
    }
}

/// Adds `value` if absent, removes it if present. Keeps insertion order.
fn toggle(values: &mut Vec<String>, value: &str) {
    if let Some(pos) = values.iter().position(|v| v == value) {
        values.remove(pos);
    } else {
        values.push(value.to_string());
    }
}

//=========================================================================================
// Books
//=========================================================================================

/// A book as stored in the wishlist or reading history.
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub genres: Vec<String>,
    /// Average community rating.
    pub rating: f32,
    /// The user's own rating, 1 to 5 stars.
    pub my_rating: Option<u8>,
    pub date_read: Option<NaiveDate>,
    pub review: Option<String>,
    pub cover_url: String,
}

impl Book {
    /// A wishlist entry known only by its identifier.
    pub fn stub(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            author: String::new(),
            genres: Vec::new(),
            rating: 0.0,
            my_rating: None,
            date_read: None,
            review: None,
            cover_url: String::new(),
        }
    }

    pub fn has_metadata(&self) -> bool {
        !self.title.is_empty()
    }
}

/// A book suggested by the backend, with the reason it matches the profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub book: Book,
    pub description: String,
    pub pages: u32,
    pub publish_year: i32,
    pub match_reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factor(status: FactorStatus) -> MfaFactor {
        MfaFactor {
            id: Uuid::new_v4(),
            friendly_name: None,
            factor_type: FactorType::Totp,
            status,
            created_at: Utc::now(),
        }
    }

    fn session(assurance: AssuranceLevel, factors: Vec<MfaFactor>) -> Session {
        Session {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
            assurance,
            user: User {
                id: Uuid::new_v4(),
                email: Some("ann@example.com".into()),
                providers: vec!["email".into(), TOTP_PROVIDER.into()],
                factors,
            },
        }
    }

    #[test]
    fn verification_code_requires_six_digits() {
        assert_eq!(VerificationCode::parse(" 123456 ").unwrap().as_str(), "123456");
        assert_eq!(VerificationCode::parse("12345"), Err(ValidationError::InvalidCode));
        assert_eq!(VerificationCode::parse("12345a"), Err(ValidationError::InvalidCode));
        assert_eq!(VerificationCode::parse(""), Err(ValidationError::InvalidCode));
    }

    #[test]
    fn session_with_verified_factor_needs_aal2() {
        let partial = session(AssuranceLevel::Aal1, vec![factor(FactorStatus::Verified)]);
        assert!(!partial.is_fully_authenticated());

        let complete = session(AssuranceLevel::Aal2, vec![factor(FactorStatus::Verified)]);
        assert!(complete.is_fully_authenticated());

        // An unverified enrollment does not gate the session.
        let pending = session(AssuranceLevel::Aal1, vec![factor(FactorStatus::Unverified)]);
        assert!(pending.is_fully_authenticated());
    }

    #[test]
    fn factor_list_keeps_only_verified_totp() {
        let verified = factor(FactorStatus::Verified);
        let list = FactorList::from_factors(vec![factor(FactorStatus::Unverified), verified.clone()]);
        assert_eq!(list.all.len(), 2);
        assert_eq!(list.totp, vec![verified]);
    }

    #[test]
    fn toggling_genres_preserves_order() {
        let mut profile = UserProfile::default();
        profile.toggle_genre("Mystery");
        profile.toggle_genre("Poetry");
        profile.toggle_genre("Fiction");
        profile.toggle_genre("Poetry");
        assert_eq!(profile.favorite_genres, vec!["Mystery", "Fiction"]);
    }

    #[test]
    fn preferred_length_snaps_to_slider() {
        assert_eq!(UserProfile::snap_preferred_length(20), 100);
        assert_eq!(UserProfile::snap_preferred_length(274), 250);
        assert_eq!(UserProfile::snap_preferred_length(276), 300);
        assert_eq!(UserProfile::snap_preferred_length(900), 500);
    }

    #[test]
    fn profile_validation() {
        let mut profile = UserProfile::default();
        assert!(profile.validate().is_ok());

        profile.preferred_length = 260;
        assert!(matches!(
            profile.validate(),
            Err(ValidationError::InvalidValue { field: "preferred length", .. })
        ));

        profile.preferred_length = 300;
        profile.favorite_genres.push("Westerns".into());
        assert!(matches!(
            profile.validate(),
            Err(ValidationError::InvalidValue { field: "favorite genres", .. })
        ));
    }
}
