//! services/client/src/adapters/functions.rs
//!
//! This module contains the library adapter, the concrete implementation of the
//! `LibraryService` port. Profile, wishlist, reading history and
//! recommendations are served by the backend's edge function; this adapter
//! converts its camelCase JSON records into domain types.

use crate::adapters::response::{endpoint, ensure_success, read_json, transport_error};
use crate::adapters::session_store::SessionStore;
use crate::config::Config;
use async_trait::async_trait;
use chrono::NaiveDate;
use egolay_core::domain::{Book, ReadingLevel, Recommendation, UserProfile, DEFAULT_THEME};
use egolay_core::ports::{LibraryService, PortError, PortResult};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A library adapter that implements the `LibraryService` port.
#[derive(Clone)]
pub struct FunctionsAdapter {
    http: Client,
    base_url: String,
    anon_key: String,
    sessions: Arc<SessionStore>,
}

impl FunctionsAdapter {
    /// Creates a new `FunctionsAdapter`.
    pub fn new(http: Client, config: &Config, sessions: Arc<SessionStore>) -> Self {
        Self {
            http,
            base_url: config.functions_url(),
            anon_key: config.anon_key.clone(),
            sessions,
        }
    }

    /// Builds a request authorized as the current user, or anonymously when signed out.
    async fn request(&self, method: Method, segments: &[&str]) -> PortResult<RequestBuilder> {
        let url = endpoint(&self.base_url, segments)?;
        let token = self
            .sessions
            .access_token()
            .await
            .unwrap_or_else(|| self.anon_key.clone());
        Ok(self
            .http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token))
    }
}

//=========================================================================================
// Wire Records
//=========================================================================================

fn default_preferred_length() -> u32 {
    UserProfile::default().preferred_length
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileRecord {
    #[serde(default)]
    name: String,
    #[serde(default)]
    age: u32,
    #[serde(default)]
    reading_level: String,
    #[serde(default = "default_preferred_length")]
    preferred_length: u32,
    #[serde(default)]
    favorite_genres: Vec<String>,
    #[serde(default)]
    current_moods: Vec<String>,
    #[serde(default)]
    favorite_authors: String,
    #[serde(default)]
    recent_favorite: String,
    #[serde(default)]
    looking_for: String,
    #[serde(default)]
    theme: Option<String>,
}

impl ProfileRecord {
    fn to_domain(self) -> UserProfile {
        UserProfile {
            name: self.name,
            age: self.age,
            reading_level: ReadingLevel::parse(&self.reading_level),
            preferred_length: self.preferred_length,
            favorite_genres: self.favorite_genres,
            current_moods: self.current_moods,
            favorite_authors: self.favorite_authors,
            recent_favorite: self.recent_favorite,
            looking_for: self.looking_for,
            theme: self
                .theme
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_THEME.to_string()),
        }
    }

    fn from_domain(profile: &UserProfile) -> Self {
        Self {
            name: profile.name.clone(),
            age: profile.age,
            reading_level: profile
                .reading_level
                .map(|l| l.as_str().to_string())
                .unwrap_or_default(),
            preferred_length: profile.preferred_length,
            favorite_genres: profile.favorite_genres.clone(),
            current_moods: profile.current_moods.clone(),
            favorite_authors: profile.favorite_authors.clone(),
            recent_favorite: profile.recent_favorite.clone(),
            looking_for: profile.looking_for.clone(),
            theme: Some(profile.theme.clone()),
        }
    }
}

/// Accepts `""`, `"2024-03-01"` and full timestamps; anything else reads as no date.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .map(str::trim)
        .and_then(|s| s.get(..10))
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()))
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookRecord {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default, rename = "genre")]
    genres: Vec<String>,
    #[serde(default)]
    rating: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    my_rating: Option<f32>,
    #[serde(default, deserialize_with = "lenient_date", skip_serializing_if = "Option::is_none")]
    date_read: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    review: Option<String>,
    #[serde(default)]
    cover_url: String,
}

impl BookRecord {
    fn to_domain(self) -> Book {
        Book {
            id: self.id,
            title: self.title,
            author: self.author,
            genres: self.genres,
            rating: self.rating,
            // Zero means unrated.
            my_rating: self
                .my_rating
                .filter(|r| *r >= 0.5)
                .map(|r| r.round().clamp(1.0, 5.0) as u8),
            date_read: self.date_read,
            review: self.review.filter(|r| !r.trim().is_empty()),
            cover_url: self.cover_url,
        }
    }

    fn from_domain(book: &Book) -> Self {
        Self {
            id: book.id.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            genres: book.genres.clone(),
            rating: book.rating,
            my_rating: book.my_rating.map(f32::from),
            date_read: book.date_read,
            review: book.review.clone(),
            cover_url: book.cover_url.clone(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationRecord {
    #[serde(flatten)]
    book: BookRecord,
    #[serde(default)]
    description: String,
    #[serde(default)]
    pages: u32,
    #[serde(default)]
    publish_year: i32,
    #[serde(default)]
    match_reason: String,
}

impl RecommendationRecord {
    fn to_domain(self) -> Recommendation {
        Recommendation {
            book: self.book.to_domain(),
            description: self.description,
            pages: self.pages,
            publish_year: self.publish_year,
            match_reason: self.match_reason,
        }
    }
}

#[derive(Deserialize)]
struct ProfileEnvelope {
    #[serde(default)]
    profile: Option<ProfileRecord>,
}

#[derive(Deserialize)]
struct WishlistEnvelope {
    #[serde(default)]
    wishlist: Vec<BookRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryEnvelope {
    #[serde(default)]
    reading_history: Vec<BookRecord>,
}

#[derive(Deserialize)]
struct RecommendationsEnvelope {
    #[serde(default)]
    recommendations: Vec<RecommendationRecord>,
}

//=========================================================================================
// `LibraryService` Trait Implementation
//=========================================================================================

#[async_trait]
impl LibraryService for FunctionsAdapter {
    async fn get_profile(&self) -> PortResult<Option<UserProfile>> {
        let response = self
            .request(Method::GET, &["profile"])
            .await?
            .send()
            .await
            .map_err(transport_error)?;
        let envelope: ProfileEnvelope = read_json(response).await?;
        Ok(envelope.profile.map(ProfileRecord::to_domain))
    }

    async fn update_profile(&self, profile: &UserProfile) -> PortResult<UserProfile> {
        let response = self
            .request(Method::PUT, &["profile"])
            .await?
            .json(&ProfileRecord::from_domain(profile))
            .send()
            .await
            .map_err(transport_error)?;
        let body = ensure_success(response)
            .await?
            .text()
            .await
            .map_err(transport_error)?;
        // An empty answer, or one without `profile`, keeps what was sent.
        if body.trim().is_empty() {
            return Ok(profile.clone());
        }
        let envelope: ProfileEnvelope = serde_json::from_str(&body)
            .map_err(|e| PortError::Unexpected(format!("malformed response body: {}", e)))?;
        Ok(envelope
            .profile
            .map(ProfileRecord::to_domain)
            .unwrap_or_else(|| profile.clone()))
    }

    async fn get_wishlist(&self) -> PortResult<Vec<Book>> {
        let response = self
            .request(Method::GET, &["wishlist"])
            .await?
            .send()
            .await
            .map_err(transport_error)?;
        let envelope: WishlistEnvelope = read_json(response).await?;
        Ok(envelope.wishlist.into_iter().map(BookRecord::to_domain).collect())
    }

    async fn add_to_wishlist(&self, book_id: &str, book: Option<&Book>) -> PortResult<()> {
        let body = json!({
            "bookId": book_id,
            "bookData": book.map(BookRecord::from_domain),
        });
        let response = self
            .request(Method::POST, &["wishlist"])
            .await?
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response).await?;
        debug!(book_id, "Added to wishlist");
        Ok(())
    }

    async fn remove_from_wishlist(&self, book_id: &str) -> PortResult<()> {
        let response = self
            .request(Method::DELETE, &["wishlist", book_id])
            .await?
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response).await?;
        debug!(book_id, "Removed from wishlist");
        Ok(())
    }

    async fn get_reading_history(&self) -> PortResult<Vec<Book>> {
        let response = self
            .request(Method::GET, &["reading-history"])
            .await?
            .send()
            .await
            .map_err(transport_error)?;
        let envelope: HistoryEnvelope = read_json(response).await?;
        Ok(envelope
            .reading_history
            .into_iter()
            .map(BookRecord::to_domain)
            .collect())
    }

    async fn add_to_reading_history(&self, book: &Book) -> PortResult<()> {
        let response = self
            .request(Method::POST, &["reading-history"])
            .await?
            .json(&json!({ "bookData": BookRecord::from_domain(book) }))
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response).await?;
        debug!(book_id = %book.id, "Added to reading history");
        Ok(())
    }

    async fn get_recommendations(&self) -> PortResult<Vec<Recommendation>> {
        let response = self
            .request(Method::GET, &["recommendations"])
            .await?
            .send()
            .await
            .map_err(transport_error)?;
        let envelope: RecommendationsEnvelope = read_json(response).await?;
        Ok(envelope
            .recommendations
            .into_iter()
            .map(RecommendationRecord::to_domain)
            .collect())
    }
}
